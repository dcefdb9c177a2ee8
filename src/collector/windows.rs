//! Windows implementation of event collection using Windows Hooks.
//!
//! Low-level keyboard and mouse hooks (SetWindowsHookEx) run on a dedicated
//! thread with its own message loop.

use crate::collector::types::{InputEvent, KeyPressEvent, PointerMoveEvent};
use crate::collector::{CollectorConfig, CollectorError, EVENT_CHANNEL_CAPACITY};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::error;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx,
    HHOOK, MSG, MSLLHOOKSTRUCT, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_MOUSEMOVE, WM_QUIT,
    WM_SYSKEYDOWN,
};

/// The Windows event collector using Windows Hooks.
pub struct WindowsCollector {
    config: CollectorConfig,
    sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    running: Arc<AtomicBool>,
    hook_thread_id: Arc<AtomicU32>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WindowsCollector {
    /// Create a new Windows collector with the given configuration.
    pub fn new(config: CollectorConfig) -> Self {
        // Bounded so a stalled consumer cannot grow memory without limit
        let (sender, receiver) = bounded(EVENT_CHANNEL_CAPACITY);

        Self {
            config,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            hook_thread_id: Arc::new(AtomicU32::new(0)),
            thread_handle: None,
        }
    }

    /// Start capturing events in a background thread.
    ///
    /// Returns an error if the collector is already running.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let thread_id = self.hook_thread_id.clone();
        let config = self.config.clone();

        let handle = thread::spawn(move || {
            if let Err(e) = run_hook_loop(sender, running.clone(), thread_id, config) {
                error!("Hook loop error: {e}");
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop capturing events.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        // GetMessageW blocks until a message arrives; wake it with WM_QUIT.
        let thread_id = self.hook_thread_id.swap(0, Ordering::SeqCst);
        if thread_id != 0 {
            unsafe {
                let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    /// Check if the collector is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for input events.
    pub fn receiver(&self) -> &Receiver<InputEvent> {
        &self.receiver
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<InputEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for WindowsCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

// Hook procedures cannot capture state, so the sender lives in the hook
// thread's TLS.
thread_local! {
    static EVENT_SENDER: std::cell::RefCell<Option<Sender<InputEvent>>> = const { std::cell::RefCell::new(None) };
}

fn publish(event: InputEvent) {
    EVENT_SENDER.with(|sender| {
        if let Some(ref s) = *sender.borrow() {
            let _ = s.try_send(event);
        }
    });
}

/// Low-level keyboard hook callback.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 && matches!(w_param.0 as u32, WM_KEYDOWN | WM_SYSKEYDOWN) {
        publish(InputEvent::KeyPress(KeyPressEvent::new()));
    }

    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Low-level mouse hook callback.
unsafe extern "system" fn mouse_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 && w_param.0 as u32 == WM_MOUSEMOVE {
        let mouse_struct = &*(l_param.0 as *const MSLLHOOKSTRUCT);
        publish(InputEvent::PointerMove(PointerMoveEvent::new(
            mouse_struct.pt.x as f64,
            mouse_struct.pt.y as f64,
        )));
    }

    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

fn unhook_all(hooks: Vec<HHOOK>) {
    for hook in hooks {
        unsafe {
            let _ = UnhookWindowsHookEx(hook);
        }
    }
}

/// Run the Windows hook message loop.
fn run_hook_loop(
    sender: Sender<InputEvent>,
    running: Arc<AtomicBool>,
    thread_id: Arc<AtomicU32>,
    config: CollectorConfig,
) -> Result<(), CollectorError> {
    EVENT_SENDER.with(|s| {
        *s.borrow_mut() = Some(sender);
    });
    thread_id.store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);

    let mut hooks: Vec<HHOOK> = Vec::new();

    if config.capture_keyboard {
        match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) } {
            Ok(hook) => hooks.push(hook),
            Err(_) => {
                unhook_all(hooks);
                return Err(CollectorError::HookInstallationFailed);
            }
        }
    }

    if config.capture_mouse {
        match unsafe { SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0) } {
            Ok(hook) => hooks.push(hook),
            Err(_) => {
                unhook_all(hooks);
                return Err(CollectorError::HookInstallationFailed);
            }
        }
    }

    let mut msg = MSG::default();
    while running.load(Ordering::SeqCst) {
        // The hooks run inside GetMessageW; 0 is WM_QUIT, -1 an error
        let result = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
        if result.0 <= 0 {
            break;
        }
    }

    unhook_all(hooks);
    EVENT_SENDER.with(|s| {
        *s.borrow_mut() = None;
    });

    Ok(())
}

/// Check if the application can install low-level hooks.
pub fn check_permission() -> bool {
    unsafe {
        match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) {
            Ok(hook) => {
                let _ = UnhookWindowsHookEx(hook);
                true
            }
            Err(_) => false,
        }
    }
}
