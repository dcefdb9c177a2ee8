//! Activity Capture Agent CLI
//!
//! Runs the capture agent in the foreground and controls a running agent
//! through the shared config file.

use activity_capture_agent::{
    collector::check_permission,
    config::{validate_interval, Config, SourceConfig},
    create_shared_stats_with_persistence,
    instance::{InstanceError, InstanceLock},
    stats::read_persisted,
    Agent, AgentComponents, DeliveryQueue, Spool, DISCLOSURE, VERSION,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "activity_capture_agent=info,activity_agent=info,warn";

#[derive(Parser)]
#[command(name = "activity-agent")]
#[command(version = VERSION)]
#[command(about = "Background capture of input activity and screenshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent in the foreground
    Run {
        /// Input sources to capture (keyboard, mouse, or all)
        #[arg(long, default_value = "all")]
        sources: String,

        /// Start without capturing; wait for `activity-agent start`
        #[arg(long)]
        idle: bool,

        /// Seconds between activity logs
        #[arg(long, allow_negative_numbers = true)]
        activity_interval: Option<i64>,

        /// Minutes between screenshots
        #[arg(long, allow_negative_numbers = true)]
        screenshot_interval: Option<i64>,

        /// Disable screenshots
        #[arg(long)]
        no_screenshots: bool,

        /// Blur screenshots before upload
        #[arg(long)]
        blur: bool,

        /// Write artifacts to this directory instead of uploading
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },

    /// Resume capturing in a running agent
    Start,

    /// Pause capturing in a running agent
    Stop,

    /// Set seconds between activity logs
    SetActivityInterval {
        #[arg(allow_negative_numbers = true)]
        secs: i64,
    },

    /// Set minutes between screenshots
    SetScreenshotInterval {
        #[arg(allow_negative_numbers = true)]
        mins: i64,
    },

    /// Turn screenshot capture on or off
    ToggleScreenshots,

    /// Turn screenshot blurring on or off
    ToggleBlur,

    /// Show current status
    Status,

    /// Show configuration
    Config,

    /// Display what the agent captures
    Disclosure,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            sources,
            idle,
            activity_interval,
            screenshot_interval,
            no_screenshots,
            blur,
            store_dir,
        } => cmd_run(RunOptions {
            sources,
            idle,
            activity_interval,
            screenshot_interval,
            no_screenshots,
            blur,
            store_dir,
        }),
        Commands::Start => cmd_set_capturing(true),
        Commands::Stop => cmd_set_capturing(false),
        Commands::SetActivityInterval { secs } => cmd_set_activity_interval(secs),
        Commands::SetScreenshotInterval { mins } => cmd_set_screenshot_interval(mins),
        Commands::ToggleScreenshots => cmd_toggle_screenshots(),
        Commands::ToggleBlur => cmd_toggle_blur(),
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
        Commands::Disclosure => {
            println!("{DISCLOSURE}");
            Ok(())
        }
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

struct RunOptions {
    sources: String,
    idle: bool,
    activity_interval: Option<i64>,
    screenshot_interval: Option<i64>,
    no_screenshots: bool,
    blur: bool,
    store_dir: Option<PathBuf>,
}

fn cmd_run(options: RunOptions) -> Result<()> {
    init_logging();

    println!("Activity Capture Agent v{VERSION}");
    println!();

    let mut config = Config::load().context("Failed to load configuration")?;
    config
        .ensure_directories()
        .context("Failed to create data directory")?;

    // Nothing else may touch shared state until we own the lock.
    let _lock = match InstanceLock::acquire(config.lock_path()) {
        Ok(lock) => lock,
        Err(InstanceError::AlreadyRunning(path)) => {
            eprintln!("Error: another instance of the agent is already running.");
            eprintln!("Lock file: {}", path.display());
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::Error::new(e).context("Failed to acquire instance lock"))
        }
    };

    let sources = SourceConfig::from_csv(&options.sources);
    if !sources.any_enabled() {
        eprintln!("Error: At least one source must be enabled (keyboard or mouse)");
        std::process::exit(1);
    }
    config.sources = sources;

    if let Some(secs) = options.activity_interval {
        config.activity_interval_secs = checked_interval("activity interval", secs);
    }
    if let Some(mins) = options.screenshot_interval {
        config.screenshot_interval_mins = checked_interval("screenshot interval", mins);
    }
    if options.no_screenshots {
        config.capture_screenshots = false;
    }
    if options.blur {
        config.capture_blurred = true;
    }
    if options.store_dir.is_some() {
        config.store.directory = options.store_dir;
    }
    config.capturing = !options.idle;

    // The file is what control commands edit, so it must match what we run with.
    config.save().context("Failed to save configuration")?;

    if !check_permission() {
        warn!("Input monitoring permission not granted; activity logs will be empty");
    }

    let stats = create_shared_stats_with_persistence(config.stats_path());
    let components = AgentComponents::from_config(&config, stats.clone())
        .context("Failed to set up capture agent")?;

    // The spool stays on disk until the restored artifacts are delivered, so
    // a crash after this point loses nothing.
    let spool = Spool::new(config.spool_path());
    let spool_readable = match spool.load() {
        Ok(restored) => {
            if !restored.is_empty() {
                info!("Restored {} queued artifacts from the spool", restored.len());
                components.dispatcher.queue().extend(restored);
            }
            true
        }
        Err(e) => {
            warn!("Ignoring unreadable spool at {}: {e}", spool.dir().display());
            false
        }
    };

    // Keys the spool on disk holds right now
    let mut spooled = components.dispatcher.queue().keys();

    let settings = components.settings.snapshot();
    println!("  Keyboard: {}", enabled(config.sources.keyboard));
    println!("  Mouse: {}", enabled(config.sources.mouse));
    println!("  Activity interval: {}s", settings.activity_interval_secs);
    println!(
        "  Screenshots: {} (every {}m, blur {})",
        enabled(settings.capture_screenshots),
        settings.screenshot_interval_mins,
        enabled(settings.capture_blurred)
    );
    println!(
        "  Store: {}",
        components.dispatcher.uploader().store().describe()
    );
    println!();

    let agent = Agent::new(components);
    if config.capturing {
        agent.start();
        println!("Capturing. Press Ctrl+C to stop");
    } else {
        println!("Idle. Run `activity-agent start` to begin capturing");
    }
    println!();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")?;

    // Poll the config file so control commands reach this process.
    let mut last_config_check = Instant::now();
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
        if last_config_check.elapsed() < Duration::from_secs(1) {
            continue;
        }
        last_config_check = Instant::now();

        match Config::load() {
            Ok(cfg) => apply_config(&agent, &cfg),
            Err(e) => warn!("Could not reload config: {e}"),
        }

        if spool_readable {
            spooled = checkpoint_spool(&spool, agent.queue(), spooled);
        }
    }

    println!();
    println!("Shutting down...");
    agent.shutdown();

    let pending = agent.queue().take_all();
    if spool_readable || !pending.is_empty() {
        match spool.save(&pending) {
            Ok(()) if pending.is_empty() => {}
            Ok(()) => println!("Spooled {} undelivered artifacts", pending.len()),
            Err(e) => eprintln!("Error spooling undelivered artifacts: {e}"),
        }
    }

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save stats: {e}");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

/// Mirror the delivery queue to the spool if its keys moved since the last
/// write. Returns the keys now on disk.
fn checkpoint_spool(spool: &Spool, queue: &DeliveryQueue, spooled: Vec<String>) -> Vec<String> {
    let keys = queue.keys();
    if keys == spooled {
        return spooled;
    }
    match spool.save(&queue.snapshot()) {
        Ok(()) => {
            debug!("Spool updated ({} queued)", keys.len());
            keys
        }
        Err(e) => {
            warn!("Could not update spool at {}: {e}", spool.dir().display());
            spooled
        }
    }
}

/// Bring the running agent in line with the persisted config.
fn apply_config(agent: &Agent, config: &Config) {
    let live = agent.settings().snapshot();

    if config.activity_interval_secs != live.activity_interval_secs {
        if let Err(e) = agent.set_activity_interval(config.activity_interval_secs as i64) {
            warn!("{e}");
        }
    }
    if config.screenshot_interval_mins != live.screenshot_interval_mins {
        if let Err(e) = agent.set_screenshot_interval(config.screenshot_interval_mins as i64) {
            warn!("{e}");
        }
    }
    if config.capture_screenshots != live.capture_screenshots {
        agent.toggle_screenshot_capture();
    }
    if config.capture_blurred != live.capture_blurred {
        agent.toggle_blur();
    }

    if config.capturing && agent.start() {
        println!("Capture resumed");
    } else if !config.capturing && agent.stop() {
        println!("Capture paused");
    }
}

fn checked_interval(what: &'static str, value: i64) -> u64 {
    match validate_interval(what, value) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

fn update_config(edit: impl FnOnce(&mut Config)) -> Result<Config> {
    let mut config = Config::load().context("Failed to load configuration")?;
    edit(&mut config);
    config.save().context("Failed to save configuration")?;
    Ok(config)
}

fn cmd_set_capturing(capturing: bool) -> Result<()> {
    update_config(|c| c.capturing = capturing)?;
    if capturing {
        println!("Capture started.");
    } else {
        println!("Capture stopped. Use 'activity-agent start' to continue.");
    }
    Ok(())
}

fn cmd_set_activity_interval(secs: i64) -> Result<()> {
    let secs = checked_interval("activity interval", secs);
    update_config(|c| c.activity_interval_secs = secs)?;
    println!("Activity interval set to {secs}s.");
    Ok(())
}

fn cmd_set_screenshot_interval(mins: i64) -> Result<()> {
    let mins = checked_interval("screenshot interval", mins);
    update_config(|c| c.screenshot_interval_mins = mins)?;
    println!("Screenshot interval set to {mins}m.");
    Ok(())
}

fn cmd_toggle_screenshots() -> Result<()> {
    let config = update_config(|c| c.capture_screenshots = !c.capture_screenshots)?;
    println!("Screenshot capture {}.", enabled(config.capture_screenshots));
    Ok(())
}

fn cmd_toggle_blur() -> Result<()> {
    let config = update_config(|c| c.capture_blurred = !c.capture_blurred)?;
    println!("Screenshot blur {}.", enabled(config.capture_blurred));
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    println!("Activity Capture Agent Status");
    println!("=============================");
    println!();

    let agent_running = matches!(
        InstanceLock::acquire(config.lock_path()),
        Err(InstanceError::AlreadyRunning(_))
    );
    println!(
        "Agent process: {}",
        if agent_running { "running" } else { "not running" }
    );
    println!(
        "Input Monitoring Permission: {}",
        if check_permission() {
            "Granted ✓"
        } else {
            "Not Granted ✗"
        }
    );
    println!();

    println!("Configuration:");
    println!("  Capturing: {}", config.capturing);
    println!("  Keyboard capture: {}", enabled(config.sources.keyboard));
    println!("  Mouse capture: {}", enabled(config.sources.mouse));
    println!("  Activity interval: {}s", config.activity_interval_secs);
    println!(
        "  Screenshots: {} (every {}m)",
        enabled(config.capture_screenshots),
        config.screenshot_interval_mins
    );
    println!("  Blur: {}", enabled(config.capture_blurred));
    println!(
        "  Spooled artifacts: {}",
        Spool::new(config.spool_path()).pending()
    );
    println!();

    match read_persisted(&config.stats_path()) {
        Ok(stats) => {
            println!("Cumulative Statistics:");
            println!("  Activity windows logged: {}", stats.windows_logged);
            println!("  Activity windows suppressed: {}", stats.windows_suppressed);
            println!("  Screenshots captured: {}", stats.screenshots_captured);
            println!("  Capture failures: {}", stats.capture_failures);
            println!("  Artifacts delivered: {}", stats.artifacts_delivered);
            println!("  Delivery failures: {}", stats.delivery_failures);
            println!("  Artifacts queued offline: {}", stats.artifacts_queued);
            println!("  Last updated: {}", stats.last_updated);
        }
        Err(_) => println!("No previous session data found."),
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?
    );
    Ok(())
}
