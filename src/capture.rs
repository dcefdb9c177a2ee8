//! Screen capture and screenshot encoding.
//!
//! A [`ScreenSource`] produces raw RGBA frames; [`encode_screenshot`] blurs
//! (optionally) and encodes them as PNG. Real capture goes through `xcap`
//! and is only compiled with the `screen-capture` feature.

use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No monitors found")]
    NoMonitor,
    #[error("Screen capture failed: {0}")]
    Capture(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Screen capture not available in this build (enable the `screen-capture` feature)")]
    Unsupported,
}

/// Anything that can grab the current screen contents.
pub trait ScreenSource: Send + Sync {
    fn capture(&self) -> Result<RgbaImage, CaptureError>;
}

/// Blur radius and other per-agent screenshot options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    /// Gaussian sigma applied when blur is enabled
    pub blur_sigma: f32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self { blur_sigma: 10.0 }
    }
}

/// Encode a frame as PNG, blurring it first when `blur_sigma` is given.
pub fn encode_screenshot(image: &RgbaImage, blur_sigma: Option<f32>) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);

    match blur_sigma {
        Some(sigma) if sigma > 0.0 => image::imageops::blur(image, sigma)
            .write_to(&mut cursor, ImageFormat::Png),
        _ => image.write_to(&mut cursor, ImageFormat::Png),
    }
    .map_err(|e| CaptureError::Encode(e.to_string()))?;

    Ok(buffer)
}

/// Capture from `source` and encode per the current blur setting.
pub fn capture_screenshot(
    source: &dyn ScreenSource,
    blurred: bool,
    options: &CaptureOptions,
) -> Result<Vec<u8>, CaptureError> {
    let frame = source.capture()?;
    encode_screenshot(&frame, blurred.then_some(options.blur_sigma))
}

/// Primary monitor capture via xcap.
#[cfg(feature = "screen-capture")]
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimaryMonitor;

#[cfg(feature = "screen-capture")]
impl ScreenSource for PrimaryMonitor {
    fn capture(&self) -> Result<RgbaImage, CaptureError> {
        let monitors = xcap::Monitor::all().map_err(|e| CaptureError::Capture(e.to_string()))?;

        let primary = monitors
            .iter()
            .position(|m| m.is_primary().unwrap_or(false))
            .unwrap_or(0);
        let monitor = monitors.get(primary).ok_or(CaptureError::NoMonitor)?;

        let frame = monitor
            .capture_image()
            .map_err(|e| CaptureError::Capture(e.to_string()))?;

        let (width, height) = (frame.width(), frame.height());
        RgbaImage::from_raw(width, height, frame.into_raw())
            .ok_or_else(|| CaptureError::Capture("Failed to create image buffer".to_string()))
    }
}

/// Stand-in used when the binary is built without screen capture.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableScreen;

impl ScreenSource for UnavailableScreen {
    fn capture(&self) -> Result<RgbaImage, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}

/// The best screen source this build supports.
pub fn default_screen_source() -> Box<dyn ScreenSource> {
    #[cfg(feature = "screen-capture")]
    {
        Box::new(PrimaryMonitor)
    }
    #[cfg(not(feature = "screen-capture"))]
    {
        Box::new(UnavailableScreen)
    }
}
