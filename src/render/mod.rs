//! Frame rendering for the 480x480 pump display.
//!
//! Frames are either composed from a background plus a status overlay, or
//! produced by one of the animated presets. Caches that outlive a single
//! frame live in [`RenderContext`].

pub mod background;
pub mod composer;
pub mod heartbeat;
pub mod matrix;
pub mod preset;
pub mod text;

use image::RgbImage;

pub use background::{BackgroundCache, load_background};
pub use composer::{CpuSmoother, OverlayConfig, compose_frame};
pub use preset::Preset;
pub use text::{FontCache, FontHandle};

/// A display frame: 8-bit RGB, no alpha.
pub type Raster = RgbImage;

pub const DISPLAY_WIDTH: u32 = 480;
pub const DISPLAY_HEIGHT: u32 = 480;

/// Black raster of display size.
pub fn blank_raster() -> Raster {
    RgbImage::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
}

/// State shared by every frame for the life of the process.
#[derive(Debug, Default)]
pub struct RenderContext {
    pub backgrounds: BackgroundCache,
    pub fonts: FontCache,
    pub cpu: CpuSmoother,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context using a specific font cache.
    pub fn with_fonts(fonts: FontCache) -> Self {
        Self {
            backgrounds: BackgroundCache::new(),
            fonts,
            cpu: CpuSmoother::default(),
        }
    }
}
