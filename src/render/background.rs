//! Background image loading and scaling.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tracing::{debug, info};

use super::{DISPLAY_HEIGHT, DISPLAY_WIDTH, Raster};
use crate::config::ScalingMode;
use crate::error::{GalahadError, Result};

const FILTER: FilterType = FilterType::Lanczos3;

/// Load an image and scale it to the display size.
pub fn load_background(path: &Path, mode: ScalingMode) -> Result<Raster> {
    let img = image::open(path).map_err(|e| GalahadError::Background {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let source = img.to_rgb8();
    debug!(
        "decoded {} ({}x{}), scaling with {}",
        path.display(),
        source.width(),
        source.height(),
        mode
    );

    Ok(scale_to_display(&source, mode))
}

/// Scale an RGB image to exactly 480x480.
pub fn scale_to_display(source: &RgbImage, mode: ScalingMode) -> Raster {
    match mode {
        ScalingMode::Stretch => stretch(source),
        ScalingMode::Fit => fit(source),
        ScalingMode::Fill => fill(source),
    }
}

fn stretch(source: &RgbImage) -> Raster {
    imageops::resize(source, DISPLAY_WIDTH, DISPLAY_HEIGHT, FILTER)
}

fn fit(source: &RgbImage) -> Raster {
    let (w, h) = source.dimensions();
    let scale = (DISPLAY_WIDTH as f64 / w as f64)
        .min(DISPLAY_HEIGHT as f64 / h as f64)
        .min(1.0);

    let new_w = ((w as f64 * scale).round() as u32).clamp(1, DISPLAY_WIDTH);
    let new_h = ((h as f64 * scale).round() as u32).clamp(1, DISPLAY_HEIGHT);

    let mut canvas = RgbImage::from_pixel(DISPLAY_WIDTH, DISPLAY_HEIGHT, Rgb([0, 0, 0]));
    let x = (DISPLAY_WIDTH - new_w) / 2;
    let y = (DISPLAY_HEIGHT - new_h) / 2;

    if (new_w, new_h) == (w, h) {
        imageops::replace(&mut canvas, source, x as i64, y as i64);
    } else {
        let scaled = imageops::resize(source, new_w, new_h, FILTER);
        imageops::replace(&mut canvas, &scaled, x as i64, y as i64);
    }
    canvas
}

fn fill(source: &RgbImage) -> Raster {
    let (w, h) = source.dimensions();

    // Too small to cover without upscaling on one axis
    if w < DISPLAY_WIDTH || h < DISPLAY_HEIGHT {
        return stretch(source);
    }

    let scale = (DISPLAY_WIDTH as f64 / w as f64).max(DISPLAY_HEIGHT as f64 / h as f64);
    let new_w = ((w as f64 * scale).ceil() as u32).max(DISPLAY_WIDTH);
    let new_h = ((h as f64 * scale).ceil() as u32).max(DISPLAY_HEIGHT);

    let scaled = imageops::resize(source, new_w, new_h, FILTER);
    let left = (new_w - DISPLAY_WIDTH) / 2;
    let top = (new_h - DISPLAY_HEIGHT) / 2;
    imageops::crop_imm(&scaled, left, top, DISPLAY_WIDTH, DISPLAY_HEIGHT).to_image()
}

// =============================================================================
// Cache
// =============================================================================

struct CacheEntry {
    path: PathBuf,
    mode: ScalingMode,
    raster: Arc<Raster>,
}

/// Single-entry background cache keyed by (path, mode).
///
/// Requesting a different key replaces the entry.
#[derive(Default)]
pub struct BackgroundCache {
    entry: Option<CacheEntry>,
    decodes: usize,
}

impl BackgroundCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scaled background for `(path, mode)`, decoding only on a cache miss.
    pub fn get(&mut self, path: &Path, mode: ScalingMode) -> Result<Arc<Raster>> {
        match &self.entry {
            Some(entry) if entry.path == path && entry.mode == mode => {
                return Ok(Arc::clone(&entry.raster));
            }
            _ => {}
        }

        self.entry = None;
        self.decodes += 1;

        let raster = Arc::new(load_background(path, mode)?);
        info!("loaded background {} ({})", path.display(), mode);

        self.entry = Some(CacheEntry {
            path: path.to_path_buf(),
            mode,
            raster: Arc::clone(&raster),
        });
        Ok(raster)
    }

    /// Number of decode attempts so far.
    pub fn decode_count(&self) -> usize {
        self.decodes
    }
}

impl std::fmt::Debug for BackgroundCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundCache")
            .field("path", &self.entry.as_ref().map(|e| &e.path))
            .field("mode", &self.entry.as_ref().map(|e| e.mode))
            .field("decodes", &self.decodes)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
