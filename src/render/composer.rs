//! Background plus status overlay composition.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use tracing::trace;

use super::text::OVERLAY_FONT_PATTERNS;
use super::{DISPLAY_HEIGHT, DISPLAY_WIDTH, Raster, RenderContext};
use crate::utils::sensors::{MetricsSource, format_temperature};

// =============================================================================
// Layout
// =============================================================================

pub const FONT_SIZE_TIME: u32 = 90;
pub const FONT_SIZE_CPU: u32 = 35;
pub const FONT_SIZE_DATE: u32 = 45;

pub const COLOR_TEMPERATURE: Rgb<u8> = Rgb([0, 200, 255]);
pub const COLOR_USAGE: Rgb<u8> = Rgb([255, 160, 0]);
pub const COLOR_TIME: Rgb<u8> = Rgb([0, 255, 200]);
pub const COLOR_DATE: Rgb<u8> = Rgb([120, 120, 120]);

pub const FALLBACK_BG: Rgb<u8> = Rgb([30, 30, 30]);
pub const FALLBACK_RECT: Rgb<u8> = Rgb([10, 10, 10]);

const TEMPERATURE_POS: (i32, i32) = (60, 100);
const USAGE_RIGHT_EDGE: i32 = 420;
const USAGE_Y: i32 = 100;
const CENTER_X: i32 = 240;
const TIME_Y: i32 = 180;
const DATE_Y: i32 = 290;

/// Inclusive corners of the placeholder rectangle.
const FALLBACK_RECT_CORNERS: ((i32, i32), (i32, i32)) = ((40, 40), (440, 440));

// =============================================================================
// Overlay Settings
// =============================================================================

/// Per-frame overlay options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayConfig {
    pub show: bool,
    /// Carried through to the composer; currently drawn at full strength.
    pub opacity: u8,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            show: true,
            opacity: 180,
        }
    }
}

/// Exponential smoothing of CPU usage across frames.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuSmoother {
    value: Option<f32>,
}

impl CpuSmoother {
    const KEEP: f32 = 0.7;

    /// Feed a raw sample and return the smoothed value.
    ///
    /// The first sample is taken as-is.
    pub fn update(&mut self, raw: f32) -> f32 {
        let next = match self.value {
            Some(prev) => Self::KEEP * prev + (1.0 - Self::KEEP) * raw,
            None => raw,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f32> {
        self.value
    }
}

// =============================================================================
// Composition
// =============================================================================

/// Dark placeholder used when no background is available.
pub fn themed_fallback() -> Raster {
    let mut img = RgbImage::from_pixel(DISPLAY_WIDTH, DISPLAY_HEIGHT, FALLBACK_BG);
    let ((x0, y0), (x1, y1)) = FALLBACK_RECT_CORNERS;
    draw_filled_rect_mut(
        &mut img,
        Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32),
        FALLBACK_RECT,
    );
    img
}

/// Compose one frame using the current local time.
pub fn compose_frame<M: MetricsSource>(
    ctx: &mut RenderContext,
    background: Option<&Arc<Raster>>,
    overlay: OverlayConfig,
    metrics: &mut M,
) -> Arc<Raster> {
    compose_frame_at(ctx, background, overlay, metrics, Local::now().naive_local())
}

/// Compose one frame for the given wall-clock time.
///
/// With a background and no overlay the background is returned as-is. A
/// cached background is never drawn on; the overlay goes onto a copy.
pub fn compose_frame_at<M: MetricsSource>(
    ctx: &mut RenderContext,
    background: Option<&Arc<Raster>>,
    overlay: OverlayConfig,
    metrics: &mut M,
    now: NaiveDateTime,
) -> Arc<Raster> {
    let mut img = match (background, overlay.show) {
        (Some(bg), false) => return Arc::clone(bg),
        (Some(bg), true) => bg.as_ref().clone(),
        (None, show) => {
            let fallback = themed_fallback();
            if !show {
                return Arc::new(fallback);
            }
            fallback
        }
    };

    draw_overlay(ctx, &mut img, metrics, now);
    Arc::new(img)
}

fn draw_overlay<M: MetricsSource>(
    ctx: &mut RenderContext,
    img: &mut Raster,
    metrics: &mut M,
    now: NaiveDateTime,
) {
    let temperature = format_temperature(metrics.cpu_temperature());
    let usage = ctx.cpu.update(metrics.cpu_usage().unwrap_or(0.0));
    let usage = format!("{}%", usage as i32);
    let time = now.format("%H:%M:%S").to_string();
    let date = now.format("%d.%m.%Y").to_string();

    trace!(%temperature, %usage, %time, "drawing overlay");

    let cpu_font = ctx.fonts.get(&OVERLAY_FONT_PATTERNS, FONT_SIZE_CPU);
    let time_font = ctx.fonts.get(&OVERLAY_FONT_PATTERNS, FONT_SIZE_TIME);
    let date_font = ctx.fonts.get(&OVERLAY_FONT_PATTERNS, FONT_SIZE_DATE);

    let (tx, ty) = TEMPERATURE_POS;
    cpu_font.draw(img, COLOR_TEMPERATURE, tx, ty, &temperature);
    cpu_font.draw_right_aligned(img, COLOR_USAGE, USAGE_RIGHT_EDGE, USAGE_Y, &usage);
    time_font.draw_centered(img, COLOR_TIME, CENTER_X, TIME_Y, &time);
    date_font.draw_centered(img, COLOR_DATE, CENTER_X, DATE_Y, &date);
}

// =============================================================================
// Tests
// =============================================================================
