//! Falling-glyph animation with the CPU temperature in the center.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::text::{FontCache, MONO_FONT_PATTERNS, OVERLAY_FONT_PATTERNS};
use super::{DISPLAY_HEIGHT, DISPLAY_WIDTH, Raster};
use crate::utils::sensors::{MetricsSource, format_temperature};

// =============================================================================
// Constants
// =============================================================================

pub const COLUMN_PITCH: u32 = 10;
pub const COLUMN_COUNT: usize = (DISPLAY_WIDTH / COLUMN_PITCH) as usize;
pub const CELL_HEIGHT: f32 = 15.0;

/// Columns reset once their head passes this far below the display.
const RESET_MARGIN: f32 = 100.0;
/// Trail segments this far outside the display are still drawn.
const VISIBLE_MARGIN: f32 = 20.0;

const GLYPH_POOL: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const GLYPH_SIZE: u32 = 12;
const TEMPERATURE_SIZE: u32 = 60;
const TEMPERATURE_PADDING: i32 = 10;
const BOX_COLOR: Rgb<u8> = Rgb([0, 30, 0]);
const BOX_BLEND: f32 = 0.3;

pub const SHADE_BRIGHT: Rgb<u8> = Rgb([0, 255, 0]);
pub const SHADE_MID: Rgb<u8> = Rgb([0, 200, 0]);
pub const SHADE_DIM: Rgb<u8> = Rgb([0, 100, 0]);
pub const SHADE_VERY_DIM: Rgb<u8> = Rgb([0, 50, 0]);

/// Quantize a trail brightness (1 = head) into one of four greens.
pub fn trail_shade(brightness: f32) -> Rgb<u8> {
    if brightness > 0.75 {
        SHADE_BRIGHT
    } else if brightness > 0.5 {
        SHADE_MID
    } else if brightness > 0.25 {
        SHADE_DIM
    } else {
        SHADE_VERY_DIM
    }
}

// =============================================================================
// State
// =============================================================================

/// One falling column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixColumn {
    /// Head position in pixels; negative is above the display.
    pub y: f32,
    pub glyph: char,
    /// Pixels per frame.
    pub speed: f32,
    /// Number of glyphs in the trail, fixed for the column's life.
    pub trail_length: u32,
}

/// Matrix animation state.
#[derive(Debug, Clone)]
pub struct MatrixState {
    columns: Vec<MatrixColumn>,
    rng: StdRng,
    fps: f64,
    frame_count: u64,
}

impl MatrixState {
    pub fn new(fps: f64) -> Self {
        Self::with_rng(fps, StdRng::from_entropy())
    }

    /// Deterministic state for a given seed.
    pub fn with_seed(fps: f64, seed: u64) -> Self {
        Self::with_rng(fps, StdRng::seed_from_u64(seed))
    }

    fn with_rng(fps: f64, mut rng: StdRng) -> Self {
        let columns = (0..COLUMN_COUNT)
            .map(|_| MatrixColumn {
                y: rng.gen_range(-200..=0) as f32,
                glyph: random_glyph(&mut rng),
                speed: random_speed(&mut rng),
                trail_length: rng.gen_range(5..=15),
            })
            .collect();

        Self {
            columns,
            rng,
            fps,
            frame_count: 0,
        }
    }

    pub fn columns(&self) -> &[MatrixColumn] {
        &self.columns
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Move every column down one step, resetting those that left the display.
    pub fn advance(&mut self) {
        let limit = DISPLAY_HEIGHT as f32 + RESET_MARGIN;
        for column in &mut self.columns {
            column.y += column.speed;
            if column.y > limit {
                column.y = self.rng.gen_range(-200.0..0.0);
                column.glyph = random_glyph(&mut self.rng);
                column.speed = random_speed(&mut self.rng);
            }
        }
    }

    /// Advance the animation and draw one frame.
    pub fn render<M: MetricsSource>(&mut self, fonts: &mut FontCache, metrics: &mut M) -> Raster {
        self.advance();

        let mut img = RgbImage::new(DISPLAY_WIDTH, DISPLAY_HEIGHT);
        let glyph_font = fonts.get(&MONO_FONT_PATTERNS, GLYPH_SIZE);
        let mut buf = [0u8; 4];

        for (idx, column) in self.columns.iter().enumerate() {
            let x = idx as i32 * COLUMN_PITCH as i32 + 2;
            let glyph = column.glyph.encode_utf8(&mut buf);

            for i in 0..column.trail_length {
                let y = column.y - i as f32 * CELL_HEIGHT;
                if y <= -VISIBLE_MARGIN || y >= DISPLAY_HEIGHT as f32 + VISIBLE_MARGIN {
                    continue;
                }
                let shade = trail_shade(1.0 - i as f32 / column.trail_length as f32);
                glyph_font.draw(&mut img, shade, x, y as i32, glyph);
            }
        }

        let temperature = format_temperature(metrics.cpu_temperature());
        let temp_font = fonts.get(&OVERLAY_FONT_PATTERNS, TEMPERATURE_SIZE);
        let (w, h) = temp_font.measure(&temperature);
        let cx = DISPLAY_WIDTH as i32 / 2;
        let cy = DISPLAY_HEIGHT as i32 / 2;

        let x0 = cx - w / 2 - TEMPERATURE_PADDING;
        let y0 = cy - h / 2 - TEMPERATURE_PADDING;
        let x1 = cx + w / 2 + TEMPERATURE_PADDING;
        let y1 = cy + h / 2 + TEMPERATURE_PADDING;
        blend_backing_box(&mut img, (x0, y0), (x1, y1));

        temp_font.draw(&mut img, SHADE_BRIGHT, cx - w / 2, cy - h / 2, &temperature);

        self.frame_count += 1;
        img
    }
}

fn random_glyph(rng: &mut StdRng) -> char {
    GLYPH_POOL[rng.gen_range(0..GLYPH_POOL.len())] as char
}

fn random_speed(rng: &mut StdRng) -> f32 {
    rng.gen_range(1.5..3.0)
}

/// Blend the frame with a black layer holding the backing box.
///
/// Corners are inclusive. Every pixel becomes `0.7 * frame + 0.3 * layer`.
fn blend_backing_box(img: &mut Raster, (x0, y0): (i32, i32), (x1, y1): (i32, i32)) {
    let mut layer = RgbImage::new(img.width(), img.height());
    if x1 >= x0 && y1 >= y0 {
        draw_filled_rect_mut(
            &mut layer,
            Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32),
            BOX_COLOR,
        );
    }

    for (dst, src) in img.pixels_mut().zip(layer.pixels()) {
        for (d, s) in dst.0.iter_mut().zip(src.0) {
            *d = ((1.0 - BOX_BLEND) * *d as f32 + BOX_BLEND * s as f32).round() as u8;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
