//! Pulsing CPU load bar.
//!
//! A row of 16 block glyphs, mirrored around the center, whose heights follow
//! a sine wave that speeds up and brightens with CPU load.

use std::collections::VecDeque;

use image::{Rgb, RgbImage};

use super::text::{FontCache, FontHandle, MONO_FONT_PATTERNS, OVERLAY_FONT_PATTERNS};
use super::{DISPLAY_HEIGHT, DISPLAY_WIDTH, Raster};
use crate::utils::sensors::MetricsSource;

/// Lower block elements, shortest to full.
pub const BLOCK_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Segments on each side of the center.
pub const SEGMENTS_PER_SIDE: usize = 8;

const HISTORY_LEN: usize = 5;

const BAR_SIZE: u32 = 64;
const MIN_BAR_SIZE: u32 = 8;
const READOUT_SIZE: u32 = 56;
const LABEL_SIZE: u32 = 24;

const CENTER_X: i32 = DISPLAY_WIDTH as i32 / 2;
const READOUT_Y: i32 = 120;
const LABEL_Y: i32 = 190;
const BAR_Y: i32 = 260;

/// Horizontal cell of one bar segment; all 16 cells span the display exactly.
pub const SEGMENT_PITCH: i32 = DISPLAY_WIDTH as i32 / (2 * SEGMENTS_PER_SIDE as i32);

const FULL_BLOCK: &str = "█";

/// Left edges of the (right, left) cells for each segment, innermost first.
pub fn segment_cells() -> [(i32, i32); SEGMENTS_PER_SIDE] {
    std::array::from_fn(|i| {
        let offset = i as i32 * SEGMENT_PITCH;
        (CENTER_X + offset, CENTER_X - offset - SEGMENT_PITCH)
    })
}

/// Largest bar face up to the nominal size whose full block fits one cell.
pub fn bar_font(fonts: &mut FontCache) -> FontHandle {
    let mut size = BAR_SIZE;
    loop {
        let font = fonts.get(&MONO_FONT_PATTERNS, size);
        let width = font.measure(FULL_BLOCK).0.max(1);
        if width <= SEGMENT_PITCH || size <= MIN_BAR_SIZE {
            return font;
        }
        let scaled = size * SEGMENT_PITCH as u32 / width as u32;
        size = scaled.clamp(MIN_BAR_SIZE, size - 1);
    }
}

/// Intensity of each segment, innermost first. Always within [0, 1].
pub fn segment_intensities(load: f32, phase: f32) -> [f32; SEGMENTS_PER_SIDE] {
    let base = (load / 80.0).min(1.2);
    std::array::from_fn(|i| {
        let i = i as f32;
        let pulse = ((phase + 0.4 * i).sin() + 1.0) / 2.0;
        let center_boost = 1.0 - (i / SEGMENTS_PER_SIDE as f32) * 0.4;
        (base * pulse * center_boost).clamp(0.0, 1.0)
    })
}

/// Block glyph for an intensity in [0, 1].
pub fn block_for(intensity: f32) -> char {
    let idx = (intensity.clamp(0.0, 1.0) * 7.0).floor() as usize;
    BLOCK_GLYPHS[idx.min(BLOCK_GLYPHS.len() - 1)]
}

/// Bar color for a load percentage.
///
/// Three zones: green to yellow-green up to 50%, yellow to orange up to 75%,
/// orange to red above.
pub fn bar_color(load: f32) -> Rgb<u8> {
    let load = load.clamp(0.0, 100.0);
    let (r, g) = if load < 50.0 {
        let t = load / 50.0;
        (200.0 * t, 255.0)
    } else if load < 75.0 {
        let t = (load - 50.0) / 25.0;
        (255.0, 255.0 - 90.0 * t)
    } else {
        let t = (load - 75.0) / 25.0;
        (255.0, 165.0 * (1.0 - t))
    };
    Rgb([r.round() as u8, g.round() as u8, 0])
}

fn dimmed(color: Rgb<u8>) -> Rgb<u8> {
    Rgb(color.0.map(|c| c / 2))
}

/// Heartbeat animation state.
#[derive(Debug, Clone)]
pub struct HeartbeatState {
    cpu_history: VecDeque<f32>,
    frame_count: u64,
    fps: f64,
    bar_font: Option<FontHandle>,
}

impl HeartbeatState {
    pub fn new(fps: f64) -> Self {
        Self {
            cpu_history: VecDeque::with_capacity(HISTORY_LEN),
            frame_count: 0,
            fps,
            bar_font: None,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Record a raw sample and return the mean of the window.
    pub fn push_sample(&mut self, usage: f32) -> f32 {
        if self.cpu_history.len() == HISTORY_LEN {
            self.cpu_history.pop_front();
        }
        self.cpu_history.push_back(usage);
        self.cpu_history.iter().sum::<f32>() / self.cpu_history.len() as f32
    }

    /// Wave phase for the current frame at a given load.
    pub fn phase(&self, load: f32) -> f32 {
        let pulse_speed = 2.0 + (load / 100.0) * 4.0;
        (self.frame_count as f64 / self.fps) as f32 * pulse_speed
    }

    pub fn render<M: MetricsSource>(&mut self, fonts: &mut FontCache, metrics: &mut M) -> Raster {
        let raw = metrics.cpu_usage().filter(|u| u.is_finite()).unwrap_or(0.0);
        let load = self.push_sample(raw);
        let intensities = segment_intensities(load, self.phase(load));
        let color = bar_color(load);

        let mut img = RgbImage::new(DISPLAY_WIDTH, DISPLAY_HEIGHT);

        let readout_font = fonts.get(&OVERLAY_FONT_PATTERNS, READOUT_SIZE);
        readout_font.draw_centered(&mut img, color, CENTER_X, READOUT_Y, &format!("{:.0}%", load));

        let label_font = fonts.get(&OVERLAY_FONT_PATTERNS, LABEL_SIZE);
        label_font.draw_centered(&mut img, dimmed(color), CENTER_X, LABEL_Y, "CPU LOAD");

        let bar_font = self.bar_font.get_or_insert_with(|| bar_font(fonts));
        let inset = (SEGMENT_PITCH - bar_font.measure(FULL_BLOCK).0).max(0) / 2;
        let mut buf = [0u8; 4];
        for (&intensity, &(right, left)) in intensities.iter().zip(segment_cells().iter()) {
            let glyph = block_for(intensity).encode_utf8(&mut buf);
            bar_font.draw(&mut img, color, right + inset, BAR_Y, glyph);
            bar_font.draw(&mut img, color, left + inset, BAR_Y, glyph);
        }

        self.frame_count += 1;
        img
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::sensors::FixedMetrics;
    use proptest::prelude::*;

    fn fonts() -> FontCache {
        FontCache::with_locator(|_| None)
    }

    proptest! {
        #[test]
        fn intensities_stay_in_unit_range(load in -50.0f32..500.0, phase in -1000.0f32..1000.0) {
            for v in segment_intensities(load, phase) {
                prop_assert!((0.0..=1.0).contains(&v), "intensity {}", v);
            }
        }
    }

    #[test]
    fn test_idle_bar_is_flat() {
        assert!(segment_intensities(0.0, 1.3).iter().all(|&v| v == 0.0));
        assert_eq!(block_for(0.0), '▁');
        assert_eq!(block_for(1.0), '█');
        assert_eq!(block_for(0.5), '▄');
    }

    #[test]
    fn test_center_segment_peaks() {
        // Phase pi/2 puts the innermost segment at the top of the wave
        let v = segment_intensities(80.0, std::f32::consts::FRAC_PI_2);
        assert!((v[0] - 1.0).abs() < 1e-5);
        assert!(v[0] >= v[7]);
    }

    #[test]
    fn test_bar_color_zones() {
        assert_eq!(bar_color(0.0), Rgb([0, 255, 0]));
        assert_eq!(bar_color(25.0), Rgb([100, 255, 0]));
        assert_eq!(bar_color(50.0), Rgb([255, 255, 0]));
        assert_eq!(bar_color(62.5), Rgb([255, 210, 0]));
        assert_eq!(bar_color(75.0), Rgb([255, 165, 0]));
        assert_eq!(bar_color(100.0), Rgb([255, 0, 0]));
        assert_eq!(bar_color(150.0), Rgb([255, 0, 0]));
        assert_eq!(dimmed(Rgb([255, 165, 0])), Rgb([127, 82, 0]));
    }

    #[test]
    fn test_history_window() {
        let mut state = HeartbeatState::new(5.0);
        assert_eq!(state.push_sample(10.0), 10.0);
        assert_eq!(state.push_sample(20.0), 15.0);
        for _ in 0..5 {
            state.push_sample(50.0);
        }
        assert_eq!(state.cpu_history.len(), 5);
        assert_eq!(state.push_sample(100.0), 60.0);
    }

    #[test]
    fn test_phase_uses_frame_count() {
        let mut state = HeartbeatState::new(4.0);
        assert_eq!(state.phase(50.0), 0.0);
        state.frame_count = 2;
        // 2 frames at 4 fps, pulse speed 2 + 0.5 * 4
        assert!((state.phase(50.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_frame_count_increments_per_render() {
        let mut state = HeartbeatState::new(5.0);
        let mut fonts = fonts();
        let mut metrics = FixedMetrics {
            temperature: None,
            usage: Some(60.0),
        };
        for n in 1..=4 {
            let frame = state.render(&mut fonts, &mut metrics);
            assert_eq!(frame.dimensions(), (480, 480));
            assert_eq!(state.frame_count(), n);
        }
    }

    #[test]
    fn test_render_draws_bar_and_label() {
        let mut state = HeartbeatState::new(5.0);
        let frame = state.render(
            &mut fonts(),
            &mut FixedMetrics {
                temperature: None,
                usage: Some(90.0),
            },
        );
        let color = bar_color(90.0);
        assert!(frame.pixels().any(|p| *p == color));
        assert!(frame.pixels().any(|p| *p == dimmed(color)));
    }

    #[test]
    fn test_segment_cells_cover_display_symmetrically() {
        let cells = segment_cells();
        assert_eq!(SEGMENT_PITCH * 2 * SEGMENTS_PER_SIDE as i32, 480);
        assert_eq!(cells[0], (240, 210));
        for &(right, left) in &cells {
            assert!(left >= 0 && right + SEGMENT_PITCH <= 480);
            assert_eq!(left + SEGMENT_PITCH, 480 - right);
        }
        assert_eq!(cells[SEGMENTS_PER_SIDE - 1], (450, 0));
    }

    #[test]
    fn test_builtin_bar_font_fits_cell() {
        let font = bar_font(&mut fonts());
        assert!(font.is_builtin());
        assert!(font.measure(FULL_BLOCK).0 <= SEGMENT_PITCH);
    }

    #[test]
    fn test_truetype_bar_stays_on_screen() {
        let Some(path) = crate::render::text::find_font(MONO_FONT_PATTERNS[0]) else {
            eprintln!("no system font found, skipping");
            return;
        };
        let mut fonts = FontCache::with_locator(move |_| Some(path.clone()));
        let font = bar_font(&mut fonts);
        if font.is_builtin() {
            eprintln!("system font not loadable, skipping");
            return;
        }
        assert!(font.size() <= BAR_SIZE as f32);
        assert!(font.measure(FULL_BLOCK).0 <= SEGMENT_PITCH);

        let mut state = HeartbeatState::new(5.0);
        let frame = state.render(
            &mut fonts,
            &mut FixedMetrics {
                temperature: None,
                usage: Some(100.0),
            },
        );
        let color = bar_color(100.0);
        // Full load lights both outermost cells
        let lit_in = |x0: u32, x1: u32| {
            (x0..x1).any(|x| (BAR_Y as u32..480).any(|y| *frame.get_pixel(x, y) == color))
        };
        assert!(lit_in(0, SEGMENT_PITCH as u32));
        assert!(lit_in(480 - SEGMENT_PITCH as u32, 480));
    }

    #[test]
    fn test_missing_usage_is_zero_load() {
        let mut state = HeartbeatState::new(5.0);
        let frame = state.render(&mut fonts(), &mut FixedMetrics::default());
        assert_eq!(frame.dimensions(), (480, 480));
        assert_eq!(state.cpu_history.back(), Some(&0.0));
    }
}
