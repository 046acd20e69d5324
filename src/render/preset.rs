//! Animated presets that replace background and overlay.

use super::heartbeat::HeartbeatState;
use super::matrix::MatrixState;
use super::text::FontCache;
use super::Raster;
use crate::config::PresetKind;
use crate::utils::sensors::MetricsSource;

/// A running preset with its animation state.
#[derive(Debug, Clone)]
pub enum Preset {
    Matrix(MatrixState),
    Heartbeat(HeartbeatState),
}

impl Preset {
    /// Initialize the preset for the given frame rate.
    pub fn new(kind: PresetKind, fps: f64) -> Self {
        match kind {
            PresetKind::Matrix => Preset::Matrix(MatrixState::new(fps)),
            PresetKind::Heartbeat => Preset::Heartbeat(HeartbeatState::new(fps)),
        }
    }

    pub fn kind(&self) -> PresetKind {
        match self {
            Preset::Matrix(_) => PresetKind::Matrix,
            Preset::Heartbeat(_) => PresetKind::Heartbeat,
        }
    }

    /// Advance the animation and draw one frame.
    ///
    /// Missing metrics are replaced with neutral values.
    pub fn render<M: MetricsSource>(&mut self, fonts: &mut FontCache, metrics: &mut M) -> Raster {
        match self {
            Preset::Matrix(state) => state.render(fonts, metrics),
            Preset::Heartbeat(state) => state.render(fonts, metrics),
        }
    }

    pub fn frame_count(&self) -> u64 {
        match self {
            Preset::Matrix(state) => state.frame_count(),
            Preset::Heartbeat(state) => state.frame_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::sensors::FixedMetrics;

    #[test]
    fn test_dispatch() {
        let mut fonts = FontCache::with_locator(|_| None);
        let mut metrics = FixedMetrics::default();

        for kind in [PresetKind::Matrix, PresetKind::Heartbeat] {
            let mut preset = Preset::new(kind, 5.0);
            assert_eq!(preset.kind(), kind);
            let frame = preset.render(&mut fonts, &mut metrics);
            assert_eq!(frame.dimensions(), (480, 480));
            assert_eq!(preset.frame_count(), 1);
        }
    }
}
