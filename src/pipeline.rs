//! Render, encode and transmit loop.
//!
//! One tick produces one frame: render it, encode it, split it into video
//! packets and write them in order. Ticks run back to back on a single thread,
//! so a frame is always fully sent (or failed) before the next one starts.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{DEFAULT_FPS, ScalingMode, Settings};
use crate::device::{PacketSink, send_video_frame};
use crate::encoder::FrameEncoder;
use crate::error::{GalahadError, Result};
use crate::protocol::PACKET_PACING;
use crate::render::{OverlayConfig, Preset, Raster, RenderContext, compose_frame};
use crate::utils::sensors::MetricsSource;

// =============================================================================
// Frame Source
// =============================================================================

/// What each frame is drawn from.
#[derive(Debug)]
pub enum FrameSource {
    /// Background image (or the themed placeholder) plus the status overlay.
    Composed {
        background: Option<PathBuf>,
        mode: ScalingMode,
        overlay: OverlayConfig,
    },
    /// An animated preset.
    Preset(Preset),
}

impl FrameSource {
    pub fn from_settings(settings: &Settings) -> Self {
        match settings.preset {
            Some(kind) => FrameSource::Preset(Preset::new(kind, settings.fps)),
            None => FrameSource::Composed {
                background: settings.background.clone(),
                mode: settings.bg_mode,
                overlay: OverlayConfig {
                    show: settings.overlay,
                    opacity: settings.overlay_opacity,
                },
            },
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Sent { packets: usize, bytes: usize },
    /// No payload was produced; nothing was written.
    Skipped,
    /// The payload could not be delivered.
    TransmitFailed,
}

impl TickOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TickOutcome::Sent { .. })
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_sent: u64,
    pub frames_skipped: u64,
    pub transmit_failures: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: TickOutcome) {
        match outcome {
            TickOutcome::Sent { .. } => self.frames_sent += 1,
            TickOutcome::Skipped => self.frames_skipped += 1,
            TickOutcome::TransmitFailed => self.transmit_failures += 1,
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// The frame loop and everything it owns.
pub struct Pipeline<E, S, M> {
    ctx: RenderContext,
    source: FrameSource,
    encoder: E,
    sink: S,
    metrics: M,
    interval: Duration,
    pacing: Duration,
    max_consecutive_failures: u32,
}

impl<E, S, M> Pipeline<E, S, M>
where
    E: FrameEncoder,
    S: PacketSink,
    M: MetricsSource,
{
    pub fn new(ctx: RenderContext, source: FrameSource, encoder: E, sink: S, metrics: M) -> Self {
        let defaults = Settings::default();
        Self {
            ctx,
            source,
            encoder,
            sink,
            metrics,
            interval: Duration::from_secs_f64(1.0 / DEFAULT_FPS),
            pacing: PACKET_PACING,
            max_consecutive_failures: defaults.max_consecutive_failures,
        }
    }

    /// Target time between frame starts.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Delay between packet writes.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }

    /// Hand back the sink, e.g. to release the device.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Draw the next frame.
    ///
    /// A background that fails to load is dropped for the rest of the run and
    /// the themed placeholder is used instead.
    pub fn render(&mut self) -> Arc<Raster> {
        match &mut self.source {
            FrameSource::Preset(preset) => {
                Arc::new(preset.render(&mut self.ctx.fonts, &mut self.metrics))
            }
            FrameSource::Composed {
                background,
                mode,
                overlay,
            } => {
                let base = match background.as_deref() {
                    Some(path) => match self.ctx.backgrounds.get(path, *mode) {
                        Ok(raster) => Some(raster),
                        Err(e) => {
                            warn!("{}; using default background", e);
                            *background = None;
                            None
                        }
                    },
                    None => None,
                };
                compose_frame(&mut self.ctx, base.as_ref(), *overlay, &mut self.metrics)
            }
        }
    }

    /// Render, encode and transmit one frame.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn tick(&mut self) -> TickOutcome {
        let frame = self.render();

        let payload = match self.encoder.encode(&frame) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("skipping frame: {}", e);
                return TickOutcome::Skipped;
            }
        };

        match send_video_frame(&mut self.sink, &payload, self.pacing) {
            Ok(packets) => TickOutcome::Sent {
                packets,
                bytes: payload.len(),
            },
            Err(e) => {
                warn!("frame transmission failed: {}", e);
                TickOutcome::TransmitFailed
            }
        }
    }

    /// Run ticks until `running` is cleared.
    ///
    /// The flag is only checked between ticks. Fails once
    /// `max_consecutive_failures` ticks in a row did not send a frame.
    pub fn run(&mut self, running: &AtomicBool) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut consecutive_failures = 0u32;

        info!(
            "streaming at {:.1} fps",
            1.0 / self.interval.as_secs_f64().max(f64::EPSILON)
        );

        while running.load(Ordering::SeqCst) {
            let started = Instant::now();
            let outcome = self.tick();
            summary.record(outcome);

            if outcome.is_success() {
                consecutive_failures = 0;
            } else {
                consecutive_failures += 1;
                if consecutive_failures >= self.max_consecutive_failures {
                    warn!(?summary, "giving up");
                    return Err(GalahadError::TooManyFailures(consecutive_failures));
                }
            }

            let elapsed = started.elapsed();
            match self.interval.checked_sub(elapsed) {
                Some(remaining) => std::thread::sleep(remaining),
                None => debug!(?elapsed, "frame took longer than the interval"),
            }
        }

        info!(
            sent = summary.frames_sent,
            skipped = summary.frames_skipped,
            failed = summary.transmit_failures,
            "stopped"
        );
        Ok(summary)
    }
}

impl<E, S, M> std::fmt::Debug for Pipeline<E, S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source)
            .field("interval", &self.interval)
            .field("pacing", &self.pacing)
            .field("max_consecutive_failures", &self.max_consecutive_failures)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PresetKind;
    use crate::device::stream::testing::RecordingSink;
    use crate::encoder::{H264Encoder, is_ffmpeg_on_path};
    use crate::protocol::{CHUNK_SIZE, EncodedPayload, VIDEO_PACKET_SIZE, frame_for_transport};
    use crate::render::FontCache;
    use crate::render::composer::themed_fallback;
    use crate::utils::sensors::FixedMetrics;

    /// Encoder returning the first `len` raw bytes of each frame.
    #[derive(Default)]
    struct FakeEncoder {
        len: usize,
        calls: usize,
        fail: bool,
        stop_after: Option<(usize, Arc<AtomicBool>)>,
        last_frame: Option<Raster>,
    }

    impl FrameEncoder for FakeEncoder {
        fn encode(&mut self, frame: &Raster) -> Result<EncodedPayload> {
            self.calls += 1;
            self.last_frame = Some(frame.clone());
            if let Some((n, flag)) = &self.stop_after {
                if self.calls >= *n {
                    flag.store(false, Ordering::SeqCst);
                }
            }
            if self.fail {
                return Err(GalahadError::Encode("boom".into()));
            }
            EncodedPayload::new(frame.as_raw()[..self.len].to_vec())
        }
    }

    fn context() -> RenderContext {
        RenderContext::with_fonts(FontCache::with_locator(|_| None))
    }

    fn plain_source() -> FrameSource {
        FrameSource::Composed {
            background: None,
            mode: ScalingMode::Fill,
            overlay: OverlayConfig {
                show: false,
                opacity: 180,
            },
        }
    }

    fn pipeline(
        encoder: FakeEncoder,
        sink: RecordingSink,
    ) -> Pipeline<FakeEncoder, RecordingSink, FixedMetrics> {
        Pipeline::new(
            context(),
            plain_source(),
            encoder,
            sink,
            FixedMetrics::default(),
        )
        .with_interval(Duration::ZERO)
        .with_pacing(Duration::ZERO)
    }

    #[test]
    fn test_tick_sends_all_packets() {
        let encoder = FakeEncoder {
            len: 3000,
            ..Default::default()
        };
        let mut p = pipeline(encoder, RecordingSink::default());

        assert_eq!(
            p.tick(),
            TickOutcome::Sent {
                packets: 3,
                bytes: 3000
            }
        );
        assert_eq!(p.sink.writes.len(), 3);
        assert!(p.sink.writes.iter().all(|(b, _)| b.len() == VIDEO_PACKET_SIZE));
    }

    #[test]
    fn test_encode_failure_skips_without_writing() {
        let encoder = FakeEncoder {
            fail: true,
            ..Default::default()
        };
        let mut p = pipeline(encoder, RecordingSink::default());
        assert_eq!(p.tick(), TickOutcome::Skipped);
        assert!(p.sink.writes.is_empty());
    }

    #[test]
    fn test_transmit_failure_reported() {
        let encoder = FakeEncoder {
            len: 5000,
            ..Default::default()
        };
        let sink = RecordingSink {
            fail_at: Some(1),
            ..Default::default()
        };
        let mut p = pipeline(encoder, sink);
        assert_eq!(p.tick(), TickOutcome::TransmitFailed);
        assert_eq!(p.sink.writes.len(), 1);
    }

    #[test]
    fn test_run_honors_stop_flag() {
        let running = Arc::new(AtomicBool::new(true));
        let encoder = FakeEncoder {
            len: 100,
            stop_after: Some((3, running.clone())),
            ..Default::default()
        };
        let mut p = pipeline(encoder, RecordingSink::default());

        let summary = p.run(&running).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                frames_sent: 3,
                frames_skipped: 0,
                transmit_failures: 0
            }
        );
        assert_eq!(p.encoder.calls, 3);

        // The sink comes back after the run so the device can be released
        let sink = p.into_sink();
        assert_eq!(sink.writes.len(), 3);
    }

    #[test]
    fn test_run_not_started_when_stopped() {
        let running = AtomicBool::new(false);
        let mut p = pipeline(FakeEncoder::default(), RecordingSink::default());
        assert_eq!(p.run(&running).unwrap(), RunSummary::default());
        assert_eq!(p.encoder.calls, 0);
    }

    #[test]
    fn test_run_gives_up_after_consecutive_failures() {
        let running = AtomicBool::new(true);
        let encoder = FakeEncoder {
            fail: true,
            ..Default::default()
        };
        let mut p = pipeline(encoder, RecordingSink::default()).with_max_consecutive_failures(4);

        let err = p.run(&running).unwrap_err();
        assert!(matches!(err, GalahadError::TooManyFailures(4)));
        assert_eq!(p.encoder.calls, 4);
    }

    #[test]
    fn test_missing_background_falls_back() {
        let source = FrameSource::Composed {
            background: Some(PathBuf::from("/nonexistent/wallpaper.png")),
            mode: ScalingMode::Fit,
            overlay: OverlayConfig {
                show: false,
                opacity: 0,
            },
        };
        let encoder = FakeEncoder {
            len: 10,
            ..Default::default()
        };
        let mut p = Pipeline::new(
            context(),
            source,
            encoder,
            RecordingSink::default(),
            FixedMetrics::default(),
        )
        .with_pacing(Duration::ZERO);

        assert!(p.tick().is_success());
        assert_eq!(p.encoder.last_frame.as_ref(), Some(&themed_fallback()));
        assert!(matches!(
            p.source,
            FrameSource::Composed {
                background: None,
                ..
            }
        ));

        p.tick();
        assert_eq!(p.ctx.backgrounds.decode_count(), 1);
    }

    #[test]
    fn test_preset_source() {
        let settings = Settings {
            preset: Some(PresetKind::Heartbeat),
            ..Default::default()
        };
        let encoder = FakeEncoder {
            len: 10,
            ..Default::default()
        };
        let mut p = Pipeline::new(
            context(),
            FrameSource::from_settings(&settings),
            encoder,
            RecordingSink::default(),
            FixedMetrics::default(),
        )
        .with_pacing(Duration::ZERO);

        p.tick();
        p.tick();
        match &p.source {
            FrameSource::Preset(preset) => assert_eq!(preset.frame_count(), 2),
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_flat_frame_end_to_end() {
        if !is_ffmpeg_on_path() {
            eprintln!("ffmpeg not found, skipping");
            return;
        }

        let mut encoder = H264Encoder::new().unwrap();
        let frame = Raster::from_pixel(480, 480, image::Rgb([30, 30, 30]));
        let payload = encoder.encode(&frame).unwrap();

        let packets: Vec<_> = frame_for_transport(&payload).collect();
        assert_eq!(packets.len(), payload.len().div_ceil(CHUNK_SIZE));

        let rebuilt: Vec<u8> = packets.iter().flat_map(|p| p.chunk().to_vec()).collect();
        assert_eq!(rebuilt, payload.as_bytes());

        let mut sink = RecordingSink::default();
        let sent = send_video_frame(&mut sink, &payload, Duration::ZERO).unwrap();
        assert_eq!(sent, packets.len());
    }
}
