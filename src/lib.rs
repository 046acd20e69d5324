//! Galahad LCD Library
//!
//! A Rust driver for the 480x480 display on Lian Li Galahad II AIO pumps.
//!
//! # Features
//!
//! - Compose frames from a background image and a live time/CPU overlay
//! - Animated Matrix and Heartbeat presets
//! - Single-frame H.264 encoding through ffmpeg
//! - Chunked video streaming and pump RGB color over USB bulk
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//!
//! use galahad_lcd::config::Settings;
//! use galahad_lcd::device::{BulkDevice, send_color_command};
//! use galahad_lcd::encoder::H264Encoder;
//! use galahad_lcd::pipeline::{FrameSource, Pipeline};
//! use galahad_lcd::protocol::build_color_command;
//! use galahad_lcd::render::RenderContext;
//! use galahad_lcd::utils::SystemSensors;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::default();
//!
//!     let mut device = BulkDevice::open()?;
//!     let (r, g, b) = settings.effective_rgb();
//!     send_color_command(&mut device, &build_color_command(r, g, b))?;
//!
//!     let mut pipeline = Pipeline::new(
//!         RenderContext::new(),
//!         FrameSource::from_settings(&settings),
//!         H264Encoder::new()?,
//!         device,
//!         SystemSensors::new(),
//!     )
//!     .with_interval(settings.frame_interval()?);
//!
//!     let running = AtomicBool::new(true);
//!     let summary = pipeline.run(&running)?;
//!     println!("{} frames sent", summary.frames_sent);
//!
//!     pipeline.into_sink().close();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod render;
pub mod utils;

// Re-exports for convenience
pub use device::BulkDevice;
pub use error::{GalahadError, Result};
pub use pipeline::{Pipeline, RunSummary};
