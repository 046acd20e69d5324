//! Lian Li Galahad II LCD CLI
//!
//! Streams a live clock/CPU overlay or an animated preset to the pump display.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, warn};

use galahad_lcd::config::{
    self, CliOverrides, PresetKind, ScalingMode, Settings, load_file_config,
};
use galahad_lcd::device::{BulkDevice, send_color_command};
use galahad_lcd::encoder::H264Encoder;
use galahad_lcd::pipeline::{FrameSource, Pipeline};
use galahad_lcd::protocol::build_color_command;
use galahad_lcd::render::RenderContext;
use galahad_lcd::utils::parsing::parse_color;
use galahad_lcd::utils::sensors::SystemSensors;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Lian Li Galahad II LCD streamer
#[derive(Parser, Debug)]
#[command(name = "galahad-lcd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pump RGB color: name, hex (#RRGGBB) or r,g,b
    #[arg(short = 'c', long = "rgb", value_parser = parse_rgb_arg)]
    rgb: Option<(u8, u8, u8)>,

    /// Display refresh rate in frames per second
    #[arg(short, long)]
    fps: Option<f64>,

    /// Background image path
    #[arg(long = "bg", visible_alias = "background")]
    background: Option<PathBuf>,

    /// Background scaling: stretch, fit or fill
    #[arg(long)]
    bg_mode: Option<ScalingMode>,

    /// Disable the time/date/CPU overlay
    #[arg(long)]
    no_overlay: bool,

    /// Overlay opacity (0-255)
    #[arg(long, allow_negative_numbers = true)]
    overlay_opacity: Option<i64>,

    /// Animated preset: matrix or heartbeat
    #[arg(long)]
    preset: Option<PresetKind>,

    /// Config file to use instead of the default locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write an example config file and exit
    #[arg(long)]
    init_config: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            rgb: self.rgb,
            fps: self.fps,
            background: self.background.clone(),
            bg_mode: self.bg_mode,
            no_overlay: self.no_overlay,
            overlay_opacity: self.overlay_opacity,
            preset: self.preset,
        }
    }

    fn log_level(&self) -> Level {
        match (self.quiet, self.verbose) {
            (true, _) => Level::WARN,
            (false, 0) => Level::INFO,
            (false, 1) => Level::DEBUG,
            (false, _) => Level::TRACE,
        }
    }
}

fn parse_rgb_arg(s: &str) -> std::result::Result<(u8, u8, u8), String> {
    parse_color(s).map_err(|e| e.to_string())
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .init();

    if args.init_config {
        return cmd_init_config(args.config.clone());
    }

    let file = load_file_config(args.config.as_deref());
    let settings = Settings::resolve(file, args.overrides()).context("Invalid settings")?;

    cmd_stream(settings)
}

fn cmd_init_config(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(config::default_config_path);
    config::write_example_config(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("✅ Created example config at: {}", path.display());
    Ok(())
}

fn cmd_stream(settings: Settings) -> Result<()> {
    let encoder = H264Encoder::new().context("ffmpeg with libx264 is required")?;
    let mut device = BulkDevice::open().context("Failed to open Galahad II LCD")?;

    // Setup Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let (red, green, blue) = settings.effective_rgb();
    match send_color_command(&mut device, &build_color_command(red, green, blue)) {
        Ok(()) => println!("🎨 Pump color set to ({}, {}, {})", red, green, blue),
        Err(e) => warn!("failed to set pump color: {}", e),
    }

    match (&settings.preset, &settings.background) {
        (Some(preset), _) => println!("✨ Preset: {}", preset),
        (None, Some(bg)) => println!("🖼️  Background: {} ({})", bg.display(), settings.bg_mode),
        (None, None) => println!("🖼️  Background: default theme"),
    }
    println!(
        "📡 Streaming at {:.1} fps, overlay {} (Ctrl+C to stop)...",
        settings.fps,
        if settings.overlay { "on" } else { "off" }
    );

    let mut pipeline = Pipeline::new(
        RenderContext::new(),
        FrameSource::from_settings(&settings),
        encoder,
        device,
        SystemSensors::new(),
    )
    .with_interval(settings.frame_interval()?)
    .with_max_consecutive_failures(settings.max_consecutive_failures);

    let result = pipeline.run(&running);
    pipeline.into_sink().close();

    let summary = result.context("Streaming stopped")?;
    println!(
        "\n✅ Stopped. {} frames sent, {} skipped, {} failed.",
        summary.frames_sent, summary.frames_skipped, summary.transmit_failures
    );
    Ok(())
}
