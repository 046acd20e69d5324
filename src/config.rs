//! Runtime settings for the LCD streamer.
//!
//! Settings come from three layers: built-in defaults, an optional TOML file
//! and command-line flags. A flag given on the command line always wins.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{GalahadError, Result};
use crate::utils::parsing::parse_color;

// =============================================================================
// Constants
// =============================================================================

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "GALAHAD_LCD_CONFIG";

/// Optional table name wrapping the settings inside the file.
pub const CONFIG_SECTION: &str = "galahad-lcd";

pub const DEFAULT_RGB: (u8, u8, u8) = (0, 255, 200);
pub const DEFAULT_FPS: f64 = 5.0;
/// Slowest accepted refresh rate, one frame every 100 seconds.
pub const MIN_FPS: f64 = 0.01;
pub const DEFAULT_OVERLAY_OPACITY: u8 = 180;
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 50;

// =============================================================================
// Scaling Mode
// =============================================================================

/// How a background image is mapped onto the 480x480 display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMode {
    /// Non-uniform resize, aspect ratio not preserved.
    Stretch,
    /// Uniform downscale, centered on black bars.
    Fit,
    /// Uniform cover scale with a centered crop.
    #[default]
    Fill,
}

impl ScalingMode {
    pub fn name(&self) -> &'static str {
        match self {
            ScalingMode::Stretch => "stretch",
            ScalingMode::Fit => "fit",
            ScalingMode::Fill => "fill",
        }
    }
}

impl fmt::Display for ScalingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalingMode {
    type Err = GalahadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "stretch" => Ok(ScalingMode::Stretch),
            "fit" => Ok(ScalingMode::Fit),
            "fill" => Ok(ScalingMode::Fill),
            other => Err(GalahadError::InvalidInput(format!(
                "Unknown scaling mode '{}' (expected stretch, fit or fill)",
                other
            ))),
        }
    }
}

// =============================================================================
// Presets
// =============================================================================

/// Procedural animation replacing background and overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetKind {
    Matrix,
    Heartbeat,
}

impl PresetKind {
    pub fn name(&self) -> &'static str {
        match self {
            PresetKind::Matrix => "matrix",
            PresetKind::Heartbeat => "heartbeat",
        }
    }

    /// Pump color forced while this preset runs.
    pub fn accent_color(&self) -> (u8, u8, u8) {
        match self {
            PresetKind::Matrix => (0, 255, 0),
            PresetKind::Heartbeat => (255, 32, 32),
        }
    }
}

impl fmt::Display for PresetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PresetKind {
    type Err = GalahadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "matrix" => Ok(PresetKind::Matrix),
            "heartbeat" => Ok(PresetKind::Heartbeat),
            other => Err(GalahadError::InvalidInput(format!(
                "Unknown preset '{}' (expected matrix or heartbeat)",
                other
            ))),
        }
    }
}

// =============================================================================
// File Layer
// =============================================================================

/// Values read from a config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub rgb: Option<String>,
    pub fps: Option<f64>,
    pub background: Option<PathBuf>,
    /// Short form of `background`; `background` wins when both are set.
    pub bg: Option<PathBuf>,
    pub bg_mode: Option<ScalingMode>,
    pub overlay: Option<bool>,
    pub overlay_opacity: Option<i64>,
    pub preset: Option<PresetKind>,
    pub max_consecutive_failures: Option<u32>,
}

impl FileConfig {
    /// Parse config text. A `[galahad-lcd]` table is used when present.
    pub fn parse(text: &str) -> Result<Self> {
        let mut table: toml::Table = text.parse()?;
        let root = match table.remove(CONFIG_SECTION) {
            Some(toml::Value::Table(section)) => section,
            _ => table,
        };
        Ok(toml::Value::Table(root).try_into::<FileConfig>()?)
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| GalahadError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }
}

/// Config file locations, in lookup order.
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
        paths.push(PathBuf::from(explicit));
    }
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("galahad-lcd").join("config.toml"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join("galahad-lcd.toml"));
    }
    paths.push(PathBuf::from("./galahad-lcd.toml"));
    paths
}

/// First existing config file, if any.
pub fn find_config_file() -> Option<PathBuf> {
    config_search_paths().into_iter().find(|p| p.is_file())
}

/// Load the file layer.
///
/// A missing or broken file is reported and treated as empty.
pub fn load_file_config(explicit: Option<&Path>) -> FileConfig {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match find_config_file() {
            Some(path) => path,
            None => {
                debug!("no config file found");
                return FileConfig::default();
            }
        },
    };

    match FileConfig::load(&path) {
        Ok(config) => {
            debug!("loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("ignoring config file {}: {}", path.display(), e);
            FileConfig::default()
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub rgb: Option<(u8, u8, u8)>,
    pub fps: Option<f64>,
    pub background: Option<PathBuf>,
    pub bg_mode: Option<ScalingMode>,
    pub no_overlay: bool,
    pub overlay_opacity: Option<i64>,
    pub preset: Option<PresetKind>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub rgb: (u8, u8, u8),
    pub fps: f64,
    pub background: Option<PathBuf>,
    pub bg_mode: ScalingMode,
    pub overlay: bool,
    pub overlay_opacity: u8,
    pub preset: Option<PresetKind>,
    pub max_consecutive_failures: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rgb: DEFAULT_RGB,
            fps: DEFAULT_FPS,
            background: None,
            bg_mode: ScalingMode::default(),
            overlay: true,
            overlay_opacity: DEFAULT_OVERLAY_OPACITY,
            preset: None,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

impl Settings {
    /// Merge defaults, file values and CLI values, then validate.
    pub fn resolve(file: FileConfig, cli: CliOverrides) -> Result<Self> {
        let defaults = Settings::default();

        let file_rgb = file.rgb.as_deref().and_then(|s| match parse_color(s) {
            Ok(rgb) => Some(rgb),
            Err(e) => {
                warn!("ignoring rgb '{}' from config file: {}", s, e);
                None
            }
        });
        let opacity = cli
            .overlay_opacity
            .or(file.overlay_opacity)
            .map(|o| o.clamp(0, 255) as u8)
            .unwrap_or(defaults.overlay_opacity);

        let settings = Settings {
            rgb: cli.rgb.or(file_rgb).unwrap_or(defaults.rgb),
            fps: cli.fps.or(file.fps).unwrap_or(defaults.fps),
            background: cli
                .background
                .or(file.background)
                .or(file.bg)
                .map(|p| expand_tilde(&p)),
            bg_mode: cli.bg_mode.or(file.bg_mode).unwrap_or(defaults.bg_mode),
            overlay: !cli.no_overlay && file.overlay.unwrap_or(defaults.overlay),
            overlay_opacity: opacity,
            preset: cli.preset.or(file.preset),
            max_consecutive_failures: file
                .max_consecutive_failures
                .unwrap_or(defaults.max_consecutive_failures)
                .max(1),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.fps.is_finite() || self.fps < MIN_FPS {
            return Err(GalahadError::InvalidInput(format!(
                "fps must be a number of at least {}, got {}",
                MIN_FPS, self.fps
            )));
        }
        self.frame_interval().map(|_| ())
    }

    /// Pump color to send, taking a preset's accent color into account.
    pub fn effective_rgb(&self) -> (u8, u8, u8) {
        self.preset.map(|p| p.accent_color()).unwrap_or(self.rgb)
    }

    /// Time between frames.
    pub fn frame_interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(1.0 / self.fps).map_err(|e| {
            GalahadError::InvalidInput(format!("no frame interval for {} fps: {}", self.fps, e))
        })
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

// =============================================================================
// Example Config
// =============================================================================

const EXAMPLE_CONFIG: &str = r##"# Lian Li Galahad II LCD configuration
# Default location: ~/.config/galahad-lcd/config.toml

[galahad-lcd]

# Pump RGB color: name, hex (#RRGGBB) or r,g,b
rgb = "#00FFC8"

# Display refresh rate in frames per second
fps = 5.0

# Background image (optional)
# background = "~/Pictures/wallpaper.png"

# Background scaling: "stretch", "fit" or "fill"
bg_mode = "fill"

# Show time, date and CPU overlay
overlay = true

# Overlay opacity (0-255)
overlay_opacity = 180

# Animated preset instead of background: "matrix" or "heartbeat"
# preset = "matrix"

# Give up after this many failed frames in a row
max_consecutive_failures = 50
"##;

/// Write a commented example config, creating parent directories.
pub fn write_example_config(path: &Path) -> Result<()> {
    let io_err = |source| GalahadError::ConfigIo {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, EXAMPLE_CONFIG).map_err(io_err)
}

/// Default location for `--init-config`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("galahad-lcd").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("./galahad-lcd.toml"))
}

// =============================================================================
// Tests
// =============================================================================
