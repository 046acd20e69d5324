//! Parsing utilities for CLI arguments and configuration values.
//!
//! This module provides reusable parsing functions for common input formats
//! used throughout the application.

use crate::error::{GalahadError, Result};

// =============================================================================
// Named Colors
// =============================================================================

/// Named color templates accepted by [`parse_color`].
pub const COLOR_TEMPLATES: [(&str, (u8, u8, u8)); 17] = [
    // Basic colors
    ("black", (0, 0, 0)),
    ("red", (255, 0, 0)),
    ("green", (0, 255, 0)),
    ("yellow", (255, 255, 0)),
    ("blue", (0, 0, 255)),
    ("magenta", (255, 0, 255)),
    ("cyan", (0, 255, 255)),
    ("white", (255, 255, 255)),
    // Bright colors
    ("gray", (128, 128, 128)),
    ("grey", (128, 128, 128)),
    ("bright_red", (255, 64, 64)),
    ("bright_green", (64, 255, 64)),
    ("bright_yellow", (255, 255, 64)),
    ("bright_blue", (64, 64, 255)),
    ("bright_magenta", (255, 64, 255)),
    ("bright_cyan", (64, 255, 255)),
    ("bright_white", (255, 255, 255)),
];

/// Look up a named color (case-insensitive).
///
/// # Arguments
/// * `name` - Template name such as `red` or `bright_cyan`
///
/// # Returns
/// The template's RGB values, or `None` for an unknown name
pub fn named_color(name: &str) -> Option<(u8, u8, u8)> {
    let name = name.to_lowercase();
    COLOR_TEMPLATES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, rgb)| *rgb)
}

// =============================================================================
// Color Parsing
// =============================================================================

/// Parse a hex color string into RGB components.
///
/// Accepts formats: `#RRGGBB` or `RRGGBB`
///
/// # Arguments
/// * `hex` - Hex color string
///
/// # Returns
/// Tuple of (red, green, blue) values (0-255 each)
///
/// # Example
/// ```
/// use galahad_lcd::utils::parsing::parse_hex_color;
///
/// let (r, g, b) = parse_hex_color("#FF5500").unwrap();
/// assert_eq!(r, 255);
/// assert_eq!(g, 85);
/// assert_eq!(b, 0);
/// ```
pub fn parse_hex_color(hex: &str) -> Result<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid_hex(hex));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| invalid_hex(hex))
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Parse an `r,g,b` decimal triple (spaces allowed around values).
///
/// # Arguments
/// * `text` - Three comma-separated decimal values
///
/// # Returns
/// Tuple of (red, green, blue) values, or `InvalidInput` if any value is
/// missing or outside 0-255
pub fn parse_rgb_triple(text: &str) -> Result<(u8, u8, u8)> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(GalahadError::InvalidInput(format!(
            "Expected three comma-separated values, got '{}'",
            text
        )));
    }

    let mut rgb = [0u8; 3];
    for (slot, part) in rgb.iter_mut().zip(&parts) {
        *slot = part.parse::<u8>().map_err(|_| {
            GalahadError::InvalidInput(format!("Color component '{}' is not 0-255", part))
        })?;
    }
    Ok((rgb[0], rgb[1], rgb[2]))
}

/// Parse a color from a name, hex (`#RRGGBB` / `RRGGBB`) or `r,g,b`.
///
/// # Arguments
/// * `text` - Color as given on the command line or in the config file
///
/// # Returns
/// Tuple of (red, green, blue) values (0-255 each)
///
/// # Example
/// ```
/// use galahad_lcd::utils::parsing::parse_color;
///
/// assert_eq!(parse_color("bright_red").unwrap(), (255, 64, 64));
/// assert_eq!(parse_color("#00FFC8").unwrap(), (0, 255, 200));
/// assert_eq!(parse_color("0, 255, 0").unwrap(), (0, 255, 0));
/// ```
pub fn parse_color(text: &str) -> Result<(u8, u8, u8)> {
    let text = text.trim();

    if let Some(rgb) = named_color(text) {
        return Ok(rgb);
    }

    if text.contains(',') {
        if let Ok(rgb) = parse_rgb_triple(text) {
            return Ok(rgb);
        }
    } else if let Ok(rgb) = parse_hex_color(text) {
        return Ok(rgb);
    }

    let names: Vec<&str> = COLOR_TEMPLATES.iter().map(|(n, _)| *n).collect();
    Err(GalahadError::InvalidInput(format!(
        "Invalid color '{}'. Use a color name ({}), hex (#00FF00), or RGB (0,255,0)",
        text,
        names.join(", ")
    )))
}

fn invalid_hex(text: &str) -> GalahadError {
    GalahadError::InvalidInput(format!("Invalid color hex: {}", text))
}

// =============================================================================
// Tests
// =============================================================================
