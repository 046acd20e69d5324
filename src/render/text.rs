//! Font discovery, caching and text drawing.
//!
//! TrueType faces are rendered through `rusttype`/`imageproc`. When no face
//! can be found or parsed, a built-in 5x7 bitmap face is used instead so text
//! always renders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use tracing::{debug, warn};

// =============================================================================
// Font Discovery
// =============================================================================

/// Patterns tried, in order, for the overlay face.
pub const OVERLAY_FONT_PATTERNS: [&str; 2] = ["NotoSansMono:weight=bold", "NotoSans:weight=bold"];

/// Patterns tried for small monospace glyphs.
pub const MONO_FONT_PATTERNS: [&str; 1] = ["NotoSansMono"];

/// Common system font paths, used when fontconfig is not available.
const FALLBACK_FONT_PATHS: [&str; 8] = [
    "/usr/share/fonts/noto/NotoSansMono-Bold.ttf",
    "/usr/share/fonts/truetype/noto/NotoSansMono-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "C:\\Windows\\Fonts\\consolab.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Find a font file for a fontconfig pattern.
///
/// Asks `fc-match` first and falls back to a list of common paths.
pub fn find_font(pattern: &str) -> Option<PathBuf> {
    let from_fontconfig = Command::new("fc-match")
        .args(["-f", "%{file}", pattern])
        .stderr(Stdio::null())
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .filter(|path| path.exists());

    from_fontconfig.or_else(|| {
        FALLBACK_FONT_PATHS
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
    })
}

// =============================================================================
// Font Handle
// =============================================================================

#[derive(Clone)]
enum Face {
    TrueType(Arc<Font<'static>>),
    Builtin,
}

/// A face at one pixel size, ready to measure and draw text.
#[derive(Clone)]
pub struct FontHandle {
    face: Face,
    size: f32,
}

impl FontHandle {
    /// The built-in bitmap face at `size` pixels.
    pub fn builtin(size: f32) -> Self {
        Self {
            face: Face::Builtin,
            size,
        }
    }

    fn truetype(font: Arc<Font<'static>>, size: f32) -> Self {
        Self {
            face: Face::TrueType(font),
            size,
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.face, Face::Builtin)
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// Width and height of `text` in pixels.
    pub fn measure(&self, text: &str) -> (i32, i32) {
        match &self.face {
            Face::TrueType(font) => text_size(Scale::uniform(self.size), font, text),
            Face::Builtin => builtin::measure(builtin::pixel_scale(self.size), text),
        }
    }

    /// Draw `text` with its top-left corner at (x, y). Clipped to the image.
    pub fn draw(&self, img: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, text: &str) {
        match &self.face {
            Face::TrueType(font) => {
                draw_text_mut(img, color, x, y, Scale::uniform(self.size), font, text)
            }
            Face::Builtin => builtin::draw(img, color, x, y, builtin::pixel_scale(self.size), text),
        }
    }

    /// Draw `text` horizontally centered on `center_x`. Returns the left edge.
    pub fn draw_centered(
        &self,
        img: &mut RgbImage,
        color: Rgb<u8>,
        center_x: i32,
        y: i32,
        text: &str,
    ) -> i32 {
        let (w, _) = self.measure(text);
        let x = center_x - w / 2;
        self.draw(img, color, x, y, text);
        x
    }

    /// Draw `text` so that it ends at `right_x`. Returns the left edge.
    pub fn draw_right_aligned(
        &self,
        img: &mut RgbImage,
        color: Rgb<u8>,
        right_x: i32,
        y: i32,
        text: &str,
    ) -> i32 {
        let (w, _) = self.measure(text);
        let x = right_x - w;
        self.draw(img, color, x, y, text);
        x
    }
}

impl std::fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontHandle")
            .field("builtin", &self.is_builtin())
            .field("size", &self.size)
            .finish()
    }
}

// =============================================================================
// Font Cache
// =============================================================================

type Locator = Box<dyn FnMut(&str) -> Option<PathBuf>>;

/// Process-wide font cache.
///
/// Discovery results are cached per pattern, including failures, so the
/// locator runs at most once per distinct pattern. Parsed faces are cached per
/// file and handles per (file, pixel size).
pub struct FontCache {
    locator: Locator,
    discovered: HashMap<String, Option<PathBuf>>,
    faces: HashMap<PathBuf, Option<Arc<Font<'static>>>>,
    handles: HashMap<(PathBuf, u32), FontHandle>,
    lookups: usize,
}

impl FontCache {
    /// Cache backed by [`find_font`].
    pub fn new() -> Self {
        Self::with_locator(find_font)
    }

    /// Cache backed by a custom locator.
    pub fn with_locator(locator: impl FnMut(&str) -> Option<PathBuf> + 'static) -> Self {
        Self {
            locator: Box::new(locator),
            discovered: HashMap::new(),
            faces: HashMap::new(),
            handles: HashMap::new(),
            lookups: 0,
        }
    }

    /// How many times the locator has been invoked.
    pub fn lookups(&self) -> usize {
        self.lookups
    }

    /// Resolve a pattern to a font path, caching the answer.
    fn resolve(&mut self, pattern: &str) -> Option<PathBuf> {
        if let Some(cached) = self.discovered.get(pattern) {
            return cached.clone();
        }

        self.lookups += 1;
        let found = (self.locator)(pattern);
        match &found {
            Some(path) => debug!("font '{}' -> {}", pattern, path.display()),
            None => warn!("no font found for '{}', using built-in face", pattern),
        }
        self.discovered.insert(pattern.to_string(), found.clone());
        found
    }

    fn face(&mut self, path: &Path) -> Option<Arc<Font<'static>>> {
        if let Some(cached) = self.faces.get(path) {
            return cached.clone();
        }

        let face = match std::fs::read(path) {
            Ok(data) => Font::try_from_vec(data).map(Arc::new),
            Err(e) => {
                warn!("failed to read font {}: {}", path.display(), e);
                None
            }
        };
        if face.is_none() {
            warn!("font {} could not be loaded", path.display());
        }

        self.faces.insert(path.to_path_buf(), face.clone());
        face
    }

    /// Get a handle for the first pattern that resolves to a loadable face.
    ///
    /// Falls back to the built-in face; never fails.
    pub fn get(&mut self, patterns: &[&str], size_px: u32) -> FontHandle {
        for pattern in patterns {
            let Some(path) = self.resolve(pattern) else {
                continue;
            };

            let key = (path, size_px);
            if let Some(handle) = self.handles.get(&key) {
                return handle.clone();
            }

            if let Some(font) = self.face(&key.0) {
                let handle = FontHandle::truetype(font, size_px as f32);
                self.handles.insert(key, handle.clone());
                return handle;
            }
        }

        FontHandle::builtin(size_px as f32)
    }
}

impl Default for FontCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FontCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontCache")
            .field("patterns", &self.discovered.len())
            .field("faces", &self.faces.len())
            .field("handles", &self.handles.len())
            .finish()
    }
}

// =============================================================================
// Built-in Face
// =============================================================================

mod builtin {
    use super::*;

    const GLYPH_W: i32 = 5;
    const GLYPH_H: i32 = 7;
    const ADVANCE: i32 = GLYPH_W + 1;

    /// Integer pixel scale for a nominal font size.
    pub fn pixel_scale(size: f32) -> i32 {
        ((size / 10.0).round() as i32).max(1)
    }

    pub fn measure(scale: i32, text: &str) -> (i32, i32) {
        let n = text.chars().count() as i32;
        if n == 0 {
            return (0, 0);
        }
        (n * ADVANCE * scale - scale, GLYPH_H * scale)
    }

    pub fn draw(img: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, scale: i32, text: &str) {
        for (i, ch) in text.chars().enumerate() {
            let gx = x + i as i32 * ADVANCE * scale;

            if let Some(level) = block_level(ch) {
                let h = (GLYPH_H * scale * level + 7) / 8;
                let top = y + GLYPH_H * scale - h;
                draw_filled_rect_mut(
                    img,
                    Rect::at(gx, top).of_size((GLYPH_W * scale) as u32, h as u32),
                    color,
                );
                continue;
            }

            let Some(rows) = glyph(ch) else {
                continue;
            };
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_W {
                    if bits & (0x10 >> col) != 0 {
                        draw_filled_rect_mut(
                            img,
                            Rect::at(gx + col * scale, y + row as i32 * scale)
                                .of_size(scale as u32, scale as u32),
                            color,
                        );
                    }
                }
            }
        }
    }

    /// Fill level (1-8) of the lower block elements U+2581..U+2588.
    fn block_level(ch: char) -> Option<i32> {
        let code = ch as u32;
        (0x2581..=0x2588)
            .contains(&code)
            .then(|| (code - 0x2580) as i32)
    }

    fn glyph(ch: char) -> Option<[u8; 7]> {
        let rows = match ch.to_ascii_uppercase() {
            '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
            '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
            '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
            '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
            '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
            '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
            '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
            '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
            '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
            '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
            'A' => [0x0E, 0x11, 0x11, 0x11, 0x1F, 0x11, 0x11],
            'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
            'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
            'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
            'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
            'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
            'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
            'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
            'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
            'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
            'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
            'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
            'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
            'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
            'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
            'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
            'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
            'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
            'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
            'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
            'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
            'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
            'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
            'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
            'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
            'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
            ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
            '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
            '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
            '°' => [0x0C, 0x12, 0x12, 0x0C, 0x00, 0x00, 0x00],
            '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
            '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
            ' ' => [0x00; 7],
            _ => return None,
        };
        Some(rows)
    }
}
