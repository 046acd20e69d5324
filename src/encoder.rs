//! Single-frame H.264 encoding.
//!
//! Each raster is piped as raw RGB into an `ffmpeg` process running libx264
//! with a fixed low-latency baseline profile. The Annex-B stream comes back on
//! stdout, so nothing touches the filesystem.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use crate::error::{GalahadError, Result};
use crate::protocol::EncodedPayload;
use crate::render::{DISPLAY_HEIGHT, DISPLAY_WIDTH, Raster};

/// Turns one raster into one independently decodable payload.
pub trait FrameEncoder {
    fn encode(&mut self, frame: &Raster) -> Result<EncodedPayload>;
}

impl<E: FrameEncoder + ?Sized> FrameEncoder for &mut E {
    fn encode(&mut self, frame: &Raster) -> Result<EncodedPayload> {
        (**self).encode(frame)
    }
}

impl<E: FrameEncoder + ?Sized> FrameEncoder for Box<E> {
    fn encode(&mut self, frame: &Raster) -> Result<EncodedPayload> {
        (**self).encode(frame)
    }
}

/// x264 tuning: single reference, no B-frames, no CABAC, cheapest motion search.
pub const X264_PARAMS: &str = "cabac=0:ref=1:deblock=0:0:0:analyse=0:0:me=dia:subme=0:keyint=24:keyint_min=2:scenecut=0:bframes=0:mbtree=0";

/// Check whether the `ffmpeg` binary can be started.
pub fn is_ffmpeg_on_path() -> bool {
    probe("ffmpeg").is_ok()
}

fn probe(program: &str) -> Result<()> {
    let status = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| GalahadError::EncoderUnavailable(format!("{}: {}", program, e)))?;

    if !status.success() {
        return Err(GalahadError::EncoderUnavailable(format!(
            "{} -version exited with {}",
            program, status
        )));
    }
    Ok(())
}

/// H.264 encoder backed by an `ffmpeg` subprocess per frame.
///
/// Resolution and profile are fixed at construction.
#[derive(Debug, Clone)]
pub struct H264Encoder {
    program: String,
    width: u32,
    height: u32,
    args: Vec<String>,
}

impl H264Encoder {
    /// Encoder for display-sized frames using `ffmpeg` from `PATH`.
    pub fn new() -> Result<Self> {
        Self::with_program("ffmpeg")
    }

    /// Encoder using a specific ffmpeg executable.
    pub fn with_program(program: impl Into<String>) -> Result<Self> {
        let program = program.into();
        probe(&program)?;
        debug!("using encoder '{}'", program);
        Ok(Self::unchecked(program, DISPLAY_WIDTH, DISPLAY_HEIGHT))
    }

    fn unchecked(program: String, width: u32, height: u32) -> Self {
        Self {
            program,
            width,
            height,
            args: encoder_args(width, height),
        }
    }

    /// Command-line arguments passed to ffmpeg.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl FrameEncoder for H264Encoder {
    fn encode(&mut self, frame: &Raster) -> Result<EncodedPayload> {
        if frame.dimensions() != (self.width, self.height) {
            let (w, h) = frame.dimensions();
            return Err(GalahadError::Encode(format!(
                "frame is {}x{}, encoder expects {}x{}",
                w, h, self.width, self.height
            )));
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GalahadError::EncoderUnavailable(format!("{}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| GalahadError::Encode("encoder stdin unavailable".into()))?;
        let raw = frame.as_raw();

        // Feed stdin from a second thread so a full stdout pipe cannot deadlock us.
        let (output, written) = std::thread::scope(|s| {
            let writer = s.spawn(move || stdin.write_all(raw));
            let output = child.wait_with_output();
            (output, writer.join())
        });

        let output =
            output.map_err(|e| GalahadError::Encode(format!("waiting for ffmpeg: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GalahadError::Encode(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(GalahadError::Encode(format!("writing frame: {}", e))),
            Err(_) => return Err(GalahadError::Encode("frame writer panicked".into())),
        }

        let payload = EncodedPayload::new(output.stdout)?;
        trace!(bytes = payload.len(), "encoded frame");
        Ok(payload)
    }
}

fn encoder_args(width: u32, height: u32) -> Vec<String> {
    let size = format!("{}x{}", width, height);
    [
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgb24",
        "-s",
        size.as_str(),
        "-i",
        "pipe:0",
        "-c:v",
        "libx264",
        "-preset",
        "ultrafast",
        "-tune",
        "zerolatency",
        "-profile:v",
        "baseline",
        "-level",
        "3.0",
        "-x264-params",
        X264_PARAMS,
        "-crf",
        "25",
        "-pix_fmt",
        "yuv420p",
        "-frames:v",
        "1",
        "-f",
        "h264",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_profile_arguments() {
        let enc = H264Encoder::unchecked("ffmpeg".into(), 480, 480);
        let args = enc.args();
        assert_eq!(arg_after(args, "-s"), Some("480x480"));
        assert_eq!(arg_after(args, "-c:v"), Some("libx264"));
        assert_eq!(arg_after(args, "-preset"), Some("ultrafast"));
        assert_eq!(arg_after(args, "-tune"), Some("zerolatency"));
        assert_eq!(arg_after(args, "-profile:v"), Some("baseline"));
        assert_eq!(arg_after(args, "-frames:v"), Some("1"));
        assert_eq!(arg_after(args, "-f"), Some("rawvideo"));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
        assert!(X264_PARAMS.contains("bframes=0"));
        assert!(X264_PARAMS.contains("ref=1"));
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let err = H264Encoder::with_program("/nonexistent/ffmpeg-binary").unwrap_err();
        assert!(matches!(err, GalahadError::EncoderUnavailable(_)));
    }

    #[test]
    fn test_wrong_dimensions_rejected() {
        let mut enc = H264Encoder::unchecked("ffmpeg".into(), 480, 480);
        let err = enc.encode(&RgbImage::new(100, 100)).unwrap_err();
        assert!(matches!(err, GalahadError::Encode(_)));
    }

    #[test]
    fn test_encode_flat_frame() {
        if !is_ffmpeg_on_path() {
            eprintln!("ffmpeg not found, skipping");
            return;
        }

        let mut enc = H264Encoder::new().unwrap();
        let frame = RgbImage::from_pixel(480, 480, Rgb([128, 128, 128]));
        let payload = enc.encode(&frame).unwrap();

        assert!(payload.len() > 4);
        let bytes = payload.as_bytes();
        assert!(bytes.starts_with(&[0, 0, 0, 1]) || bytes.starts_with(&[0, 0, 1]));

        // The context is reusable across frames
        let again = enc.encode(&frame).unwrap();
        assert!(again.len().abs_diff(payload.len()) <= payload.len() / 10);
    }
}
