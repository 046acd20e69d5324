//! USB identifiers, packet constants and command builders for the Galahad II LCD.
//!
//! Protocol based on USB captures of the vendor software driving the pump
//! display: a bulk OUT endpoint on interface 1 carries both video packets and
//! the pump RGB color command.

use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// Lian Li Vendor ID.
pub const LIANLI_VID: u16 = 0x0416;

/// Galahad II LCD Product ID.
pub const GALAHAD2_LCD_PID: u16 = 0x7395;

/// Interface carrying the bulk OUT endpoint.
pub const INTERFACE_CONTROL: u8 = 1;

/// Write timeout for the RGB color command.
pub const COLOR_WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Write timeout for each video packet.
pub const VIDEO_WRITE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Pause between consecutive video packets (device intake rate).
pub const PACKET_PACING: Duration = Duration::from_millis(1);

// =============================================================================
// RGB Color Command
// =============================================================================

/// RGB command packet length.
pub const RGB_PACKET_SIZE: usize = 64;

/// RGB command header: [0x01, 0x83].
pub const CMD_RGB_HEADER: [u8; 2] = [0x01, 0x83];

/// Offset of the payload size byte.
const RGB_PAYLOAD_SIZE_OFFSET: usize = 5;

/// Payload size announced in the command (19 bytes).
pub const RGB_PAYLOAD_SIZE: u8 = 0x13;

/// Payload sub-header preceding the color bytes.
pub const RGB_SUB_HEADER: [u8; 4] = [0x00, 0x03, 0x04, 0x00];

/// Offset of the sub-header.
const RGB_SUB_HEADER_OFFSET: usize = 6;

/// Offset of the red byte (green and blue follow).
const RGB_COLOR_OFFSET: usize = 10;

/// RGB command packet (64 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCommand([u8; RGB_PACKET_SIZE]);

impl ColorCommand {
    /// Raw packet bytes.
    pub fn as_bytes(&self) -> &[u8; RGB_PACKET_SIZE] {
        &self.0
    }

    /// The (R, G, B) color carried by this command.
    pub fn color(&self) -> (u8, u8, u8) {
        (
            self.0[RGB_COLOR_OFFSET],
            self.0[RGB_COLOR_OFFSET + 1],
            self.0[RGB_COLOR_OFFSET + 2],
        )
    }
}

// =============================================================================
// Command Builders
// =============================================================================

/// Build the pump RGB color command.
///
/// Layout:
/// - Bytes 0-1: header `01 83`
/// - Byte 5: payload size (19)
/// - Bytes 6-9: sub-header `00 03 04 00`
/// - Bytes 10-12: R, G, B
/// - Everything else zero
pub fn build_color_command(r: u8, g: u8, b: u8) -> ColorCommand {
    let mut buf = [0u8; RGB_PACKET_SIZE];

    buf[0..2].copy_from_slice(&CMD_RGB_HEADER);
    buf[RGB_PAYLOAD_SIZE_OFFSET] = RGB_PAYLOAD_SIZE;
    buf[RGB_SUB_HEADER_OFFSET..RGB_SUB_HEADER_OFFSET + 4].copy_from_slice(&RGB_SUB_HEADER);
    buf[RGB_COLOR_OFFSET] = r;
    buf[RGB_COLOR_OFFSET + 1] = g;
    buf[RGB_COLOR_OFFSET + 2] = b;

    ColorCommand(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_command_layout() {
        let cmd = build_color_command(0, 255, 200);
        let bytes = cmd.as_bytes();

        assert_eq!(bytes.len(), 64);
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], 0x83);
        assert_eq!(bytes[5], 0x13);
        assert_eq!(&bytes[6..10], &[0x00, 0x03, 0x04, 0x00]);
        assert_eq!(&bytes[10..13], &[0x00, 0xFF, 0xC8]);

        // Everything else must be zero
        for (i, &b) in bytes.iter().enumerate() {
            if matches!(i, 0 | 1 | 5..=12) {
                continue;
            }
            assert_eq!(b, 0, "byte {} should be zero", i);
        }
    }

    #[test]
    fn test_color_command_roundtrip_color() {
        assert_eq!(build_color_command(12, 34, 56).color(), (12, 34, 56));
    }

    #[test]
    fn test_color_command_is_stateless() {
        assert_eq!(build_color_command(1, 2, 3), build_color_command(1, 2, 3));
    }
}
