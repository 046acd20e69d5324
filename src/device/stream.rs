//! Paced transmission of framed video and the pump color command.
//!
//! Everything here writes through [`PacketSink`], so the sequencing rules can
//! be exercised without hardware.

use std::time::Duration;

use tracing::{debug, trace};

use crate::error::Result;
use crate::protocol::{
    COLOR_WRITE_TIMEOUT, ColorCommand, EncodedPayload, VIDEO_WRITE_TIMEOUT,
    frame_for_transport,
};

/// Destination for raw device packets.
pub trait PacketSink {
    /// Write one packet, waiting at most `timeout` for the device to take it.
    fn write_packet(&mut self, packet: &[u8], timeout: Duration) -> Result<()>;
}

impl<S: PacketSink + ?Sized> PacketSink for &mut S {
    fn write_packet(&mut self, packet: &[u8], timeout: Duration) -> Result<()> {
        (**self).write_packet(packet, timeout)
    }
}

/// Send the one-shot pump color command.
pub fn send_color_command<S: PacketSink + ?Sized>(sink: &mut S, cmd: &ColorCommand) -> Result<()> {
    let (r, g, b) = cmd.color();
    debug!(r, g, b, "sending pump color");
    sink.write_packet(cmd.as_bytes(), COLOR_WRITE_TIMEOUT)
}

/// Stream one encoded frame to the display.
///
/// Packets go out in ascending sequence order with `pacing` between writes.
/// The first failed write aborts the frame and is returned; the caller must
/// not start another frame until this returns.
///
/// Returns the number of packets written.
pub fn send_video_frame<S: PacketSink + ?Sized>(
    sink: &mut S,
    payload: &EncodedPayload,
    pacing: Duration,
) -> Result<usize> {
    let packets = frame_for_transport(payload);
    let count = packets.len();

    for packet in packets {
        trace!(
            sequence = packet.sequence(),
            chunk_len = packet.chunk_len(),
            "video packet"
        );
        sink.write_packet(packet.as_bytes(), VIDEO_WRITE_TIMEOUT)?;
        if !pacing.is_zero() {
            std::thread::sleep(pacing);
        }
    }

    debug!(bytes = payload.len(), packets = count, "frame sent");
    Ok(count)
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use crate::error::GalahadError;
    use crate::protocol::build_color_command;

    #[test]
    fn test_color_command_uses_color_timeout() {
        let mut sink = RecordingSink::default();
        send_color_command(&mut sink, &build_color_command(0, 255, 0)).unwrap();

        assert_eq!(sink.writes.len(), 1);
        assert_eq!(sink.writes[0].0.len(), 64);
        assert_eq!(sink.writes[0].1, Duration::from_millis(1000));
    }

    #[test]
    fn test_video_frame_written_in_order() {
        let mut sink = RecordingSink::default();
        let payload = EncodedPayload::new(vec![0xAB; 5000]).unwrap();

        let sent = send_video_frame(&mut sink, &payload, Duration::ZERO).unwrap();
        assert_eq!(sent, 5);
        assert_eq!(sink.writes.len(), 5);

        for (k, (bytes, timeout)) in sink.writes.iter().enumerate() {
            assert_eq!(bytes.len(), 1024);
            assert_eq!(*timeout, Duration::from_millis(2000));
            let seq = ((bytes[6] as usize) << 16) | ((bytes[7] as usize) << 8) | bytes[8] as usize;
            assert_eq!(seq, k);
        }
    }

    #[test]
    fn test_failed_write_aborts_frame() {
        let mut sink = RecordingSink {
            fail_at: Some(2),
            ..Default::default()
        };
        let payload = EncodedPayload::new(vec![1; 5000]).unwrap();

        let err = send_video_frame(&mut sink, &payload, Duration::ZERO).unwrap_err();
        assert!(matches!(err, GalahadError::WriteTimeout(2000)));
        // Nothing after the failing packet was attempted
        assert_eq!(sink.writes.len(), 2);
    }
}
