//! Device abstraction layer for the Galahad II LCD.
//!
//! Provides device discovery, bulk writes and paced frame transmission.

pub mod bulk;
pub mod stream;

pub use bulk::BulkDevice;
pub use stream::{PacketSink, send_color_command, send_video_frame};
