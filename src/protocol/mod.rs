//! USB protocol implementation for the Galahad II LCD.
//!
//! This module contains the packet constants, the pump color command builder,
//! and the video framing used to stream encoded frames to the display.

pub mod commands;
pub mod video;

pub use commands::*;
pub use video::*;
