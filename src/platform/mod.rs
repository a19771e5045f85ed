//! Device collaborators
//!
//! The camera model talks to hardware only through these traits:
//! - [`ControlBackend`]: raw control listing and control writes
//! - [`CapabilityBackend`]: pixel formats, frame sizes and frame rates
//! - [`StreamBackend`]: format get/set and blocking frame reads
//!
//! [`v4l2ctl::V4l2Ctl`] implements the first two by running the `v4l2-ctl`
//! tool. On Linux, [`linux::V4lStream`] implements the stream on top of V4L2.

use crate::errors::CameraError;
use crate::formats::FormatEntry;
use crate::fourcc::FourCc;

#[cfg(target_os = "linux")]
pub mod linux;
pub mod v4l2ctl;

#[cfg(target_os = "linux")]
pub use linux::V4lStream;
pub use v4l2ctl::V4l2Ctl;

pub trait ControlBackend {
    /// Raw control listing in the driver tool's text format.
    fn list_controls(&self) -> Result<String, CameraError>;

    /// Write one control value.
    fn set_control(&self, name: &str, value: i64) -> Result<(), CameraError>;
}

pub trait CapabilityBackend {
    fn pixel_formats(&self) -> Result<Vec<FourCc>, CameraError>;

    fn frame_sizes(&self, fourcc: FourCc) -> Result<Vec<(u32, u32)>, CameraError>;

    fn frame_rates(&self, fourcc: FourCc, width: u32, height: u32) -> Result<Vec<f64>, CameraError>;
}

/// One frame exactly as the driver delivered it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub fourcc: FourCc,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

pub trait StreamBackend {
    /// The format the device is using right now.
    fn format(&self) -> Result<FormatEntry, CameraError>;

    /// Push a format to the device. The driver may adjust any field; callers
    /// re-read with [`format`](StreamBackend::format).
    fn set_format(&mut self, requested: &FormatEntry) -> Result<(), CameraError>;

    /// Block until one frame is available.
    fn read(&mut self) -> Result<RawFrame, CameraError>;

    /// Release streaming buffers. The device may be reopened by a later read.
    fn close(&mut self);
}
