//! Video recording
//!
//! A capture session writes frames through a [`VideoSink`] obtained from a
//! [`SinkFactory`]. With the `recording` feature the default factory writes
//! H.264 into MP4 using:
//! - openh264 for H.264 encoding
//! - muxide for MP4 muxing
//!
//! # Example
//! ```rust,ignore
//! use usbcam::recording::VideoCodec;
//!
//! let info = session.start_recording("clip.mp4", VideoCodec::H264, None)?;
//! // In your frame loop:
//! session.read_frame()?;
//! // When done:
//! let stats = session.stop_recording()?;
//! ```

mod config;
#[cfg(feature = "recording")]
mod encoder;
#[cfg(feature = "recording")]
mod recorder;

pub use config::{RecordingMode, RecordingSpec, RecordingStats, VideoCodec};
#[cfg(feature = "recording")]
pub use encoder::{EncodedFrame, H264Encoder};
#[cfg(feature = "recording")]
pub use recorder::{Mp4Recorder, Mp4SinkFactory};

use crate::convert::PixelBuffer;
use crate::errors::CameraError;

/// An open video writer.
pub trait VideoSink: Send {
    fn write(&mut self, frame: &PixelBuffer) -> Result<(), CameraError>;

    /// Flush and close the file.
    fn finish(self: Box<Self>) -> Result<RecordingStats, CameraError>;
}

pub trait SinkFactory: Send {
    fn create(&self, spec: &RecordingSpec) -> Result<Box<dyn VideoSink>, CameraError>;

    /// Whether `create` can succeed at all.
    fn available(&self) -> bool;
}

/// Factory used when the crate is built without a video encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecording;

impl SinkFactory for NoRecording {
    fn create(&self, _spec: &RecordingSpec) -> Result<Box<dyn VideoSink>, CameraError> {
        Err(CameraError::Unsupported(
            "video recording requires the `recording` feature".to_string(),
        ))
    }

    fn available(&self) -> bool {
        false
    }
}

pub fn default_factory() -> Box<dyn SinkFactory> {
    #[cfg(feature = "recording")]
    {
        Box::new(Mp4SinkFactory)
    }
    #[cfg(not(feature = "recording"))]
    {
        Box::new(NoRecording)
    }
}
