//! Recording configuration types

use crate::errors::CameraError;
use crate::fourcc::FourCc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Codecs a video sink can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// H.264 in an MP4 container
    #[default]
    H264,
}

impl VideoCodec {
    pub fn fourcc(&self) -> FourCc {
        match self {
            VideoCodec::H264 => FourCc::AVC1,
        }
    }

    /// File extension of the container the codec is written to
    pub fn container_extension(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "mp4",
        }
    }
}

impl FromStr for VideoCodec {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h264" | "avc1" => Ok(VideoCodec::H264),
            other => Err(CameraError::InvalidArgument(format!("unknown codec: {other}"))),
        }
    }
}

/// What `read_frame` does with frames while a recording is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingMode {
    /// Frames go to the writer only; the preview is not refreshed
    #[default]
    RecordOnly,
    /// Frames go to the writer and are returned for preview
    RecordAndPreview,
}

/// Writer parameters, fixed when the recording starts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingSpec {
    pub path: PathBuf,
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Statistics returned after finishing a recording
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Total number of video frames written
    pub video_frames: u64,
    /// Duration in seconds
    pub duration_secs: f64,
    /// Total bytes written to file
    pub bytes_written: u64,
    /// Number of frames the encoder produced no data for
    pub dropped_frames: u64,
    /// Output file path
    pub output_path: PathBuf,
}

impl RecordingStats {
    /// Calculate the average bitrate achieved
    pub fn avg_bitrate(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.bytes_written as f64 * 8.0) / self.duration_secs
        } else {
            0.0
        }
    }
}
