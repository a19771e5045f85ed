use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Cannot open /dev/video{device}: {reason}")]
    DeviceUnavailable { device: u32, reason: String },

    #[error("Frame read error: {0}")]
    FrameRead(String),

    #[error("Unknown control: {0}")]
    UnknownControl(String),

    #[error("Value {value} out of range for {name} [{min}, {max}]")]
    ValueOutOfRange {
        name: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("External tool failure: `{command}` exited with {status}: {stderr}")]
    ExternalTool {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("No free file name in {} after {attempts} attempts", directory.display())]
    FilenameExhausted { directory: PathBuf, attempts: u32 },

    #[error("{} control(s) failed to reset", .0.len())]
    ResetFailed(Vec<(String, CameraError)>),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CameraError {
    /// Whether the error ends the capture session. Everything else is
    /// reported and isolated from the live preview.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CameraError::DeviceUnavailable { .. } | CameraError::FrameRead(_)
        )
    }

    pub(crate) fn external_tool(command: &[String], status: impl ToString, stderr: &[u8]) -> Self {
        CameraError::ExternalTool {
            command: command.join(" "),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

impl From<image::ImageError> for CameraError {
    fn from(e: image::ImageError) -> Self {
        CameraError::Image(e.to_string())
    }
}
