//! usbcam: control and capability model for USB/CSI video cameras
//!
//! This crate turns a V4L2 device into a typed model a front end can drive:
//! - Control listing parsing into a [`ParameterRegistry`] with an active subset
//! - A [`FormatCatalog`] of the pixel format / size / rate tuples the device advertises
//! - A [`CaptureSession`] that re-reads the applied format after every change
//! - Sequential, timestamp and manual output naming
//! - Still saving with a `.csv` parameter side-car file
//! - Optional H.264/MP4 recording (`recording` feature)
//!
//! # Usage
//! ```rust,ignore
//! use usbcam::{CaptureSession, FormatCatalog, ParameterRegistry, SessionOptions};
//! use usbcam::platform::V4l2Ctl;
//!
//! let tool = V4l2Ctl::new(0);
//! let mut registry = ParameterRegistry::discover(&tool)?;
//! let catalog = FormatCatalog::discover(&tool)?;
//! let mut session = CaptureSession::open(0, SessionOptions::default())?;
//! let frame = session.read_frame()?;
//! ```

pub mod config;
pub mod controls;
pub mod convert;
pub mod device;
pub mod errors;
pub mod formats;
pub mod fourcc;
pub mod naming;
pub mod platform;
pub mod poll;
pub mod recording;
pub mod session;
pub mod snapshot;

// Testing utilities - scripted collaborators for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::UsbcamConfig;
pub use controls::{ControlDescriptor, ControlKind, ParamSet, ParameterRegistry};
pub use convert::{ColorMode, PixelBuffer};
pub use device::{CameraKind, Capabilities};
pub use errors::CameraError;
pub use formats::{FormatCatalog, FormatEntry};
pub use fourcc::FourCc;
pub use naming::{next_name, ImageExtension, NamingPolicy};
pub use poll::{frame_interval, CaptureThread};
pub use session::{CaptureSession, FrameOutcome, SessionOptions, SessionState};

/// Initialize logging for the camera system
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "usbcam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
