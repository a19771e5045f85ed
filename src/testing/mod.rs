//! Testing utilities for usbcam
//!
//! In-memory stand-ins for the device collaborators plus synthetic frames,
//! so the camera model can be exercised without hardware.

pub mod scripted;
pub mod synthetic_data;

pub use scripted::{CallLog, ScriptedCapabilities, ScriptedControls, ScriptedStream};
pub use synthetic_data::{synthetic_frame, synthetic_rgb_frame, synthetic_yuyv_frame};
