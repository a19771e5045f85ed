//! Device families and the small policies that distinguish them.

use crate::errors::CameraError;
use crate::fourcc::FourCc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CameraKind {
    /// Generic UVC webcam.
    #[default]
    #[serde(rename = "usb_cam")]
    UsbCam,
    /// Sensor delivering packed 13-bit samples, two bytes per pixel.
    #[serde(rename = "uvcam")]
    UvCam,
    /// Raspberry Pi camera module behind the V4L2 bridge.
    #[serde(rename = "raspi")]
    RaspiCam,
}

/// How raw device bytes turn into display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytePacking {
    /// Decode the stream's pixel format, honouring the session colour mode.
    Native,
    /// Decode the stream's pixel format, always to RGB.
    ForceRgb,
    /// Two bytes per pixel holding a 13-bit sample, high byte first.
    Packed13Bit,
}

/// What a device family supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub supports_format_probe: bool,
    pub supports_recording: bool,
}

impl CameraKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraKind::UsbCam => "usb_cam",
            CameraKind::UvCam => "uvcam",
            CameraKind::RaspiCam => "raspi",
        }
    }

    /// Controls shown by the minimum parameter set.
    pub fn preset_controls(&self) -> &'static [&'static str] {
        match self {
            CameraKind::UsbCam => &[
                "brightness",
                "contrast",
                "saturation",
                "exposure_auto",
                "exposure_absolute",
            ],
            CameraKind::UvCam => &["brightness", "contrast"],
            CameraKind::RaspiCam => &[
                "brightness",
                "contrast",
                "saturation",
                "horizontal_flip",
                "vertical_flip",
                "exposure_time_absolute",
                "auto_exposure",
                "iso_sensitivity",
                "iso_sensitivity_auto",
            ],
        }
    }

    pub fn packing(&self) -> BytePacking {
        match self {
            CameraKind::UsbCam => BytePacking::Native,
            CameraKind::UvCam => BytePacking::Packed13Bit,
            CameraKind::RaspiCam => BytePacking::ForceRgb,
        }
    }

    /// Pixel format forced when the session opens.
    pub fn pinned_format(&self) -> Option<FourCc> {
        match self {
            CameraKind::RaspiCam => Some(FourCc::YUYV),
            _ => None,
        }
    }

    /// The Pi bridge does not enumerate frame sizes reliably; its catalog
    /// comes from [`FormatCatalog::raspicam`](crate::formats::FormatCatalog::raspicam).
    pub fn supports_format_probe(&self) -> bool {
        !matches!(self, CameraKind::RaspiCam)
    }
}

impl FromStr for CameraKind {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "usb_cam" => Ok(CameraKind::UsbCam),
            "uvcam" => Ok(CameraKind::UvCam),
            "raspi" => Ok(CameraKind::RaspiCam),
            other => Err(CameraError::InvalidArgument(format!(
                "unknown camera kind: {other} (expected usb_cam, uvcam or raspi)"
            ))),
        }
    }
}

impl fmt::Display for CameraKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
