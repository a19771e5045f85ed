//! Format catalog: the (pixel format, size, rate) tuples a device advertises.

pub mod listing;

use crate::errors::CameraError;
use crate::fourcc::FourCc;
use crate::platform::CapabilityBackend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rates closer than this are the same rate.
const RATE_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormatEntry {
    pub fourcc: FourCc,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl FormatEntry {
    pub fn new(fourcc: FourCc, width: u32, height: u32, fps: f64) -> Self {
        Self {
            fourcc,
            width,
            height,
            fps,
        }
    }

    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn matches(&self, other: &FormatEntry) -> bool {
        self.fourcc == other.fourcc
            && self.width == other.width
            && self.height == other.height
            && (self.fps - other.fps).abs() < RATE_EPSILON
    }
}

impl fmt::Display for FormatEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}x{}@{}", self.fourcc, self.width, self.height, self.fps)
    }
}

/// Parses `FOURCC:WxH@FPS`, e.g. `MJPG:1280x720@30`.
impl FromStr for FormatEntry {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CameraError::InvalidArgument(format!("format should be FOURCC:WxH@FPS, got {s:?}"));
        let (fourcc, rest) = s.split_once(':').ok_or_else(invalid)?;
        let (size, fps) = rest.split_once('@').ok_or_else(invalid)?;
        let (width, height) = parse_size(size).ok_or_else(invalid)?;
        let fps: f64 = fps.parse().map_err(|_| invalid())?;
        Ok(FormatEntry::new(fourcc.parse()?, width, height, fps))
    }
}

fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FormatCatalog {
    entries: Vec<FormatEntry>,
}

impl FormatCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the device for every format, then every size of each format, then
    /// every rate of each size. Only combinations the device reported are kept.
    pub fn discover<B: CapabilityBackend + ?Sized>(backend: &B) -> Result<Self, CameraError> {
        let mut catalog = Self::new();
        for fourcc in backend.pixel_formats()? {
            for (width, height) in backend.frame_sizes(fourcc)? {
                for fps in backend.frame_rates(fourcc, width, height)? {
                    catalog.push(FormatEntry::new(fourcc, width, height, fps));
                }
            }
        }
        log::debug!("Discovered {} format entries", catalog.len());
        Ok(catalog)
    }

    /// Fixed catalog for the Pi camera bridge: YUYV at the sensor's modes,
    /// 10 to 90 fps.
    pub fn raspicam() -> Self {
        const SIZES: [(u32, u32); 10] = [
            (320, 240),
            (640, 480),
            (800, 600),
            (1280, 720),
            (1640, 720),
            (1640, 922),
            (1920, 1080),
            (1920, 1200),
            (2560, 1440),
            (3280, 2464),
        ];
        let mut catalog = Self::new();
        for (width, height) in SIZES {
            for fps in (10..=90).step_by(10) {
                catalog.push(FormatEntry::new(FourCc::YUYV, width, height, fps as f64));
            }
        }
        catalog
    }

    /// Append an entry unless an equal one is already present.
    pub fn push(&mut self, entry: FormatEntry) -> bool {
        if self.contains(&entry) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn entries(&self) -> &[FormatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entry: &FormatEntry) -> bool {
        self.entries.iter().any(|e| e.matches(entry))
    }

    pub fn formats(&self) -> Vec<FourCc> {
        let mut out = Vec::new();
        for entry in &self.entries {
            if !out.contains(&entry.fourcc) {
                out.push(entry.fourcc);
            }
        }
        out
    }

    /// Sizes of one format as `WxH`.
    pub fn sizes_for(&self, fourcc: FourCc) -> Vec<String> {
        let mut out = Vec::new();
        for entry in self.entries.iter().filter(|e| e.fourcc == fourcc) {
            let size = entry.size();
            if !out.contains(&size) {
                out.push(size);
            }
        }
        out
    }

    /// Rates of one format at one `WxH` size.
    pub fn rates_for(&self, fourcc: FourCc, size: &str) -> Vec<f64> {
        let Some((width, height)) = parse_size(size) else {
            return Vec::new();
        };
        let mut out: Vec<f64> = Vec::new();
        for entry in self
            .entries
            .iter()
            .filter(|e| e.fourcc == fourcc && e.width == width && e.height == height)
        {
            if !out.iter().any(|r| (r - entry.fps).abs() < RATE_EPSILON) {
                out.push(entry.fps);
            }
        }
        out
    }

    /// The catalog as the `Fourcc | Width | Height | FPS` table printed by
    /// probe-only mode.
    pub fn table(&self) -> String {
        let mut out = format!(
            "{:^10} | {:^10} | {:^10} | {:^10}\n{}\n",
            "Fourcc",
            "Width",
            "Height",
            "FPS",
            "-".repeat(60)
        );
        for e in &self.entries {
            out.push_str(&format!(
                "{:^10} | {:^10} | {:^10} | {:^10}\n",
                e.fourcc.to_string(),
                e.width,
                e.height,
                e.fps
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> FormatCatalog {
        let mut c = FormatCatalog::new();
        c.push(FormatEntry::new(FourCc::YUYV, 640, 480, 30.0));
        c.push(FormatEntry::new(FourCc::YUYV, 640, 480, 15.0));
        c.push(FormatEntry::new(FourCc::YUYV, 1280, 720, 10.0));
        c.push(FormatEntry::new(FourCc::MJPG, 1280, 720, 30.0));
        c
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut c = catalog();
        assert!(!c.push(FormatEntry::new(FourCc::YUYV, 640, 480, 30.0)));
        assert!(!c.push(FormatEntry::new(FourCc::YUYV, 640, 480, 30.001)));
        assert_eq!(c.len(), 4);
    }

    #[test]
    fn test_queries() {
        let c = catalog();
        assert_eq!(c.formats(), vec![FourCc::YUYV, FourCc::MJPG]);
        assert_eq!(c.sizes_for(FourCc::YUYV), vec!["640x480", "1280x720"]);
        assert_eq!(c.rates_for(FourCc::YUYV, "640x480"), vec![30.0, 15.0]);
        assert!(c.rates_for(FourCc::MJPG, "640x480").is_empty());
        assert!(c.rates_for(FourCc::MJPG, "garbage").is_empty());
    }

    #[test]
    fn test_entry_from_str() {
        let e: FormatEntry = "MJPG:1280x720@30".parse().unwrap();
        assert_eq!(e, FormatEntry::new(FourCc::MJPG, 1280, 720, 30.0));
        assert!("MJPG:1280x720".parse::<FormatEntry>().is_err());
        assert!("MJPEG:1280x720@30".parse::<FormatEntry>().is_err());
    }

    #[test]
    fn test_raspicam_catalog() {
        let c = FormatCatalog::raspicam();
        assert_eq!(c.formats(), vec![FourCc::YUYV]);
        assert_eq!(c.sizes_for(FourCc::YUYV).len(), 10);
        assert_eq!(c.rates_for(FourCc::YUYV, "3280x2464").len(), 9);
    }
}
