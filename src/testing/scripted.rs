//! Scripted collaborators
//!
//! Each one answers from canned data and records what it was asked, so tests
//! can assert on the exact device traffic.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use crate::errors::CameraError;
use crate::formats::FormatEntry;
use crate::fourcc::FourCc;
use crate::platform::{CapabilityBackend, ControlBackend, RawFrame, StreamBackend};

use super::synthetic_data::synthetic_frame;

/// Shared, append-only record of calls made on a scripted collaborator.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Calls starting with `prefix`
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Control collaborator answering from a fixed listing.
#[derive(Debug, Default)]
pub struct ScriptedControls {
    listing: String,
    failing: HashSet<String>,
    log: CallLog,
}

impl ScriptedControls {
    pub fn new(listing: impl Into<String>) -> Self {
        Self {
            listing: listing.into(),
            ..Default::default()
        }
    }

    /// Writes to `name` fail with an external tool error.
    pub fn failing_on(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// `(name, value)` pairs written so far, in order.
    pub fn writes(&self) -> Vec<(String, i64)> {
        self.log
            .matching("set ")
            .iter()
            .filter_map(|c| {
                let (name, value) = c.trim_start_matches("set ").split_once('=')?;
                Some((name.to_string(), value.parse().ok()?))
            })
            .collect()
    }
}

impl ControlBackend for ScriptedControls {
    fn list_controls(&self) -> Result<String, CameraError> {
        self.log.push("list");
        Ok(self.listing.clone())
    }

    fn set_control(&self, name: &str, value: i64) -> Result<(), CameraError> {
        self.log.push(format!("set {name}={value}"));
        if self.failing.contains(name) {
            return Err(CameraError::ExternalTool {
                command: format!("v4l2-ctl --set-ctrl {name}={value}"),
                status: "1".to_string(),
                stderr: format!("{name}: Input/output error"),
            });
        }
        Ok(())
    }
}

/// Capability collaborator backed by a list of advertised tuples.
#[derive(Debug, Default, Clone)]
pub struct ScriptedCapabilities {
    entries: Vec<FormatEntry>,
}

impl ScriptedCapabilities {
    pub fn new(entries: Vec<FormatEntry>) -> Self {
        Self { entries }
    }
}

impl CapabilityBackend for ScriptedCapabilities {
    fn pixel_formats(&self) -> Result<Vec<FourCc>, CameraError> {
        let mut out = Vec::new();
        for entry in &self.entries {
            if !out.contains(&entry.fourcc) {
                out.push(entry.fourcc);
            }
        }
        Ok(out)
    }

    fn frame_sizes(&self, fourcc: FourCc) -> Result<Vec<(u32, u32)>, CameraError> {
        let mut out = Vec::new();
        for entry in self.entries.iter().filter(|e| e.fourcc == fourcc) {
            if !out.contains(&(entry.width, entry.height)) {
                out.push((entry.width, entry.height));
            }
        }
        Ok(out)
    }

    fn frame_rates(&self, fourcc: FourCc, width: u32, height: u32) -> Result<Vec<f64>, CameraError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.fourcc == fourcc && e.width == width && e.height == height)
            .map(|e| e.fps)
            .collect())
    }
}

/// Stream collaborator that behaves like a driver: it may clamp requested
/// geometry, and can be told to fail after a number of reads.
#[derive(Debug)]
pub struct ScriptedStream {
    format: FormatEntry,
    max_width: Option<u32>,
    queued: VecDeque<RawFrame>,
    fail_after: Option<u64>,
    reads: u64,
    log: CallLog,
}

impl ScriptedStream {
    pub fn new(format: FormatEntry) -> Self {
        Self {
            format,
            max_width: None,
            queued: VecDeque::new(),
            fail_after: None,
            reads: 0,
            log: CallLog::default(),
        }
    }

    /// Silently clamp requested widths to `max`.
    pub fn with_max_width(mut self, max: u32) -> Self {
        self.max_width = Some(max);
        self
    }

    /// Reads after the first `reads` fail, as if the device was unplugged.
    pub fn failing_after(mut self, reads: u64) -> Self {
        self.fail_after = Some(reads);
        self
    }

    /// Frames returned before falling back to synthetic ones.
    pub fn with_frames(mut self, frames: impl IntoIterator<Item = RawFrame>) -> Self {
        self.queued.extend(frames);
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl StreamBackend for ScriptedStream {
    fn format(&self) -> Result<FormatEntry, CameraError> {
        self.log.push("format");
        Ok(self.format)
    }

    fn set_format(&mut self, requested: &FormatEntry) -> Result<(), CameraError> {
        self.log.push(format!("set_format {requested}"));
        let mut applied = *requested;
        if let Some(max) = self.max_width {
            applied.width = applied.width.min(max);
        }
        self.format = applied;
        Ok(())
    }

    fn read(&mut self) -> Result<RawFrame, CameraError> {
        if self.fail_after.is_some_and(|n| self.reads >= n) {
            self.log.push("read failed");
            return Err(CameraError::FrameRead("device disconnected".to_string()));
        }
        self.log.push("read");
        let frame = self
            .queued
            .pop_front()
            .unwrap_or_else(|| synthetic_frame(self.reads, &self.format));
        self.reads += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.log.push("close");
    }
}
