//! Parser for the driver tool's control listing (`v4l2-ctl -l`).
//!
//! A listing looks like:
//!
//! ```text
//! User Controls
//!
//!                      brightness 0x00980900 (int)    : min=-64 max=64 step=1 default=0 value=0
//!  white_balance_temperature_auto 0x0098090c (bool)   : default=1 value=1
//!
//! Camera Controls
//!
//!                   exposure_auto 0x009a0901 (menu)   : min=0 max=3 default=3 value=3
//!               exposure_absolute 0x009a0902 (int)    : min=1 max=5000 step=1 default=157 value=157 flags=inactive
//! ```
//!
//! Only the user-controls and camera-controls sections are kept; codec and
//! JPEG compression controls are not exposed.

use super::{ControlDescriptor, ControlKind};

const USER_MARKER: &str = "User Controls";
const CODEC_MARKER: &str = "Codec Controls";
const CAMERA_MARKER: &str = "Camera Controls";
const JPEG_MARKER: &str = "JPEG Compression Controls";

pub const KEYS: [&str; 6] = ["min", "max", "step", "default", "value", "flags"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl FieldValue {
    fn parse(raw: &str) -> Self {
        raw.parse::<i64>()
            .map(FieldValue::Int)
            .unwrap_or_else(|_| FieldValue::Text(raw.to_string()))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Text(s) => s,
        }
    }
}

/// The `key=value` fields of one listing line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFields {
    pub min: Option<FieldValue>,
    pub max: Option<FieldValue>,
    pub step: Option<FieldValue>,
    pub default: Option<FieldValue>,
    pub value: Option<FieldValue>,
    pub flags: Option<FieldValue>,
}

impl ControlFields {
    fn slot(&mut self, key: &str) -> Option<&mut Option<FieldValue>> {
        match key {
            "min" => Some(&mut self.min),
            "max" => Some(&mut self.max),
            "step" => Some(&mut self.step),
            "default" => Some(&mut self.default),
            "value" => Some(&mut self.value),
            "flags" => Some(&mut self.flags),
            _ => None,
        }
    }
}

/// Keep the user-controls section (up to the codec marker or end of text) and,
/// when both markers are present, the camera-controls section up to the JPEG
/// marker.
pub fn extract_sections(raw: &str) -> String {
    let start = raw.find(USER_MARKER).map_or(0, |i| i + USER_MARKER.len());
    let end = raw.find(CODEC_MARKER).unwrap_or(raw.len());
    let mut out = raw.get(start..end).unwrap_or_default().to_string();

    let camera = raw.find(CAMERA_MARKER).map(|i| i + CAMERA_MARKER.len());
    let jpeg = raw.find(JPEG_MARKER);
    if let (Some(start), Some(end)) = (camera, jpeg) {
        if let Some(section) = raw.get(start..end) {
            out.push('\n');
            out.push_str(section);
        }
    }
    out
}

/// Read every recognised `key=value` token of a line. Keys only match at a
/// token boundary, so `default=` never satisfies a lookup for `value=`.
pub fn parse_fields(line: &str) -> ControlFields {
    let mut fields = ControlFields::default();
    for token in line.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        if let Some(slot) = fields.slot(key) {
            if slot.is_none() {
                *slot = Some(FieldValue::parse(value));
            }
        }
    }
    fields
}

fn parse_line(line: &str) -> Option<ControlDescriptor> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() <= 3 || !tokens[1].starts_with("0x") {
        return None;
    }

    let fields = parse_fields(line);
    let numeric = |field: Option<FieldValue>, key: &str| match field {
        Some(FieldValue::Int(v)) => Some(v),
        Some(FieldValue::Text(text)) => {
            log::debug!("{}: non-numeric {}={}", tokens[0], key, text);
            None
        }
        None => None,
    };

    Some(ControlDescriptor {
        name: tokens[0].to_string(),
        hex_id: tokens[1].to_string(),
        type_tag: tokens[2].to_string(),
        kind: ControlKind::from_type_tag(tokens[2]),
        min: numeric(fields.min, "min"),
        max: numeric(fields.max, "max"),
        step: numeric(fields.step, "step"),
        default: numeric(fields.default, "default"),
        current: numeric(fields.value, "value"),
        flags: fields.flags.map(FieldValue::into_text),
    })
}

/// Parse a raw control listing into descriptors, in listing order. A name
/// seen twice keeps its first position and its last definition.
pub fn parse(raw: &str) -> Vec<ControlDescriptor> {
    let mut controls: Vec<ControlDescriptor> = Vec::new();
    for line in extract_sections(raw).lines() {
        let Some(descriptor) = parse_line(line) else {
            continue;
        };
        match controls.iter_mut().find(|c| c.name == descriptor.name) {
            Some(existing) => *existing = descriptor,
            None => controls.push(descriptor),
        }
    }
    controls
}
