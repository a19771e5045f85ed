//! Device control model
//!
//! Controls are discovered from the driver tool's textual listing, held in a
//! [`ParameterRegistry`] and written back through a
//! [`ControlBackend`](crate::platform::ControlBackend). Descriptors are plain
//! data: renderers keep their own name-to-widget mapping and redraw from
//! [`ParameterRegistry::snapshot`].

pub mod parser;
pub mod registry;

pub use parser::{extract_sections, parse, parse_fields, ControlFields, FieldValue};
pub use registry::{ParamSet, ParameterRegistry};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ControlKind {
    Integer,
    Boolean,
    Menu,
}

impl ControlKind {
    /// Infer the kind from the driver's type tag, e.g. `(int)`, `(bool)`, `(menu)`.
    pub fn from_type_tag(tag: &str) -> Self {
        match tag.trim_matches(|c| c == '(' || c == ')') {
            "bool" => ControlKind::Boolean,
            "menu" | "intmenu" => ControlKind::Menu,
            _ => ControlKind::Integer,
        }
    }
}

/// One tunable control exposed by the device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlDescriptor {
    pub name: String,
    pub hex_id: String,
    pub type_tag: String,
    pub kind: ControlKind,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub step: Option<i64>,
    pub default: Option<i64>,
    pub current: Option<i64>,
    pub flags: Option<String>,
}

impl ControlDescriptor {
    /// Step used by sliders; absent steps count as 1.
    pub fn effective_step(&self) -> i64 {
        match self.step {
            Some(step) if step > 0 => step,
            _ => 1,
        }
    }

    /// Reported bounds. Booleans are listed without min/max and take `[0, 1]`.
    pub fn bounds(&self) -> (Option<i64>, Option<i64>) {
        match self.kind {
            ControlKind::Boolean => (Some(self.min.unwrap_or(0)), Some(self.max.unwrap_or(1))),
            _ => (self.min, self.max),
        }
    }

    /// Checks every bound that is known.
    pub fn in_range(&self, value: i64) -> bool {
        let (min, max) = self.bounds();
        min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags
            .as_deref()
            .is_some_and(|flags| flags.split(',').any(|f| f.trim() == flag))
    }

    pub fn is_inactive(&self) -> bool {
        self.has_flag("inactive")
    }

    pub fn is_read_only(&self) -> bool {
        self.has_flag("read-only")
    }
}
