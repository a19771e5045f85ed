//! Parameter registry: every control the device reported, plus the ordered
//! subset currently shown as sliders.

use super::{parser, ControlDescriptor};
use crate::device::CameraKind;
use crate::errors::CameraError;
use crate::platform::ControlBackend;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which controls are activated after discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamSet {
    /// Every discovered control, in listing order.
    #[default]
    Full,
    /// The camera kind's preset, restricted to controls the device reported.
    Minimum,
}

impl FromStr for ParamSet {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(ParamSet::Full),
            "minimum" => Ok(ParamSet::Minimum),
            other => Err(CameraError::InvalidArgument(format!(
                "unknown parameter set: {other} (expected full or minimum)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    controls: Vec<ControlDescriptor>,
    active: Vec<String>,
}

impl ParameterRegistry {
    /// Build a registry from already-parsed descriptors. Reported values
    /// outside `[min, max]` are dropped so `current` always honours the bounds.
    pub fn from_descriptors(descriptors: Vec<ControlDescriptor>) -> Self {
        let controls = descriptors
            .into_iter()
            .map(|mut d| {
                if let Some(current) = d.current {
                    if !d.in_range(current) {
                        log::warn!(
                            "{} reports value {} outside [{:?}, {:?}], treating as unknown",
                            d.name,
                            current,
                            d.min,
                            d.max
                        );
                        d.current = None;
                    }
                }
                d
            })
            .collect();
        Self {
            controls,
            active: Vec::new(),
        }
    }

    pub fn from_listing(raw: &str) -> Self {
        Self::from_descriptors(parser::parse(raw))
    }

    /// Enumerate the device's controls. The active subset starts empty.
    pub fn discover<B: ControlBackend + ?Sized>(backend: &B) -> Result<Self, CameraError> {
        let raw = backend.list_controls()?;
        let registry = Self::from_listing(&raw);
        log::debug!("Discovered {} controls", registry.controls.len());
        Ok(registry)
    }

    /// Replace the full set after the device was reconfigured. Active names
    /// that still exist stay active, in their previous order.
    pub fn rediscover<B: ControlBackend + ?Sized>(&mut self, backend: &B) -> Result<(), CameraError> {
        let fresh = Self::discover(backend)?;
        let previous = std::mem::take(&mut self.active);
        self.controls = fresh.controls;
        self.active = previous
            .into_iter()
            .filter(|name| self.get(name).is_some())
            .collect();
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ControlDescriptor> {
        self.controls.iter().find(|c| c.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut ControlDescriptor> {
        self.controls.iter_mut().find(|c| c.name == name)
    }

    pub fn controls(&self) -> &[ControlDescriptor] {
        &self.controls
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.controls.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn active_names(&self) -> &[String] {
        &self.active
    }

    /// Replace the active subset. Every name must belong to the full set.
    pub fn activate<I, S>(&mut self, names: I) -> Result<&[String], CameraError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut active = Vec::new();
        for name in names {
            let name = name.into();
            if self.get(&name).is_none() {
                return Err(CameraError::UnknownControl(name));
            }
            if !active.contains(&name) {
                active.push(name);
            }
        }
        self.active = active;
        Ok(&self.active)
    }

    /// Activate a parameter set for the given camera kind.
    pub fn activate_set(&mut self, set: ParamSet, kind: CameraKind) -> Result<&[String], CameraError> {
        let names: Vec<String> = match set {
            ParamSet::Full => self.names().map(str::to_string).collect(),
            ParamSet::Minimum => kind
                .preset_controls()
                .iter()
                .filter(|name| self.get(name).is_some())
                .map(|name| name.to_string())
                .collect(),
        };
        self.activate(names)
    }

    /// Owned copies of the active descriptors, in display order.
    pub fn snapshot(&self) -> Vec<ControlDescriptor> {
        self.active
            .iter()
            .filter_map(|name| self.get(name).cloned())
            .collect()
    }

    /// Write a control value through the backend. Values outside the
    /// reported bounds are rejected, never clamped; `current` changes only
    /// after the device accepted the write.
    pub fn set_value<B: ControlBackend + ?Sized>(
        &mut self,
        backend: &B,
        name: &str,
        value: i64,
    ) -> Result<i64, CameraError> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| CameraError::UnknownControl(name.to_string()))?;

        if !descriptor.in_range(value) {
            let (min, max) = descriptor.bounds();
            return Err(CameraError::ValueOutOfRange {
                name: name.to_string(),
                value,
                min: min.unwrap_or(i64::MIN),
                max: max.unwrap_or(i64::MAX),
            });
        }
        if descriptor.is_read_only() {
            log::warn!("{} is flagged read-only, writing anyway", name);
        }

        backend.set_control(name, value)?;
        log::debug!("{} = {}", name, value);

        if let Some(descriptor) = self.get_mut(name) {
            descriptor.current = Some(value);
        }
        Ok(value)
    }

    /// Reset every active control to its default. A failing control does not
    /// stop the others; all failures are returned together.
    pub fn reset_to_defaults<B: ControlBackend + ?Sized>(&mut self, backend: &B) -> Result<(), CameraError> {
        let mut failures = Vec::new();
        for name in self.active.clone() {
            let Some(default) = self.get(&name).and_then(|c| c.default) else {
                log::debug!("{} has no default, skipping reset", name);
                continue;
            };
            if let Err(e) = self.set_value(backend, &name, default) {
                log::warn!("Failed to reset {}: {}", name, e);
                failures.push((name, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CameraError::ResetFailed(failures))
        }
    }
}
