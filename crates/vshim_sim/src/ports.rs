//! Name and index lookup over a model's fixed port list.

use std::collections::HashMap;

use vshim_common::{PortId, PortSpec, PortValue};

use crate::error::SimError;

/// Fixed mapping from port name to [`PortId`], with the validity checks the
/// session applies before touching model memory.
#[derive(Clone, Debug)]
pub struct PortTable {
    specs: Vec<PortSpec>,
    by_name: HashMap<String, PortId>,
}

impl PortTable {
    /// Builds a table from a port list. Ids follow list order; if a name
    /// repeats, lookups resolve to its first occurrence.
    pub fn new(specs: &[PortSpec]) -> Self {
        let mut by_name = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            by_name
                .entry(spec.name.clone())
                .or_insert(PortId::from_raw(i as u32));
        }
        Self {
            specs: specs.to_vec(),
            by_name,
        }
    }

    /// Rejects a port list containing a zero-width port.
    pub fn check_widths(specs: &[PortSpec]) -> Result<(), SimError> {
        match specs.iter().find(|p| p.width == 0) {
            Some(p) => Err(SimError::ZeroWidthPort(p.name.clone())),
            None => Ok(()),
        }
    }

    /// Number of ports.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns true if the model has no ports.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Resolves a port name.
    pub fn lookup(&self, name: &str) -> Result<PortId, SimError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownPort(name.to_string()))
    }

    /// Returns the descriptor of a port.
    pub fn spec(&self, id: PortId) -> Result<&PortSpec, SimError> {
        self.specs.get(id.index()).ok_or(SimError::PortOutOfRange {
            index: id.as_raw(),
            count: self.specs.len(),
        })
    }

    /// Iterates over `(id, spec)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (PortId, &PortSpec)> {
        self.specs
            .iter()
            .enumerate()
            .map(|(i, s)| (PortId::from_raw(i as u32), s))
    }

    /// Returns all descriptors in id order.
    pub fn specs(&self) -> &[PortSpec] {
        &self.specs
    }

    /// Checks that `value` may be written to `id` and returns it sized to
    /// the port width.
    pub fn check_write(&self, id: PortId, value: &PortValue) -> Result<PortValue, SimError> {
        let spec = self.spec(id)?;
        if !spec.is_input() {
            return Err(SimError::ReadOnlyPort(spec.name.clone()));
        }
        let bits = value.significant_bits();
        if bits > spec.width {
            return Err(SimError::ValueTooWide {
                port: spec.name.clone(),
                width: spec.width,
                value_bits: bits,
            });
        }
        Ok(value.resized(spec.width))
    }
}
