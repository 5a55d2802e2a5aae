//! The seam between a session and the external simulation kernel.

use vshim_common::{PortId, PortSpec, PortValue};

/// A compiled hardware model driven one evaluation at a time.
///
/// Implementations own the model's memory. The session guarantees that
/// `read_port`/`write_port` are only called with ids below `ports().len()`,
/// with values already sized to the port width, and never after `finalize`.
pub trait SimModel {
    /// The model type name, the default trace scope.
    fn name(&self) -> &str;

    /// The exposed ports in id order. Must not change over the model's life.
    fn ports(&self) -> &[PortSpec];

    /// Evaluates the model once.
    fn eval(&mut self);

    /// Runs the model's end-of-simulation hook.
    fn finalize(&mut self);

    /// Reads the current contents of a port.
    fn read_port(&self, id: PortId) -> PortValue;

    /// Overwrites the contents of a port.
    fn write_port(&mut self, id: PortId, value: &PortValue);
}

impl<M: SimModel + ?Sized> SimModel for Box<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn ports(&self) -> &[PortSpec] {
        (**self).ports()
    }

    fn eval(&mut self) {
        (**self).eval()
    }

    fn finalize(&mut self) {
        (**self).finalize()
    }

    fn read_port(&self, id: PortId) -> PortValue {
        (**self).read_port(id)
    }

    fn write_port(&mut self, id: PortId, value: &PortValue) {
        (**self).write_port(id, value)
    }
}
