//! The simulation session: lifecycle, port access, and tracing for one
//! model instance.
//!
//! A session is created around a freshly constructed model, stepped any
//! number of times, and destroyed once. Every operation checks the session
//! state first, so stepping or touching ports after `destroy` is reported as
//! [`SimError::InvalidState`] instead of reaching freed model memory.

use std::fmt;
use std::path::Path;

use log::{debug, trace, warn};
use vshim_common::{PortId, PortSpec, PortValue};

use crate::error::SimError;
use crate::model::SimModel;
use crate::ports::PortTable;
use crate::trace::{TraceOptions, TraceSession};

/// Lifecycle state of a [`Session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// The model is live; steps and port access are allowed.
    Ready,
    /// `destroy` has run. Terminal.
    Finalized,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Ready => write!(f, "ready"),
            SessionState::Finalized => write!(f, "finalized"),
        }
    }
}

/// Options applied when a session is created.
#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    /// Trace settings; `None` disables tracing.
    pub trace: Option<TraceOptions>,
    /// Leave the model allocated on destroy instead of releasing it.
    pub leak_model_on_destroy: bool,
}

/// A simulation session owning one model instance.
pub struct Session<M: SimModel> {
    model: Option<M>,
    ports: PortTable,
    trace: Option<TraceSession>,
    state: SessionState,
    steps: u64,
    leak_model_on_destroy: bool,
}

impl<M: SimModel> Session<M> {
    /// Wraps a freshly constructed model, opening the trace if requested.
    pub fn create(model: M, options: SessionOptions) -> Result<Self, SimError> {
        PortTable::check_widths(model.ports())?;
        let trace = match &options.trace {
            Some(trace_options) => Some(TraceSession::create(&model, trace_options)?),
            None => None,
        };
        let ports = PortTable::new(model.ports());
        debug!(
            "created session for {} ({} ports, tracing {})",
            model.name(),
            ports.len(),
            if trace.is_some() { "on" } else { "off" }
        );
        Ok(Self {
            model: Some(model),
            ports,
            trace,
            state: SessionState::Ready,
            steps: 0,
            leak_model_on_destroy: options.leak_model_on_destroy,
        })
    }

    /// Creates a session that records into a caller-supplied trace.
    pub fn with_trace(model: M, trace: TraceSession) -> Self {
        let ports = PortTable::new(model.ports());
        Self {
            model: Some(model),
            ports,
            trace: Some(trace),
            state: SessionState::Ready,
            steps: 0,
            leak_model_on_destroy: false,
        }
    }

    /// Evaluates the model once, then samples and flushes the trace.
    pub fn step(&mut self) -> Result<(), SimError> {
        let model = self.live_model_mut("step")?;
        model.eval();
        self.steps += 1;
        if let (Some(trace), Some(model)) = (self.trace.as_mut(), self.model.as_ref()) {
            trace.sample(model)?;
            trace!("step {} at trace time {}", self.steps, trace.time());
        } else {
            trace!("step {}", self.steps);
        }
        Ok(())
    }

    /// Alias of [`step`](Self::step) matching the model's native entry point.
    pub fn eval(&mut self) -> Result<(), SimError> {
        self.step()
    }

    /// Finalizes the model, closes the trace, and releases the model unless
    /// leaking was requested. The session is unusable afterwards.
    pub fn destroy(&mut self) -> Result<(), SimError> {
        self.live_model_mut("destroy")?;
        self.state = SessionState::Finalized;
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), SimError> {
        let Some(mut model) = self.model.take() else {
            return Ok(());
        };
        model.finalize();
        let closed = match self.trace.as_mut() {
            Some(trace) => trace.close(),
            None => Ok(()),
        };
        let name = model.name().to_string();
        if self.leak_model_on_destroy {
            warn!("leaking model {name} on destroy");
            std::mem::forget(model);
        } else {
            drop(model);
        }
        debug!("destroyed session for {name} after {} steps", self.steps);
        closed
    }

    /// Resolves a port name to its id.
    pub fn port_id(&self, name: &str) -> Result<PortId, SimError> {
        self.check_ready("access")?;
        self.ports.lookup(name)
    }

    /// Returns the descriptor of a port.
    pub fn port(&self, id: PortId) -> Result<&PortSpec, SimError> {
        self.check_ready("access")?;
        self.ports.spec(id)
    }

    /// Returns every port descriptor in id order. Available in any state.
    pub fn ports(&self) -> &[PortSpec] {
        self.ports.specs()
    }

    /// Reads a port.
    pub fn read(&self, id: PortId) -> Result<PortValue, SimError> {
        let model = self.live_model("read")?;
        self.ports.spec(id)?;
        Ok(model.read_port(id))
    }

    /// Reads a port as a `u64`, truncating ports wider than 64 bits.
    pub fn read_u64(&self, id: PortId) -> Result<u64, SimError> {
        self.read(id).map(|v| v.low_u64())
    }

    /// Writes an input port. The new value is visible to the model at the
    /// next step.
    pub fn write(&mut self, id: PortId, value: &PortValue) -> Result<(), SimError> {
        self.check_ready("write")?;
        let sized = self.ports.check_write(id, value)?;
        let model = self.live_model_mut("write")?;
        model.write_port(id, &sized);
        Ok(())
    }

    /// Writes an input port from a `u64`.
    pub fn write_u64(&mut self, id: PortId, value: u64) -> Result<(), SimError> {
        self.write(id, &PortValue::from_u64(value, 64))
    }

    /// Reads a port by name as a `u64`.
    pub fn get(&self, name: &str) -> Result<u64, SimError> {
        let id = self.port_id(name)?;
        self.read_u64(id)
    }

    /// Writes an input port by name.
    pub fn set(&mut self, name: &str, value: u64) -> Result<(), SimError> {
        let id = self.port_id(name)?;
        self.write_u64(id, value)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of completed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Current trace timestamp, or `None` when tracing is disabled.
    pub fn trace_time(&self) -> Option<u64> {
        self.trace.as_ref().map(TraceSession::time)
    }

    /// Path of the trace file, if tracing to a file.
    pub fn trace_path(&self) -> Option<&Path> {
        self.trace.as_ref().and_then(TraceSession::path)
    }

    /// Name of the model type, or `None` once the model is gone.
    pub fn model_name(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.name())
    }

    fn check_ready(&self, operation: &'static str) -> Result<(), SimError> {
        match self.state {
            SessionState::Ready => Ok(()),
            state => Err(SimError::InvalidState { operation, state }),
        }
    }

    fn live_model(&self, operation: &'static str) -> Result<&M, SimError> {
        self.check_ready(operation)?;
        self.model.as_ref().ok_or(SimError::InvalidState {
            operation,
            state: self.state,
        })
    }

    fn live_model_mut(&mut self, operation: &'static str) -> Result<&mut M, SimError> {
        self.check_ready(operation)?;
        let state = self.state;
        self.model
            .as_mut()
            .ok_or(SimError::InvalidState { operation, state })
    }
}

impl<M: SimModel> Drop for Session<M> {
    fn drop(&mut self) {
        if self.state == SessionState::Ready {
            self.state = SessionState::Finalized;
            if let Err(e) = self.teardown() {
                warn!("failed to finalize session on drop: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{Adder, Counter, FullAdder, PassThrough};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts lifecycle calls and drops of a one-port model.
    struct Probe {
        specs: Vec<PortSpec>,
        value: PortValue,
        evals: Rc<Cell<u32>>,
        finals: Rc<Cell<u32>>,
        drops: Rc<Cell<u32>>,
    }

    #[derive(Default)]
    struct Counts {
        evals: Rc<Cell<u32>>,
        finals: Rc<Cell<u32>>,
        drops: Rc<Cell<u32>>,
    }

    impl Counts {
        fn probe(&self) -> Probe {
            Probe {
                specs: vec![PortSpec::input("d", 8)],
                value: PortValue::new(8),
                evals: self.evals.clone(),
                finals: self.finals.clone(),
                drops: self.drops.clone(),
            }
        }
    }

    impl SimModel for Probe {
        fn name(&self) -> &str {
            "Probe"
        }
        fn ports(&self) -> &[PortSpec] {
            &self.specs
        }
        fn eval(&mut self) {
            self.evals.set(self.evals.get() + 1);
        }
        fn finalize(&mut self) {
            self.finals.set(self.finals.get() + 1);
        }
        fn read_port(&self, _id: PortId) -> PortValue {
            self.value.clone()
        }
        fn write_port(&mut self, _id: PortId, value: &PortValue) {
            self.value = value.clone();
        }
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn step_evaluates_once() {
        let counts = Counts::default();
        let mut s = Session::create(counts.probe(), SessionOptions::default()).unwrap();
        s.step().unwrap();
        s.eval().unwrap();
        assert_eq!(counts.evals.get(), 2);
        assert_eq!(s.steps(), 2);
        assert_eq!(s.trace_time(), None);
    }

    #[test]
    fn destroy_finalizes_and_releases() {
        let counts = Counts::default();
        let mut s = Session::create(counts.probe(), SessionOptions::default()).unwrap();
        s.destroy().unwrap();
        assert_eq!(counts.finals.get(), 1);
        assert_eq!(counts.drops.get(), 1);
        assert_eq!(s.state(), SessionState::Finalized);
        drop(s);
        assert_eq!(counts.finals.get(), 1);
        assert_eq!(counts.drops.get(), 1);
    }

    #[test]
    fn leak_is_opt_in() {
        let counts = Counts::default();
        let options = SessionOptions {
            leak_model_on_destroy: true,
            ..SessionOptions::default()
        };
        let mut s = Session::create(counts.probe(), options).unwrap();
        s.destroy().unwrap();
        assert_eq!(counts.finals.get(), 1);
        assert_eq!(counts.drops.get(), 0);
    }

    #[test]
    fn drop_while_ready_finalizes() {
        let counts = Counts::default();
        let s = Session::create(counts.probe(), SessionOptions::default()).unwrap();
        drop(s);
        assert_eq!(counts.finals.get(), 1);
        assert_eq!(counts.drops.get(), 1);
    }

    #[test]
    fn use_after_destroy_is_invalid_state() {
        let counts = Counts::default();
        let mut s = Session::create(counts.probe(), SessionOptions::default()).unwrap();
        let d = s.port_id("d").unwrap();
        s.destroy().unwrap();

        assert!(matches!(
            s.step(),
            Err(SimError::InvalidState { operation: "step", state: SessionState::Finalized })
        ));
        assert!(matches!(s.destroy(), Err(SimError::InvalidState { .. })));
        assert!(matches!(s.read(d), Err(SimError::InvalidState { .. })));
        assert!(matches!(s.write_u64(d, 1), Err(SimError::InvalidState { .. })));
        assert!(matches!(s.port_id("d"), Err(SimError::InvalidState { .. })));
        assert_eq!(counts.evals.get(), 0);
        // the port list stays inspectable
        assert_eq!(s.ports().len(), 1);
        assert_eq!(s.model_name(), None);
    }

    #[test]
    fn accessor_checks() {
        let mut s = Session::create(Adder::new(4), SessionOptions::default()).unwrap();
        assert!(matches!(s.port_id("carry"), Err(SimError::UnknownPort(_))));
        assert!(matches!(
            s.read(PortId::from_raw(9)),
            Err(SimError::PortOutOfRange { index: 9, count: 3 })
        ));
        assert!(matches!(s.set("a", 16), Err(SimError::ValueTooWide { .. })));
        assert!(matches!(s.set("sum", 1), Err(SimError::ReadOnlyPort(_))));
        assert_eq!(s.port(PortId::from_raw(2)).unwrap().name, "sum");
    }

    #[test]
    fn full_adder_scenario() {
        let mut s = Session::create(FullAdder::new(), SessionOptions::default()).unwrap();
        s.set("in0", 1).unwrap();
        s.set("in1", 0).unwrap();
        s.step().unwrap();
        assert_eq!(s.get("sum").unwrap(), 1);
        assert_eq!(s.get("cout").unwrap(), 0);
        s.destroy().unwrap();
    }

    #[test]
    fn outputs_hold_until_step() {
        let mut s = Session::create(PassThrough::new(8), SessionOptions::default()).unwrap();
        s.set("in_", 7).unwrap();
        assert_eq!(s.get("out").unwrap(), 0);
        s.step().unwrap();
        assert_eq!(s.get("out").unwrap(), 7);
    }

    #[test]
    fn wide_value_round_trip() {
        let mut s = Session::create(PassThrough::new(64), SessionOptions::default()).unwrap();
        let id = s.port_id("in_").unwrap();
        s.write(id, &PortValue::from_u64(u64::MAX, 64)).unwrap();
        s.step().unwrap();
        assert_eq!(s.get("out").unwrap(), u64::MAX);
    }

    #[test]
    fn port_ids_stable() {
        let mut s = Session::create(FullAdder::new(), SessionOptions::default()).unwrap();
        let ids: Vec<_> = ["in0", "in1", "cin", "sum", "cout"]
            .iter()
            .map(|n| s.port_id(n).unwrap())
            .collect();
        for _ in 0..10 {
            s.step().unwrap();
        }
        for (i, name) in ["in0", "in1", "cin", "sum", "cout"].iter().enumerate() {
            assert_eq!(s.port_id(name).unwrap(), ids[i]);
            assert_eq!(ids[i].as_raw(), i as u32);
        }
    }

    #[test]
    fn traced_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.Counter.vcd");
        let options = SessionOptions {
            trace: Some(TraceOptions::new(&path)),
            ..SessionOptions::default()
        };
        let mut s = Session::create(Counter::new(4), options).unwrap();
        assert_eq!(s.trace_path(), Some(path.as_path()));
        for cycle in 0..4u64 {
            s.set("clk", cycle % 2).unwrap();
            s.step().unwrap();
        }
        assert_eq!(s.trace_time(), Some(15));
        assert_eq!(s.get("count").unwrap(), 2);
        s.destroy().unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn create_fails_on_bad_clock() {
        let dir = tempfile::tempdir().unwrap();
        let options = SessionOptions {
            trace: Some(TraceOptions::new(dir.path().join("t.vcd"))),
            ..SessionOptions::default()
        };
        let err = Session::create(Adder::new(4), options).err().unwrap();
        assert!(matches!(err, SimError::InvalidClock { .. }));
    }

    #[test]
    fn zero_width_port_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.Probe.vcd");
        let counts = Counts::default();
        let mut model = counts.probe();
        model.specs.push(PortSpec::output("nil", 0));
        let options = SessionOptions {
            trace: Some(TraceOptions::new(&path).with_clock(None)),
            ..SessionOptions::default()
        };
        let err = Session::create(model, options).err().unwrap();
        assert!(matches!(err, SimError::ZeroWidthPort(ref n) if n == "nil"));
        assert!(!path.exists());

        let mut model = counts.probe();
        model.specs.push(PortSpec::output("nil", 0));
        assert!(Session::create(model, SessionOptions::default()).is_err());
    }

    #[test]
    fn state_display() {
        assert_eq!(SessionState::Ready.to_string(), "ready");
        assert_eq!(SessionState::Finalized.to_string(), "finalized");
    }
}
