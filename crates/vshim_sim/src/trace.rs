//! The waveform side-channel of a session.
//!
//! A [`TraceSession`] samples every port after each evaluation. The trace
//! timestamp is logical: it advances by a fixed tick whenever the clock port
//! differs from the value seen at the previous sample, and stays put
//! otherwise. Only changed values are written, except on the first sample
//! which dumps everything. The recorder is flushed after every sample so the
//! file is complete up to the last step even if the process dies.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::info;
use vshim_common::{PortId, PortValue};
use vshim_config::DEFAULT_TICK;

use crate::error::SimError;
use crate::model::SimModel;
use crate::ports::PortTable;
use crate::waveform::{VcdRecorder, WaveformRecorder};

/// Default clock port name.
pub const DEFAULT_CLOCK: &str = "clk";

/// How a session traces its ports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceOptions {
    /// Output VCD path.
    pub path: PathBuf,
    /// Clock port name; `None` keeps the timestamp at 0.
    pub clock: Option<String>,
    /// Timestamp increment per clock transition. Must be non-zero.
    pub tick: u64,
    /// VCD `$timescale`.
    pub timescale: String,
    /// Top-level `$scope` name; `None` uses the model's own name.
    pub scope: Option<String>,
}

impl TraceOptions {
    /// Options writing to `path` with clock `clk`, tick 5, and a `1ps`
    /// timescale.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            clock: Some(DEFAULT_CLOCK.to_string()),
            tick: DEFAULT_TICK,
            timescale: "1ps".to_string(),
            scope: None,
        }
    }

    /// Sets the clock port; `None` disables clock tracking.
    pub fn with_clock(mut self, clock: Option<&str>) -> Self {
        self.clock = clock.map(str::to_string);
        self
    }

    /// Sets the tick increment.
    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    /// Sets the top-level scope name.
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }
}

impl From<vshim_config::TracePlan> for TraceOptions {
    fn from(plan: vshim_config::TracePlan) -> Self {
        Self {
            path: plan.path,
            clock: plan.clock,
            tick: plan.tick,
            timescale: plan.timescale,
            scope: Some(plan.scope),
        }
    }
}

/// An open trace: recorder, logical timestamp, and last dumped values.
pub struct TraceSession {
    recorder: Box<dyn WaveformRecorder + Send>,
    path: Option<PathBuf>,
    clock: Option<PortId>,
    tick: u64,
    time: u64,
    prev_clk: bool,
    last: Vec<Option<PortValue>>,
    closed: bool,
}

impl TraceSession {
    /// Creates the trace file (and missing parent directories) and declares
    /// every port of `model` under `options.scope` or the model name.
    pub fn create(model: &dyn SimModel, options: &TraceOptions) -> Result<Self, SimError> {
        // Reject bad ports or a bad clock before anything is created on disk.
        PortTable::check_widths(model.ports())?;
        resolve_clock(model, options)?;
        if let Some(parent) = options.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&options.path)?;
        let recorder = VcdRecorder::with_timescale(BufWriter::new(file), &options.timescale);
        let mut trace = Self::with_recorder(model, options, Box::new(recorder))?;
        trace.path = Some(options.path.clone());
        info!(
            "tracing {} to {}",
            model.name(),
            options.path.display()
        );
        Ok(trace)
    }

    /// Creates a trace over an arbitrary recorder. `options.path` is not
    /// opened.
    pub fn with_recorder(
        model: &dyn SimModel,
        options: &TraceOptions,
        mut recorder: Box<dyn WaveformRecorder + Send>,
    ) -> Result<Self, SimError> {
        if options.tick == 0 {
            return Err(SimError::InvalidClock {
                name: options.clock.clone().unwrap_or_default(),
                reason: "tick increment must be non-zero".to_string(),
            });
        }
        PortTable::check_widths(model.ports())?;
        let clock = resolve_clock(model, options)?;

        recorder.begin_scope(options.scope.as_deref().unwrap_or(model.name()))?;
        for (i, spec) in model.ports().iter().enumerate() {
            recorder.register_signal(PortId::from_raw(i as u32), &spec.name, spec.width)?;
        }
        recorder.end_scope()?;

        Ok(Self {
            recorder,
            path: None,
            clock,
            tick: options.tick,
            time: 0,
            prev_clk: false,
            last: vec![None; model.ports().len()],
            closed: false,
        })
    }

    /// Records the model's state after an evaluation and flushes.
    pub fn sample(&mut self, model: &dyn SimModel) -> Result<(), SimError> {
        if let Some(clk) = self.clock {
            let level = !model.read_port(clk).is_zero();
            if level != self.prev_clk {
                self.time += self.tick;
            }
            self.prev_clk = level;
        }

        for (i, last) in self.last.iter_mut().enumerate() {
            let id = PortId::from_raw(i as u32);
            let value = model.read_port(id);
            if last.as_ref() != Some(&value) {
                self.recorder.record_change(self.time, id, &value)?;
                *last = Some(value);
            }
        }
        self.recorder.flush()
    }

    /// Current trace timestamp.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Path of the trace file, if the trace writes to one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Finalizes the trace. Further calls are no-ops.
    pub fn close(&mut self) -> Result<(), SimError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.recorder.finalize()
    }
}

fn resolve_clock(model: &dyn SimModel, options: &TraceOptions) -> Result<Option<PortId>, SimError> {
    let Some(name) = options.clock.as_deref() else {
        return Ok(None);
    };
    let (index, spec) = model
        .ports()
        .iter()
        .enumerate()
        .find(|(_, p)| p.name == name)
        .ok_or_else(|| SimError::InvalidClock {
            name: name.to_string(),
            reason: format!("model {} has no such port", model.name()),
        })?;
    if spec.width != 1 {
        return Err(SimError::InvalidClock {
            name: name.to_string(),
            reason: format!("clock must be 1 bit wide, port is {} bits", spec.width),
        });
    }
    Ok(Some(PortId::from_raw(index as u32)))
}
