//! Waveform sinks for session traces.
//!
//! A [`TraceSession`](crate::TraceSession) talks to a [`WaveformRecorder`];
//! [`VcdRecorder`] is the only sink and writes IEEE 1364 VCD text.

use std::io::Write;

use vshim_common::{PortId, PortValue};

use crate::error::SimError;

/// A sink for the port values a traced session dumps after each step.
pub trait WaveformRecorder {
    /// Enters the module scope the following signals belong to.
    fn begin_scope(&mut self, name: &str) -> Result<(), SimError>;

    /// Registers a port for recording.
    fn register_signal(&mut self, id: PortId, name: &str, width: u32) -> Result<(), SimError>;

    /// Leaves the scope opened by `begin_scope`.
    fn end_scope(&mut self) -> Result<(), SimError>;

    /// Records a value change at the given time (in timescale units).
    fn record_change(&mut self, time: u64, id: PortId, value: &PortValue)
        -> Result<(), SimError>;

    /// Pushes buffered output to the underlying sink.
    fn flush(&mut self) -> Result<(), SimError>;

    /// Writes any pending trailer and flushes.
    fn finalize(&mut self) -> Result<(), SimError>;
}

/// Writes a VCD trace to any [`Write`] sink.
///
/// Each registered port gets a short code of printable ASCII from `!`.
/// The header is written on the first scope; `$enddefinitions` and the
/// `$dumpvars` block are written before the first recorded change.
pub struct VcdRecorder<W: Write> {
    writer: W,
    timescale: String,
    /// Indexed by `PortId`: (id_code, width) for registered ports.
    id_map: Vec<Option<(String, u32)>>,
    next_id: u32,
    header_written: bool,
    in_dumpvars: bool,
    current_time: Option<u64>,
}

impl<W: Write> VcdRecorder<W> {
    /// Creates a recorder with a `1ps` timescale.
    pub fn new(writer: W) -> Self {
        Self::with_timescale(writer, "1ps")
    }

    /// Creates a recorder declaring the given `$timescale` (e.g. `"1ns"`).
    pub fn with_timescale(writer: W, timescale: &str) -> Self {
        Self {
            writer,
            timescale: timescale.to_string(),
            id_map: Vec::new(),
            next_id: 0,
            header_written: false,
            in_dumpvars: false,
            current_time: None,
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> Result<(), SimError> {
        if self.header_written {
            return Ok(());
        }
        self.header_written = true;
        writeln!(self.writer, "$date")?;
        writeln!(self.writer, "  Session trace")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$version")?;
        writeln!(self.writer, "  vshim session shim")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$timescale")?;
        writeln!(self.writer, "  {}", self.timescale)?;
        writeln!(self.writer, "$end")?;
        Ok(())
    }

    /// Code for the `n`th registered signal: `!`..`~`, then two characters.
    fn signal_code(n: u32) -> String {
        const RADIX: u32 = 94;
        let mut code = String::new();
        let mut rest = n;
        loop {
            code.push(char::from(b'!' + (rest % RADIX) as u8));
            rest /= RADIX;
            if rest == 0 {
                return code;
            }
            rest -= 1;
        }
    }

    fn format_value(value: &PortValue, width: u32) -> String {
        if width == 1 {
            if value.bit(0) { "1" } else { "0" }.to_string()
        } else {
            format!("b{}", value.to_vcd_bits())
        }
    }
}

impl<W: Write> WaveformRecorder for VcdRecorder<W> {
    fn begin_scope(&mut self, name: &str) -> Result<(), SimError> {
        self.write_header()?;
        writeln!(self.writer, "$scope module {name} $end")?;
        Ok(())
    }

    fn register_signal(&mut self, id: PortId, name: &str, width: u32) -> Result<(), SimError> {
        if width == 0 {
            return Err(SimError::ZeroWidthPort(name.to_string()));
        }
        let id_code = Self::signal_code(self.next_id);
        self.next_id += 1;

        writeln!(self.writer, "$var wire {width} {id_code} {name} $end")?;

        if self.id_map.len() <= id.index() {
            self.id_map.resize(id.index() + 1, None);
        }
        self.id_map[id.index()] = Some((id_code, width));
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$upscope $end")?;
        Ok(())
    }

    fn record_change(
        &mut self,
        time: u64,
        id: PortId,
        value: &PortValue,
    ) -> Result<(), SimError> {
        self.write_header()?;

        if self.current_time != Some(time) {
            match self.current_time {
                None => {
                    writeln!(self.writer, "$enddefinitions $end")?;
                    writeln!(self.writer, "#{time}")?;
                    writeln!(self.writer, "$dumpvars")?;
                    self.in_dumpvars = true;
                }
                Some(prev) if time < prev => {
                    return Err(SimError::InvalidSignalRef {
                        reason: format!("time {time} precedes recorded time {prev}"),
                    });
                }
                Some(_) => {
                    if self.in_dumpvars {
                        writeln!(self.writer, "$end")?;
                        self.in_dumpvars = false;
                    }
                    writeln!(self.writer, "#{time}")?;
                }
            }
            self.current_time = Some(time);
        }

        let (id_code, width) = self
            .id_map
            .get(id.index())
            .and_then(|e| e.as_ref())
            .ok_or_else(|| SimError::InvalidSignalRef {
                reason: format!("port {} was never registered", id.as_raw()),
            })?;

        let bits = Self::format_value(value, *width);
        if *width == 1 {
            writeln!(self.writer, "{bits}{id_code}")?;
        } else {
            writeln!(self.writer, "{bits} {id_code}")?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SimError> {
        self.writer.flush()?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SimError> {
        if self.current_time.is_none() {
            self.write_header()?;
            writeln!(self.writer, "$enddefinitions $end")?;
            self.current_time = Some(0);
        }
        if self.in_dumpvars {
            writeln!(self.writer, "$end")?;
            self.in_dumpvars = false;
        }
        self.writer.flush()?;
        Ok(())
    }
}
