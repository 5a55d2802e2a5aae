//! VCD file loader for reading session traces back.
//!
//! Parses IEEE 1364 Value Change Dump files produced by [`VcdRecorder`] or
//! by the external simulator's own tracer. Values are 2-state: `x` and `z`
//! bits load as `0`.
//!
//! [`VcdRecorder`]: crate::waveform::VcdRecorder

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use vshim_common::PortValue;

/// Errors that can occur while loading a VCD file.
#[derive(Debug, Error)]
pub enum VcdLoadError {
    /// An I/O error occurred while reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A parse error at a specific line number.
    #[error("parse error at line {line}: {message}")]
    ParseError {
        /// The 1-based line number where the error occurred.
        line: usize,
        /// Description of the error.
        message: String,
    },
    /// The VCD file has a structural format error.
    #[error("format error: {0}")]
    FormatError(String),
}

/// Timescale declared in the VCD header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VcdTimescale {
    /// The declaration as written (e.g. `"1ps"`).
    pub text: String,
    /// Femtoseconds per VCD time unit.
    pub fs_per_unit: u64,
}

impl Default for VcdTimescale {
    fn default() -> Self {
        Self {
            text: "1fs".to_string(),
            fs_per_unit: 1,
        }
    }
}

/// A signal declared by a `$var`.
#[derive(Clone, Debug, Serialize)]
pub struct VcdSignalDef {
    /// The VCD identifier code (e.g. `"!"`).
    pub id_code: String,
    /// Dotted hierarchical name (e.g. `"FullAdder.sum"`).
    pub name: String,
    /// Bit width.
    pub width: u32,
    /// Variable type (e.g. `"wire"`).
    pub var_type: String,
}

/// A fully loaded waveform.
#[derive(Clone, Debug)]
pub struct LoadedWaveform {
    /// The timescale from the header.
    pub timescale: VcdTimescale,
    /// Signal definitions in declaration order.
    pub signals: Vec<VcdSignalDef>,
    /// Per-signal `(time, value)` changes, parallel to `signals`. Times are
    /// in timescale units.
    pub histories: Vec<Vec<(u64, PortValue)>>,
    /// The last timestamp in the file.
    pub end_time: u64,
}

impl LoadedWaveform {
    /// Finds a signal by its full hierarchical name or by its leaf name.
    pub fn find_signal(&self, name: &str) -> Option<usize> {
        self.signals
            .iter()
            .position(|s| s.name == name)
            .or_else(|| {
                self.signals
                    .iter()
                    .position(|s| s.name.rsplit('.').next() == Some(name))
            })
    }

    /// Returns the value of signal `index` at `time` (the last change at or
    /// before it), or `None` if the signal had no value yet.
    pub fn value_at(&self, index: usize, time: u64) -> Option<&PortValue> {
        self.histories
            .get(index)?
            .iter()
            .take_while(|(t, _)| *t <= time)
            .last()
            .map(|(_, v)| v)
    }
}

/// Line-oriented VCD parse state.
#[derive(Default)]
struct Parser {
    timescale: VcdTimescale,
    signals: Vec<VcdSignalDef>,
    id_to_idx: HashMap<String, usize>,
    histories: Vec<Vec<(u64, PortValue)>>,
    scope_stack: Vec<String>,
    in_definitions: bool,
    saw_enddefinitions: bool,
    current_time: u64,
    /// Keyword whose body spans several lines, with the body so far.
    pending: Option<(String, String)>,
}

impl Parser {
    fn line(&mut self, trimmed: &str, line: usize) -> Result<(), VcdLoadError> {
        if let Some((kw, mut body)) = self.pending.take() {
            if let Some(pos) = trimmed.find("$end") {
                body.push(' ');
                body.push_str(trimmed[..pos].trim());
                self.keyword(&kw, body.trim(), line)?;
            } else {
                body.push(' ');
                body.push_str(trimmed);
                self.pending = Some((kw, body));
            }
            return Ok(());
        }

        if self.in_definitions {
            if trimmed.starts_with("$enddefinitions") {
                self.saw_enddefinitions = true;
                self.in_definitions = false;
            } else if let Some(kw) = extract_keyword(trimmed) {
                let body = extract_keyword_body(trimmed);
                if trimmed.contains("$end") {
                    self.keyword(&kw, &body, line)?;
                } else {
                    self.pending = Some((kw, body));
                }
            }
            return Ok(());
        }

        if trimmed.starts_with('$') {
            // $dumpvars, $dumpoff, $end, $comment ... carry no timing
            return Ok(());
        }

        if let Some(time_str) = trimmed.strip_prefix('#') {
            self.current_time = time_str.parse().map_err(|_| VcdLoadError::ParseError {
                line,
                message: format!("invalid timestamp: {trimmed}"),
            })?;
            return Ok(());
        }

        self.value_change(trimmed, line)
    }

    fn keyword(&mut self, keyword: &str, body: &str, line: usize) -> Result<(), VcdLoadError> {
        match keyword {
            "timescale" => {
                self.timescale = VcdTimescale {
                    text: body.split_whitespace().collect(),
                    fs_per_unit: parse_timescale(body, line)?,
                };
            }
            "scope" => {
                if let Some(name) = body.split_whitespace().last() {
                    self.scope_stack.push(name.to_string());
                }
            }
            "upscope" => {
                self.scope_stack.pop();
            }
            "var" => {
                let parts: Vec<&str> = body.split_whitespace().collect();
                if parts.len() < 4 {
                    return Err(VcdLoadError::ParseError {
                        line,
                        message: format!("invalid $var: {body}"),
                    });
                }
                let width: u32 = parts[1].parse().map_err(|_| VcdLoadError::ParseError {
                    line,
                    message: format!("invalid width in $var: {}", parts[1]),
                })?;
                let name = if self.scope_stack.is_empty() {
                    parts[3].to_string()
                } else {
                    format!("{}.{}", self.scope_stack.join("."), parts[3])
                };
                // A repeated id code aliases the first declaration.
                if !self.id_to_idx.contains_key(parts[2]) {
                    self.id_to_idx
                        .insert(parts[2].to_string(), self.signals.len());
                }
                self.signals.push(VcdSignalDef {
                    id_code: parts[2].to_string(),
                    name,
                    width,
                    var_type: parts[0].to_string(),
                });
                self.histories.push(Vec::new());
            }
            _ => {}
        }
        Ok(())
    }

    fn value_change(&mut self, line_text: &str, line: usize) -> Result<(), VcdLoadError> {
        let mut chars = line_text.chars();
        let Some(first) = chars.next() else {
            return Ok(());
        };
        match first {
            'b' | 'B' => {
                let mut parts = line_text[1..].split_whitespace();
                let (Some(bits), Some(id_code)) = (parts.next(), parts.next()) else {
                    return Err(VcdLoadError::ParseError {
                        line,
                        message: format!("invalid binary value change: {line_text}"),
                    });
                };
                if let Some(&idx) = self.id_to_idx.get(id_code) {
                    let value = parse_binary_value(bits, self.signals[idx].width);
                    self.histories[idx].push((self.current_time, value));
                }
            }
            '0' | '1' | 'x' | 'X' | 'z' | 'Z' => {
                let id_code = chars.as_str();
                if let Some(&idx) = self.id_to_idx.get(id_code) {
                    let value = PortValue::from_bool(first == '1').resized(self.signals[idx].width);
                    self.histories[idx].push((self.current_time, value));
                }
            }
            // real values and anything else are not representable
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<LoadedWaveform, VcdLoadError> {
        if !self.saw_enddefinitions && !self.signals.is_empty() {
            return Err(VcdLoadError::FormatError(
                "missing $enddefinitions".to_string(),
            ));
        }
        Ok(LoadedWaveform {
            timescale: self.timescale,
            signals: self.signals,
            histories: self.histories,
            end_time: self.current_time,
        })
    }
}

/// Loads a VCD waveform from a buffered reader.
///
/// # Errors
///
/// Returns [`VcdLoadError`] on I/O errors, malformed lines, or a missing
/// `$enddefinitions`.
pub fn load_vcd<R: BufRead>(reader: R) -> Result<LoadedWaveform, VcdLoadError> {
    let mut parser = Parser {
        in_definitions: true,
        ..Parser::default()
    };
    for (i, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            parser.line(trimmed, i + 1)?;
        }
    }
    parser.finish()
}

/// Loads a VCD file from a filesystem path.
pub fn load_vcd_file(path: &Path) -> Result<LoadedWaveform, VcdLoadError> {
    let file = std::fs::File::open(path)?;
    load_vcd(std::io::BufReader::new(file))
}

fn extract_keyword(line: &str) -> Option<String> {
    let rest = line.strip_prefix('$')?;
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '$')
        .unwrap_or(rest.len());
    let kw = &rest[..end];
    (!kw.is_empty()).then(|| kw.to_lowercase())
}

fn extract_keyword_body(line: &str) -> String {
    let Some(pos) = line.find(char::is_whitespace) else {
        return String::new();
    };
    let after = &line[pos..];
    let body = after.find("$end").map_or(after, |end| &after[..end]);
    body.trim().to_string()
}

/// Parses a timescale such as `"1ns"` or `"10 ps"` into femtoseconds per unit.
fn parse_timescale(body: &str, line: usize) -> Result<u64, VcdLoadError> {
    let s: String = body.split_whitespace().collect();
    if s.is_empty() {
        return Ok(1);
    }
    let digit_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num_str, unit) = s.split_at(digit_end);
    let num: u64 = if num_str.is_empty() {
        1
    } else {
        num_str.parse().map_err(|_| VcdLoadError::ParseError {
            line,
            message: format!("invalid timescale number: {num_str}"),
        })?
    };
    let fs_per = match unit.to_lowercase().as_str() {
        "fs" | "" => 1,
        "ps" => 1_000,
        "ns" => 1_000_000,
        "us" => 1_000_000_000,
        "ms" => 1_000_000_000_000,
        "s" => 1_000_000_000_000_000,
        other => {
            return Err(VcdLoadError::ParseError {
                line,
                message: format!("unknown timescale unit: {other}"),
            })
        }
    };
    num.checked_mul(fs_per).ok_or_else(|| VcdLoadError::ParseError {
        line,
        message: format!("timescale too large: {s}"),
    })
}

/// Parses an MSB-first binary string, zero-extending to `width`.
fn parse_binary_value(bits: &str, width: u32) -> PortValue {
    let mut value = PortValue::new(width);
    for (i, ch) in bits.chars().rev().enumerate() {
        let i = i as u32;
        if i < width && ch == '1' {
            value.set_bit(i, true);
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::{VcdRecorder, WaveformRecorder};
    use std::io::Cursor;
    use vshim_common::PortId;

    const ADDER_VCD: &str = "\
$date
  Session trace
$end
$version
  vshim session shim
$end
$timescale
  1ps
$end
$scope module Adder $end
$var wire 4 ! a $end
$var wire 4 \" b $end
$var wire 4 # sum $end
$upscope $end
$enddefinitions $end
#0
$dumpvars
b1 !
b0 \"
b1 #
$end
#5
b11 \"
b100 #
";

    #[test]
    fn load_recorded_trace() {
        let wf = load_vcd(Cursor::new(ADDER_VCD)).unwrap();
        assert_eq!(wf.timescale.text, "1ps");
        assert_eq!(wf.timescale.fs_per_unit, 1_000);
        assert_eq!(wf.signals.len(), 3);
        assert_eq!(wf.signals[2].name, "Adder.sum");
        assert_eq!(wf.histories[2].len(), 2);
        assert_eq!(wf.histories[2][1], (5, PortValue::from_u64(4, 4)));
        assert_eq!(wf.end_time, 5);
    }

    #[test]
    fn value_at_and_find_signal() {
        let wf = load_vcd(Cursor::new(ADDER_VCD)).unwrap();
        let sum = wf.find_signal("sum").unwrap();
        assert_eq!(wf.find_signal("Adder.sum"), Some(sum));
        assert_eq!(wf.value_at(sum, 0).unwrap().to_u64(), Some(1));
        assert_eq!(wf.value_at(sum, 4).unwrap().to_u64(), Some(1));
        assert_eq!(wf.value_at(sum, 100).unwrap().to_u64(), Some(4));
        assert!(wf.find_signal("carry").is_none());
    }

    #[test]
    fn xz_bits_load_as_zero() {
        let vcd = "\
$timescale 1ns $end
$scope module top $end
$var wire 1 ! sig $end
$var wire 4 \" bus $end
$upscope $end
$enddefinitions $end
#0
x!
bz1x1 \"
#10
1!
";
        let wf = load_vcd(Cursor::new(vcd)).unwrap();
        assert_eq!(wf.timescale.fs_per_unit, 1_000_000);
        assert!(!wf.histories[0][0].1.bit(0));
        assert!(wf.histories[0][1].1.bit(0));
        assert_eq!(wf.histories[1][0].1.to_u64(), Some(0b0101));
    }

    #[test]
    fn hierarchical_scopes() {
        let vcd = "\
$scope module top $end
$scope module cpu $end
$var wire 1 ! clk $end
$upscope $end
$var reg 8 \" data $end
$upscope $end
$enddefinitions $end
";
        let wf = load_vcd(Cursor::new(vcd)).unwrap();
        assert_eq!(wf.signals[0].name, "top.cpu.clk");
        assert_eq!(wf.signals[1].name, "top.data");
        assert_eq!(wf.signals[1].var_type, "reg");
        assert_eq!(wf.end_time, 0);
    }

    #[test]
    fn missing_enddefinitions_errors() {
        let vcd = "$scope module top $end\n$var wire 1 ! clk $end\n";
        assert!(matches!(
            load_vcd(Cursor::new(vcd)),
            Err(VcdLoadError::FormatError(_))
        ));
    }

    #[test]
    fn bad_timestamp_errors() {
        let vcd = "$enddefinitions $end\n#abc\n";
        let err = load_vcd(Cursor::new(vcd)).unwrap_err();
        assert!(matches!(err, VcdLoadError::ParseError { line: 2, .. }));
    }

    #[test]
    fn bad_timescale_unit_errors() {
        let vcd = "$timescale 1 parsec $end\n$enddefinitions $end\n";
        assert!(load_vcd(Cursor::new(vcd)).is_err());
    }

    #[test]
    fn recorder_output_loads() {
        let mut rec = VcdRecorder::new(Vec::new());
        rec.begin_scope("Counter").unwrap();
        rec.register_signal(PortId::from_raw(0), "clk", 1).unwrap();
        rec.register_signal(PortId::from_raw(1), "count", 4).unwrap();
        rec.end_scope().unwrap();
        rec.record_change(0, PortId::from_raw(0), &PortValue::from_bool(false))
            .unwrap();
        rec.record_change(0, PortId::from_raw(1), &PortValue::new(4))
            .unwrap();
        rec.record_change(5, PortId::from_raw(0), &PortValue::from_bool(true))
            .unwrap();
        rec.record_change(5, PortId::from_raw(1), &PortValue::from_u64(1, 4))
            .unwrap();
        rec.finalize().unwrap();

        let wf = load_vcd(Cursor::new(rec.into_inner())).unwrap();
        assert_eq!(wf.signals.len(), 2);
        assert_eq!(wf.signals[1].name, "Counter.count");
        assert_eq!(wf.histories[1].last().unwrap().1.to_u64(), Some(1));
        assert_eq!(wf.end_time, 5);
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_vcd_file(&dir.path().join("none.vcd")).unwrap_err();
        assert!(matches!(err, VcdLoadError::Io(_)));
    }

    #[test]
    fn oversized_timescale_is_parse_error() {
        let vcd = "$timescale 100000 s $end\n$enddefinitions $end\n";
        let err = load_vcd(Cursor::new(vcd)).unwrap_err();
        assert!(matches!(err, VcdLoadError::ParseError { line: 1, .. }));
        assert!(err.to_string().contains("timescale too large"));
    }

    #[test]
    fn header_serializes() {
        let wf = load_vcd(Cursor::new(ADDER_VCD)).unwrap();
        let sig = serde_json::to_value(&wf.signals[1]).unwrap();
        assert_eq!(sig["name"], "Adder.b");
        assert_eq!(sig["width"], 4);
        assert_eq!(sig["id_code"], "\"");
        assert_eq!(sig["var_type"], "wire");
        let ts = serde_json::to_value(&wf.timescale).unwrap();
        assert_eq!(ts["text"], "1ps");
        assert_eq!(ts["fs_per_unit"], 1_000);
    }
}
