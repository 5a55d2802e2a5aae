//! `vshim inspect`: summarize a VCD trace.

use std::path::Path;

use serde::Serialize;
use vshim_sim::{load_vcd_file, LoadedWaveform};

use crate::{InspectArgs, ReportFormat};

/// Summary of a loaded trace.
#[derive(Debug, Serialize)]
pub struct TraceSummary {
    /// Timescale declaration (e.g. `"1ps"`).
    pub timescale: String,
    /// Last timestamp in the file.
    pub end_time: u64,
    /// One entry per declared signal.
    pub signals: Vec<SignalSummary>,
}

/// Summary of one signal.
#[derive(Debug, Serialize)]
pub struct SignalSummary {
    /// Hierarchical name.
    pub name: String,
    /// Bit width.
    pub width: u32,
    /// Number of recorded value changes, including the initial dump.
    pub changes: usize,
    /// Final value as `0x`-prefixed hex, if the signal was ever dumped.
    pub last_value: Option<String>,
}

/// Runs the `vshim inspect` command. Returns exit code 0 on success.
pub fn run(args: &InspectArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let waveform = load_vcd_file(Path::new(&args.file))?;
    let summary = summarize(&waveform);
    match args.format {
        ReportFormat::Text => print_text(&args.file, &summary),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(0)
}

/// Builds a [`TraceSummary`] from a loaded waveform.
pub fn summarize(waveform: &LoadedWaveform) -> TraceSummary {
    let signals = waveform
        .signals
        .iter()
        .zip(&waveform.histories)
        .map(|(def, history)| SignalSummary {
            name: def.name.clone(),
            width: def.width,
            changes: history.len(),
            last_value: history
                .last()
                .map(|(_, v)| format!("0x{}", v.to_hex_string())),
        })
        .collect();
    TraceSummary {
        timescale: waveform.timescale.text.clone(),
        end_time: waveform.end_time,
        signals,
    }
}

fn print_text(file: &str, summary: &TraceSummary) {
    println!(
        "{file}: {} signals, end time {} ({})",
        summary.signals.len(),
        summary.end_time,
        summary.timescale
    );
    let name_width = summary.signals.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for signal in &summary.signals {
        println!(
            "  {:<name_width$}  {:>3}  {:>6} changes  {}",
            signal.name,
            signal.width,
            signal.changes,
            signal.last_value.as_deref().unwrap_or("-")
        );
    }
}
