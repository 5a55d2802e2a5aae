//! `vshim run`: open a session, apply inputs, and step it.
//!
//! Loads `vshim.toml`, opens the configured model, applies every `--set`
//! assignment, steps the requested number of times, and prints the final
//! port values together with the trace time.

use std::path::Path;

use log::info;
use serde::Serialize;
use vshim_common::{PortDirection, PortValue};
use vshim_config::{resolve_session_plan, trace_file_name};
use vshim_sim::{open_session, DynSession};

use crate::{project, ReportFormat, RunArgs};

/// Final state of a session after `vshim run`.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Model type name.
    pub model: String,
    /// Steps executed.
    pub steps: u64,
    /// Every port with its value after the last step.
    pub ports: Vec<PortReport>,
    /// Final trace timestamp, when tracing.
    pub trace_time: Option<u64>,
    /// Trace file, when tracing.
    pub trace_path: Option<String>,
}

/// One port in a [`RunReport`].
#[derive(Debug, Serialize)]
pub struct PortReport {
    /// Port name.
    pub name: String,
    /// Port direction.
    pub direction: PortDirection,
    /// Width in bits.
    pub width: u32,
    /// Value as `0x`-prefixed hex.
    pub value: String,
}

/// Runs the `vshim run` command. Returns exit code 0 on success.
pub fn run(args: &RunArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let report = execute(args)?;
    match args.format {
        ReportFormat::Text => print_text(&report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(0)
}

/// Opens, drives, and destroys the session, returning its final state.
pub fn execute(args: &RunArgs) -> Result<RunReport, Box<dyn std::error::Error>> {
    let (mut config, dir) = project::load(args.config.as_deref())?;
    if args.no_trace {
        config.trace.enabled = false;
    }
    if args.trace_dir.is_some() {
        config.trace.enabled = true;
    }

    let mut plan = resolve_session_plan(&config, &dir)?;
    if let (Some(trace_dir), Some(trace)) = (&args.trace_dir, plan.trace.as_mut()) {
        let file_name = trace_file_name(&config.trace.prefix, &plan.model_name);
        trace.path = Path::new(trace_dir).join(file_name);
    }

    let mut session = open_session(&plan)?;
    for assignment in &args.set {
        apply_assignment(&mut session, assignment)?;
    }

    let clock = if args.toggle_clock {
        if config.trace.clock.is_empty() {
            return Err("--toggle-clock needs a clock port (trace.clock is empty)".into());
        }
        Some(session.port_id(&config.trace.clock)?)
    } else {
        None
    };

    for i in 0..args.steps {
        if let Some(clk) = clock {
            session.write_u64(clk, i % 2)?;
        }
        session.step()?;
    }

    let mut ports = Vec::with_capacity(session.ports().len());
    for spec in session.ports().to_vec() {
        let value = session.read(session.port_id(&spec.name)?)?;
        ports.push(PortReport {
            name: spec.name,
            direction: spec.direction,
            width: spec.width,
            value: format!("0x{}", value.to_hex_string()),
        });
    }
    let report = RunReport {
        model: plan.model_name.clone(),
        steps: session.steps(),
        ports,
        trace_time: session.trace_time(),
        trace_path: session.trace_path().map(|p| p.display().to_string()),
    };

    session.destroy()?;
    info!("ran {} for {} steps", report.model, report.steps);
    Ok(report)
}

/// Applies a `PORT=VALUE` assignment.
fn apply_assignment(
    session: &mut DynSession,
    assignment: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (name, literal) = assignment
        .split_once('=')
        .ok_or_else(|| format!("expected PORT=VALUE, got '{assignment}'"))?;
    let id = session.port_id(name.trim())?;
    let width = session.port(id)?.width;
    let value = PortValue::parse(literal.trim(), width)?;
    session.write(id, &value)?;
    Ok(())
}

fn print_text(report: &RunReport) {
    println!("{} after {} steps", report.model, report.steps);
    let name_width = report.ports.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for port in &report.ports {
        println!(
            "  {:<name_width$}  {:<6}  {:>3}  {}",
            port.name,
            port.direction.to_string(),
            port.width,
            port.value
        );
    }
    if let (Some(time), Some(path)) = (report.trace_time, &report.trace_path) {
        println!("trace: {path} (time {time})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn args(dir: &Path) -> RunArgs {
        RunArgs {
            config: dir.to_str().map(String::from),
            steps: 1,
            toggle_clock: false,
            set: Vec::new(),
            no_trace: false,
            trace_dir: None,
            format: ReportFormat::Text,
        }
    }

    fn value<'a>(report: &'a RunReport, name: &str) -> &'a str {
        &report.ports.iter().find(|p| p.name == name).unwrap().value
    }

    #[test]
    fn full_adder_with_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("vshim.toml"),
            "[model]\nname = \"FullAdder\"\nreference = \"full_adder\"\n",
        )
        .unwrap();
        let mut a = args(tmp.path());
        a.set = vec!["in0=1".into(), "in1 = 0b0".into()];
        let report = execute(&a).unwrap();
        assert_eq!(report.model, "FullAdder");
        assert_eq!(value(&report, "sum"), "0x1");
        assert_eq!(value(&report, "cout"), "0x0");
        assert_eq!(report.trace_time, None);
    }

    #[test]
    fn toggled_counter_traces() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("vshim.toml"),
            "[model]\nname = \"Counter\"\nreference = \"counter\"\nwidth = 8\n\n[trace]\nenabled = true\n",
        )
        .unwrap();
        let mut a = args(tmp.path());
        a.steps = 100;
        a.toggle_clock = true;
        let report = execute(&a).unwrap();
        assert_eq!(report.trace_time, Some(495));
        assert_eq!(value(&report, "count"), "0x32");
        assert!(tmp.path().join("trace.Counter.vcd").exists());
    }

    #[test]
    fn trace_dir_and_no_trace() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("vshim.toml"),
            "[model]\nname = \"Counter\"\nreference = \"counter\"\n\n[trace]\nenabled = true\n",
        )
        .unwrap();
        let waves = tmp.path().join("waves");
        let mut a = args(tmp.path());
        a.trace_dir = waves.to_str().map(String::from);
        let report = execute(&a).unwrap();
        assert!(waves.join("trace.Counter.vcd").exists());
        assert!(report.trace_path.unwrap().ends_with("trace.Counter.vcd"));

        let mut a = args(tmp.path());
        a.no_trace = true;
        let report = execute(&a).unwrap();
        assert!(report.trace_time.is_none());
        assert!(!tmp.path().join("trace.Counter.vcd").exists());
    }

    #[test]
    fn bad_assignments() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("vshim.toml"),
            "[model]\nname = \"Adder\"\nreference = \"adder\"\nwidth = 4\n",
        )
        .unwrap();
        for bad in ["a", "c=1", "a=0x10", "sum=1", "a=zz"] {
            let mut a = args(tmp.path());
            a.set = vec![bad.into()];
            assert!(execute(&a).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn report_serializes() {
        let report = RunReport {
            model: "Adder".into(),
            steps: 2,
            ports: vec![PortReport {
                name: "sum".into(),
                direction: PortDirection::Output,
                width: 4,
                value: "0x3".into(),
            }],
            trace_time: Some(10),
            trace_path: None,
        };
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ports"][0]["direction"], "output");
        assert_eq!(json["trace_time"], 10);
        assert!(json["trace_path"].is_null());
    }
}
