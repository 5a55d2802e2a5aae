//! `vshim gen`: render the model wrapper from `vshim.toml`.

use std::path::PathBuf;

use vshim_codegen::{write_wrapper, WrapperSpec};

use crate::{project, GenArgs};

/// Runs the `vshim gen` command. Returns exit code 0 on success.
pub fn run(args: &GenArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (config, dir) = project::load(args.config.as_deref())?;
    let out_dir = match &args.out {
        Some(out) => PathBuf::from(out),
        None => dir.join(&config.codegen.out_dir),
    };

    let spec = WrapperSpec::from_config(&config);
    let files = write_wrapper(&out_dir, &spec)?;

    eprintln!("   Generated {}", files.source.display());
    eprintln!("   Generated {}", files.header.display());
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const COUNTER: &str = r#"
[model]
name = "Counter"
library = "build/libCounter.so"

[[ports]]
name = "clk"
width = 1
direction = "input"

[[ports]]
name = "count"
width = 8
direction = "output"

[codegen]
dump_vcd = true
out_dir = "gen"
"#;

    #[test]
    fn generates_into_configured_dir() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("vshim.toml"), COUNTER).unwrap();
        let args = GenArgs {
            config: tmp.path().to_str().map(String::from),
            out: None,
        };
        assert_eq!(run(&args).unwrap(), 0);
        let src = fs::read_to_string(tmp.path().join("gen").join("VCounter_v.cpp")).unwrap();
        assert!(src.contains("#define DUMP_VCD 1"));
        assert!(tmp.path().join("gen").join("VCounter_v.h").exists());
    }

    #[test]
    fn out_flag_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("vshim.toml"), COUNTER).unwrap();
        let out = tmp.path().join("elsewhere");
        let args = GenArgs {
            config: tmp.path().to_str().map(String::from),
            out: out.to_str().map(String::from),
        };
        run(&args).unwrap();
        assert!(out.join("VCounter_v.cpp").exists());
    }

    #[test]
    fn reference_model_without_ports_fails() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("vshim.toml"),
            "[model]\nname = \"Adder\"\nreference = \"adder\"\n",
        )
        .unwrap();
        let args = GenArgs {
            config: tmp.path().to_str().map(String::from),
            out: None,
        };
        let err = run(&args).unwrap_err();
        assert!(err.to_string().contains("declares no ports"));
    }
}
