//! Rendering of the C++ wrapper source and its C header.
//!
//! The wrapper owns a single model instance in file-scope globals and exposes
//! it through three `extern "C"` entry points plus one pointer variable per
//! port. After `create_model` each pointer addresses the port's storage in
//! the model, so a host reads and writes ports without further calls.

use std::fmt::Write;

use vshim_common::{CType, PortSpec};

use crate::spec::WrapperSpec;

/// File name of the generated wrapper source: `V<model>_v.cpp`.
pub fn wrapper_file_name(model_name: &str) -> String {
    format!("V{model_name}_v.cpp")
}

/// File name of the generated header: `V<model>_v.h`.
pub fn header_file_name(model_name: &str) -> String {
    format!("V{model_name}_v.h")
}

/// Pointer declaration for one port, e.g. `uint16_t * sum;`.
fn pointer_decl(port: &PortSpec) -> String {
    format!("{} * {};", port.ctype().c_name(), port.name)
}

/// Binding statement for one port inside `create_model`.
fn pointer_init(port: &PortSpec) -> String {
    match port.ctype() {
        // WData members are arrays; bind to the first word
        CType::Wide { .. } => format!("{0} = &model->{0}[0];", port.name),
        _ => format!("{0} = &model->{0};", port.name),
    }
}

/// Renders `V<model>_v.cpp`. `spec` must already be valid; see
/// [`WrapperSpec::validate`].
pub fn render_wrapper(spec: &WrapperSpec) -> String {
    let model = &spec.model_name;
    let mut out = String::new();

    let _ = writeln!(out, "//{}", "=".repeat(70));
    let _ = writeln!(out, "// {}", wrapper_file_name(model));
    let _ = writeln!(out, "//{}", "=".repeat(70));
    let _ = writeln!(out, "// C interface to the Verilator model V{model}.");
    let _ = writeln!(out, "// Generated by vshim; do not edit.");
    out.push('\n');
    let _ = writeln!(out, "#include \"obj_dir_{model}/V{model}.h\"");
    out.push_str("#include \"stdio.h\"\n");
    out.push_str("#include \"stdint.h\"\n");
    out.push_str("#include \"verilated.h\"\n");
    out.push_str("#include \"verilated_vcd_c.h\"\n\n");

    out.push_str("// set to 1 to compile VCD tracing into the wrapper\n");
    let _ = writeln!(out, "#define DUMP_VCD {}", u8::from(spec.dump_vcd));
    out.push('\n');

    out.push_str("extern \"C\" {\n");
    out.push_str("  extern void create_model( void );\n");
    out.push_str("  extern void destroy_model( void );\n");
    out.push_str("  extern void eval( void );\n\n");
    for port in &spec.ports {
        let _ = writeln!(out, "  extern {}", pointer_decl(port));
    }
    out.push_str("}\n\n");

    out.push_str("// port pointers, bound by create_model()\n");
    for port in &spec.ports {
        let _ = writeln!(out, "{}", pointer_decl(port));
    }
    out.push('\n');

    let _ = writeln!(out, "V{model} * model;");
    out.push('\n');
    out.push_str("#if DUMP_VCD\n");
    out.push_str("VerilatedVcdC * tfp;\n");
    out.push_str("unsigned long long trace_time;\n");
    out.push_str("unsigned char prev_clk;\n");
    out.push_str("#endif\n\n");

    // create_model
    out.push_str("void create_model() {\n");
    let _ = writeln!(out, "  model = new V{model}();");
    out.push('\n');
    out.push_str("#if DUMP_VCD\n");
    out.push_str("  Verilated::traceEverOn( true );\n");
    out.push_str("  tfp = new VerilatedVcdC();\n");
    out.push_str("  model->trace( tfp, 99 );\n");
    let _ = writeln!(out, "  tfp->open( \"{}.{model}.vcd\" );", spec.vcd_prefix);
    out.push_str("  trace_time = 0;\n");
    out.push_str("  prev_clk   = 0;\n");
    out.push_str("#endif\n\n");
    for port in &spec.ports {
        let _ = writeln!(out, "  {}", pointer_init(port));
    }
    out.push_str("}\n\n");

    // destroy_model
    out.push_str("void destroy_model() {\n");
    out.push_str("  model->final();\n\n");
    out.push_str("#if DUMP_VCD\n");
    out.push_str("  tfp->close();\n");
    out.push_str("  delete tfp;\n");
    out.push_str("#endif\n\n");
    if spec.leak_model {
        out.push_str("  // model left allocated; the host may still touch it during teardown\n");
    } else {
        out.push_str("  delete model;\n");
        out.push_str("  model = 0;\n");
    }
    out.push_str("}\n\n");

    // eval
    out.push_str("void eval() {\n");
    out.push_str("  model->eval();\n\n");
    out.push_str("#if DUMP_VCD\n");
    if let Some(clock) = &spec.clock_port {
        let _ = writeln!(
            out,
            "  if ( prev_clk != *{clock} ) {{ trace_time += {}; }}",
            spec.tick_increment
        );
        let _ = writeln!(out, "  prev_clk = *{clock};");
        out.push('\n');
    }
    out.push_str("  tfp->dump( trace_time );\n");
    out.push_str("  tfp->flush();\n");
    out.push_str("#endif\n");
    out.push_str("}\n");

    out
}

/// Renders `V<model>_v.h`, the declarations a host FFI layer binds to.
pub fn render_header(spec: &WrapperSpec) -> String {
    let model = &spec.model_name;
    let guard = format!("V{}_V_H", model.to_uppercase());
    let mut out = String::new();

    let _ = writeln!(out, "/* {}: C interface to V{model}. */", header_file_name(model));
    let _ = writeln!(out, "#ifndef {guard}");
    let _ = writeln!(out, "#define {guard}");
    out.push('\n');
    out.push_str("#include <stdint.h>\n\n");
    out.push_str("#ifdef __cplusplus\nextern \"C\" {\n#endif\n\n");
    out.push_str("void create_model(void);\n");
    out.push_str("void destroy_model(void);\n");
    out.push_str("void eval(void);\n\n");
    for port in &spec.ports {
        let ctype = port.ctype();
        let _ = write!(out, "extern {}", pointer_decl(port));
        match ctype {
            CType::Wide { words } => {
                let _ = writeln!(out, " /* {} {} bits, {words} words */", port.direction, port.width);
            }
            _ => {
                let _ = writeln!(out, " /* {} {} bits */", port.direction, port.width);
            }
        }
    }
    out.push_str("\n#ifdef __cplusplus\n}\n#endif\n\n");
    let _ = writeln!(out, "#endif /* {guard} */");
    out
}
