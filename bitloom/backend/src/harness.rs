//! Top-level emission: the Verilog module plus a Verilator simulation
//! scaffold. The C++ harness, the per-module makefile and the
//! delegating Makefile are verbatim templates parameterized on the
//! module name.
use std::fs;
use std::path::Path;

use bitloom_ir::Netlist;
use bitloom_utils::{Error, LoomResult, OutputFile};

use crate::traits::Backend;
use crate::verilog::VerilogBackend;

/// Write `<dir>/<module>.v` together with `<module>.cpp`,
/// `<module>.mk` and a parent `Makefile` that delegates to it.
pub fn emit_verilog_top(
    module: &str,
    dir: &Path,
    netlist: &Netlist,
) -> LoomResult<()> {
    fs::create_dir_all(dir).map_err(|e| {
        Error::write_error(format!(
            "cannot create directory {}: {}",
            dir.display(),
            e
        ))
    })?;
    VerilogBackend.run(
        module,
        netlist,
        OutputFile::file(dir.join(format!("{}.v", module))),
    )?;
    fs::write(dir.join(format!("{}.cpp", module)), cpp_harness(module))?;
    fs::write(dir.join(format!("{}.mk", module)), module_makefile(module))?;
    fs::write(dir.join("Makefile"), top_makefile(module))?;
    Ok(())
}

/// Instantiates the Verilated model and ticks the clock until the
/// design calls `$finish`.
fn cpp_harness(module: &str) -> String {
    format!(
        r#"// Verilator harness for {module}
#include "V{module}.h"
#include "verilated.h"

vluint64_t main_time = 0;

double sc_time_stamp() {{ return main_time; }}

int main(int argc, char** argv) {{
  Verilated::commandArgs(argc, argv);
  V{module}* top = new V{module};
  while (!Verilated::gotFinish()) {{
    top->clock = 0;
    top->eval();
    top->clock = 1;
    top->eval();
    main_time++;
  }}
  top->final();
  delete top;
  return 0;
}}
"#
    )
}

fn module_makefile(module: &str) -> String {
    format!(
        r#"# Verilator build rules for {module}
TOPMOD = {module}

VERILATOR_FLAGS = -cc $(TOPMOD).v --exe $(TOPMOD).cpp -o $(TOPMOD) \
  -Wno-WIDTH -Wno-UNSIGNED -y $(BITLOOM_ROOT)/verilog

all: $(TOPMOD)

$(TOPMOD): $(TOPMOD).v $(TOPMOD).cpp
	verilator $(VERILATOR_FLAGS)
	$(MAKE) -C obj_dir -f V$(TOPMOD).mk V$(TOPMOD)
	cp obj_dir/V$(TOPMOD) $(TOPMOD)

.PHONY: clean
clean:
	rm -rf obj_dir $(TOPMOD)
"#
    )
}

fn top_makefile(module: &str) -> String {
    format!(
        r#"all:
	$(MAKE) -f {module}.mk

.PHONY: clean
clean:
	$(MAKE) -f {module}.mk clean
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitloom_ir::{Bit, Builder, Var};

    #[test]
    fn top_emission_writes_all_four_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = Builder::new();
        let r = b.reg(4, 0);
        b.assign(&r, r.read() + Bit::constant(4, 1));
        b.output("count", r.read());
        let netlist = b.into_netlist().unwrap();

        emit_verilog_top("Tick", dir.path(), &netlist).unwrap();

        let v = fs::read_to_string(dir.path().join("Tick.v")).unwrap();
        assert!(v.starts_with("module Tick("));
        let cpp = fs::read_to_string(dir.path().join("Tick.cpp")).unwrap();
        assert!(cpp.contains("VTick* top = new VTick;"));
        assert!(cpp.contains("while (!Verilated::gotFinish())"));
        let mk = fs::read_to_string(dir.path().join("Tick.mk")).unwrap();
        assert!(mk.contains("TOPMOD = Tick"));
        let makefile =
            fs::read_to_string(dir.path().join("Makefile")).unwrap();
        assert!(makefile.contains("-f Tick.mk"));
    }

    #[test]
    fn unwritable_directory_surfaces_an_io_error() {
        let mut b = Builder::new();
        b.output("o", Bit::constant(1, 0));
        let netlist = b.into_netlist().unwrap();
        let err = emit_verilog_top(
            "Nope",
            Path::new("/proc/definitely/not/writable"),
            &netlist,
        )
        .unwrap_err();
        assert!(err.message().contains("cannot create directory"));
    }
}
