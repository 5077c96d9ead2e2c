//! Interface for a bitloom backend.
use bitloom_ir::Netlist;
use bitloom_utils::{LoomResult, OutputFile};

/// A backend lowering netlists to some textual target.
pub trait Backend {
    /// The name of this backend.
    fn name(&self) -> &'static str;
    /// Validate the netlist for emitting using this backend. Returns an
    /// Err(..) if it contains unexpected constructs.
    fn validate(netlist: &Netlist) -> LoomResult<()>;
    /// Transforms the netlist into a formatted string representing a
    /// valid program of the target and writes it to `file`.
    fn emit(
        module: &str,
        netlist: &Netlist,
        file: &mut OutputFile,
    ) -> LoomResult<()>;
    /// Convience function to validate and emit the netlist.
    fn run(
        &self,
        module: &str,
        netlist: &Netlist,
        mut file: OutputFile,
    ) -> LoomResult<()> {
        Self::validate(netlist)?;
        Self::emit(module, netlist, &mut file)
    }
}
