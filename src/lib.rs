//! bitloom: an embedded hardware description library.
//!
//! Synchronous circuits are described as ordinary Rust expressions over
//! [`Bit`] values inside a [`Builder`], then flattened into a
//! [`Netlist`] and lowered to a synthesizable Verilog module with a
//! Verilator simulation scaffold.
//!
//! ```no_run
//! use bitloom::prelude::*;
//!
//! let mut b = Builder::new();
//! let count = b.reg(4, 0);
//! b.name(&count, "count");
//! b.assign(&count, count.read() + Bit::constant(4, 1));
//! b.when(count.read().eq(&Bit::constant(4, 10)), |b| b.finish());
//! b.output("count", count.read());
//!
//! let netlist = b.into_netlist().unwrap();
//! bitloom::emit_verilog_top("Counter", std::path::Path::new("out"), &netlist)
//!     .unwrap();
//! ```

pub use bitloom_backend::{emit_verilog_top, Backend, VerilogBackend};
pub use bitloom_ir::{
    make_bram, make_bram_be, make_dual_bram, make_reg_file,
    make_true_dual_bram, mux, one_slot_queue, queue_to_stream, Bit, Bram,
    BramKind, Builder, DualBram, Fmt, FormatItem, MergeStrategy, Net, NetId,
    NetInput, Netlist, Prim, Queue, Radix, Reg, RegFile, RegFileInfo, Stream,
    TrueDualBram, Var, Wire,
};
pub use bitloom_utils::{
    bits_needed_for, mangle, Error, Id, LoomResult, NameHint, NameHints,
    OutputFile,
};

/// The handful of names every circuit description needs.
pub mod prelude {
    pub use crate::{
        mux, one_slot_queue, Bit, Builder, Fmt, Radix, Var,
    };
}
