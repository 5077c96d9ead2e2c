//! Internal representation for bitloom circuits.
//!
//! A circuit is described by building [`Bit`] expressions (a structurally
//! shared DAG of primitive operations) inside a [`Builder`], which collects
//! register and wire declarations, guarded assignments and display side
//! effects. Flattening the builder produces a [`Netlist`]: a dense,
//! creation-ordered array of primitive instances that backends lower to
//! text.

// Modules defining internal structures.
mod builder;
mod expr;
mod flatten;
mod format;
mod interface;
mod netlist;
mod prim;

// Re-export types at the module level.
pub use builder::{Builder, Reg, Var, Wire};
pub use expr::{mux, Bit};
pub use format::{Fmt, FormatItem, Radix};
pub use interface::{
    make_bram, make_bram_be, make_dual_bram, make_reg_file,
    make_true_dual_bram, one_slot_queue, queue_to_stream, Bram, DualBram,
    Queue, RegFile, Stream, TrueDualBram,
};
pub use netlist::{Net, NetId, NetInput, Netlist};
pub use prim::{BramKind, MergeStrategy, Prim, RegFileInfo};

pub use bitloom_utils::Id;
