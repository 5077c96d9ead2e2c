//! The RTL elaborator. Provides convience methods to declare state,
//! record guarded assignments and side effects, and flatten the result
//! into a netlist.
use std::sync::atomic::{AtomicU32, Ordering};

use bitloom_utils::{
    bits_needed_for, Error, Id, LoomResult, NameHint, NameHints,
};

use crate::expr::{Bit, NodeKind};
use crate::flatten;
use crate::format::{Fmt, FormatItem};
use crate::netlist::Netlist;
use crate::prim::{Prim, RegFileInfo};

/// Distinguishes elaborations so that a handle leaking across builders
/// is caught instead of silently wiring two circuits together.
static NEXT_ELAB: AtomicU32 = AtomicU32::new(0);

pub(crate) enum VarKind {
    Reg { init: Option<u128> },
    Wire { default: Bit },
}

pub(crate) struct VarDef {
    pub kind: VarKind,
    pub width: u64,
    pub hints: NameHints,
}

pub(crate) struct Assign {
    pub guard: Bit,
    pub var: u32,
    pub rhs: Bit,
}

pub(crate) enum Event {
    Display {
        guard: Bit,
        items: Vec<FormatItem>,
        inputs: Vec<Bit>,
    },
    Finish {
        guard: Bit,
    },
    Assert {
        guard: Bit,
        msg: String,
        pred: Bit,
    },
    RegFileWrite {
        guard: Bit,
        info: RegFileInfo,
        addr: Bit,
        data: Bit,
    },
}

/// A variable handle: something assignable that reads back as the
/// resolved driving expression after flattening.
pub trait Var {
    /// The (placeholder) expression standing for this variable's value.
    fn read(&self) -> Bit;
    fn width(&self) -> u64;
    fn var_id(&self) -> u32;
    fn elab_id(&self) -> u32;
}

/// Handle to a register: holds its value across cycles, updating on the
/// rising clock edge in cycles where an assignment's guard is active.
pub struct Reg {
    var: u32,
    elab: u32,
    out: Bit,
}

/// Handle to a wire: resolves each cycle to the active assignment, or
/// to its default when none is active.
pub struct Wire {
    var: u32,
    elab: u32,
    out: Bit,
}

macro_rules! impl_var {
    ($ty:ident) => {
        impl Var for $ty {
            fn read(&self) -> Bit {
                self.out.clone()
            }
            fn width(&self) -> u64 {
                self.out.width()
            }
            fn var_id(&self) -> u32 {
                self.var
            }
            fn elab_id(&self) -> u32 {
                self.elab
            }
        }
    };
}

impl_var!(Reg);
impl_var!(Wire);

/// Collects declarations, guarded assignments and side effects for one
/// elaboration. Actions are recorded in call order; flattening assigns
/// net ids in that order, so emission is deterministic.
pub struct Builder {
    pub(crate) elab: u32,
    guard_stack: Vec<Bit>,
    pub(crate) vars: Vec<VarDef>,
    pub(crate) assigns: Vec<Assign>,
    pub(crate) events: Vec<Event>,
    /// Input and Output nodes in declaration order.
    pub(crate) ports: Vec<Bit>,
    /// Instance nodes that must reach the netlist even when unread
    /// (RAMs, register files, custom modules).
    pub(crate) instances: Vec<Bit>,
    next_regfile: u32,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            elab: NEXT_ELAB.fetch_add(1, Ordering::Relaxed),
            guard_stack: vec![Bit::constant(1, 1)],
            vars: Vec::new(),
            assigns: Vec::new(),
            events: Vec::new(),
            ports: Vec::new(),
            instances: Vec::new(),
            next_regfile: 0,
        }
    }

    /// The conjunction of every enclosing `when` condition.
    pub fn guard(&self) -> Bit {
        self.guard_stack
            .last()
            .expect("guard stack must never be empty")
            .clone()
    }

    fn fresh_var(&mut self, def: VarDef) -> (u32, Bit) {
        let var = u32::try_from(self.vars.len()).expect("too many variables");
        let out = Bit::node(
            NodeKind::Var {
                elab: self.elab,
                var,
            },
            vec![],
            def.width,
        );
        self.vars.push(def);
        (var, out)
    }

    /// A register of the given width, reset to `init`.
    pub fn reg(&mut self, width: u64, init: u128) -> Reg {
        assert!(width > 0, "zero-width register");
        if width < 128 && bits_needed_for(init) > width && init != 0 {
            panic!(
                "{:?}",
                Error::out_of_range(format!(
                    "register init {} cannot fit in {} bits",
                    init, width
                ))
            );
        }
        let (var, out) = self.fresh_var(VarDef {
            kind: VarKind::Reg { init: Some(init) },
            width,
            hints: NameHints::default(),
        });
        Reg {
            var,
            elab: self.elab,
            out,
        }
    }

    /// A register with no reset value; it holds garbage until first
    /// assigned.
    pub fn reg_u(&mut self, width: u64) -> Reg {
        assert!(width > 0, "zero-width register");
        let (var, out) = self.fresh_var(VarDef {
            kind: VarKind::Reg { init: None },
            width,
            hints: NameHints::default(),
        });
        Reg {
            var,
            elab: self.elab,
            out,
        }
    }

    /// A wire that reads as `default` in cycles where no assignment is
    /// active.
    pub fn wire(&mut self, default: Bit) -> Wire {
        let width = default.width();
        let (var, out) = self.fresh_var(VarDef {
            kind: VarKind::Wire { default },
            width,
            hints: NameHints::default(),
        });
        Wire {
            var,
            elab: self.elab,
            out,
        }
    }

    fn check_var(&self, var: &impl Var, what: &str) {
        if var.elab_id() != self.elab {
            panic!(
                "{:?}",
                Error::dangling_var(format!(
                    "{} of variable {} from another elaboration",
                    what,
                    var.var_id()
                ))
            );
        }
    }

    /// Drive `var` with `rhs` in every cycle where the current guard is
    /// active.
    pub fn assign(&mut self, var: &impl Var, rhs: Bit) {
        self.check_var(var, "assignment");
        if rhs.width() != var.width() {
            panic!(
                "{:?}",
                Error::width_mismatch("assign", var.width(), rhs.width())
            );
        }
        self.assigns.push(Assign {
            guard: self.guard(),
            var: var.var_id(),
            rhs,
        });
    }

    /// Attach a root name hint to a variable.
    pub fn name(&mut self, var: &impl Var, root: &str) {
        self.hint(var, NameHint::Root(root.to_string()));
    }

    pub fn hint(&mut self, var: &impl Var, hint: NameHint) {
        self.check_var(var, "naming");
        self.vars[var.var_id() as usize].hints.insert(hint);
    }

    /// Elaborate `body` under `cond` conjoined with the current guard.
    pub fn when<F: FnOnce(&mut Self)>(&mut self, cond: Bit, body: F) {
        if cond.width() != 1 {
            panic!("{:?}", Error::width_mismatch("when", 1, cond.width()));
        }
        let conj = self.guard().and(&cond);
        self.guard_stack.push(conj);
        body(self);
        self.guard_stack.pop();
    }

    /// Two guarded blocks: `then_body` under `cond`, `else_body` under
    /// `!cond`, both under the outer guard.
    pub fn if_then_else<F, G>(&mut self, cond: Bit, then_body: F, else_body: G)
    where
        F: FnOnce(&mut Self),
        G: FnOnce(&mut Self),
    {
        self.when(cond.clone(), then_body);
        self.when(!cond, else_body);
    }

    /// Record a formatted write, emitted in cycles where the current
    /// guard is active.
    pub fn display(&mut self, args: &[Fmt]) {
        let mut items = Vec::new();
        let mut inputs = Vec::new();
        flatten_fmt(args, &mut items, &mut inputs);
        self.events.push(Event::Display {
            guard: self.guard(),
            items,
            inputs,
        });
    }

    /// Terminate simulation when the current guard is active.
    pub fn finish(&mut self) {
        self.events.push(Event::Finish {
            guard: self.guard(),
        });
    }

    /// Print `msg` and finish when `pred` is low while the current
    /// guard is active.
    pub fn assert(&mut self, msg: &str, pred: Bit) {
        if pred.width() != 1 {
            panic!("{:?}", Error::width_mismatch("Assert", 1, pred.width()));
        }
        self.events.push(Event::Assert {
            guard: self.guard(),
            msg: msg.to_string(),
            pred,
        });
    }

    /// Declare a module input port.
    pub fn input(&mut self, name: &str, width: u64) -> Bit {
        assert!(width > 0, "zero-width input port");
        let node = Bit::node_hinted(
            NodeKind::Prim(Prim::Input {
                width,
                name: Id::new(name),
            }),
            vec![],
            width,
            vec![NameHint::Root(name.to_string())],
        );
        self.ports.push(node.clone());
        node
    }

    /// Declare a module output port driven by `driver`.
    pub fn output(&mut self, name: &str, driver: Bit) {
        let node = Bit::node(
            NodeKind::Prim(Prim::Output {
                width: driver.width(),
                name: Id::new(name),
            }),
            vec![driver],
            0,
        );
        self.ports.push(node);
    }

    /// Instantiate an opaque external module. Returns one signal per
    /// declared output, in order.
    pub fn custom(
        &mut self,
        name: &str,
        ins: &[(&str, Bit)],
        outs: &[(&str, u64)],
        params: &[(&str, &str)],
        clocked: bool,
        resetable: bool,
    ) -> Vec<Bit> {
        let prim = Prim::Custom {
            name: Id::new(name),
            ins: ins.iter().map(|(n, b)| (Id::new(n), b.width())).collect(),
            outs: outs.iter().map(|(n, w)| (Id::new(n), *w)).collect(),
            params: params
                .iter()
                .map(|(k, v)| (Id::new(k), v.to_string()))
                .collect(),
            clocked,
            resetable,
        };
        let inst = Bit::node_hinted(
            NodeKind::Prim(prim),
            ins.iter().map(|(_, b)| b.clone()).collect(),
            0,
            vec![NameHint::Root(name.to_string())],
        );
        self.instances.push(inst.clone());
        outs.iter()
            .map(|(n, w)| {
                Bit::node(NodeKind::OutPort(Id::new(n)), vec![inst.clone()], *w)
            })
            .collect()
    }

    pub(crate) fn fresh_regfile_id(&mut self) -> u32 {
        let id = self.next_regfile;
        self.next_regfile += 1;
        id
    }

    pub(crate) fn add_instance(&mut self, inst: Bit) {
        self.instances.push(inst);
    }

    pub(crate) fn add_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Resolve every variable and transcribe the expression DAG into a
    /// flat netlist.
    pub fn into_netlist(self) -> LoomResult<Netlist> {
        flatten::flatten(self)
    }
}

fn flatten_fmt(args: &[Fmt], items: &mut Vec<FormatItem>, inputs: &mut Vec<Bit>) {
    for arg in args {
        match arg {
            Fmt::Str(s) => items.push(FormatItem::Literal(s.clone())),
            Fmt::Val {
                radix,
                pad,
                zero_pad,
                bit,
            } => {
                items.push(FormatItem::Value {
                    radix: *radix,
                    pad: *pad,
                    zero_pad: *zero_pad,
                });
                inputs.push(bit.clone());
            }
            Fmt::Cond(cond, inner) => {
                if cond.width() != 1 {
                    panic!(
                        "{:?}",
                        Error::width_mismatch("Display", 1, cond.width())
                    );
                }
                items.push(FormatItem::BeginCond);
                inputs.push(cond.clone());
                flatten_fmt(inner, items, inputs);
                items.push(FormatItem::EndCond);
            }
        }
    }
}
