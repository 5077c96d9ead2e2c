//! Netlist flattening: second-pass resolution of variables and
//! transcription of the expression DAG into numbered nets.
//!
//! Registers are materialized before their inputs so that the feedback
//! through a register is the only place a net may point forward; every
//! combinational input points backward.
use std::collections::HashMap;

use linked_hash_map::LinkedHashMap;
use log::debug;
use smallvec::SmallVec;

use bitloom_utils::{Error, LoomResult, NameHints};

use crate::builder::{Builder, Event, VarDef, VarKind};
use crate::expr::{Bit, ExprNode, NodeKind};
use crate::netlist::{NetInput, Netlist};
use crate::prim::{MergeStrategy, Prim};

#[derive(Clone)]
enum VarState {
    Pending,
    /// A wire whose driver is currently being materialized; reentry
    /// means a combinational cycle.
    InProgress,
    Done(NetInput),
}

struct Flattener {
    elab: u32,
    netlist: Netlist,
    memo: HashMap<*const ExprNode, NetInput>,
    defs: Vec<VarDef>,
    groups: LinkedHashMap<u32, Vec<(Bit, Bit)>>,
    states: Vec<VarState>,
    /// Expressions synthesized during resolution. The memo table keys
    /// on node addresses, so every node must outlive it.
    synthesized: Vec<Bit>,
}

pub(crate) fn flatten(mut builder: Builder) -> LoomResult<Netlist> {
    let ports = std::mem::take(&mut builder.ports);
    let instances = std::mem::take(&mut builder.instances);
    let events = std::mem::take(&mut builder.events);
    let assigns = std::mem::take(&mut builder.assigns);
    let defs = std::mem::take(&mut builder.vars);

    // Group assignment sites per variable, keeping elaboration order.
    let mut groups: LinkedHashMap<u32, Vec<(Bit, Bit)>> = LinkedHashMap::new();
    for a in assigns {
        groups.entry(a.var).or_insert_with(Vec::new).push((a.guard, a.rhs));
    }

    let mut fl = Flattener {
        elab: builder.elab,
        netlist: Netlist::default(),
        memo: HashMap::new(),
        states: vec![VarState::Pending; defs.len()],
        defs,
        groups,
        synthesized: Vec::new(),
    };

    for port in &ports {
        fl.flatten_expr(port)?;
    }
    for inst in &instances {
        fl.flatten_expr(inst)?;
    }
    for event in &events {
        fl.flatten_event(event)?;
    }
    // Anything assigned but never read still belongs to the netlist.
    for var in 0..fl.defs.len() as u32 {
        fl.resolve_var(var)?;
    }

    debug!(
        "flattened {} nets from {} variables",
        fl.netlist.len(),
        fl.defs.len()
    );
    Ok(fl.netlist)
}

impl Flattener {
    fn flatten_expr(&mut self, bit: &Bit) -> LoomResult<NetInput> {
        let key = std::rc::Rc::as_ptr(&bit.0);
        if let Some(found) = self.memo.get(&key) {
            return Ok(found.clone());
        }
        let result = match &bit.0.kind {
            NodeKind::Var { elab, var } => {
                if *elab != self.elab {
                    return Err(Error::dangling_var(format!(
                        "expression reads variable {} of another elaboration",
                        var
                    )));
                }
                self.resolve_var(*var)?
            }
            NodeKind::OutPort(port) => {
                let inner = self.flatten_expr(&bit.0.inputs[0])?;
                NetInput {
                    net: inner.net,
                    port: Some(*port),
                }
            }
            NodeKind::Prim(prim) => {
                let mut inputs: SmallVec<[NetInput; 4]> =
                    SmallVec::with_capacity(bit.0.inputs.len());
                for input in &bit.0.inputs {
                    inputs.push(self.flatten_expr(input)?);
                }
                let hints: NameHints = bit.0.hints.iter().cloned().collect();
                NetInput::new(self.netlist.add(prim.clone(), inputs, hints))
            }
        };
        self.memo.insert(key, result.clone());
        Ok(result)
    }

    /// Fold a variable's assignment sites into its single driver.
    fn resolve_var(&mut self, var: u32) -> LoomResult<NetInput> {
        match &self.states[var as usize] {
            VarState::Done(found) => return Ok(found.clone()),
            VarState::InProgress => {
                return Err(Error::malformed_structure(format!(
                    "combinational cycle through wire variable {}",
                    var
                )));
            }
            VarState::Pending => {}
        }
        let width = self.defs[var as usize].width;
        let hints = self.defs[var as usize].hints.clone();
        let pairs = self.groups.get(&var).cloned().unwrap_or_default();
        // Copy the definition out so resolution can borrow `self` freely.
        enum Def {
            Reg(Option<u128>),
            Wire(Bit),
        }
        let def = match &self.defs[var as usize].kind {
            VarKind::Reg { init } => Def::Reg(*init),
            VarKind::Wire { default } => Def::Wire(default.clone()),
        };

        match def {
            Def::Reg(init) => {
                let (enable, data) = match pairs.len() {
                    // Unreachable in a completed design; emit a register
                    // that never updates.
                    0 => (Bit::constant(1, 0), Bit::dont_care(width)),
                    1 => (pairs[0].0.clone(), pairs[0].1.clone()),
                    _ => (or_all(&pairs), merge_writes(width, &pairs)),
                };
                self.synthesized.push(enable.clone());
                self.synthesized.push(data.clone());

                let always_on = enable.as_const() == Some(1);
                let prim = if always_on {
                    Prim::Register { init, width }
                } else {
                    Prim::RegisterEn { init, width }
                };
                // The register net exists before its inputs so that the
                // feedback path can refer to it.
                let id = self.netlist.add(prim, SmallVec::new(), hints);
                self.states[var as usize] =
                    VarState::Done(NetInput::new(id));

                let mut inputs: SmallVec<[NetInput; 4]> = SmallVec::new();
                if !always_on {
                    inputs.push(self.flatten_expr(&enable)?);
                }
                inputs.push(self.flatten_expr(&data)?);
                self.netlist.net_mut(id).inputs = inputs;
                Ok(NetInput::new(id))
            }
            Def::Wire(default) => {
                self.states[var as usize] = VarState::InProgress;
                let driver = if pairs.is_empty() {
                    default
                } else if pairs.len() == 1
                    && pairs[0].0.as_const() == Some(1)
                {
                    pairs[0].1.clone()
                } else {
                    // The none-active slot drives the default; a zero
                    // default is already the OR-merge identity.
                    let mut all = pairs.clone();
                    if default.as_const() != Some(0) {
                        let none_active = !or_all(&pairs);
                        all.push((none_active, default));
                    }
                    merge_writes(width, &all)
                };
                self.synthesized.push(driver.clone());
                let result = self.flatten_expr(&driver)?;
                if !hints.is_empty() {
                    self.netlist.net_mut(result.net).hints.extend(&hints);
                }
                self.states[var as usize] = VarState::Done(result.clone());
                Ok(result)
            }
        }
    }

    fn flatten_event(&mut self, event: &Event) -> LoomResult<()> {
        let (prim, bits): (Prim, Vec<&Bit>) = match event {
            Event::Display {
                guard,
                items,
                inputs,
            } => {
                let mut bits = vec![guard];
                bits.extend(inputs.iter());
                (Prim::Display(items.clone()), bits)
            }
            Event::Finish { guard } => (Prim::Finish, vec![guard]),
            Event::Assert { guard, msg, pred } => {
                (Prim::Assert(msg.clone()), vec![guard, pred])
            }
            Event::RegFileWrite {
                guard,
                info,
                addr,
                data,
            } => (Prim::RegFileWrite(info.clone()), vec![guard, addr, data]),
        };
        let mut inputs: SmallVec<[NetInput; 4]> =
            SmallVec::with_capacity(bits.len());
        for bit in bits {
            inputs.push(self.flatten_expr(bit)?);
        }
        self.netlist.add(prim, inputs, NameHints::default());
        Ok(())
    }
}

/// OR of every guard in the list.
fn or_all(pairs: &[(Bit, Bit)]) -> Bit {
    pairs[1..]
        .iter()
        .fold(pairs[0].0.clone(), |acc, (g, _)| acc.or(g))
}

/// Priority-free selector over guard/value pairs.
fn merge_writes(width: u64, pairs: &[(Bit, Bit)]) -> Bit {
    let mut inputs = Vec::with_capacity(pairs.len() * 2);
    for (guard, value) in pairs {
        inputs.push(guard.clone());
        inputs.push(value.clone());
    }
    Bit::prim(
        Prim::MergeWrites {
            strategy: MergeStrategy::Or,
            n: pairs.len() as u64,
            width,
        },
        inputs,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Var;

    fn prims(netlist: &Netlist) -> Vec<&'static str> {
        netlist.iter().map(|n| n.prim.tag()).collect()
    }

    #[test]
    fn counter_flattens_to_register_with_feedback() {
        let mut b = Builder::new();
        let count = b.reg(4, 0);
        b.name(&count, "count");
        let next = count.read() + Bit::constant(4, 1);
        b.assign(&count, next);
        let netlist = b.into_netlist().unwrap();

        assert_eq!(prims(&netlist), vec!["Register", "Const", "Add"]);
        let reg = netlist.iter().next().unwrap();
        // Feedback: the register's data input points forward to the adder,
        // and the adder reads the register back.
        assert_eq!(reg.inputs.len(), 1);
        assert_eq!(reg.inputs[0].net.index(), 2);
        let add = netlist.get(reg.inputs[0].net);
        assert_eq!(add.inputs[0].net.index(), 0);
    }

    #[test]
    fn guarded_register_becomes_register_en() {
        let mut b = Builder::new();
        let tick = b.input("tick", 1);
        let r = b.reg(8, 0);
        b.when(tick, |b| b.assign(&r, Bit::constant(8, 7)));
        let netlist = b.into_netlist().unwrap();
        assert!(netlist
            .iter()
            .any(|n| matches!(n.prim, Prim::RegisterEn { .. })));
        assert!(!netlist
            .iter()
            .any(|n| matches!(n.prim, Prim::Register { .. })));
    }

    #[test]
    fn multi_assignment_merges_with_or_strategy() {
        let mut b = Builder::new();
        let c1 = b.input("c1", 1);
        let c2 = b.input("c2", 1);
        let r = b.reg(8, 0);
        b.when(c1, |b| b.assign(&r, Bit::constant(8, 1)));
        b.when(c2, |b| b.assign(&r, Bit::constant(8, 2)));
        let netlist = b.into_netlist().unwrap();

        let reg = netlist
            .iter()
            .find(|n| matches!(n.prim, Prim::RegisterEn { .. }))
            .unwrap();
        // Enable is the OR of the two guards; data is a two-pair merge.
        let enable = netlist.get(reg.inputs[0].net);
        assert!(matches!(enable.prim, Prim::Or(1)));
        let data = netlist.get(reg.inputs[1].net);
        assert!(matches!(
            data.prim,
            Prim::MergeWrites {
                strategy: MergeStrategy::Or,
                n: 2,
                width: 8
            }
        ));
        assert_eq!(data.inputs.len(), 4);
    }

    #[test]
    fn unassigned_wire_reads_its_default() {
        let mut b = Builder::new();
        let w = b.wire(Bit::constant(8, 42));
        b.output("o", w.read());
        let netlist = b.into_netlist().unwrap();
        let out = netlist
            .iter()
            .find(|n| matches!(n.prim, Prim::Output { .. }))
            .unwrap();
        let driver = netlist.get(out.inputs[0].net);
        assert!(matches!(driver.prim, Prim::Const { value: 42, .. }));
    }

    #[test]
    fn guarded_wire_keeps_nonzero_default_slot() {
        let mut b = Builder::new();
        let c = b.input("c", 1);
        let w = b.wire(Bit::constant(8, 42));
        b.when(c, |b| b.assign(&w, Bit::constant(8, 1)));
        b.output("o", w.read());
        let netlist = b.into_netlist().unwrap();
        let merge = netlist
            .iter()
            .find(|n| matches!(n.prim, Prim::MergeWrites { .. }))
            .unwrap();
        // One site plus the none-active default pair.
        assert!(matches!(merge.prim, Prim::MergeWrites { n: 2, .. }));
    }

    #[test]
    fn guarded_wire_drops_zero_default_slot() {
        let mut b = Builder::new();
        let c = b.input("c", 1);
        let w = b.wire(Bit::constant(8, 0));
        b.when(c, |b| b.assign(&w, Bit::constant(8, 1)));
        b.output("o", w.read());
        let netlist = b.into_netlist().unwrap();
        let merge = netlist
            .iter()
            .find(|n| matches!(n.prim, Prim::MergeWrites { .. }))
            .unwrap();
        assert!(matches!(merge.prim, Prim::MergeWrites { n: 1, .. }));
    }

    #[test]
    fn shared_expressions_materialize_once() {
        let mut b = Builder::new();
        let x = b.input("x", 8);
        let doubled = x.clone() + x.clone();
        b.output("a", doubled.clone());
        b.output("b", doubled);
        let netlist = b.into_netlist().unwrap();
        let adders = netlist
            .iter()
            .filter(|n| matches!(n.prim, Prim::Add(_)))
            .count();
        assert_eq!(adders, 1);
    }

    #[test]
    fn combinational_inputs_point_backward() {
        let mut b = Builder::new();
        let x = b.input("x", 8);
        let y = b.input("y", 8);
        let r = b.reg(8, 0);
        b.assign(&r, (x.clone() & y.clone()) | (x ^ y));
        b.output("o", r.read());
        let netlist = b.into_netlist().unwrap();
        for net in netlist.iter() {
            if net.prim.is_register() {
                continue;
            }
            for input in &net.inputs {
                assert!(input.net <= net.id);
            }
        }
    }

    #[test]
    fn dangling_variable_is_an_error() {
        let mut a = Builder::new();
        let r = a.reg(8, 0);
        a.assign(&r, Bit::constant(8, 0));
        let mut b = Builder::new();
        b.output("o", r.read());
        let err = b.into_netlist().unwrap_err();
        assert!(err.message().contains("another elaboration"));
    }

    #[test]
    fn combinational_cycle_is_an_error() {
        let mut b = Builder::new();
        let w = b.wire(Bit::constant(8, 0));
        let loopback = w.read();
        b.assign(&w, loopback);
        let err = b.into_netlist().unwrap_err();
        assert!(err.message().contains("combinational cycle"));
    }

    #[test]
    fn elaboration_is_deterministic() {
        let build = || {
            let mut b = Builder::new();
            let x = b.input("x", 8);
            let r = b.reg(8, 3);
            b.when(x.msb(), |b| b.assign(&r, x.clone() + r.read()));
            b.output("o", r.read());
            b.into_netlist().unwrap()
        };
        let first = build();
        let second = build();
        assert_eq!(prims(&first), prims(&second));
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.inputs, b.inputs);
        }
    }
}
