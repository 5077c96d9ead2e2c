//! Flat netlists of primitive instances.
use bitloom_utils::{Id, NameHints};
use smallvec::SmallVec;

use crate::prim::Prim;

/// Reference to a net inside one [`Netlist`]. Ids are dense and ordered
/// by creation; clients should rely on nothing beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetId(u32);

impl NetId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for NetId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single input connection: the source net, plus the output port read
/// when the source is a multi-output instance (RAMs, custom modules).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInput {
    pub net: NetId,
    pub port: Option<Id>,
}

impl NetInput {
    pub fn new(net: NetId) -> Self {
        NetInput { net, port: None }
    }
}

/// One primitive instance in the flattened circuit.
#[derive(Debug, Clone)]
pub struct Net {
    pub id: NetId,
    pub prim: Prim,
    pub inputs: SmallVec<[NetInput; 4]>,
    pub hints: NameHints,
}

/// A dense array of nets, totally ordered by creation, with no
/// deletions. Combinational inputs only point backward; registers are
/// patched after creation and may point forward.
#[derive(Debug, Default)]
pub struct Netlist {
    nets: Vec<Net>,
}

impl Netlist {
    pub(crate) fn add(
        &mut self,
        prim: Prim,
        inputs: SmallVec<[NetInput; 4]>,
        hints: NameHints,
    ) -> NetId {
        let id = NetId(
            u32::try_from(self.nets.len()).expect("too many nets in netlist"),
        );
        self.nets.push(Net {
            id,
            prim,
            inputs,
            hints,
        });
        id
    }

    pub(crate) fn net_mut(&mut self, id: NetId) -> &mut Net {
        &mut self.nets[id.index()]
    }

    pub fn get(&self, id: NetId) -> &Net {
        &self.nets[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Net> {
        self.nets.iter()
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }
}

impl std::ops::Index<NetId> for Netlist {
    type Output = Net;
    fn index(&self, id: NetId) -> &Net {
        self.get(id)
    }
}
