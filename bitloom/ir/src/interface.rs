//! Collaborator-facing interface records, layered over registers and
//! wires by pure convention. Preconditions (full/empty checks, not
//! loading and storing a single-port RAM in one cycle) are the
//! designer's responsibility.
use bitloom_utils::{Id, NameHint};

use crate::builder::{Builder, Event, Var, Wire};
use crate::expr::{Bit, NodeKind};
use crate::prim::{BramKind, Prim, RegFileInfo};

/// A one-slot queue of `width`-wide items.
pub struct Queue {
    pub not_full: Bit,
    pub not_empty: Bit,
    pub can_deq: Bit,
    pub first: Bit,
    enq_en: Wire,
    enq_data: Wire,
    deq_en: Wire,
}

/// Build a queue holding at most one item. Enqueueing and dequeueing in
/// the same cycle write the full flag from two sites at once and is
/// left undefined, as with any conflicting assignment.
pub fn one_slot_queue(b: &mut Builder, width: u64) -> Queue {
    let full = b.reg(1, 0);
    b.name(&full, "q_full");
    let data = b.reg_u(width);
    b.name(&data, "q_data");
    let enq_en = b.wire(Bit::constant(1, 0));
    let enq_data = b.wire(Bit::dont_care(width));
    let deq_en = b.wire(Bit::constant(1, 0));
    b.when(enq_en.read(), |b| {
        let item = enq_data.read();
        b.assign(&data, item);
        b.assign(&full, Bit::constant(1, 1));
    });
    b.when(deq_en.read(), |b| {
        b.assign(&full, Bit::constant(1, 0));
    });
    Queue {
        not_full: !full.read(),
        not_empty: full.read(),
        can_deq: full.read(),
        first: data.read(),
        enq_en,
        enq_data,
        deq_en,
    }
}

impl Queue {
    /// Insert `item` this cycle. Precondition: `not_full`.
    pub fn enq(&self, b: &mut Builder, item: Bit) {
        b.assign(&self.enq_en, Bit::constant(1, 1));
        b.assign(&self.enq_data, item);
    }

    /// Drop the held item this cycle. Precondition: `can_deq`.
    pub fn deq(&self, b: &mut Builder) {
        b.assign(&self.deq_en, Bit::constant(1, 1));
    }
}

/// A queue viewed from the consumer side only.
pub struct Stream {
    pub can_get: Bit,
    pub value: Bit,
    queue: Queue,
}

pub fn queue_to_stream(queue: Queue) -> Stream {
    Stream {
        can_get: queue.can_deq.clone(),
        value: queue.first.clone(),
        queue,
    }
}

impl Stream {
    /// Consume the current value. Precondition: `can_get`.
    pub fn get(&self, b: &mut Builder) {
        self.queue.deq(b);
    }
}

/// One read/write port of a block RAM. Loading and storing through the
/// same port in one cycle is undefined.
pub struct Bram {
    out: Bit,
    addr: Wire,
    di: Wire,
    we: Wire,
    re: Wire,
    be: Option<Wire>,
}

impl Bram {
    /// Present `addr` for reading; `out` holds the data next cycle.
    pub fn load(&self, b: &mut Builder, addr: Bit) {
        b.assign(&self.addr, addr);
        b.assign(&self.re, Bit::constant(1, 1));
    }

    /// Write `data` at `addr` on the next clock edge.
    pub fn store(&self, b: &mut Builder, addr: Bit, data: Bit) {
        b.assign(&self.addr, addr);
        b.assign(&self.di, data);
        b.assign(&self.we, Bit::constant(1, 1));
        if let Some(be) = &self.be {
            let ones = (1u128 << be.width().min(127)) - 1;
            b.assign(be, Bit::constant(be.width(), ones));
        }
    }

    /// Byte-enable variant of `store`; only on RAMs built with
    /// [`make_bram_be`].
    pub fn store_be(&self, b: &mut Builder, addr: Bit, data: Bit, be: Bit) {
        let be_wire = self
            .be
            .as_ref()
            .expect("store_be on a RAM without byte enables");
        b.assign(&self.addr, addr);
        b.assign(&self.di, data);
        b.assign(&self.we, Bit::constant(1, 1));
        b.assign(be_wire, be);
    }

    /// The data output of this port.
    pub fn out(&self) -> Bit {
        self.out.clone()
    }
}

fn bram_wires(
    b: &mut Builder,
    addr_width: u64,
    data_width: u64,
    byte_en: bool,
) -> (Wire, Wire, Wire, Wire, Option<Wire>) {
    let addr = b.wire(Bit::dont_care(addr_width));
    let di = b.wire(Bit::dont_care(data_width));
    let we = b.wire(Bit::constant(1, 0));
    let re = b.wire(Bit::constant(1, 0));
    let be = byte_en.then(|| b.wire(Bit::constant(data_width / 8, 0)));
    (addr, di, we, re, be)
}

fn single_port_bram(
    b: &mut Builder,
    init_file: Option<&str>,
    addr_width: u64,
    data_width: u64,
    byte_en: bool,
) -> Bram {
    let (addr, di, we, re, be) = bram_wires(b, addr_width, data_width, byte_en);
    let mut inputs = vec![addr.read(), di.read(), we.read(), re.read()];
    if let Some(be) = &be {
        inputs.push(be.read());
    }
    let inst = Bit::node_hinted(
        NodeKind::Prim(Prim::Bram {
            kind: BramKind::SinglePort,
            init_file: init_file.map(|f| f.to_string()),
            addr_width,
            data_width,
            byte_en,
        }),
        inputs,
        0,
        vec![NameHint::Root("bram".to_string())],
    );
    b.add_instance(inst.clone());
    let out = Bit::node(NodeKind::OutPort(Id::new("DO")), vec![inst], data_width);
    Bram {
        out,
        addr,
        di,
        we,
        re,
        be,
    }
}

/// A single-port block RAM with `2^addr_width` entries of `data_width`
/// bits, optionally initialized from a hex file.
pub fn make_bram(
    b: &mut Builder,
    init_file: Option<&str>,
    addr_width: u64,
    data_width: u64,
) -> Bram {
    single_port_bram(b, init_file, addr_width, data_width, false)
}

/// Single-port block RAM with per-byte write enables.
pub fn make_bram_be(
    b: &mut Builder,
    init_file: Option<&str>,
    addr_width: u64,
    data_width: u64,
) -> Bram {
    assert!(
        data_width % 8 == 0,
        "byte-enable RAM needs a byte-multiple data width"
    );
    single_port_bram(b, init_file, addr_width, data_width, true)
}

/// A dual-port block RAM: one read port, one write port.
pub struct DualBram {
    out: Bit,
    rd_addr: Wire,
    wr_addr: Wire,
    di: Wire,
    we: Wire,
    re: Wire,
}

impl DualBram {
    pub fn load(&self, b: &mut Builder, addr: Bit) {
        b.assign(&self.rd_addr, addr);
        b.assign(&self.re, Bit::constant(1, 1));
    }

    pub fn store(&self, b: &mut Builder, addr: Bit, data: Bit) {
        b.assign(&self.wr_addr, addr);
        b.assign(&self.di, data);
        b.assign(&self.we, Bit::constant(1, 1));
    }

    pub fn out(&self) -> Bit {
        self.out.clone()
    }
}

pub fn make_dual_bram(
    b: &mut Builder,
    init_file: Option<&str>,
    addr_width: u64,
    data_width: u64,
) -> DualBram {
    let rd_addr = b.wire(Bit::dont_care(addr_width));
    let wr_addr = b.wire(Bit::dont_care(addr_width));
    let di = b.wire(Bit::dont_care(data_width));
    let we = b.wire(Bit::constant(1, 0));
    let re = b.wire(Bit::constant(1, 0));
    let inst = Bit::node_hinted(
        NodeKind::Prim(Prim::Bram {
            kind: BramKind::DualPort,
            init_file: init_file.map(|f| f.to_string()),
            addr_width,
            data_width,
            byte_en: false,
        }),
        vec![
            rd_addr.read(),
            wr_addr.read(),
            di.read(),
            we.read(),
            re.read(),
        ],
        0,
        vec![NameHint::Root("bram".to_string())],
    );
    b.add_instance(inst.clone());
    let out = Bit::node(NodeKind::OutPort(Id::new("DO")), vec![inst], data_width);
    DualBram {
        out,
        rd_addr,
        wr_addr,
        di,
        we,
        re,
    }
}

/// A true dual-port block RAM: two fully independent ports into one
/// storage array.
pub struct TrueDualBram {
    pub a: Bram,
    pub b: Bram,
}

pub fn make_true_dual_bram(
    b: &mut Builder,
    init_file: Option<&str>,
    addr_width: u64,
    data_width: u64,
) -> TrueDualBram {
    let (addr_a, di_a, we_a, re_a, _) =
        bram_wires(b, addr_width, data_width, false);
    let (addr_b, di_b, we_b, re_b, _) =
        bram_wires(b, addr_width, data_width, false);
    let inst = Bit::node_hinted(
        NodeKind::Prim(Prim::Bram {
            kind: BramKind::TrueDualPort,
            init_file: init_file.map(|f| f.to_string()),
            addr_width,
            data_width,
            byte_en: false,
        }),
        vec![
            addr_a.read(),
            di_a.read(),
            we_a.read(),
            re_a.read(),
            addr_b.read(),
            di_b.read(),
            we_b.read(),
            re_b.read(),
        ],
        0,
        vec![NameHint::Root("bram".to_string())],
    );
    b.add_instance(inst.clone());
    let out_a = Bit::node(
        NodeKind::OutPort(Id::new("DO_A")),
        vec![inst.clone()],
        data_width,
    );
    let out_b = Bit::node(
        NodeKind::OutPort(Id::new("DO_B")),
        vec![inst],
        data_width,
    );
    TrueDualBram {
        a: Bram {
            out: out_a,
            addr: addr_a,
            di: di_a,
            we: we_a,
            re: re_a,
            be: None,
        },
        b: Bram {
            out: out_b,
            addr: addr_b,
            di: di_b,
            we: we_b,
            re: re_b,
            be: None,
        },
    }
}

/// A register file with combinational reads and any number of
/// concurrent reads and writes per cycle.
pub struct RegFile {
    info: RegFileInfo,
}

pub fn make_reg_file(
    b: &mut Builder,
    init_file: Option<&str>,
    addr_width: u64,
    data_width: u64,
) -> RegFile {
    let info = RegFileInfo {
        id: b.fresh_regfile_id(),
        init_file: init_file.map(|f| f.to_string()),
        addr_width,
        data_width,
    };
    let make = Bit::node_hinted(
        NodeKind::Prim(Prim::RegFileMake(info.clone())),
        vec![],
        0,
        vec![NameHint::Root("regfile".to_string())],
    );
    b.add_instance(make);
    RegFile { info }
}

impl RegFile {
    /// Combinational read of the entry at `addr`.
    pub fn read(&self, addr: Bit) -> Bit {
        Bit::prim(Prim::RegFileRead(self.info.clone()), vec![addr])
    }

    /// Write `data` at `addr` on the next clock edge, under the current
    /// guard.
    pub fn update(&self, b: &mut Builder, addr: Bit, data: Bit) {
        let guard = b.guard();
        b.add_event(Event::RegFileWrite {
            guard,
            info: self.info.clone(),
            addr,
            data,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prim::MergeStrategy;

    #[test]
    fn queue_state_lives_in_two_registers() {
        let mut b = Builder::new();
        let q = one_slot_queue(&mut b, 8);
        let producing = b.input("producing", 1);
        b.when(producing, |b| q.enq(b, Bit::constant(8, 5)));
        b.output("first", q.first.clone());
        let netlist = b.into_netlist().unwrap();
        let regs = netlist.iter().filter(|n| n.prim.is_register()).count();
        assert_eq!(regs, 2);
        assert!(netlist.iter().any(|n| matches!(
            n.prim,
            Prim::MergeWrites {
                strategy: MergeStrategy::Or,
                ..
            }
        )));
    }

    #[test]
    fn bram_read_goes_through_a_named_port() {
        let mut b = Builder::new();
        let ram = make_bram(&mut b, Some("boot.hex"), 10, 32);
        let addr = b.input("addr", 10);
        ram.load(&mut b, addr);
        b.output("data", ram.out());
        let netlist = b.into_netlist().unwrap();
        let out = netlist
            .iter()
            .find(|n| matches!(n.prim, Prim::Output { .. }))
            .unwrap();
        assert_eq!(out.inputs[0].port, Some(Id::new("DO")));
        let bram = netlist.get(out.inputs[0].net);
        assert!(matches!(
            bram.prim,
            Prim::Bram {
                kind: BramKind::SinglePort,
                ..
            }
        ));
        assert_eq!(bram.inputs.len(), 4);
    }

    #[test]
    fn true_dual_ports_share_one_instance() {
        let mut b = Builder::new();
        let ram = make_true_dual_bram(&mut b, None, 8, 16);
        b.output("a", ram.a.out());
        b.output("b", ram.b.out());
        let netlist = b.into_netlist().unwrap();
        let instances = netlist
            .iter()
            .filter(|n| matches!(n.prim, Prim::Bram { .. }))
            .count();
        assert_eq!(instances, 1);
        let ports: Vec<_> = netlist
            .iter()
            .filter(|n| matches!(n.prim, Prim::Output { .. }))
            .map(|n| n.inputs[0].port.unwrap())
            .collect();
        assert_eq!(ports, vec![Id::new("DO_A"), Id::new("DO_B")]);
    }

    #[test]
    fn reg_file_reads_and_writes() {
        let mut b = Builder::new();
        let rf = make_reg_file(&mut b, None, 5, 32);
        let addr = b.input("addr", 5);
        b.output("data", rf.read(addr.clone()));
        rf.update(&mut b, addr, Bit::constant(32, 99));
        let netlist = b.into_netlist().unwrap();
        assert!(netlist
            .iter()
            .any(|n| matches!(n.prim, Prim::RegFileMake(_))));
        assert!(netlist
            .iter()
            .any(|n| matches!(n.prim, Prim::RegFileRead(_))));
        let write = netlist
            .iter()
            .find(|n| matches!(n.prim, Prim::RegFileWrite(_)))
            .unwrap();
        assert_eq!(write.inputs.len(), 3);
    }
}
