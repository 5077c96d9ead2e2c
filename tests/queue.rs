//! A producer/consumer pair around a one-slot queue: every enqueue is
//! followed by the matching dequeue one cycle later, giving a strictly
//! interleaved trace.
use bitloom::prelude::*;
use bitloom::{emit_verilog_top, Prim};

#[test]
fn producer_consumer_over_one_slot_queue() {
    let mut b = Builder::new();
    let q = one_slot_queue(&mut b, 8);

    let produced = b.reg(8, 0);
    b.name(&produced, "produced");
    b.when(q.not_full.clone(), |b| {
        q.enq(b, produced.read());
        b.assign(&produced, produced.read() + Bit::constant(8, 1));
        b.display(&[Fmt::str("Enqueued "), Fmt::dec(&produced.read())]);
    });
    b.when(q.can_deq.clone(), |b| {
        q.deq(b);
        b.display(&[Fmt::str("Dequeued "), Fmt::dec(&q.first)]);
    });

    let cycles = b.reg(8, 0);
    b.name(&cycles, "cycles");
    b.assign(&cycles, cycles.read() + Bit::constant(8, 1));
    b.when(cycles.read().eq(&Bit::constant(8, 100)), |b| b.finish());

    let netlist = b.into_netlist().unwrap();
    // Queue state (full flag + slot) plus the two counters.
    let regs = netlist.iter().filter(|n| n.prim.is_register()).count();
    assert_eq!(regs, 4);
    let displays = netlist
        .iter()
        .filter(|n| matches!(n.prim, Prim::Display(_)))
        .count();
    assert_eq!(displays, 2);

    let dir = tempfile::tempdir().unwrap();
    emit_verilog_top("SimpleQueue", dir.path(), &netlist).unwrap();
    let v =
        std::fs::read_to_string(dir.path().join("SimpleQueue.v")).unwrap();
    assert!(v.contains("$write(\"Enqueued %d\", "));
    assert!(v.contains("$write(\"Dequeued %d\", "));
    assert!(v.contains("q_full_"));
    assert!(v.contains("q_data_"));
    // The enqueue trace is guarded by queue emptiness, the dequeue trace
    // by fullness; both land in the single always block.
    assert_eq!(v.matches("always @(posedge clock) begin").count(), 1);
}
