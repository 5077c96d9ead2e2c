//! Verilog backend for bitloom netlists.
//!
//! Lowers a [`Netlist`] in one deterministic pass: module header with
//! clock/reset and the boundary ports, per-net declarations, continuous
//! assigns and instances, and a single `always @(posedge clock)` block
//! holding synchronous reset logic, register updates and guarded side
//! effects.
use std::collections::{HashMap, HashSet};
use std::io;
use std::time::Instant;

use itertools::Itertools;

use bitloom_ir::{
    BramKind, FormatItem, Net, NetId, NetInput, Netlist, Prim,
};
use bitloom_utils::{mangle, Error, Id, LoomResult, OutputFile};

use crate::traits::Backend;

/// Implements the Verilog-2005 backend.
#[derive(Default)]
pub struct VerilogBackend;

impl Backend for VerilogBackend {
    fn name(&self) -> &'static str {
        "verilog"
    }

    fn validate(netlist: &Netlist) -> LoomResult<()> {
        let made: HashSet<u32> = netlist
            .iter()
            .filter_map(|net| match &net.prim {
                Prim::RegFileMake(info) => Some(info.id),
                _ => None,
            })
            .collect();
        for net in netlist.iter() {
            validate_inputs(netlist, net)?;
            validate_arity(net)?;
            if let Prim::RegFileRead(info) | Prim::RegFileWrite(info) =
                &net.prim
            {
                if !made.contains(&info.id) {
                    return Err(Error::malformed_structure(format!(
                        "net {} uses register file {} which was never made",
                        net.id, info.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn emit(
        module: &str,
        netlist: &Netlist,
        file: &mut OutputFile,
    ) -> LoomResult<()> {
        let out = &mut file.get_write()?;
        // Time the generation of the module.
        let time = Instant::now();
        emit_module(module, netlist, out)?;
        log::info!("Generated `{}` in {:?}", module, time.elapsed());
        Ok(())
    }
}

/// Check that every input reference can be rendered: backward pointing
/// for combinational nets, and naming a real output port when reading a
/// multi-output instance.
fn validate_inputs(netlist: &Netlist, net: &Net) -> LoomResult<()> {
    for input in &net.inputs {
        if !net.prim.is_register() && input.net > net.id {
            return Err(Error::malformed_structure(format!(
                "combinational net {} reads forward from net {}",
                net.id, input.net
            )));
        }
        let source = netlist.get(input.net);
        match &input.port {
            None => {
                if source.prim.output_width() == 0 {
                    return Err(Error::unsupported_prim(source.prim.tag()));
                }
            }
            Some(port) => {
                if !has_out_port(&source.prim, *port) {
                    return Err(Error::malformed_structure(format!(
                        "net {} has no output port `{}'",
                        input.net, port
                    )));
                }
            }
        }
    }
    Ok(())
}

fn has_out_port(prim: &Prim, port: Id) -> bool {
    match prim {
        Prim::Bram { kind, .. } => match kind {
            BramKind::SinglePort | BramKind::DualPort => port == "DO",
            BramKind::TrueDualPort => port == "DO_A" || port == "DO_B",
        },
        Prim::Custom { outs, .. } => outs.iter().any(|(n, _)| *n == port),
        _ => false,
    }
}

fn validate_arity(net: &Net) -> LoomResult<()> {
    let expected = match &net.prim {
        Prim::MergeWrites { n, .. } => Some(2 * n),
        Prim::Register { .. } => Some(1),
        Prim::RegisterEn { .. } => Some(2),
        Prim::Output { .. } => Some(1),
        Prim::Finish => Some(1),
        Prim::Assert(_) => Some(2),
        Prim::RegFileRead(_) => Some(1),
        Prim::RegFileWrite(_) => Some(3),
        Prim::Display(items) => {
            Some(1 + items.iter().filter(|i| i.takes_input()).count() as u64)
        }
        Prim::Custom { ins, .. } => Some(ins.len() as u64),
        Prim::Mux { sel_width, .. } => {
            let data = net.inputs.len().saturating_sub(1) as u64;
            if data == 0
                || (*sel_width < 64 && data > (1u64 << sel_width))
            {
                return Err(Error::malformed_structure(format!(
                    "mux net {} has {} alternatives for a {}-bit selector",
                    net.id, data, sel_width
                )));
            }
            None
        }
        _ => None,
    };
    if let Some(expected) = expected {
        if net.inputs.len() as u64 != expected {
            return Err(Error::malformed_structure(format!(
                "{} net {} expects {} inputs, found {}",
                net.prim.tag(),
                net.id,
                expected,
                net.inputs.len()
            )));
        }
    }
    Ok(())
}

/* ---------------- emission ---------------- */

struct PortDecl {
    name: Id,
    width: u64,
    is_input: bool,
    net: NetId,
}

/// Boundary ports in netlist order, first occurrence winning on a
/// duplicated name.
fn boundary_ports(netlist: &Netlist) -> (Vec<PortDecl>, HashSet<NetId>) {
    let mut seen: HashSet<Id> = HashSet::new();
    let mut ports = Vec::new();
    let mut kept = HashSet::new();
    for net in netlist.iter() {
        let decl = match net.prim {
            Prim::Input { width, name } => PortDecl {
                name,
                width,
                is_input: true,
                net: net.id,
            },
            Prim::Output { width, name } => PortDecl {
                name,
                width,
                is_input: false,
                net: net.id,
            },
            _ => continue,
        };
        if seen.insert(decl.name) {
            kept.insert(decl.net);
            ports.push(decl);
        }
    }
    (ports, kept)
}

/// `[w-1:0] ` or nothing for single-bit signals.
fn range(width: u64) -> String {
    if width == 1 {
        String::new()
    } else {
        format!("[{}:0] ", width - 1)
    }
}

fn dont_care_literal(width: u64) -> String {
    format!("{}'b{}", width, "x".repeat(width as usize))
}

fn src(names: &[String], input: &NetInput) -> String {
    match &input.port {
        Some(port) => format!("{}_{}", names[input.net.index()], port),
        None => names[input.net.index()].clone(),
    }
}

fn emit_module<F: io::Write>(
    module: &str,
    netlist: &Netlist,
    f: &mut F,
) -> io::Result<()> {
    let names: Vec<String> = netlist
        .iter()
        .map(|net| mangle(&net.hints, net.id.id()))
        .collect();
    let regfiles: HashMap<u32, String> = netlist
        .iter()
        .filter_map(|net| match &net.prim {
            Prim::RegFileMake(info) => {
                Some((info.id, names[net.id.index()].clone()))
            }
            _ => None,
        })
        .collect();
    let (ports, kept) = boundary_ports(netlist);

    writeln!(f, "module {}(", module)?;
    write!(f, "  input wire clock,\n  input wire reset")?;
    for port in &ports {
        let dir = if port.is_input { "input" } else { "output" };
        write!(f, ",\n  {} wire {}{}", dir, range(port.width), port.name)?;
    }
    writeln!(f, "\n);")?;

    for net in netlist.iter() {
        decl_net(net, &names, f)?;
    }
    for net in netlist.iter() {
        assign_net(net, &names, &regfiles, &kept, f)?;
    }
    emit_always(netlist, &names, &regfiles, f)?;
    writeln!(f, "endmodule")?;
    Ok(())
}

/// One declaration per net that owns storage or a wire.
fn decl_net<F: io::Write>(
    net: &Net,
    names: &[String],
    f: &mut F,
) -> io::Result<()> {
    let name = &names[net.id.index()];
    match &net.prim {
        Prim::Const { width, value } => {
            writeln!(
                f,
                "wire {}{} = {}'h{:x};",
                range(*width),
                name,
                width,
                value
            )
        }
        Prim::DontCare(width) => {
            writeln!(
                f,
                "wire {}{} = {};",
                range(*width),
                name,
                dont_care_literal(*width)
            )
        }
        Prim::Register { width, .. } | Prim::RegisterEn { width, .. } => {
            writeln!(f, "reg {}{};", range(*width), name)
        }
        Prim::Mux { sel_width, width } if *sel_width > 1 => {
            emit_mux_function(net, name, *sel_width, *width, f)
        }
        Prim::Bram { kind, data_width, .. } => {
            match kind {
                BramKind::SinglePort | BramKind::DualPort => {
                    writeln!(f, "wire {}{}_DO;", range(*data_width), name)
                }
                BramKind::TrueDualPort => {
                    writeln!(f, "wire {}{}_DO_A;", range(*data_width), name)?;
                    writeln!(f, "wire {}{}_DO_B;", range(*data_width), name)
                }
            }
        }
        Prim::Custom { outs, .. } => {
            for (port, width) in outs {
                writeln!(f, "wire {}{}_{};", range(*width), name, port)?;
            }
            Ok(())
        }
        Prim::RegFileMake(info) => {
            writeln!(
                f,
                "reg {}{}[0:{}];",
                range(info.data_width),
                name,
                (1u128 << info.addr_width.min(127)) - 1
            )?;
            if let Some(file) = &info.init_file {
                writeln!(
                    f,
                    "generate initial $readmemh(\"{}\", {}); endgenerate",
                    file, name
                )?;
            }
            Ok(())
        }
        Prim::Output { .. }
        | Prim::Display(_)
        | Prim::Finish
        | Prim::Assert(_)
        | Prim::RegFileWrite(_) => Ok(()),
        prim => {
            // Everything else is a plain combinational wire.
            let width = prim.output_width();
            writeln!(f, "wire {}{};", range(width), name)
        }
    }
}

/// A `Mux` with a wide selector lowers to a case inside a function.
fn emit_mux_function<F: io::Write>(
    net: &Net,
    name: &str,
    sel_width: u64,
    width: u64,
    f: &mut F,
) -> io::Result<()> {
    let alts = net.inputs.len() - 1;
    writeln!(f, "wire {}{};", range(width), name)?;
    writeln!(f, "function {}{}_f;", range(width), name)?;
    writeln!(f, "  input {}s;", range(sel_width))?;
    for i in 0..alts {
        writeln!(f, "  input {}i{};", range(width), i)?;
    }
    writeln!(f, "  begin")?;
    writeln!(f, "    case (s)")?;
    for i in 0..alts {
        writeln!(f, "      {}: {}_f = i{};", i, name, i)?;
    }
    writeln!(f, "      default: {}_f = {};", name, dont_care_literal(width))?;
    writeln!(f, "    endcase")?;
    writeln!(f, "  end")?;
    writeln!(f, "endfunction")?;
    Ok(())
}

/// Replication expression `{n{item}}`.
fn repl(n: u64, item: &str) -> String {
    format!("{{{}{{{}}}}}", n, item)
}

fn assign_net<F: io::Write>(
    net: &Net,
    names: &[String],
    regfiles: &HashMap<u32, String>,
    kept: &HashSet<NetId>,
    f: &mut F,
) -> io::Result<()> {
    let name = &names[net.id.index()];
    let s = |i: usize| src(names, &net.inputs[i]);
    let binop = |f: &mut F, op: &str| -> io::Result<()> {
        writeln!(f, "assign {} = {} {} {};", name, s(0), op, s(1))
    };
    match &net.prim {
        Prim::Add(_) => binop(f, "+"),
        Prim::Sub(_) => binop(f, "-"),
        Prim::Mul { is_signed, .. } => {
            if *is_signed {
                writeln!(
                    f,
                    "assign {} = $signed({}) * $signed({});",
                    name,
                    s(0),
                    s(1)
                )
            } else {
                binop(f, "*")
            }
        }
        Prim::Div(_) => binop(f, "/"),
        Prim::Mod(_) => binop(f, "%"),
        Prim::And(_) => binop(f, "&"),
        Prim::Or(_) => binop(f, "|"),
        Prim::Xor(_) => binop(f, "^"),
        Prim::Not(_) => writeln!(f, "assign {} = ~{};", name, s(0)),
        Prim::ShiftLeft(_) => binop(f, "<<"),
        Prim::ShiftRight(_) => binop(f, ">>"),
        Prim::ArithShiftRight(_) => {
            writeln!(f, "assign {} = $signed({}) >>> {};", name, s(0), s(1))
        }
        Prim::Equal(_) => binop(f, "=="),
        Prim::NotEqual(_) => binop(f, "!="),
        Prim::LessThan(_) => binop(f, "<"),
        Prim::LessThanEq(_) => binop(f, "<="),
        Prim::ReplicateBit(w) => {
            writeln!(f, "assign {} = {};", name, repl(*w, &s(0)))
        }
        Prim::ZeroExtend {
            in_width,
            out_width,
        } => {
            let pad = repl(out_width - in_width, "1'b0");
            writeln!(f, "assign {} = {{{}, {}}};", name, pad, s(0))
        }
        Prim::SignExtend {
            in_width,
            out_width,
        } => {
            let sign = format!("{}[{}]", s(0), in_width - 1);
            let pad = repl(out_width - in_width, &sign);
            writeln!(f, "assign {} = {{{}, {}}};", name, pad, s(0))
        }
        Prim::SelectBits { hi, lo, .. } => {
            writeln!(f, "assign {} = {}[{}:{}];", name, s(0), hi, lo)
        }
        Prim::Concat(..) => {
            writeln!(f, "assign {} = {{{}, {}}};", name, s(0), s(1))
        }
        Prim::Identity(_) => writeln!(f, "assign {} = {};", name, s(0)),
        Prim::Mux { sel_width, width } => {
            if *sel_width == 1 {
                // The second alternative may be missing; it reads as x.
                let on_true = if net.inputs.len() == 3 {
                    s(2)
                } else {
                    dont_care_literal(*width)
                };
                writeln!(
                    f,
                    "assign {} = {} ? {} : {};",
                    name,
                    s(0),
                    on_true,
                    s(1)
                )
            } else {
                let args = (0..net.inputs.len()).map(s).join(", ");
                writeln!(f, "assign {} = {}_f({});", name, name, args)
            }
        }
        Prim::MergeWrites { n, width, .. } => {
            if *n == 0 {
                writeln!(
                    f,
                    "assign {} = {};",
                    name,
                    dont_care_literal(*width)
                )
            } else {
                let terms = (0..*n as usize)
                    .map(|i| {
                        format!(
                            "({} & {})",
                            repl(*width, &s(2 * i)),
                            s(2 * i + 1)
                        )
                    })
                    .join(" | ");
                writeln!(f, "assign {} = {};", name, terms)
            }
        }
        Prim::TestPlusArgs(arg) => {
            writeln!(
                f,
                "assign {} = $test$plusargs(\"{}\") == 0 ? 0 : 1;",
                name, arg
            )
        }
        Prim::RegFileRead(info) => {
            writeln!(f, "assign {} = {}[{}];", name, regfiles[&info.id], s(0))
        }
        Prim::Input { name: port, .. } => {
            writeln!(f, "assign {} = {};", name, port)
        }
        Prim::Output { name: port, .. } => {
            // Duplicated output names keep their first driver only.
            if kept.contains(&net.id) {
                writeln!(f, "assign {} = {};", port, s(0))
            } else {
                Ok(())
            }
        }
        Prim::Bram {
            kind,
            init_file,
            addr_width,
            data_width,
            byte_en,
        } => emit_bram(
            net, name, *kind, init_file, *addr_width, *data_width, *byte_en,
            names, f,
        ),
        Prim::Custom {
            name: module,
            ins,
            outs,
            params,
            clocked,
            resetable,
        } => {
            let mut bindings = Vec::new();
            if *clocked {
                bindings.push(".clock(clock)".to_string());
            }
            if *resetable {
                bindings.push(".reset(reset)".to_string());
            }
            for (i, (port, _)) in ins.iter().enumerate() {
                bindings.push(format!(".{}({})", port, s(i)));
            }
            for (port, _) in outs {
                bindings.push(format!(".{}({}_{})", port, name, port));
            }
            if params.is_empty() {
                writeln!(f, "{} {} (", module, name)?;
            } else {
                writeln!(f, "{} #(", module)?;
                let plist = params
                    .iter()
                    .map(|(k, v)| format!("  .{}({})", k, v))
                    .join(",\n");
                writeln!(f, "{}", plist)?;
                writeln!(f, ") {} (", name)?;
            }
            writeln!(f, "{}", bindings.iter().map(|b| format!("  {}", b)).join(",\n"))?;
            writeln!(f, ");")
        }
        Prim::Register { .. }
        | Prim::RegisterEn { .. }
        | Prim::RegFileMake(_)
        | Prim::RegFileWrite(_)
        | Prim::Const { .. }
        | Prim::DontCare(_)
        | Prim::Display(_)
        | Prim::Finish
        | Prim::Assert(_) => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_bram<F: io::Write>(
    net: &Net,
    name: &str,
    kind: BramKind,
    init_file: &Option<String>,
    addr_width: u64,
    data_width: u64,
    byte_en: bool,
    names: &[String],
    f: &mut F,
) -> io::Result<()> {
    let s = |i: usize| src(names, &net.inputs[i]);
    let module = match (kind, byte_en) {
        (BramKind::SinglePort, false) => "BlockRAM",
        (BramKind::SinglePort, true) => "BlockRAMBE",
        (BramKind::DualPort, false) => "BlockRAMDual",
        (BramKind::DualPort, true) => "BlockRAMDualBE",
        (BramKind::TrueDualPort, false) => "BlockRAMTrueDual",
        (BramKind::TrueDualPort, true) => "BlockRAMTrueDualBE",
    };
    writeln!(f, "{} #(", module)?;
    writeln!(
        f,
        "  .INIT_FILE(\"{}\"),",
        init_file.as_deref().unwrap_or("UNUSED")
    )?;
    writeln!(f, "  .ADDR_WIDTH({}),", addr_width)?;
    writeln!(f, "  .DATA_WIDTH({})", data_width)?;
    writeln!(f, ") {} (", name)?;
    let mut bindings = vec![".CLK(clock)".to_string()];
    match kind {
        BramKind::SinglePort => {
            bindings.push(format!(".ADDR({})", s(0)));
            bindings.push(format!(".DI({})", s(1)));
            bindings.push(format!(".WE({})", s(2)));
            bindings.push(format!(".RE({})", s(3)));
            if byte_en {
                bindings.push(format!(".BE({})", s(4)));
            }
            bindings.push(format!(".DO({}_DO)", name));
        }
        BramKind::DualPort => {
            bindings.push(format!(".RD_ADDR({})", s(0)));
            bindings.push(format!(".WR_ADDR({})", s(1)));
            bindings.push(format!(".DI({})", s(2)));
            bindings.push(format!(".WE({})", s(3)));
            bindings.push(format!(".RE({})", s(4)));
            if byte_en {
                bindings.push(format!(".BE({})", s(5)));
            }
            bindings.push(format!(".DO({}_DO)", name));
        }
        BramKind::TrueDualPort => {
            bindings.push(format!(".ADDR_A({})", s(0)));
            bindings.push(format!(".DI_A({})", s(1)));
            bindings.push(format!(".WE_A({})", s(2)));
            bindings.push(format!(".RE_A({})", s(3)));
            bindings.push(format!(".ADDR_B({})", s(4)));
            bindings.push(format!(".DI_B({})", s(5)));
            bindings.push(format!(".WE_B({})", s(6)));
            bindings.push(format!(".RE_B({})", s(7)));
            bindings.push(format!(".DO_A({}_DO_A)", name));
            bindings.push(format!(".DO_B({}_DO_B)", name));
        }
    }
    writeln!(f, "{}", bindings.iter().map(|b| format!("  {}", b)).join(",\n"))?;
    writeln!(f, ");")
}

/// The single sequential block: synchronous reset, then register
/// updates, then side effects in elaboration order.
fn emit_always<F: io::Write>(
    netlist: &Netlist,
    names: &[String],
    regfiles: &HashMap<u32, String>,
    f: &mut F,
) -> io::Result<()> {
    writeln!(f, "always @(posedge clock) begin")?;
    writeln!(f, "  if (reset) begin")?;
    for net in netlist.iter() {
        if let Some((init, width)) = net.prim.register_init() {
            writeln!(
                f,
                "    {} <= {}'h{:x};",
                names[net.id.index()],
                width,
                init
            )?;
        }
    }
    writeln!(f, "  end else begin")?;
    for net in netlist.iter() {
        let name = &names[net.id.index()];
        match &net.prim {
            Prim::Register { .. } => {
                writeln!(
                    f,
                    "    {} <= {};",
                    name,
                    src(names, &net.inputs[0])
                )?;
            }
            Prim::RegisterEn { .. } => {
                writeln!(
                    f,
                    "    if ({}) {} <= {};",
                    src(names, &net.inputs[0]),
                    name,
                    src(names, &net.inputs[1])
                )?;
            }
            _ => {}
        }
    }
    for net in netlist.iter() {
        match &net.prim {
            Prim::Display(items) => {
                emit_display(net, items, names, 4, f)?;
            }
            Prim::Finish => {
                writeln!(
                    f,
                    "    if ({}) $finish;",
                    src(names, &net.inputs[0])
                )?;
            }
            Prim::Assert(msg) => {
                writeln!(
                    f,
                    "    if ({} == 1) if ({} == 0) begin $write(\"{}\"); $finish; end",
                    src(names, &net.inputs[0]),
                    src(names, &net.inputs[1]),
                    escape(msg)
                )?;
            }
            Prim::RegFileWrite(info) => {
                writeln!(
                    f,
                    "    if ({}) {}[{}] <= {};",
                    src(names, &net.inputs[0]),
                    regfiles[&info.id],
                    src(names, &net.inputs[1]),
                    src(names, &net.inputs[2])
                )?;
            }
            _ => {}
        }
    }
    writeln!(f, "  end")?;
    writeln!(f, "end")?;
    Ok(())
}

/// A display net: one guard plus `$write` calls, with conditional
/// format regions nesting as `if (cond == 1)` blocks.
fn emit_display<F: io::Write>(
    net: &Net,
    items: &[FormatItem],
    names: &[String],
    indent: usize,
    f: &mut F,
) -> io::Result<()> {
    let pad = " ".repeat(indent);
    writeln!(f, "{}if ({}) begin", pad, src(names, &net.inputs[0]))?;
    let mut depth = indent + 2;
    let mut fmt = String::new();
    let mut args: Vec<String> = Vec::new();
    let mut arg_idx = 1;
    for item in items {
        match item {
            FormatItem::Literal(text) => fmt.push_str(&escape(text)),
            FormatItem::Value {
                radix,
                pad,
                zero_pad,
            } => {
                fmt.push('%');
                if *zero_pad {
                    fmt.push('0');
                }
                if let Some(p) = pad {
                    fmt.push_str(&p.to_string());
                }
                fmt.push(radix.spec_char());
                args.push(src(names, &net.inputs[arg_idx]));
                arg_idx += 1;
            }
            FormatItem::BeginCond => {
                flush_write(&mut fmt, &mut args, depth, f)?;
                let cond = src(names, &net.inputs[arg_idx]);
                arg_idx += 1;
                writeln!(f, "{}if ({} == 1) begin", " ".repeat(depth), cond)?;
                depth += 2;
            }
            FormatItem::EndCond => {
                flush_write(&mut fmt, &mut args, depth, f)?;
                depth -= 2;
                writeln!(f, "{}end", " ".repeat(depth))?;
            }
        }
    }
    flush_write(&mut fmt, &mut args, depth, f)?;
    writeln!(f, "{}end", pad)?;
    Ok(())
}

fn flush_write<F: io::Write>(
    fmt: &mut String,
    args: &mut Vec<String>,
    depth: usize,
    f: &mut F,
) -> io::Result<()> {
    if fmt.is_empty() {
        return Ok(());
    }
    let pad = " ".repeat(depth);
    if args.is_empty() {
        writeln!(f, "{}$write(\"{}\");", pad, fmt)?;
    } else {
        writeln!(f, "{}$write(\"{}\", {});", pad, fmt, args.join(", "))?;
    }
    fmt.clear();
    args.clear();
    Ok(())
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '%' => out.push_str("%%"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitloom_ir::{mux, Bit, Builder, Fmt, Var};

    fn emit_to_string(module: &str, b: Builder) -> String {
        let netlist = b.into_netlist().unwrap();
        VerilogBackend::validate(&netlist).unwrap();
        let mut buf = Vec::new();
        emit_module(module, &netlist, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn two_sort(b: &mut Builder) {
        let x = b.input("x", 8);
        let y = b.input("y", 8);
        let swap = y.lt(&x);
        b.output("lo", swap.select(&y, &x));
        b.output("hi", swap.select(&x, &y));
    }

    #[test]
    fn two_sort_uses_a_compare_and_ternaries() {
        let mut b = Builder::new();
        two_sort(&mut b);
        let text = emit_to_string("TwoSort", b);
        assert!(text.starts_with("module TwoSort(\n"));
        assert!(text.contains("  input wire clock,"));
        assert!(text.contains("  input wire reset,"));
        assert!(text.contains("  input wire [7:0] x,"));
        assert!(text.contains("  output wire [7:0] hi"));
        assert!(text.contains(" < "));
        assert_eq!(text.matches(" ? ").count(), 2);
        assert!(text.contains("assign lo = "));
        assert!(text.ends_with("endmodule\n"));
    }

    #[test]
    fn counter_reset_and_update_live_in_one_always_block() {
        let mut b = Builder::new();
        let count = b.reg(4, 0);
        b.name(&count, "count");
        let next = count.read() + Bit::constant(4, 1);
        b.assign(&count, next);
        b.output("value", count.read());
        let text = emit_to_string("Counter", b);
        assert_eq!(text.matches("always @(posedge clock) begin").count(), 1);
        assert!(text.contains("  if (reset) begin\n    count_0 <= 4'h0;"));
        assert!(text.contains("reg [3:0] count_0;"));
        assert!(text.contains("    count_0 <= "));
        assert!(text.contains("assign value = count_0;"));
    }

    #[test]
    fn uninitialized_register_has_no_reset_entry() {
        let mut b = Builder::new();
        let tick = b.input("tick", 1);
        let r = b.reg_u(8);
        b.name(&r, "scratch");
        b.when(tick, |b| b.assign(&r, Bit::constant(8, 1)));
        b.output("o", r.read());
        let text = emit_to_string("Scratch", b);
        assert!(text.contains("if (reset) begin\n  end else begin"));
        assert!(text.contains("    if (tick_0) scratch_"));
    }

    #[test]
    fn wide_selector_mux_lowers_to_a_case_function() {
        let mut b = Builder::new();
        let sel = b.input("sel", 2);
        let a = b.input("a", 8);
        let c = b.input("c", 8);
        let out = mux(&sel, &[a, c.clone(), c.clone(), c]);
        b.output("o", out);
        let text = emit_to_string("Pick", b);
        assert!(text.contains("function [7:0] "));
        assert!(text.contains("case (s)"));
        assert!(text.contains("default: "));
        assert!(text.contains("8'bxxxxxxxx"));
        assert!(text.contains("_f(sel_0, "));
    }

    #[test]
    fn merge_writes_emit_masked_or_terms() {
        let mut b = Builder::new();
        let c1 = b.input("c1", 1);
        let c2 = b.input("c2", 1);
        let w = b.wire(Bit::constant(4, 0));
        b.when(c1, |b| b.assign(&w, Bit::constant(4, 1)));
        b.when(c2, |b| b.assign(&w, Bit::constant(4, 2)));
        b.output("o", w.read());
        let text = emit_to_string("Merge", b);
        assert!(text.contains("({4{c1_0}} & "));
        assert!(text.contains(" | ({4{c2_1}} & "));
    }

    #[test]
    fn display_formats_with_pad_and_conditionals() {
        let mut b = Builder::new();
        let go = b.input("go", 1);
        let v = b.input("v", 8);
        let extra = b.input("extra", 1);
        b.when(go, |b| {
            b.display(&[
                Fmt::str("v = "),
                Fmt::dec(&v).with_pad(5).zero_padded(),
                Fmt::cond(&extra, vec![Fmt::str(" 100% sure")]),
            ]);
            b.finish();
        });
        let text = emit_to_string("Show", b);
        assert!(text.contains("if (go_0) begin"));
        assert!(text.contains("$write(\"v = %05d\", v_1);"));
        assert!(text.contains("if (extra_2 == 1) begin"));
        assert!(text.contains("$write(\" 100%% sure\");"));
        assert!(text.contains("if (go_0) $finish;"));
    }

    #[test]
    fn assert_checks_predicate_under_guard() {
        let mut b = Builder::new();
        let go = b.input("go", 1);
        let p = b.input("p", 1);
        b.when(go.clone(), |b| b.assert("p must hold", p));
        let text = emit_to_string("Check", b);
        assert!(text.contains(
            "if (go_0 == 1) if (p_1 == 0) begin $write(\"p must hold\"); $finish; end"
        ));
    }

    #[test]
    fn extensions_and_slices_use_concat_syntax() {
        let mut b = Builder::new();
        let x = b.input("x", 4);
        b.output("z", x.zero_extend(8));
        b.output("s", x.sign_extend(8));
        b.output("n", x.bits(2, 1));
        let text = emit_to_string("Ext", b);
        assert!(text.contains("{{4{1'b0}}, x_0}"));
        assert!(text.contains("{{4{x_0[3]}}, x_0}"));
        assert!(text.contains("x_0[2:1];"));
    }

    #[test]
    fn dont_care_declares_x_literal() {
        let mut b = Builder::new();
        let w = b.wire(Bit::dont_care(4));
        b.output("o", w.read());
        let text = emit_to_string("Dc", b);
        assert!(text.contains(" = 4'bxxxx;"));
    }

    #[test]
    fn duplicate_output_names_keep_first_driver() {
        let mut b = Builder::new();
        b.output("o", Bit::constant(8, 1));
        b.output("o", Bit::constant(8, 2));
        let text = emit_to_string("Dup", b);
        assert_eq!(text.matches("output wire [7:0] o").count(), 1);
        assert_eq!(text.matches("assign o = ").count(), 1);
    }

    #[test]
    fn emission_is_byte_identical_across_runs() {
        let build = |val| {
            let mut b = Builder::new();
            let x = b.input("x", 8);
            let r = b.reg(8, val);
            b.name(&r, "acc");
            b.assign(&r, r.read() + x);
            b.output("acc", r.read());
            emit_to_string("Same", b)
        };
        assert_eq!(build(5), build(5));
    }

    #[test]
    fn finish_and_boundary_netlists_validate() {
        let mut b = Builder::new();
        let done = b.input("done", 1);
        b.when(done, |b| b.finish());
        b.output("o", Bit::constant(1, 0));
        let netlist = b.into_netlist().unwrap();
        assert!(VerilogBackend::validate(&netlist).is_ok());
    }
}
