//! Structured display formatting carried through the netlist.
use crate::expr::Bit;

/// Radix for a formatted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Bin,
    Dec,
    Hex,
}

impl Radix {
    /// The `$write` conversion character.
    pub fn spec_char(self) -> char {
        match self {
            Radix::Bin => 'b',
            Radix::Dec => 'd',
            Radix::Hex => 'h',
        }
    }
}

/// One element of a flattened display format. `Value` and `BeginCond`
/// each consume the next net input in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatItem {
    Literal(String),
    Value {
        radix: Radix,
        pad: Option<u64>,
        zero_pad: bool,
    },
    BeginCond,
    EndCond,
}

impl FormatItem {
    /// Whether this item consumes one of the display net's inputs.
    pub fn takes_input(&self) -> bool {
        matches!(self, FormatItem::Value { .. } | FormatItem::BeginCond)
    }
}

/// User-facing display arguments. Conditional blocks nest; the builder
/// flattens them into [`FormatItem`]s plus an input list.
#[derive(Clone)]
pub enum Fmt {
    Str(String),
    Val {
        radix: Radix,
        pad: Option<u64>,
        zero_pad: bool,
        bit: Bit,
    },
    Cond(Bit, Vec<Fmt>),
}

impl Fmt {
    pub fn str<S: ToString>(s: S) -> Self {
        Fmt::Str(s.to_string())
    }

    pub fn bin(bit: &Bit) -> Self {
        Fmt::val(Radix::Bin, bit)
    }

    pub fn dec(bit: &Bit) -> Self {
        Fmt::val(Radix::Dec, bit)
    }

    pub fn hex(bit: &Bit) -> Self {
        Fmt::val(Radix::Hex, bit)
    }

    pub fn val(radix: Radix, bit: &Bit) -> Self {
        Fmt::Val {
            radix,
            pad: None,
            zero_pad: false,
            bit: bit.clone(),
        }
    }

    /// Pad the value to at least `pad` characters.
    pub fn with_pad(self, pad: u64) -> Self {
        match self {
            Fmt::Val {
                radix,
                zero_pad,
                bit,
                ..
            } => Fmt::Val {
                radix,
                pad: Some(pad),
                zero_pad,
                bit,
            },
            other => other,
        }
    }

    /// Pad with zeros instead of spaces.
    pub fn zero_padded(self) -> Self {
        match self {
            Fmt::Val {
                radix, pad, bit, ..
            } => Fmt::Val {
                radix,
                pad,
                zero_pad: true,
                bit,
            },
            other => other,
        }
    }

    /// Emit the enclosed items only when `cond` is high.
    pub fn cond(cond: &Bit, items: Vec<Fmt>) -> Self {
        Fmt::Cond(cond.clone(), items)
    }
}
