//! Width-indexed bit-vector expressions.
//!
//! A [`Bit`] is a cheap handle to a structurally shared DAG node denoting
//! a combinational signal. Constructors check the width rules of each
//! primitive and fold any node whose inputs are all constants, so a
//! constant-only subtree always collapses to a single `Const`.
use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Not, Rem, Shl, Shr, Sub};
use std::rc::Rc;

use bitloom_utils::{bits_needed_for, Error, Id, NameHint};

use crate::prim::Prim;

/// What a DAG node stands for. `Var` and `OutPort` never reach the
/// netlist: the former is resolved during flattening, the latter turns
/// into a named-port input reference.
#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Prim(Prim),
    /// Placeholder for a builder variable, resolved in the second pass.
    Var { elab: u32, var: u32 },
    /// Projection of a named output port of a multi-output instance.
    OutPort(Id),
}

#[derive(Debug)]
pub(crate) struct ExprNode {
    pub kind: NodeKind,
    pub inputs: Vec<Bit>,
    pub width: u64,
    pub hints: Vec<NameHint>,
}

/// A width-tracked reference to a combinational signal.
///
/// Cloning shares the underlying node; two clones denote the same wire
/// and flatten to the same net.
#[derive(Clone)]
pub struct Bit(pub(crate) Rc<ExprNode>);

impl std::fmt::Debug for Bit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0.kind {
            NodeKind::Prim(p) => {
                write!(f, "Bit<{}>({})", self.0.width, p.tag())
            }
            NodeKind::Var { var, .. } => {
                write!(f, "Bit<{}>(var {})", self.0.width, var)
            }
            NodeKind::OutPort(name) => {
                write!(f, "Bit<{}>(port {})", self.0.width, name)
            }
        }
    }
}

fn mask(width: u64) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Abort elaboration on a width violation. Operator overloads cannot
/// return `Result`, so the error surfaces as a panic with the same
/// message the fallible paths use.
fn width_fatal(prim: &str, expected: u64, found: u64) -> ! {
    panic!("{:?}", Error::width_mismatch(prim, expected, found))
}

fn check_same_width(prim: &str, a: &Bit, b: &Bit) {
    if a.width() != b.width() {
        width_fatal(prim, a.width(), b.width());
    }
}

impl Bit {
    /// A constant of the given width. The value must fit.
    pub fn constant(width: u64, value: u128) -> Bit {
        assert!(width > 0, "zero-width constant");
        if width < 128 && bits_needed_for(value) > width && value != 0 {
            panic!(
                "{:?}",
                Error::out_of_range(format!(
                    "constant value {} cannot fit in {} bits",
                    value, width
                ))
            );
        }
        Bit::node(
            NodeKind::Prim(Prim::Const { width, value }),
            vec![],
            width,
        )
    }

    /// A width-wide signal whose value is unspecified.
    pub fn dont_care(width: u64) -> Bit {
        assert!(width > 0, "zero-width don't-care");
        Bit::node(NodeKind::Prim(Prim::DontCare(width)), vec![], width)
    }

    /// 1-bit probe of a simulator plusarg.
    pub fn test_plus_args<S: ToString>(name: S) -> Bit {
        Bit::node(
            NodeKind::Prim(Prim::TestPlusArgs(name.to_string())),
            vec![],
            1,
        )
    }

    pub fn width(&self) -> u64 {
        self.0.width
    }

    /// The value of this signal if it folded to a constant.
    pub fn as_const(&self) -> Option<u128> {
        match &self.0.kind {
            NodeKind::Prim(Prim::Const { value, .. }) => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn node(kind: NodeKind, inputs: Vec<Bit>, width: u64) -> Bit {
        Bit(Rc::new(ExprNode {
            kind,
            inputs,
            width,
            hints: vec![],
        }))
    }

    pub(crate) fn node_hinted(
        kind: NodeKind,
        inputs: Vec<Bit>,
        width: u64,
        hints: Vec<NameHint>,
    ) -> Bit {
        Bit(Rc::new(ExprNode {
            kind,
            inputs,
            width,
            hints,
        }))
    }

    /// Build a primitive node, folding to a `Const` when every input is
    /// constant and the primitive has a defined value.
    pub(crate) fn prim(prim: Prim, inputs: Vec<Bit>) -> Bit {
        let width = prim.output_width();
        if let Some(value) = try_fold(&prim, &inputs) {
            return Bit::constant(width, value);
        }
        Bit::node(NodeKind::Prim(prim), inputs, width)
    }

    fn binary(tag: &str, prim: Prim, a: Bit, b: Bit) -> Bit {
        check_same_width(tag, &a, &b);
        Bit::prim(prim, vec![a, b])
    }

    /* ---------------- comparisons (unsigned) ---------------- */

    pub fn eq(&self, other: &Bit) -> Bit {
        Bit::binary(
            "Equal",
            Prim::Equal(self.width()),
            self.clone(),
            other.clone(),
        )
    }

    pub fn neq(&self, other: &Bit) -> Bit {
        Bit::binary(
            "NotEqual",
            Prim::NotEqual(self.width()),
            self.clone(),
            other.clone(),
        )
    }

    pub fn lt(&self, other: &Bit) -> Bit {
        Bit::binary(
            "LessThan",
            Prim::LessThan(self.width()),
            self.clone(),
            other.clone(),
        )
    }

    pub fn lte(&self, other: &Bit) -> Bit {
        Bit::binary(
            "LessThanEq",
            Prim::LessThanEq(self.width()),
            self.clone(),
            other.clone(),
        )
    }

    pub fn gt(&self, other: &Bit) -> Bit {
        other.lt(self)
    }

    pub fn gte(&self, other: &Bit) -> Bit {
        other.lte(self)
    }

    /* ------------- signed comparisons (bias pattern) ------------- */

    /// Signed less-than, built by flipping the sign bits and comparing
    /// unsigned.
    pub fn signed_lt(&self, other: &Bit) -> Bit {
        check_same_width("LessThan", self, other);
        let bias = Bit::constant(self.width(), 1u128 << (self.width() - 1).min(127));
        (self.clone() ^ bias.clone()).lt(&(other.clone() ^ bias))
    }

    pub fn signed_lte(&self, other: &Bit) -> Bit {
        check_same_width("LessThanEq", self, other);
        let bias = Bit::constant(self.width(), 1u128 << (self.width() - 1).min(127));
        (self.clone() ^ bias.clone()).lte(&(other.clone() ^ bias))
    }

    /* ---------------- arithmetic variants ---------------- */

    /// Full-width multiply: the product of two `w`-wide operands as a
    /// `2w`-wide result.
    pub fn full_mul(&self, other: &Bit, is_signed: bool) -> Bit {
        check_same_width("Mul", self, other);
        Bit::prim(
            Prim::Mul {
                width: self.width(),
                is_signed,
                full_width: true,
            },
            vec![self.clone(), other.clone()],
        )
    }

    /// Arithmetic (sign-preserving) right shift.
    pub fn ashr(&self, amount: &Bit) -> Bit {
        Bit::prim(
            Prim::ArithShiftRight(self.width()),
            vec![self.clone(), amount.clone()],
        )
    }

    /* ---------------- bit munging ---------------- */

    pub fn zero_extend(&self, out_width: u64) -> Bit {
        if out_width <= self.width() {
            width_fatal("ZeroExtend", self.width() + 1, out_width);
        }
        Bit::prim(
            Prim::ZeroExtend {
                in_width: self.width(),
                out_width,
            },
            vec![self.clone()],
        )
    }

    pub fn sign_extend(&self, out_width: u64) -> Bit {
        if out_width <= self.width() {
            width_fatal("SignExtend", self.width() + 1, out_width);
        }
        Bit::prim(
            Prim::SignExtend {
                in_width: self.width(),
                out_width,
            },
            vec![self.clone()],
        )
    }

    /// Bits `hi..=lo`, inclusive on both ends.
    pub fn bits(&self, hi: u64, lo: u64) -> Bit {
        if lo > hi || hi >= self.width() {
            panic!(
                "{:?}",
                Error::out_of_range(format!(
                    "SelectBits [{}:{}] of a {}-bit value",
                    hi,
                    lo,
                    self.width()
                ))
            );
        }
        Bit::prim(
            Prim::SelectBits {
                width: self.width(),
                hi,
                lo,
            },
            vec![self.clone()],
        )
    }

    /// The single bit at index `i`.
    pub fn bit(&self, i: u64) -> Bit {
        self.bits(i, i)
    }

    /// The most significant bit.
    pub fn msb(&self) -> Bit {
        self.bit(self.width() - 1)
    }

    /// `{self, low}`: self becomes the high half.
    pub fn concat(&self, low: &Bit) -> Bit {
        Bit::prim(
            Prim::Concat(self.width(), low.width()),
            vec![self.clone(), low.clone()],
        )
    }

    /// Replicate a 1-bit signal `n` times.
    pub fn replicate(&self, n: u64) -> Bit {
        if self.width() != 1 {
            width_fatal("ReplicateBit", 1, self.width());
        }
        assert!(n > 0, "zero-width replication");
        Bit::prim(Prim::ReplicateBit(n), vec![self.clone()])
    }

    /// Pass-through node; useful for attaching a name to a signal.
    pub fn tap<S: ToString>(&self, name: S) -> Bit {
        Bit::node_hinted(
            NodeKind::Prim(Prim::Identity(self.width())),
            vec![self.clone()],
            self.width(),
            vec![NameHint::Root(name.to_string())],
        )
    }

    /// `self ? on_true : on_false` for a 1-bit condition.
    pub fn select(&self, on_true: &Bit, on_false: &Bit) -> Bit {
        if self.width() != 1 {
            width_fatal("Mux", 1, self.width());
        }
        mux(self, &[on_false.clone(), on_true.clone()])
    }

    /* ------------- guard algebra (with short-circuit folds) ------------- */

    /// 1-bit conjunction with identity/annihilator simplification.
    pub fn and(&self, other: &Bit) -> Bit {
        match (self.as_const(), other.as_const()) {
            (Some(1), _) => other.clone(),
            (_, Some(1)) => self.clone(),
            (Some(0), _) | (_, Some(0)) => Bit::constant(1, 0),
            _ => self.clone() & other.clone(),
        }
    }

    /// 1-bit disjunction with identity/annihilator simplification.
    pub fn or(&self, other: &Bit) -> Bit {
        match (self.as_const(), other.as_const()) {
            (Some(0), _) => other.clone(),
            (_, Some(0)) => self.clone(),
            (Some(1), _) | (_, Some(1)) => Bit::constant(1, 1),
            _ => self.clone() | other.clone(),
        }
    }

    pub(crate) fn ptr_eq(&self, other: &Bit) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// `sel`-indexed choice among up to `2^sel_width` alternatives, all of
/// one width. Data input `i` is selected when `sel == i`; alternatives
/// beyond the list read as don't-care.
pub fn mux(sel: &Bit, choices: &[Bit]) -> Bit {
    assert!(!choices.is_empty(), "mux with no alternatives");
    let width = choices[0].width();
    for c in choices {
        check_same_width("Mux", &choices[0], c);
    }
    let sel_width = sel.width();
    if sel_width < 64 && choices.len() as u64 > (1u64 << sel_width) {
        width_fatal("Mux", 1u64 << sel_width, choices.len() as u64);
    }
    // A constant selector picks its alternative outright.
    if let Some(v) = sel.as_const() {
        return if v < choices.len() as u128 {
            choices[v as usize].clone()
        } else {
            Bit::dont_care(width)
        };
    }
    let mut inputs = Vec::with_capacity(choices.len() + 1);
    inputs.push(sel.clone());
    inputs.extend(choices.iter().cloned());
    Bit::prim(Prim::Mux { sel_width, width }, inputs)
}

/* ---------------- constant folding ---------------- */

fn sext(value: u128, from: u64, to: u64) -> u128 {
    if from < 128 && value & (1u128 << (from - 1)) != 0 {
        (value | (mask(to) & !mask(from))) & mask(to)
    } else {
        value
    }
}

/// Evaluate `prim` over constant inputs, mirroring the Verilog
/// semantics bit for bit. `None` when the result is not defined as a
/// constant (division by zero, don't-care alternatives, widths past
/// 128 bits).
fn try_fold(prim: &Prim, inputs: &[Bit]) -> Option<u128> {
    use Prim::*;
    let mut vals = Vec::with_capacity(inputs.len());
    for i in inputs {
        vals.push(i.as_const()?);
    }
    let out_w = prim.output_width();
    if out_w > 128 {
        return None;
    }
    let m = mask(out_w);
    Some(match prim {
        Add(_) => vals[0].wrapping_add(vals[1]) & m,
        Sub(_) => vals[0].wrapping_sub(vals[1]) & m,
        Mul {
            width,
            is_signed,
            full_width,
        } => {
            let (a, b) = if *is_signed && *full_width {
                (sext(vals[0], *width, 128), sext(vals[1], *width, 128))
            } else {
                (vals[0], vals[1])
            };
            a.wrapping_mul(b) & m
        }
        Div(_) => {
            if vals[1] == 0 {
                return None;
            }
            vals[0] / vals[1]
        }
        Mod(_) => {
            if vals[1] == 0 {
                return None;
            }
            vals[0] % vals[1]
        }
        And(_) => vals[0] & vals[1],
        Or(_) => vals[0] | vals[1],
        Xor(_) => vals[0] ^ vals[1],
        Not(_) => !vals[0] & m,
        ShiftLeft(_) => {
            if vals[1] >= 128 {
                0
            } else {
                (vals[0] << vals[1]) & m
            }
        }
        ShiftRight(_) => {
            if vals[1] >= 128 {
                0
            } else {
                vals[0] >> vals[1]
            }
        }
        ArithShiftRight(width) => {
            let sign = if *width < 128 {
                vals[0] & (1u128 << (width - 1)) != 0
            } else {
                vals[0] & (1u128 << 127) != 0
            };
            if vals[1] >= u128::from(*width) {
                if sign { m } else { 0 }
            } else {
                let s = vals[1] as u64;
                let r = vals[0] >> s;
                if sign {
                    (r | (m & !mask(width - s))) & m
                } else {
                    r
                }
            }
        }
        Equal(_) => (vals[0] == vals[1]) as u128,
        NotEqual(_) => (vals[0] != vals[1]) as u128,
        LessThan(_) => (vals[0] < vals[1]) as u128,
        LessThanEq(_) => (vals[0] <= vals[1]) as u128,
        ReplicateBit(w) => {
            if vals[0] & 1 == 1 {
                mask(*w)
            } else {
                0
            }
        }
        ZeroExtend { .. } => vals[0],
        SignExtend {
            in_width,
            out_width,
        } => sext(vals[0], *in_width, *out_width),
        SelectBits { hi, lo, .. } => (vals[0] >> lo) & mask(hi - lo + 1),
        Concat(_, wb) => {
            if *wb >= 128 {
                return None;
            }
            (vals[0] << wb) | vals[1]
        }
        Identity(_) => vals[0],
        Mux { .. } => {
            if vals[0] < (vals.len() - 1) as u128 {
                vals[vals[0] as usize + 1]
            } else {
                return None;
            }
        }
        MergeWrites { n, .. } => {
            let mut acc = 0u128;
            for i in 0..*n as usize {
                if vals[2 * i] & 1 == 1 {
                    acc |= vals[2 * i + 1];
                }
            }
            acc & m
        }
        // Everything else is stateful, boundary or side-effecting.
        _ => return None,
    })
}

/* ---------------- operator overloads ---------------- */

macro_rules! impl_binop {
    ($trait:ident, $method:ident, $tag:literal, $prim:ident) => {
        impl $trait for Bit {
            type Output = Bit;
            fn $method(self, rhs: Bit) -> Bit {
                let w = self.width();
                Bit::binary($tag, Prim::$prim(w), self, rhs)
            }
        }
    };
}

impl_binop!(Add, add, "Add", Add);
impl_binop!(Sub, sub, "Sub", Sub);
impl_binop!(Div, div, "Div", Div);
impl_binop!(Rem, rem, "Mod", Mod);
impl_binop!(BitAnd, bitand, "And", And);
impl_binop!(BitOr, bitor, "Or", Or);
impl_binop!(BitXor, bitxor, "Xor", Xor);

impl Mul for Bit {
    type Output = Bit;
    /// Truncating multiply; see [`Bit::full_mul`] for the double-width
    /// variant.
    fn mul(self, rhs: Bit) -> Bit {
        check_same_width("Mul", &self, &rhs);
        let width = self.width();
        Bit::prim(
            Prim::Mul {
                width,
                is_signed: false,
                full_width: false,
            },
            vec![self, rhs],
        )
    }
}

impl Not for Bit {
    type Output = Bit;
    fn not(self) -> Bit {
        let w = self.width();
        Bit::prim(Prim::Not(w), vec![self])
    }
}

impl Shl<Bit> for Bit {
    type Output = Bit;
    fn shl(self, rhs: Bit) -> Bit {
        let w = self.width();
        Bit::prim(Prim::ShiftLeft(w), vec![self, rhs])
    }
}

impl Shr<Bit> for Bit {
    type Output = Bit;
    /// Logical shift; see [`Bit::ashr`] for the arithmetic variant.
    fn shr(self, rhs: Bit) -> Bit {
        let w = self.width();
        Bit::prim(Prim::ShiftRight(w), vec![self, rhs])
    }
}
