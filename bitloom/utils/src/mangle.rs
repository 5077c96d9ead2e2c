//! Deterministic synthesis of Verilog-legal identifiers from name hints.
use itertools::Itertools;

/// A naming hint attached to a variable or expression node. Hints are
/// advisory; the mangler guarantees uniqueness on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameHint {
    Prefix(String),
    Root(String),
    Suffix(String),
}

/// The ordered, deduplicated hint sets carried by one net.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameHints {
    prefixes: Vec<String>,
    roots: Vec<String>,
    suffixes: Vec<String>,
}

impl NameHints {
    pub fn insert(&mut self, hint: NameHint) {
        let (list, name) = match hint {
            NameHint::Prefix(p) => (&mut self.prefixes, p),
            NameHint::Root(r) => (&mut self.roots, r),
            NameHint::Suffix(s) => (&mut self.suffixes, s),
        };
        if !list.contains(&name) {
            list.push(name);
        }
    }

    /// Merge another hint set into this one, keeping insertion order.
    pub fn extend(&mut self, other: &NameHints) {
        for p in &other.prefixes {
            self.insert(NameHint::Prefix(p.clone()));
        }
        for r in &other.roots {
            self.insert(NameHint::Root(r.clone()));
        }
        for s in &other.suffixes {
            self.insert(NameHint::Suffix(s.clone()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.roots.is_empty() && self.suffixes.is_empty()
    }
}

impl FromIterator<NameHint> for NameHints {
    fn from_iter<I: IntoIterator<Item = NameHint>>(iter: I) -> Self {
        let mut hints = NameHints::default();
        for h in iter {
            hints.insert(h);
        }
        hints
    }
}

/// Joins all prefixes, then all roots, then all suffixes with underscores,
/// dropping empty fields, falling back to `v` when no hints exist, and
/// appending `_<id>` so distinct nets never collide.
pub fn mangle(hints: &NameHints, id: u32) -> String {
    let joined = hints
        .prefixes
        .iter()
        .chain(hints.roots.iter())
        .chain(hints.suffixes.iter())
        .map(|h| sanitize(h))
        .filter(|h| !h.is_empty())
        .join("_");
    if joined.is_empty() {
        format!("v_{}", id)
    } else if joined.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}_{}", joined, id)
    } else {
        format!("{}_{}", joined, id)
    }
}

/// Replace anything outside `[A-Za-z0-9_]` with an underscore.
fn sanitize(hint: &str) -> String {
    hint.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints(items: Vec<NameHint>) -> NameHints {
        items.into_iter().collect()
    }

    #[test]
    fn no_hints_defaults_to_v() {
        assert_eq!(mangle(&NameHints::default(), 7), "v_7");
    }

    #[test]
    fn join_order_is_prefix_root_suffix() {
        let h = hints(vec![
            NameHint::Suffix("q".into()),
            NameHint::Root("count".into()),
            NameHint::Prefix("top".into()),
        ]);
        assert_eq!(mangle(&h, 3), "top_count_q_3");
    }

    #[test]
    fn duplicate_hints_collapse() {
        let h = hints(vec![
            NameHint::Root("count".into()),
            NameHint::Root("count".into()),
        ]);
        assert_eq!(mangle(&h, 0), "count_0");
    }

    #[test]
    fn illegal_characters_become_underscores() {
        let h = hints(vec![NameHint::Root("my.reg[2]".into())]);
        assert_eq!(mangle(&h, 1), "my_reg_2__1");
    }

    #[test]
    fn leading_digit_is_guarded() {
        let h = hints(vec![NameHint::Root("2nd".into())]);
        assert_eq!(mangle(&h, 4), "_2nd_4");
    }

    #[test]
    fn empty_fields_are_dropped() {
        let h = hints(vec![
            NameHint::Prefix(String::new()),
            NameHint::Root("x".into()),
        ]);
        assert_eq!(mangle(&h, 2), "x_2");
    }
}
