//! Per-cycle flags on formula nodes.

use crate::{common::*, formula::Formula};

/// Per-cycle flags, indexed by formula node.
///
/// Created fresh for every cycle, never stored in the formula.
#[derive(Debug, Clone)]
pub struct Scratch {
    /// True for the nodes with a quantifier over a changed pattern below them
    /// (inclusive).
    affected: Vec<bool>,
    /// True for the quantifiers that fan their children out to the pool.
    conc: Vec<bool>,
}
impl Scratch {
    /// No node affected, no node concurrent.
    pub fn new(fml: &Formula) -> Self {
        Scratch {
            affected: vec![false; fml.len()],
            conc: vec![false; fml.len()],
        }
    }

    /// All nodes affected.
    pub fn all(fml: &Formula) -> Self {
        Scratch {
            affected: vec![true; fml.len()],
            conc: vec![false; fml.len()],
        }
    }

    /// Flags for a single change on `pat`.
    pub fn for_change(fml: &Formula, pat: &str) -> Self {
        Self::for_batch(fml, Some(pat))
    }

    /// Flags for changes on some patterns.
    pub fn for_batch<'a, Pats>(fml: &Formula, pats: Pats) -> Self
    where
        Pats: IntoIterator<Item = &'a str>,
    {
        let pats: BTreeSet<&str> = pats.into_iter().collect();
        let mut scratch = Self::new(fml);
        scratch.mark(fml, fml.root(), &pats);
        scratch
    }

    /// Marks the nodes affected by some patterns, returns true if `fidx` is
    /// affected.
    fn mark(&mut self, fml: &Formula, fidx: FIdx, pats: &BTreeSet<&str>) -> bool {
        let mut affected = fml[fidx]
            .quant()
            .map(|(_, q)| pats.contains(q.pat.as_str()))
            .unwrap_or(false);
        for kid in fml[fidx].kids() {
            let kid_affected = self.mark(fml, kid, pats);
            affected = affected || kid_affected
        }
        self.affected[fidx.get()] = affected;
        affected
    }

    /// Lets a quantifier fan out.
    pub fn set_conc(&mut self, fidx: FIdx) {
        self.conc[fidx.get()] = true
    }

    /// True if a node is affected.
    #[inline]
    pub fn affected(&self, fidx: FIdx) -> bool {
        self.affected[fidx.get()]
    }
    /// True if a quantifier fans out.
    #[inline]
    pub fn conc(&self, fidx: FIdx) -> bool {
        self.conc[fidx.get()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::FormulaBuilder;

    #[test]
    fn affected_is_upward_closed() {
        let mut b = FormulaBuilder::new("r");
        let p_leaf = b.bfunc("not_still", vec![("v1", "v")]);
        let q_leaf = b.bfunc("same_loc", vec![("v1", "v"), ("v2", "w")]);
        let q = b.exists("w", "Q", q_leaf);
        let and = b.and(p_leaf, q);
        let root = b.forall("v", "P", and);
        let fml = b.build(root).unwrap();

        let scratch = Scratch::for_change(&fml, "Q");
        assert!(scratch.affected(root));
        assert!(scratch.affected(and));
        assert!(scratch.affected(q));
        assert!(!scratch.affected(p_leaf));
        assert!(!scratch.affected(q_leaf));

        let scratch = Scratch::for_change(&fml, "P");
        assert!(scratch.affected(root));
        assert!(!scratch.affected(and));

        let scratch = Scratch::for_batch(&fml, vec!["R"]);
        assert!(!scratch.affected(root));
        assert!(!scratch.conc(root))
    }
}
