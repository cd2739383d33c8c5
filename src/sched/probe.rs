//! Probing whether replacing a context by another changes anything.

use crate::{
    check::{ecc, modify::match_one, Checker, Cx},
    common::*,
    context::{Ctx, Subst},
    tree::Patch,
};

/// Rebinding of some branches of a rule, staged by [`probe`][probe].
///
/// Applying it rebinds the branches and swaps the contexts in the fact store
/// of the rule. Dropping it discards it, nothing was written.
///
/// [probe]: fn.probe.html (probe function)
#[derive(Debug, Clone)]
pub struct SideEffect {
    /// Rule.
    pub rule: String,
    /// Pattern.
    pub pat: String,
    /// Variable ranging over the pattern.
    pub var: String,
    /// Context deleted.
    pub del: Ctx,
    /// Context added.
    pub add: Ctx,
    /// Branches bound to `del`.
    pub branches: Vec<NodeIdx>,
}
impl SideEffect {
    /// Applies the rebinding.
    pub fn apply(self, checker: &mut Checker) -> Res<()> {
        checker.rule_mut(&self.rule)?.swap_branches(
            &self.pat,
            &self.var,
            &self.del,
            &self.add,
            &self.branches,
        )
    }
}

/// Checks whether replacing `del` by `add` in the pool of `pat` leaves every
/// truth of the tree unchanged.
///
/// Every branch bound to `del` is re-evaluated with the variable substituted
/// by `add`, and must keep the truth of each of its nodes. Contexts must be
/// admitted by the same quantifier nodes. If the identities differ, no filter
/// may depend on the variable.
///
/// Returns `None` if the replacement is observable, or if no branch is bound
/// to `del`.
pub fn probe(cx: &Cx, pat: &str, del: &Ctx, add: &Ctx) -> Res<Option<SideEffect>> {
    let q = match cx.fml.quant_of_pat(pat).and_then(|fidx| cx.fml[fidx].quant()) {
        Some((_, q)) => q,
        None => return Ok(None),
    };
    if del.id() != add.id() && cx.fml.filter_depends_on(&q.var) {
        return Ok(None);
    }

    let subst = Subst {
        var: q.var.clone(),
        ctx: add.clone(),
    };
    let mut branches = vec![];
    for node in cx.tree.nodes_over(pat) {
        let env = cx.tree[node].env();
        if q.admits(env, del) != q.admits(env, add) {
            return Ok(None);
        }
        let branch = if let Some(branch) = match_one(cx, node, q, del)? {
            branch
        } else {
            continue;
        };
        let mut patch = Patch::new();
        ecc::truth(cx, branch, Some(&subst), &mut patch)?;
        let same = patch
            .truths()
            .iter()
            .all(|(idx, truth)| cx.tree[*idx].truth() == *truth);
        if !same {
            return Ok(None);
        }
        branches.push(branch)
    }

    if branches.is_empty() {
        Ok(None)
    } else {
        Ok(Some(SideEffect {
            rule: cx.fml.rule().into(),
            pat: pat.into(),
            var: q.var.clone(),
            del: del.clone(),
            add: add.clone(),
            branches,
        }))
    }
}
