//! Single-change incremental re-evaluation.
//!
//! Runs after the tree was modified for exactly one change. Only the nodes
//! above a quantifier over the pattern changed are visited. At such a
//! quantifier an addition only evaluates the new child, a deletion folds the
//! child map.

use std::iter::once;

use crate::{
    check::{connective, ecc, eval_kids, fold_kids_vt, record_kids, Cx},
    common::*,
    context::{ChangeKind, ContextChange},
    formula::FNode,
    tree::Patch,
};

/// Re-evaluates a subtree after a single change.
pub fn truth(cx: &Cx, node: NodeIdx, change: &ContextChange, patch: &mut Patch) -> Res<bool> {
    let n = &cx.tree[node];
    if !cx.scratch.affected(n.fml()) {
        return n.committed();
    }
    let fnode = &cx.fml[n.fml()];

    let res = if let Some((kind, q)) = fnode.quant() {
        if q.pat == change.pat {
            match change.kind {
                ChangeKind::Addition => {
                    let fresh = n.fresh_kids();
                    let truths = eval_kids(cx, n.fml(), fresh, patch, |kid, patch| {
                        ecc::truth(cx, *kid, None, patch)
                    })?;
                    record_kids(cx.tree, node, fresh, &truths, patch)?;
                    kind.fold(once(n.committed()?).chain(truths))
                }
                ChangeKind::Deletion => fold_kids_vt(kind, n)?,
                ChangeKind::Update => bail!(inconsistent(format!(
                    "single-change evaluation of update `{}`",
                    change
                ))),
            }
        } else {
            let truths = eval_kids(cx, n.fml(), n.kids(), patch, |kid, patch| {
                truth(cx, *kid, change, patch)
            })?;
            record_kids(cx.tree, node, n.kids(), &truths, patch)?;
            kind.fold(truths)
        }
    } else if let FNode::BFunc(_) = fnode {
        n.committed()?
    } else {
        connective(cx.fml, n, |kid| truth(cx, kid, change, patch))?
    };

    patch.truth(node, res);
    Ok(res)
}
