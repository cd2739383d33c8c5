//! Batched incremental re-evaluation.
//!
//! Children of a quantifier node are split in two: the ones that were there
//! before the cycle, and the ones grafted for the additions and updates of
//! the batch, which come last. Old children are re-evaluated precisely, new
//! ones completely.

use std::iter::once;

use crate::{
    check::{connective, ecc, eval_kids, fold_kids_vt, record_kids, Cx},
    common::*,
    formula::FNode,
    tree::Patch,
};

/// Re-evaluates a subtree after a batch.
pub fn truth(cx: &Cx, node: NodeIdx, patch: &mut Patch) -> Res<bool> {
    let n = &cx.tree[node];
    if !cx.scratch.affected(n.fml()) {
        return n.committed();
    }
    let fnode = &cx.fml[n.fml()];

    let res = if let Some((kind, q)) = fnode.quant() {
        if cx.scratch.affected(q.sub) {
            let kids: Vec<Either<NodeIdx, NodeIdx>> = n
                .old_kids()
                .iter()
                .map(|kid| Either::Left(*kid))
                .chain(n.fresh_kids().iter().map(|kid| Either::Right(*kid)))
                .collect();
            let truths = eval_kids(cx, n.fml(), &kids, patch, |kid, patch| match kid {
                Either::Left(old) => truth(cx, *old, patch),
                Either::Right(new) => ecc::truth(cx, *new, None, patch),
            })?;
            record_kids(cx.tree, node, n.kids(), &truths, patch)?;
            kind.fold(truths)
        } else {
            let fresh = n.fresh_kids();
            let truths = eval_kids(cx, n.fml(), fresh, patch, |kid, patch| {
                ecc::truth(cx, *kid, None, patch)
            })?;
            record_kids(cx.tree, node, fresh, &truths, patch)?;
            // Old children are unchanged, their truths are in the child map.
            let (_, del, upd) = cx.store.delta_sizes(&q.pat);
            let base = if del + upd == 0 && !n.pruned() {
                n.committed()?
            } else {
                fold_kids_vt(kind, n)?
            };
            kind.fold(once(base).chain(truths))
        }
    } else if let FNode::BFunc(_) = fnode {
        n.committed()?
    } else {
        connective(cx.fml, n, |kid| truth(cx, kid, patch))?
    };

    patch.truth(node, res);
    Ok(res)
}
