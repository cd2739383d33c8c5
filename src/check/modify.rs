//! Structural changes of instantiation trees.
//!
//! Planning reads the tree and the deltas of the fact store and yields a list
//! of [`Edit`]s, applied in order by [`apply`][apply]. Planning fans out like
//! evaluation does, new branches are built as detached fragments.
//!
//! [`Edit`]: enum.Edit.html (Edit enum)
//! [apply]: fn.apply.html (apply function)

use crate::{
    check::{ecc, map_kids, Cx},
    common::*,
    context::Ctx,
    formula::{Formula, Quant},
    tree::{Fragment, Tree},
};

/// A structural change.
#[derive(Debug)]
pub enum Edit {
    /// Resets the fresh and pruned flags of a node.
    Touch(NodeIdx),
    /// Removes a subtree.
    Remove(NodeIdx),
    /// Grafts a fragment as the last child of a node.
    Graft(NodeIdx, Fragment),
}

/// Child of a quantifier node bound to some context.
///
/// A context the quantifier admits must be bound by exactly one child, one it
/// does not admit by none. Anything else is a consistency violation.
pub fn match_one(cx: &Cx, node: NodeIdx, q: &Quant, ctx: &Ctx) -> Res<Option<NodeIdx>> {
    let n = &cx.tree[node];
    let admitted = q.admits(n.env(), ctx);
    let matches: Vec<NodeIdx> = n
        .kids()
        .iter()
        .cloned()
        .filter(|kid| {
            cx.tree[*kid]
                .env()
                .get(&q.var)
                .map(|bound| bound.id() == ctx.id())
                .unwrap_or(false)
        })
        .collect();
    match (admitted, &matches[..]) {
        (true, [kid]) => Ok(Some(*kid)),
        (false, []) => Ok(None),
        _ => bail!(inconsistent(format!(
            "{} child(ren) of node {} bind `{}` to `{}`, expected {}",
            matches.len(),
            node,
            q.var,
            ctx,
            if admitted { 1 } else { 0 }
        ))),
    }
}

/// Plans the edits the deltas of the store call for.
///
/// Only affected nodes are visited. Every visited quantifier node is touched
/// before its children change.
pub fn plan(cx: &Cx) -> Res<Vec<Edit>> {
    let mut edits = vec![];
    if let Some(root) = cx.tree.root() {
        plan_node(cx, root, &mut edits)?
    }
    Ok(edits)
}

fn plan_node(cx: &Cx, node: NodeIdx, edits: &mut Vec<Edit>) -> Res<()> {
    let n = &cx.tree[node];
    if !cx.scratch.affected(n.fml()) {
        return Ok(());
    }
    let q = if let Some((_, q)) = cx.fml[n.fml()].quant() {
        q
    } else {
        for kid in n.kids() {
            plan_node(cx, *kid, edits)?
        }
        return Ok(());
    };

    edits.push(Edit::Touch(node));
    let delta = cx.store.delta(&q.pat);

    let mut removed = BTreeSet::new();
    if let Some(delta) = delta {
        let old = delta
            .deleted
            .values()
            .chain(delta.updated.values().map(|(old, _)| old));
        for ctx in old {
            if let Some(kid) = match_one(cx, node, q, ctx)? {
                edits.push(Edit::Remove(kid));
                removed.insert(kid);
            }
        }
    }

    if cx.scratch.affected(q.sub) {
        let survivors: Vec<NodeIdx> = n
            .kids()
            .iter()
            .filter(|kid| !removed.contains(*kid))
            .cloned()
            .collect();
        let plans = map_kids(cx, n.fml(), &survivors, |kid| {
            let mut edits = vec![];
            plan_node(cx, *kid, &mut edits)?;
            Ok(edits)
        })?;
        for plan in plans {
            edits.extend(plan)
        }
    }

    if let Some(delta) = delta {
        let new: Vec<Ctx> = delta
            .updated
            .values()
            .map(|(_, new)| new)
            .chain(delta.added.values())
            .filter(|ctx| q.admits(n.env(), ctx))
            .cloned()
            .collect();
        let frags = map_kids(cx, n.fml(), &new, |ctx| {
            ecc::build(cx, q.sub, q.bind(n.env(), ctx), Some(ctx.id()))
        })?;
        for frag in frags {
            edits.push(Edit::Graft(node, frag))
        }
    }

    Ok(())
}

/// Applies some edits in order.
pub fn apply(tree: &mut Tree, fml: &Formula, edits: Vec<Edit>) -> Res<()> {
    for edit in edits {
        match edit {
            Edit::Touch(node) => tree.touch(node)?,
            Edit::Remove(node) => tree.remove(node, fml)?,
            Edit::Graft(parent, frag) => {
                tree.graft(Some(parent), frag, fml)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        check::Scratch,
        context::{Context, ContextChange, Env, FactStore},
        formula::FormulaBuilder,
        pred::PredRegistry,
    };
    use std::sync::atomic::AtomicUsize;

    fn ctx(id: usize) -> Ctx {
        Arc::new(Context::new(id.into(), BTreeMap::new()))
    }

    #[test]
    fn plans_follow_deltas() {
        let mut b = FormulaBuilder::new("r");
        let leaf = b.bfunc("not_still", vec![("v1", "v")]);
        let root = b.forall("v", "P", leaf);
        let fml = b.build(root).unwrap();

        let mut store = FactStore::new();
        for id in 0..3 {
            store.apply_one(&ContextChange::add("P", ctx(id))).unwrap();
        }
        let (preds, pool) = (PredRegistry::new(), mk_pool(1).unwrap());
        let dispatches = AtomicUsize::new(0);
        let scratch = Scratch::for_change(&fml, "P");
        let mut tree = Tree::new();
        let frag = {
            let empty = Tree::new();
            let cx = Cx {
                fml: &fml,
                tree: &empty,
                store: &store,
                preds: &preds,
                scratch: &scratch,
                pool: &pool,
                mg: false,
                dispatches: &dispatches,
            };
            ecc::build(&cx, root, Arc::new(Env::new()), None).unwrap()
        };
        let root_node = tree.graft(None, frag, &fml).unwrap();

        store
            .apply_batch(&[
                ContextChange::del("P", ctx(1)),
                ContextChange::upd("P", ctx(2)),
                ContextChange::add("P", ctx(3)),
            ])
            .unwrap();
        let edits = {
            let cx = Cx {
                fml: &fml,
                tree: &tree,
                store: &store,
                preds: &preds,
                scratch: &scratch,
                pool: &pool,
                mg: false,
                dispatches: &dispatches,
            };
            // Context 7 is admitted but has no child.
            let q = fml[root].quant().unwrap().1;
            let err = match_one(&cx, root_node, q, &ctx(7)).unwrap_err();
            assert!(err.is_fatal());
            plan(&cx).unwrap()
        };
        let kinds: Vec<_> = edits
            .iter()
            .map(|edit| match edit {
                Edit::Touch(_) => "touch",
                Edit::Remove(_) => "remove",
                Edit::Graft(_, _) => "graft",
            })
            .collect();
        assert_eq!(kinds, vec!["touch", "remove", "remove", "graft", "graft"]);

        apply(&mut tree, &fml, edits).unwrap();
        let bound: Vec<_> = tree[root_node]
            .kids()
            .iter()
            .map(|kid| tree[*kid].bound().unwrap().get())
            .collect();
        // The updated context sits with the new ones.
        assert_eq!(bound, vec![0, 2, 3]);
        assert_eq!(tree[root_node].fresh(), 2);
        assert!(tree[root_node].pruned())
    }
}
