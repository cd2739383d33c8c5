//! Full evaluation: builds instantiation trees and evaluates them bottom-up.
//!
//! This is the reference semantics, every other strategy must agree with it.
//! It is also used by the incremental strategies for the branches created in
//! the current cycle.

use crate::{
    check::{connective, eval_kids, map_kids, record_kids, Cx},
    common::*,
    context::{Ctx, Env, Subst},
    formula::FNode,
    tree::{Fragment, Node, Patch},
};

/// Builds the instantiation tree of a formula node in some environment.
///
/// Quantifiers get one child per context of their pattern they admit. Only
/// the structure is built, all truth values are unknown.
pub fn build(cx: &Cx, fidx: FIdx, env: Arc<Env>, bound: Option<CtxId>) -> Res<Fragment> {
    let mut frag = Fragment::new(Node::new(fidx, env.clone(), bound));
    match &cx.fml[fidx] {
        FNode::Forall(q) | FNode::Exists(q) => {
            let domain: Vec<Ctx> = cx
                .store
                .domain(&q.pat)
                .into_iter()
                .filter(|ctx| q.admits(&env, ctx))
                .collect();
            let kids = map_kids(cx, fidx, &domain, |ctx| {
                build(cx, q.sub, q.bind(&env, ctx), Some(ctx.id()))
            })?;
            for kid in kids {
                frag.absorb(0, kid)
            }
        }
        FNode::And(lhs, rhs) | FNode::Or(lhs, rhs) | FNode::Implies(lhs, rhs) => {
            frag.absorb(0, build(cx, *lhs, env.clone(), None)?);
            frag.absorb(0, build(cx, *rhs, env, None)?);
        }
        FNode::Not(sub) => frag.absorb(0, build(cx, *sub, env, None)?),
        FNode::BFunc(_) => (),
    }
    Ok(frag)
}

/// Evaluates a subtree completely.
///
/// Writes the truth of every node of the subtree, and the child maps of its
/// quantifier nodes, in `patch`. If `subst` is given, variables are looked up
/// in it first.
pub fn truth(cx: &Cx, node: NodeIdx, subst: Option<&Subst>, patch: &mut Patch) -> Res<bool> {
    let n = &cx.tree[node];
    let fnode = &cx.fml[n.fml()];
    let res = if let Some((kind, _)) = fnode.quant() {
        let truths = eval_kids(cx, n.fml(), n.kids(), patch, |kid, patch| {
            truth(cx, *kid, subst, patch)
        })?;
        record_kids(cx.tree, node, n.kids(), &truths, patch)?;
        kind.fold(truths)
    } else if let FNode::BFunc(bfunc) = fnode {
        cx.preds.eval(bfunc, n.env(), subst)?
    } else {
        connective(cx.fml, n, |kid| truth(cx, kid, subst, patch))?
    };
    patch.truth(node, res);
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        check::Scratch,
        context::{Context, ContextChange, FactStore},
        formula::FormulaBuilder,
        pred::PredRegistry,
        tree::{Stage, Tree},
    };
    use std::sync::atomic::AtomicUsize;

    fn ctx(id: usize, state: &str) -> Ctx {
        let mut attrs = BTreeMap::new();
        attrs.insert("state".to_string(), state.to_string());
        attrs.insert("location".to_string(), format!("l{}", id % 2));
        Arc::new(Context::new(id.into(), attrs))
    }

    #[test]
    fn build_and_evaluate() {
        // forall v P. exists w Q: w > v && same_loc(v, w)
        let mut b = FormulaBuilder::new("r");
        let leaf = b.bfunc("same_loc", vec![("v1", "v"), ("v2", "w")]);
        let ex = b.exists("w", "Q", leaf);
        b.filter(ex, "greater", "v").unwrap();
        let root = b.forall("v", "P", ex);
        let fml = b.build(root).unwrap();

        let mut store = FactStore::new();
        for (pat, id) in &[("P", 0), ("P", 1), ("Q", 2), ("Q", 3), ("Q", 4)] {
            store
                .apply_one(&ContextChange::add(*pat, ctx(*id, "1")))
                .unwrap();
        }

        let (preds, pool) = (PredRegistry::with_builtins(), mk_pool(2).unwrap());
        let dispatches = AtomicUsize::new(0);
        let scratch = Scratch::all(&fml);
        let empty = Tree::new();
        let cx = Cx {
            fml: &fml,
            tree: &empty,
            store: &store,
            preds: &preds,
            scratch: &scratch,
            pool: &pool,
            mg: true,
            dispatches: &dispatches,
        };
        let frag = build(&cx, root, Arc::new(Env::new()), None).unwrap();
        // Root, two P children, and the Q children admitted by the filter:
        // 2, 3 and 4 are all greater than 0 and 1.
        assert_eq!(frag.len(), 1 + 2 + 6);
        let mut tree = Tree::new();
        tree.graft(None, frag, &fml).unwrap();

        let cx = Cx { tree: &tree, ..cx };
        let mut patch = Patch::new();
        let root_node = tree.get_root().unwrap();
        // P#0 (l0) finds Q#2 or Q#4 (l0), P#1 (l1) finds Q#3 (l1).
        assert!(truth(&cx, root_node, None, &mut patch).unwrap());

        // Substituting P#1 with a context at l2 falsifies its branch.
        let branch = tree[root_node].kids()[1];
        let mut other = Patch::new();
        let subst = Subst {
            var: "v".into(),
            ctx: Arc::new(ctx(1, "1").with_attr("location", "l2")),
        };
        assert!(!truth(&cx, branch, Some(&subst), &mut other).unwrap());

        tree.apply(patch, Stage::Commit).unwrap();
        tree.check(&fml).unwrap()
    }
}
