//! Link generation.
//!
//! Links explain the truth value of a node:
//!
//! - a forall node collects the bindings of its false children as violated
//!   links, an exists node those of its true children as satisfied links,
//! - `and` takes the product of its children's links when true, the union of
//!   its false children's links when false,
//! - `or` is the dual of `and`,
//! - `implies` and `not` flip the links of the sub-formulas they negate,
//! - predicates have no links.
//!
//! In `mg` mode, links are only generated when the root is false, and only
//! for the nodes whose links feed their parent's. These are the *substantial*
//! nodes of the cycle. An unaffected node reuses its cached links if it was
//! substantial in the previous cycle, that is if its cache is up to date.
//! Without `mg` the links of all nodes are kept current.

use crate::{
    check::{bound_of, eval_kids, Cx},
    common::*,
    formula::FNode,
    tree::{LinkSet, Node, Patch},
};

/// Generates the links of the tree of a rule.
///
/// Must run after the truths of the cycle are applied, reads virtual truths.
pub fn generate(cx: &Cx, patch: &mut Patch) -> Res<()> {
    let root = if let Some(root) = cx.tree.root() {
        root
    } else {
        return Ok(());
    };
    if cx.mg && cx.tree[root].staged()? {
        return Ok(());
    }
    node_links(cx, root, patch)?;
    Ok(())
}

/// Child of a connective node.
fn kid(node: &Node, i: usize) -> Res<NodeIdx> {
    node.kids().get(i).cloned().ok_or_else(|| {
        inconsistent(format!(
            "connective node for {} is missing child {}",
            node.fml(),
            i
        ))
    })
}

fn node_links(cx: &Cx, node: NodeIdx, patch: &mut Patch) -> Res<Arc<LinkSet>> {
    let n = &cx.tree[node];
    if cx.mg {
        patch.substantial(node)
    }
    let affected = cx.scratch.affected(n.fml());
    let cache_ok = !cx.mg || cx.tree.was_substantial(node);
    if !affected && cache_ok {
        if let Some(links) = n.links() {
            return Ok(links.clone());
        }
    }

    let fnode = &cx.fml[n.fml()];
    let links = if let Some((kind, q)) = fnode.quant() {
        // Old children are unchanged, only look at the new ones.
        let fast = affected && !cx.scratch.affected(q.sub) && !n.pruned() && cache_ok;
        let (mut links, kids) = match n.links() {
            Some(cached) if fast => ((**cached).clone(), n.fresh_kids()),
            _ => (LinkSet::new(), n.kids()),
        };

        let witness = kind.witness_truth();
        let mut visit = Vec::with_capacity(kids.len());
        for kid in kids {
            let is_witness = cx.tree[*kid].staged()? == witness;
            if is_witness || !cx.mg {
                visit.push((*kid, is_witness))
            }
        }
        let kid_links = eval_kids(cx, n.fml(), &visit, patch, |(kid, _), patch| {
            node_links(cx, *kid, patch)
        })?;
        for ((kid, is_witness), kid_links) in visit.iter().zip(kid_links) {
            if *is_witness {
                let bound = bound_of(cx.tree, *kid)?;
                links.union(&kid_links.with_binding(kind.link_kind(), &q.var, bound))
            }
        }
        links
    } else {
        match fnode {
            FNode::BFunc(_) => LinkSet::new(),

            FNode::Not(_) => node_links(cx, kid(n, 0)?, patch)?.flipped(),

            fnode => {
                let (a, b) = (kid(n, 0)?, kid(n, 1)?);
                let (ta, tb) = (cx.tree[a].staged()?, cx.tree[b].staged()?);
                let t = n.staged()?;
                let feeds = match fnode {
                    FNode::And(_, _) if t => [true, true],
                    FNode::And(_, _) => [!ta, !tb],
                    FNode::Or(_, _) if t => [ta, tb],
                    FNode::Or(_, _) => [true, true],
                    FNode::Implies(_, _) if t => [!ta, tb],
                    _ => [true, true],
                };
                let mut kid_links = [Arc::new(LinkSet::new()), Arc::new(LinkSet::new())];
                for (i, kid) in [a, b].iter().enumerate() {
                    if feeds[i] || !cx.mg {
                        kid_links[i] = node_links(cx, *kid, patch)?
                    }
                }
                let [la, lb] = kid_links;

                let union_of = |take_a: bool, la: &LinkSet, take_b: bool, lb: &LinkSet| {
                    let mut res = LinkSet::new();
                    if take_a {
                        res.union(la)
                    }
                    if take_b {
                        res.union(lb)
                    }
                    res
                };
                match fnode {
                    FNode::And(_, _) if t => la.cartesian(&lb),
                    FNode::And(_, _) => union_of(!ta, &la, !tb, &lb),
                    FNode::Or(_, _) if t => union_of(ta, &la, tb, &lb),
                    FNode::Or(_, _) => la.cartesian(&lb),
                    FNode::Implies(_, _) if t => union_of(!ta, &la.flipped(), tb, &lb),
                    _ => la.flipped().cartesian(&lb),
                }
            }
        }
    };

    let links = Arc::new(links);
    patch.links(node, links.clone());
    Ok(links)
}
