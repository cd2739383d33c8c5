//! Instantiation trees.
//!
//! An instantiation tree mirrors the formula of its rule, except that each
//! quantifier node has one child per context of its pattern the quantifier
//! admits. Children of a quantifier node are roots of instances of the body of
//! the quantifier, each with the quantified variable bound to its context.
//!
//! Trees are arenas of [`Node`]s indexed by [`NodeIdx`]. Parents are plain
//! indices. Freed slots are reused.
//!
//! Evaluation never writes to the tree directly. It produces [`Patch`]es and
//! [`Fragment`]s which are applied by the owner of the tree, so that the tree
//! can be shared with worker threads during evaluation.
//!
//! [`Node`]: struct.Node.html (Node struct)
//! [`NodeIdx`]: ../common/struct.NodeIdx.html (NodeIdx struct)
//! [`Patch`]: struct.Patch.html (Patch struct)
//! [`Fragment`]: struct.Fragment.html (Fragment struct)

use crate::{
    common::*,
    context::{Ctx, Env},
    formula::Formula,
};

mod link;
mod patch;

pub use self::link::{Link, LinkKind, LinkSet};
pub use self::patch::{Fragment, Patch, Stage};

/// Ternary truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Truth {
    /// True.
    True,
    /// False.
    False,
    /// Not evaluated yet.
    Unknown,
}
impl Truth {
    /// Constructor.
    pub fn of_bool(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }
    /// Boolean value, if known.
    pub fn to_bool(self) -> Option<bool> {
        match self {
            Truth::True => Some(true),
            Truth::False => Some(false),
            Truth::Unknown => None,
        }
    }
}
impl fmt::Display for Truth {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Truth::True => write!(fmt, "true"),
            Truth::False => write!(fmt, "false"),
            Truth::Unknown => write!(fmt, "unknown"),
        }
    }
}

/// A node of an instantiation tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Formula node this node instantiates.
    fml: FIdx,
    /// Environment.
    env: Arc<Env>,
    /// Children.
    kids: Vec<NodeIdx>,
    /// Parent.
    parent: Option<NodeIdx>,
    /// Committed truth.
    truth: Truth,
    /// Virtual truth.
    vtruth: Truth,
    /// Cached links, `None` if never computed.
    links: Option<Arc<LinkSet>>,
    /// Virtual truth of the children of a quantifier, by bound context.
    kids_vt: BTreeMap<CtxId, Truth>,
    /// Number of children grafted since the node was last touched, they are
    /// the last children.
    fresh: usize,
    /// True if a child was removed since the node was last touched.
    pruned: bool,
    /// Context bound by the parent quantifier, if any.
    bound: Option<CtxId>,
}
impl Node {
    /// Unevaluated node.
    pub fn new(fml: FIdx, env: Arc<Env>, bound: Option<CtxId>) -> Self {
        Node {
            fml,
            env,
            kids: vec![],
            parent: None,
            truth: Truth::Unknown,
            vtruth: Truth::Unknown,
            links: None,
            kids_vt: BTreeMap::new(),
            fresh: 0,
            pruned: false,
            bound,
        }
    }

    /// Formula node.
    #[inline]
    pub fn fml(&self) -> FIdx {
        self.fml
    }
    /// Environment.
    #[inline]
    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }
    /// Children.
    #[inline]
    pub fn kids(&self) -> &[NodeIdx] {
        &self.kids
    }
    /// Parent.
    #[inline]
    pub fn parent(&self) -> Option<NodeIdx> {
        self.parent
    }
    /// Committed truth.
    #[inline]
    pub fn truth(&self) -> Truth {
        self.truth
    }
    /// Virtual truth.
    #[inline]
    pub fn vtruth(&self) -> Truth {
        self.vtruth
    }
    /// Cached links.
    #[inline]
    pub fn links(&self) -> Option<&Arc<LinkSet>> {
        self.links.as_ref()
    }
    /// Virtual truth of the children, by bound context.
    #[inline]
    pub fn kids_vt(&self) -> &BTreeMap<CtxId, Truth> {
        &self.kids_vt
    }
    /// Number of fresh children.
    #[inline]
    pub fn fresh(&self) -> usize {
        self.fresh
    }
    /// True if some children were removed since the node was last touched.
    #[inline]
    pub fn pruned(&self) -> bool {
        self.pruned
    }
    /// Context bound by the parent quantifier.
    #[inline]
    pub fn bound(&self) -> Option<CtxId> {
        self.bound
    }

    /// Children that were already there before the node was last touched.
    pub fn old_kids(&self) -> &[NodeIdx] {
        &self.kids[..self.kids.len() - self.fresh]
    }
    /// Children grafted since the node was last touched.
    pub fn fresh_kids(&self) -> &[NodeIdx] {
        &self.kids[self.kids.len() - self.fresh..]
    }

    /// Committed truth, fails if the node was never evaluated.
    pub fn committed(&self) -> Res<bool> {
        self.truth
            .to_bool()
            .ok_or_else(|| inconsistent("reading the truth of an unevaluated node"))
    }
    /// Virtual truth, fails if the node was never evaluated.
    pub fn staged(&self) -> Res<bool> {
        self.vtruth
            .to_bool()
            .ok_or_else(|| inconsistent("reading the virtual truth of an unevaluated node"))
    }
}

/// An instantiation tree.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    /// Nodes, `None` for free slots.
    nodes: Vec<Option<Node>>,
    /// Free slots.
    free: Vec<NodeIdx>,
    /// Root.
    root: Option<NodeIdx>,
    /// Quantifier nodes by pattern.
    pat_nodes: BTreeMap<String, BTreeSet<NodeIdx>>,
    /// Nodes substantial in the previous cycle.
    prev_substantial: BTreeSet<NodeIdx>,
    /// Nodes substantial in the current cycle.
    cur_substantial: BTreeSet<NodeIdx>,
    /// Nodes with a virtual truth not committed yet.
    staged: BTreeSet<NodeIdx>,
}
impl ::std::ops::Index<NodeIdx> for Tree {
    type Output = Node;
    fn index(&self, idx: NodeIdx) -> &Node {
        match self.nodes.get(idx.get()) {
            Some(Some(node)) => node,
            _ => panic!("access to freed tree node {}", idx),
        }
    }
}
impl Tree {
    /// Empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Root.
    pub fn root(&self) -> Option<NodeIdx> {
        self.root
    }
    /// Root, fails if the tree is empty.
    pub fn get_root(&self) -> Res<NodeIdx> {
        self.root
            .ok_or_else(|| inconsistent("instantiation tree has no root"))
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }
    /// True if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Live node.
    pub fn get(&self, idx: NodeIdx) -> Option<&Node> {
        self.nodes.get(idx.get()).and_then(|node| node.as_ref())
    }
    fn node_mut(&mut self, idx: NodeIdx) -> Res<&mut Node> {
        match self.nodes.get_mut(idx.get()) {
            Some(Some(node)) => Ok(node),
            _ => bail!(inconsistent(format!("tree node {} is not live", idx))),
        }
    }

    /// Quantifier nodes over a pattern.
    pub fn nodes_over(&self, pat: &str) -> Vec<NodeIdx> {
        self.pat_nodes
            .get(pat)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// True if a node was substantial in the previous cycle.
    pub fn was_substantial(&self, idx: NodeIdx) -> bool {
        self.prev_substantial.contains(&idx)
    }
    /// True if a node is substantial in the current cycle.
    pub fn is_substantial(&self, idx: NodeIdx) -> bool {
        self.cur_substantial.contains(&idx)
    }

    /// Nodes of a subtree, pre-order.
    ///
    /// Fails if the subtree reaches a freed node.
    pub fn subtree(&self, idx: NodeIdx) -> Res<Vec<NodeIdx>> {
        let mut res = vec![];
        let mut stack = vec![idx];
        while let Some(idx) = stack.pop() {
            let node = if let Some(node) = self.get(idx) {
                node
            } else {
                bail!(inconsistent(format!("tree node {} is not live", idx)))
            };
            res.push(idx);
            stack.extend(node.kids.iter().rev().cloned())
        }
        Ok(res)
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        *self = Tree::new()
    }

    /// Starts a new cycle: current substantial nodes become the previous
    /// ones.
    pub fn begin_cycle(&mut self) {
        self.prev_substantial = ::std::mem::take(&mut self.cur_substantial)
    }

    fn alloc(&mut self) -> NodeIdx {
        if let Some(idx) = self.free.pop() {
            idx
        } else {
            self.nodes.push(None);
            NodeIdx::from(self.nodes.len() - 1)
        }
    }

    /// Grafts a fragment as the last child of `parent`, or as the root.
    ///
    /// Returns the index of the root of the fragment.
    pub fn graft(&mut self, parent: Option<NodeIdx>, frag: Fragment, fml: &Formula) -> Res<NodeIdx> {
        match parent {
            Some(parent) => {
                self.node_mut(parent)?;
            }
            None => {
                if self.root.is_some() {
                    bail!(inconsistent("grafting a second root"))
                }
            }
        }
        let nodes = frag.destroy();
        let idxs: Vec<NodeIdx> = nodes.iter().map(|_| self.alloc()).collect();
        for (local, mut node) in nodes.into_iter().enumerate() {
            node.kids = node.kids.iter().map(|kid| idxs[kid.get()]).collect();
            node.parent = if local == 0 {
                parent
            } else {
                node.parent.map(|p| idxs[p.get()])
            };
            if let Some((_, q)) = fml[node.fml].quant() {
                self.pat_nodes
                    .entry(q.pat.clone())
                    .or_default()
                    .insert(idxs[local]);
            }
            self.nodes[idxs[local].get()] = Some(node)
        }
        let root = idxs[0];
        if let Some(parent) = parent {
            let parent = self.node_mut(parent)?;
            parent.kids.push(root);
            parent.fresh += 1
        } else {
            self.root = Some(root)
        }
        Ok(root)
    }

    /// Removes a subtree.
    pub fn remove(&mut self, idx: NodeIdx, fml: &Formula) -> Res<()> {
        let (parent, bound) = {
            let node = self.node_mut(idx)?;
            (node.parent, node.bound)
        };
        if let Some(parent) = parent {
            let parent = self.node_mut(parent)?;
            let len = parent.kids.len();
            let pos = if let Some(pos) = parent.kids.iter().position(|kid| *kid == idx) {
                pos
            } else {
                bail!(inconsistent(format!("node {} is not a child of its parent", idx)))
            };
            if pos >= len - parent.fresh {
                parent.fresh -= 1
            }
            parent.kids.remove(pos);
            if let Some(bound) = bound {
                parent.kids_vt.remove(&bound);
            }
            parent.pruned = true
        } else {
            self.root = None
        }

        let mut stack = vec![idx];
        while let Some(idx) = stack.pop() {
            let node = if let Some(node) = self.nodes.get_mut(idx.get()).and_then(|n| n.take()) {
                node
            } else {
                bail!(inconsistent(format!("freeing tree node {} twice", idx)))
            };
            stack.extend(node.kids.iter().cloned());
            if let Some((_, q)) = fml[node.fml].quant() {
                if let Some(set) = self.pat_nodes.get_mut(&q.pat) {
                    set.remove(&idx);
                }
            }
            self.prev_substantial.remove(&idx);
            self.cur_substantial.remove(&idx);
            self.staged.remove(&idx);
            self.free.push(idx)
        }
        Ok(())
    }

    /// Resets the fresh and pruned flags of a node.
    pub fn touch(&mut self, idx: NodeIdx) -> Res<()> {
        let node = self.node_mut(idx)?;
        node.fresh = 0;
        node.pruned = false;
        Ok(())
    }

    /// Applies a patch.
    pub fn apply(&mut self, patch: Patch, stage: Stage) -> Res<()> {
        let (truths, kids_vt, links, substantial) = patch.destroy();
        for (idx, truth) in truths {
            let node = self.node_mut(idx)?;
            node.vtruth = truth;
            match stage {
                Stage::Commit => node.truth = truth,
                Stage::Virtual => {
                    self.staged.insert(idx);
                }
            }
        }
        for (idx, kid, truth) in kids_vt {
            self.node_mut(idx)?.kids_vt.insert(kid, truth);
        }
        for (idx, set) in links {
            self.node_mut(idx)?.links = Some(set)
        }
        self.cur_substantial.extend(substantial);
        Ok(())
    }

    /// Commits the virtual truth of all staged nodes.
    pub fn commit(&mut self) -> Res<()> {
        for idx in ::std::mem::take(&mut self.staged) {
            let node = self.node_mut(idx)?;
            node.truth = node.vtruth
        }
        Ok(())
    }

    /// Renames the bindings of `var` to `old` as `new` in all cached links.
    pub fn rename_links(&mut self, var: &str, old: CtxId, new: CtxId) {
        for node in self.nodes.iter_mut().flatten() {
            let renamed = match &node.links {
                Some(links) if links.mentions(var, old) => links.rename(var, old, new),
                _ => continue,
            };
            node.links = Some(Arc::new(renamed))
        }
    }

    /// Rebinds `var` to `ctx` in a branch of a quantifier node.
    ///
    /// The branch root's binding and its entry in its parent's child map are
    /// updated accordingly. Truths and links are left untouched.
    pub fn rebind(&mut self, branch: NodeIdx, var: &str, ctx: &Ctx) -> Res<()> {
        for idx in self.subtree(branch)? {
            let node = self.node_mut(idx)?;
            let mut env = (*node.env).clone();
            env.insert(var.into(), ctx.clone());
            node.env = Arc::new(env)
        }
        let (parent, old) = {
            let node = self.node_mut(branch)?;
            let old = node.bound.replace(ctx.id());
            (node.parent, old)
        };
        if let (Some(parent), Some(old)) = (parent, old) {
            let parent = self.node_mut(parent)?;
            if let Some(truth) = parent.kids_vt.remove(&old) {
                parent.kids_vt.insert(ctx.id(), truth);
            }
        }
        Ok(())
    }

    /// Checks the structural invariants of the tree.
    pub fn check(&self, fml: &Formula) -> Res<()> {
        macro_rules! fail {
            ($($tt:tt)*) => {
                bail!(inconsistent(format!($($tt)*)))
            };
        }
        let mut reachable = 0;
        if let Some(root) = self.root {
            if self.get(root).map(|node| node.parent.is_some()).unwrap_or(true) {
                fail!("root {} is not a live orphan", root)
            }
            reachable = self.subtree(root)?.len()
        }
        if reachable != self.len() {
            fail!("{} live node(s), {} reachable", self.len(), reachable)
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            let node = if let Some(node) = node {
                node
            } else {
                continue;
            };
            let idx = NodeIdx::from(idx);
            if node.vtruth != node.truth {
                fail!("node {} has uncommitted virtual truth {}", idx, node.vtruth)
            }
            for kid in &node.kids {
                if self.get(*kid).and_then(|kid| kid.parent) != Some(idx) {
                    fail!("node {} is a child of {} but not the other way around", kid, idx)
                }
            }
            if let Some((_, q)) = fml[node.fml].quant() {
                if !self.pat_nodes.get(&q.pat).map(|set| set.contains(&idx)).unwrap_or(false) {
                    fail!("node {} is not registered for `{}`", idx, q.pat)
                }
                let mut bounds = BTreeMap::new();
                for kid in &node.kids {
                    let kid = &self[*kid];
                    if let Some(bound) = kid.bound {
                        bounds.insert(bound, kid.vtruth);
                    } else {
                        fail!("child of quantifier node {} is not bound", idx)
                    }
                }
                if bounds.len() != node.kids.len() {
                    fail!("node {} has two children bound to the same context", idx)
                }
                if bounds != node.kids_vt {
                    fail!("child map of node {} is out of sync with its children", idx)
                }
            }
        }

        for (pat, set) in &self.pat_nodes {
            for idx in set {
                let over_pat = self
                    .get(*idx)
                    .and_then(|node| fml[node.fml].quant())
                    .map(|(_, q)| &q.pat == pat)
                    .unwrap_or(false);
                if !over_pat {
                    fail!("node {} is registered for `{}` but does not range over it", idx, pat)
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::Context, formula::FormulaBuilder};

    fn fml() -> Formula {
        let mut b = FormulaBuilder::new("r");
        let leaf = b.bfunc("not_still", vec![("v1", "v")]);
        let root = b.forall("v", "P", leaf);
        b.build(root).unwrap()
    }

    fn ctx(id: usize) -> Ctx {
        Arc::new(Context::new(id.into(), BTreeMap::new()))
    }

    /// Root over `P` with one evaluated child per context.
    fn tree(fml: &Formula, ids: &[usize]) -> Tree {
        let mut tree = Tree::new();
        let root = fml.root();
        let sub = fml[root].quant().unwrap().1.sub;
        let root = tree
            .graft(None, Fragment::new(Node::new(root, Arc::new(Env::new()), None)), fml)
            .unwrap();
        let mut patch = Patch::new();
        for id in ids {
            let mut env = Env::new();
            env.insert("v".into(), ctx(*id));
            let node = Node::new(sub, Arc::new(env), Some(CtxId::from(*id)));
            let kid = tree.graft(Some(root), Fragment::new(node), fml).unwrap();
            patch.truth(kid, true);
            patch.kid_vt(root, CtxId::from(*id), true);
        }
        patch.truth(root, true);
        tree.apply(patch, Stage::Commit).unwrap();
        tree
    }

    #[test]
    fn graft_and_remove() {
        let fml = fml();
        let mut tree = tree(&fml, &[0, 1, 2]);
        let root = tree.get_root().unwrap();
        tree.check(&fml).unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree[root].fresh(), 3);
        assert_eq!(tree.nodes_over("P"), vec![root]);

        tree.touch(root).unwrap();
        let kid = tree[root].kids()[1];
        tree.remove(kid, &fml).unwrap();
        assert!(tree[root].pruned());
        assert_eq!(tree[root].fresh(), 0);
        assert_eq!(tree.len(), 3);
        assert!(!tree[root].kids_vt().contains_key(&CtxId::from(1)));
        tree.check(&fml).unwrap();

        // Freed slots are reused.
        let sub = tree[tree[root].kids()[0]].fml();
        let node = Node::new(sub, Arc::new(Env::new()), Some(CtxId::from(7)));
        let new = tree.graft(Some(root), Fragment::new(node), &fml).unwrap();
        assert_eq!(new, kid);
        assert_eq!(tree[root].fresh_kids(), &[new]);
        // Not evaluated, not in the child map.
        assert!(tree[new].committed().is_err());
        assert!(tree.check(&fml).is_err())
    }

    #[test]
    fn staging() {
        let fml = fml();
        let mut tree = tree(&fml, &[0]);
        let root = tree.get_root().unwrap();
        let mut patch = Patch::new();
        patch.truth(root, false);
        tree.apply(patch, Stage::Virtual).unwrap();
        assert_eq!(tree[root].truth(), Truth::True);
        assert_eq!(tree[root].vtruth(), Truth::False);
        assert!(tree.check(&fml).is_err());
        tree.commit().unwrap();
        assert_eq!(tree[root].truth(), Truth::False);
        tree.check(&fml).unwrap()
    }

    #[test]
    fn rebinding() {
        let fml = fml();
        let mut tree = tree(&fml, &[0, 1]);
        let root = tree.get_root().unwrap();
        let kid = tree[root].kids()[0];
        let mut patch = Patch::new();
        let links = LinkSet::new().with_binding(LinkKind::Violated, "v", 0.into());
        patch.links(root, Arc::new(links));
        tree.apply(patch, Stage::Commit).unwrap();

        tree.rebind(kid, "v", &ctx(5)).unwrap();
        tree.rename_links("v", 0.into(), 5.into());
        assert_eq!(tree[kid].bound(), Some(CtxId::from(5)));
        assert_eq!(tree[kid].env()["v"].id(), CtxId::from(5));
        assert!(tree[root].links().unwrap().mentions("v", 5.into()));
        tree.check(&fml).unwrap()
    }

    #[test]
    fn freed_nodes_are_inconsistencies() {
        let fml = fml();
        let mut tree = tree(&fml, &[0, 1]);
        let root = tree.get_root().unwrap();
        let kid = tree[root].kids()[0];
        tree.remove(kid, &fml).unwrap();
        assert!(tree.get(kid).is_none());

        let err = tree.subtree(kid).unwrap_err();
        assert!(err.is_fatal());
        let err = tree.rebind(kid, "v", &ctx(5)).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(tree.subtree(root).unwrap().len(), tree.len());
        tree.check(&fml).unwrap()
    }
}
