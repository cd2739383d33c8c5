//! Staged writes to an instantiation tree, and detached subtrees.

use crate::{common::*, tree::*};

/// How truth writes are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Writes both the truth and the virtual truth.
    Commit,
    /// Only writes the virtual truth, the truth is written by
    /// [`Tree::commit`][commit].
    ///
    /// [commit]: struct.Tree.html#method.commit (commit function of Tree)
    Virtual,
}

/// Writes produced by evaluation tasks, applied by the thread that joins them.
///
/// Tasks only read the tree, so they can run in parallel on disjoint
/// subtrees. A patch is applied by [`Tree::apply`][apply].
///
/// [apply]: struct.Tree.html#method.apply (apply function of Tree)
#[derive(Debug, Default)]
pub struct Patch {
    truths: Vec<(NodeIdx, Truth)>,
    kids_vt: Vec<(NodeIdx, CtxId, Truth)>,
    links: Vec<(NodeIdx, Arc<LinkSet>)>,
    substantial: Vec<NodeIdx>,
}
impl Patch {
    /// Empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the patch writes nothing.
    pub fn is_empty(&self) -> bool {
        self.truths.is_empty()
            && self.kids_vt.is_empty()
            && self.links.is_empty()
            && self.substantial.is_empty()
    }

    /// Truth writes.
    pub fn truths(&self) -> &[(NodeIdx, Truth)] {
        &self.truths
    }

    /// Stages the truth of a node.
    pub fn truth(&mut self, node: NodeIdx, truth: bool) {
        self.truths.push((node, Truth::of_bool(truth)))
    }
    /// Stages the virtual truth of a child in its parent's map.
    pub fn kid_vt(&mut self, parent: NodeIdx, kid: CtxId, truth: bool) {
        self.kids_vt.push((parent, kid, Truth::of_bool(truth)))
    }
    /// Stages the links of a node.
    pub fn links(&mut self, node: NodeIdx, links: Arc<LinkSet>) {
        self.links.push((node, links))
    }
    /// Marks a node as substantial for the current cycle.
    pub fn substantial(&mut self, node: NodeIdx) {
        self.substantial.push(node)
    }

    /// Appends the writes of another patch.
    pub fn extend(&mut self, other: Patch) {
        self.truths.extend(other.truths);
        self.kids_vt.extend(other.kids_vt);
        self.links.extend(other.links);
        self.substantial.extend(other.substantial);
    }

    /// Destructor.
    pub(crate) fn destroy(
        self,
    ) -> (
        Vec<(NodeIdx, Truth)>,
        Vec<(NodeIdx, CtxId, Truth)>,
        Vec<(NodeIdx, Arc<LinkSet>)>,
        Vec<NodeIdx>,
    ) {
        (self.truths, self.kids_vt, self.links, self.substantial)
    }
}

/// A subtree built outside of the tree, grafted by
/// [`Tree::graft`][graft].
///
/// Node indices in a fragment are local, its root has index `0`.
///
/// [graft]: struct.Tree.html#method.graft (graft function of Tree)
#[derive(Debug)]
pub struct Fragment {
    nodes: Vec<Node>,
}
impl Fragment {
    /// Fragment with a single node.
    pub fn new(root: Node) -> Self {
        Fragment { nodes: vec![root] }
    }

    /// Root of the fragment.
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    /// Always false.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends `other` as the last child of the local node `parent`.
    pub fn absorb(&mut self, parent: usize, other: Fragment) {
        let offset = self.nodes.len();
        let shift = |idx: NodeIdx| NodeIdx::from(idx.get() + offset);
        for (local, mut node) in other.nodes.into_iter().enumerate() {
            node.kids = node.kids.into_iter().map(shift).collect();
            node.parent = if local == 0 {
                Some(NodeIdx::from(parent))
            } else {
                node.parent.map(shift)
            };
            self.nodes.push(node)
        }
        self.nodes[parent].kids.push(NodeIdx::from(offset))
    }

    /// Destructor.
    pub(crate) fn destroy(self) -> Vec<Node> {
        self.nodes
    }
}
