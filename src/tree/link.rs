//! Links, the variable bindings explaining the truth of a node.

use crate::common::*;

/// Kind of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkKind {
    /// The bindings violate the formula.
    Violated,
    /// The bindings satisfy the formula.
    Satisfied,
}
impl LinkKind {
    /// Opposite kind.
    pub fn flip(self) -> Self {
        match self {
            LinkKind::Violated => LinkKind::Satisfied,
            LinkKind::Satisfied => LinkKind::Violated,
        }
    }
}
impl fmt::Display for LinkKind {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinkKind::Violated => write!(fmt, "violated"),
            LinkKind::Satisfied => write!(fmt, "satisfied"),
        }
    }
}

/// A set of bindings of variables to contexts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Link {
    kind: LinkKind,
    bindings: BTreeMap<String, CtxId>,
}
impl Link {
    /// Constructor.
    pub fn new(kind: LinkKind, bindings: BTreeMap<String, CtxId>) -> Self {
        Link { kind, bindings }
    }

    /// Kind.
    pub fn kind(&self) -> LinkKind {
        self.kind
    }
    /// Bindings.
    pub fn bindings(&self) -> &BTreeMap<String, CtxId> {
        &self.bindings
    }

    /// Union of the bindings of two links, the kind of `self` is kept.
    fn merge(&self, other: &Self) -> Self {
        let mut bindings = self.bindings.clone();
        for (var, id) in &other.bindings {
            bindings.insert(var.clone(), *id);
        }
        Link {
            kind: self.kind,
            bindings,
        }
    }

    /// True if `self` has the same kind as `other` and strictly more
    /// bindings.
    fn subsumed_by(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.bindings.len() > other.bindings.len()
            && other
                .bindings
                .iter()
                .all(|(var, id)| self.bindings.get(var) == Some(id))
    }
}
impl fmt::Display for Link {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "({}", self.kind)?;
        for (var, id) in &self.bindings {
            write!(fmt, " ({} #{})", var, id)?
        }
        write!(fmt, ")")
    }
}

/// A set of links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSet(BTreeSet<Link>);
impl LinkSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Number of links.
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// Iterator over the links.
    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.0.iter()
    }

    /// Adds a link.
    pub fn insert(&mut self, link: Link) {
        self.0.insert(link);
    }

    /// Set union.
    pub fn union(&mut self, other: &Self) {
        self.0.extend(other.0.iter().cloned())
    }

    /// Cartesian product, merging the bindings of each pair.
    ///
    /// The product of an empty set with another set is the other set.
    pub fn cartesian(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let mut res = LinkSet::new();
        for lft in &self.0 {
            for rgt in &other.0 {
                res.insert(lft.merge(rgt))
            }
        }
        res
    }

    /// Same links, opposite kind.
    pub fn flipped(&self) -> Self {
        LinkSet(
            self.0
                .iter()
                .map(|link| Link {
                    kind: link.kind.flip(),
                    bindings: link.bindings.clone(),
                })
                .collect(),
        )
    }

    /// Adds a binding to all links, and sets their kind.
    ///
    /// If the set is empty, the result is a single link with only this
    /// binding.
    pub fn with_binding(&self, kind: LinkKind, var: &str, id: CtxId) -> Self {
        if self.is_empty() {
            let mut bindings = BTreeMap::new();
            bindings.insert(var.to_string(), id);
            let mut res = LinkSet::new();
            res.insert(Link::new(kind, bindings));
            return res;
        }
        LinkSet(
            self.0
                .iter()
                .map(|link| {
                    let mut bindings = link.bindings.clone();
                    bindings.insert(var.to_string(), id);
                    Link { kind, bindings }
                })
                .collect(),
        )
    }

    /// Links that are not a strict superset of another link.
    pub fn minimal(&self) -> Vec<Link> {
        self.0
            .iter()
            .filter(|link| !self.0.iter().any(|other| link.subsumed_by(other)))
            .cloned()
            .collect()
    }

    /// True if some link binds `var` to `id`.
    pub fn mentions(&self, var: &str, id: CtxId) -> bool {
        self.0
            .iter()
            .any(|link| link.bindings.get(var) == Some(&id))
    }

    /// Renames the bindings of `var` to `old` as bindings to `new`.
    pub fn rename(&self, var: &str, old: CtxId, new: CtxId) -> Self {
        LinkSet(
            self.0
                .iter()
                .map(|link| {
                    let mut link = link.clone();
                    if let Some(id) = link.bindings.get_mut(var) {
                        if *id == old {
                            *id = new
                        }
                    }
                    link
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(var: &str, id: usize) -> LinkSet {
        LinkSet::new().with_binding(LinkKind::Violated, var, id.into())
    }

    #[test]
    fn products_and_unions() {
        let empty = LinkSet::new();
        let v0 = single("v", 0);
        assert_eq!(empty.cartesian(&v0), v0);
        assert_eq!(v0.cartesian(&empty), v0);

        let mut vs = single("v", 0);
        vs.union(&single("v", 1));
        let prod = vs.cartesian(&single("w", 2));
        assert_eq!(prod.len(), 2);
        assert!(prod.iter().all(|link| link.bindings().len() == 2));
        assert!(prod.mentions("w", 2.into()));

        let flipped = prod.flipped();
        assert!(flipped.iter().all(|l| l.kind() == LinkKind::Satisfied));
        assert_eq!(flipped.flipped(), prod)
    }

    #[test]
    fn minimality() {
        let mut set = single("v", 0);
        let mut bigger = single("v", 0).with_binding(LinkKind::Violated, "w", 1.into());
        bigger.union(&single("v", 3));
        set.union(&bigger);
        let minimal = set.minimal();
        assert_eq!(minimal.len(), 2);
        assert!(minimal.iter().all(|link| link.bindings().len() == 1))
    }

    #[test]
    fn renaming() {
        let set = single("v", 0).with_binding(LinkKind::Violated, "w", 0.into());
        let renamed = set.rename("v", 0.into(), 5.into());
        assert!(renamed.mentions("v", 5.into()));
        assert!(!renamed.mentions("v", 0.into()));
        assert!(renamed.mentions("w", 0.into()))
    }
}
