//! Per-rule fact store: context pools and per-cycle deltas.

use crate::{common::*, context::*};

/// Changes of one pattern during the current cycle.
///
/// The three sets are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// Contexts added.
    pub added: BTreeMap<CtxId, Ctx>,
    /// Contexts deleted, with the value they had before the cycle.
    pub deleted: BTreeMap<CtxId, Ctx>,
    /// Contexts updated, old value and new value.
    pub updated: BTreeMap<CtxId, (Ctx, Ctx)>,
}
impl Delta {
    /// True if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }
}

/// Pools of live contexts per pattern, and deltas for the current cycle.
///
/// Pools are updated as soon as a change is applied. Deltas are only
/// populated by [`apply_batch`][batch] and survive until
/// [`clear_deltas`][clear].
///
/// [batch]: #method.apply_batch (apply_batch function)
/// [clear]: #method.clear_deltas (clear_deltas function)
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    pools: BTreeMap<String, BTreeMap<CtxId, Ctx>>,
    deltas: BTreeMap<String, Delta>,
}
impl FactStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Live contexts of a pattern, in id order.
    pub fn domain(&self, pat: &str) -> Vec<Ctx> {
        self.pools
            .get(pat)
            .map(|pool| pool.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live contexts of a pattern.
    pub fn pool_len(&self, pat: &str) -> usize {
        self.pools.get(pat).map(|pool| pool.len()).unwrap_or(0)
    }

    /// True if a context is live.
    pub fn contains(&self, pat: &str, id: CtxId) -> bool {
        self.get(pat, id).is_some()
    }

    /// Live context of a pattern.
    pub fn get(&self, pat: &str, id: CtxId) -> Option<&Ctx> {
        self.pools.get(pat).and_then(|pool| pool.get(&id))
    }

    /// Delta of a pattern for the current cycle.
    pub fn delta(&self, pat: &str) -> Option<&Delta> {
        self.deltas.get(pat)
    }

    /// Sizes of the delta of a pattern: added, deleted, updated.
    pub fn delta_sizes(&self, pat: &str) -> (usize, usize, usize) {
        self.delta(pat)
            .map(|d| (d.added.len(), d.deleted.len(), d.updated.len()))
            .unwrap_or((0, 0, 0))
    }

    /// True if some delta is not empty.
    pub fn has_deltas(&self) -> bool {
        self.deltas.values().any(|d| !d.is_empty())
    }

    /// Forgets the deltas of the current cycle.
    pub fn clear_deltas(&mut self) {
        self.deltas.clear()
    }

    /// Applies a single change to the pools, leaves the deltas untouched.
    pub fn apply_one(&mut self, change: &ContextChange) -> Res<()> {
        let pool = self.pools.entry(change.pat.clone()).or_default();
        let id = change.id();
        match change.kind {
            ChangeKind::Addition => {
                if pool.insert(id, change.ctx.clone()).is_some() {
                    bail!(inconsistent(format!(
                        "adding context `{}` to `{}` twice",
                        change.ctx, change.pat
                    )))
                }
            }
            ChangeKind::Deletion => {
                if pool.remove(&id).is_none() {
                    bail!(inconsistent(format!(
                        "deleting context `{}` absent from `{}`",
                        change.ctx, change.pat
                    )))
                }
            }
            ChangeKind::Update => {
                if pool.insert(id, change.ctx.clone()).is_none() {
                    pool.remove(&id);
                    bail!(inconsistent(format!(
                        "updating context `{}` absent from `{}`",
                        change.ctx, change.pat
                    )))
                }
            }
        }
        Ok(())
    }

    /// Applies a batch to the pools and records the normalized deltas.
    ///
    /// - an addition followed by a deletion of the same context cancels out,
    /// - a deletion followed by an addition of a live context is an update,
    /// - an update of a context added in the batch is still an addition.
    pub fn apply_batch(&mut self, batch: &[ContextChange]) -> Res<()> {
        for change in batch {
            let old = self.get(&change.pat, change.id()).cloned();
            self.apply_one(change)?;
            let delta = self.deltas.entry(change.pat.clone()).or_default();
            let id = change.id();
            match change.kind {
                ChangeKind::Addition => {
                    if let Some(before) = delta.deleted.remove(&id) {
                        delta.updated.insert(id, (before, change.ctx.clone()));
                    } else {
                        delta.added.insert(id, change.ctx.clone());
                    }
                }
                ChangeKind::Deletion => {
                    // Deleting something added in this batch leaves no trace.
                    if delta.added.remove(&id).is_none() {
                        if let Some((before, _)) = delta.updated.remove(&id) {
                            delta.deleted.insert(id, before);
                        } else if let Some(old) = old {
                            delta.deleted.insert(id, old);
                        }
                    }
                }
                ChangeKind::Update => {
                    if let Some(added) = delta.added.get_mut(&id) {
                        *added = change.ctx.clone()
                    } else if let Some(&mut (_, ref mut new)) = delta.updated.get_mut(&id) {
                        *new = change.ctx.clone()
                    } else if let Some(old) = old {
                        delta.updated.insert(id, (old, change.ctx.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Replaces a live context by another one, without any delta.
    pub fn swap(&mut self, pat: &str, old: CtxId, new: Ctx) -> Res<()> {
        let pool = self.pools.entry(pat.into()).or_default();
        if pool.remove(&old).is_none() {
            bail!(inconsistent(format!(
                "swapping context #{} absent from `{}`",
                old, pat
            )))
        }
        let id = new.id();
        if pool.insert(id, new).is_some() {
            bail!(inconsistent(format!(
                "swapping in context #{} already live in `{}`",
                id, pat
            )))
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(id: usize, state: &str) -> Ctx {
        let mut attrs = BTreeMap::new();
        attrs.insert("state".to_string(), state.to_string());
        Arc::new(Context::new(id.into(), attrs))
    }

    #[test]
    fn single_changes() {
        let mut store = FactStore::new();
        store.apply_one(&ContextChange::add("P", ctx(0, "1"))).unwrap();
        assert!(store.contains("P", 0.into()));
        let err = store
            .apply_one(&ContextChange::add("P", ctx(0, "1")))
            .unwrap_err();
        assert!(err.is_fatal());
        store.apply_one(&ContextChange::upd("P", ctx(0, "0"))).unwrap();
        assert_eq!(store.get("P", 0.into()).unwrap().attr("state"), Some("0"));
        store.apply_one(&ContextChange::del("P", ctx(0, "0"))).unwrap();
        assert_eq!(store.pool_len("P"), 0);
        assert!(store
            .apply_one(&ContextChange::del("P", ctx(0, "0")))
            .is_err());
        assert!(!store.has_deltas())
    }

    #[test]
    fn batch_normalization() {
        let mut store = FactStore::new();
        store.apply_one(&ContextChange::add("P", ctx(0, "1"))).unwrap();
        store.apply_one(&ContextChange::add("P", ctx(1, "1"))).unwrap();
        store
            .apply_batch(&[
                // Cancels out.
                ContextChange::add("P", ctx(2, "1")),
                ContextChange::del("P", ctx(2, "1")),
                // Becomes an update.
                ContextChange::del("P", ctx(0, "1")),
                ContextChange::add("P", ctx(0, "0")),
                // Stays an addition.
                ContextChange::add("P", ctx(3, "1")),
                ContextChange::upd("P", ctx(3, "0")),
                // Plain deletion.
                ContextChange::del("P", ctx(1, "1")),
            ])
            .unwrap();
        let delta = store.delta("P").unwrap();
        assert_eq!(delta.added.keys().cloned().collect::<Vec<_>>(), vec![CtxId::from(3)]);
        assert_eq!(delta.added[&CtxId::from(3)].attr("state"), Some("0"));
        assert_eq!(delta.deleted.keys().cloned().collect::<Vec<_>>(), vec![CtxId::from(1)]);
        let (old, new) = &delta.updated[&CtxId::from(0)];
        assert_eq!(old.attr("state"), Some("1"));
        assert_eq!(new.attr("state"), Some("0"));
        assert_eq!(store.delta_sizes("P"), (1, 1, 1));
        assert_eq!(store.pool_len("P"), 2);
        store.clear_deltas();
        assert!(!store.has_deltas())
    }

    #[test]
    fn swapping() {
        let mut store = FactStore::new();
        store.apply_one(&ContextChange::add("P", ctx(0, "1"))).unwrap();
        store.swap("P", 0.into(), ctx(7, "1")).unwrap();
        assert!(!store.contains("P", 0.into()));
        assert!(store.contains("P", 7.into()));
        assert!(store.swap("P", 0.into(), ctx(8, "1")).is_err())
    }
}
