//! Context manager, allocates identities and produces changes.

use crate::{common::*, context::*};

/// Keeps track of the live contexts of all patterns.
///
/// This is the producer side of the change stream: every change it returns
/// is valid with respect to the contexts it produced before.
#[derive(Debug, Default)]
pub struct ContextManager {
    /// Next fresh identity.
    next: usize,
    /// Live contexts and their pattern.
    live: BTreeMap<CtxId, (String, Ctx)>,
    /// Names of live contexts.
    names: HashMap<String, CtxId>,
}
impl ContextManager {
    /// Constructor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        self.live.len()
    }
    /// True if there are no live contexts.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Creates a new context, yields its addition.
    pub fn add<S: Into<String>>(
        &mut self,
        pat: S,
        attrs: BTreeMap<String, String>,
    ) -> Res<ContextChange> {
        let pat = pat.into();
        let id = CtxId::from(self.next);
        let ctx = Arc::new(Context::new(id, attrs));
        if let Some(name) = ctx.attr("name") {
            if self.names.contains_key(name) {
                bail!("a live context is already called `{}`", conf.bad(name))
            }
            self.names.insert(name.into(), id);
        }
        self.next += 1;
        self.live.insert(id, (pat.clone(), ctx.clone()));
        Ok(ContextChange::add(pat, ctx))
    }

    /// Removes a live context, yields its deletion.
    pub fn remove(&mut self, id: CtxId) -> Res<ContextChange> {
        if let Some((pat, ctx)) = self.live.remove(&id) {
            if let Some(name) = ctx.attr("name") {
                self.names.remove(name);
            }
            Ok(ContextChange::del(pat, ctx))
        } else {
            bail!("cannot remove unknown context #{}", id)
        }
    }

    /// Changes an attribute of a live context, yields the update.
    pub fn update<S1, S2>(&mut self, id: CtxId, attr: S1, value: S2) -> Res<ContextChange>
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let mut attrs = BTreeMap::new();
        attrs.insert(attr.into(), value.into());
        self.update_attrs(id, attrs)
    }

    /// Changes some attributes of a live context, yields the update.
    ///
    /// The `name` attribute cannot change.
    pub fn update_attrs(
        &mut self,
        id: CtxId,
        attrs: BTreeMap<String, String>,
    ) -> Res<ContextChange> {
        let (pat, ctx) = if let Some(entry) = self.live.get_mut(&id) {
            entry
        } else {
            bail!("cannot update unknown context #{}", id)
        };
        let mut new = (**ctx).clone();
        for (attr, value) in attrs {
            if attr == "name" && ctx.attr("name") != Some(value.as_str()) {
                bail!("cannot rename context `{}`", ctx)
            }
            new = new.with_attr(attr, value)
        }
        *ctx = Arc::new(new);
        Ok(ContextChange::upd(pat.clone(), ctx.clone()))
    }

    /// Identity of a live context from its name.
    pub fn by_name(&self, name: &str) -> Option<CtxId> {
        self.names.get(name).cloned()
    }

    /// Pattern of a live context.
    pub fn pattern_of(&self, id: CtxId) -> Option<&str> {
        self.live.get(&id).map(|(pat, _)| &pat[..])
    }

    /// Live context.
    pub fn get(&self, id: CtxId) -> Option<&Ctx> {
        self.live.get(&id).map(|(_, ctx)| ctx)
    }

    /// Identities of the live contexts of a pattern.
    pub fn live_ids(&self, pat: &str) -> Vec<CtxId> {
        self.live
            .iter()
            .filter(|(_, (p, _))| p == pat)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Additions re-creating all the live contexts, used to seed new rules.
    pub fn snapshot(&self) -> Vec<ContextChange> {
        self.live
            .values()
            .map(|(pat, ctx)| ContextChange::add(pat.clone(), ctx.clone()))
            .collect()
    }
}
