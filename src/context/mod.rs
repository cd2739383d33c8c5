//! Contexts, context changes, and the fact store.
//!
//! A [`Context`] is an identity-bearing tuple of string attributes. Its
//! identity is a [`CtxId`] allocated by the [`ContextManager`], attribute
//! values never take part in identity.
//!
//! [`Context`]: struct.Context.html (Context struct)
//! [`CtxId`]: ../common/struct.CtxId.html (CtxId struct)
//! [`ContextManager`]: struct.ContextManager.html (ContextManager struct)

use crate::common::*;

mod manager;
mod pool;

pub use self::manager::ContextManager;
pub use self::pool::{Delta, FactStore};

/// A context, a fact belonging to a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// Identity.
    id: CtxId,
    /// Attributes.
    attrs: BTreeMap<String, String>,
}
impl Context {
    /// Constructor.
    pub fn new(id: CtxId, attrs: BTreeMap<String, String>) -> Self {
        Context { id, attrs }
    }

    /// Identity.
    #[inline]
    pub fn id(&self) -> CtxId {
        self.id
    }

    /// Attributes.
    #[inline]
    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    /// Value of an attribute.
    pub fn attr(&self, attr: &str) -> Option<&str> {
        self.attrs.get(attr).map(|s| &s[..])
    }

    /// Display name, the `name` attribute if any.
    pub fn name(&self) -> String {
        if let Some(name) = self.attr("name") {
            name.into()
        } else {
            format!("ctx#{}", self.id)
        }
    }

    /// Same context with an attribute overwritten.
    pub fn with_attr<S1, S2>(&self, attr: S1, value: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let mut attrs = self.attrs.clone();
        attrs.insert(attr.into(), value.into());
        Context { id: self.id, attrs }
    }
}
impl fmt::Display for Context {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.name())
    }
}

/// Shared context.
pub type Ctx = Arc<Context>;

/// Variable environment, maps variables to the context they are bound to.
pub type Env = BTreeMap<String, Ctx>;

/// Substitution of a single variable, used when probing branches.
#[derive(Debug, Clone)]
pub struct Subst {
    /// Variable substituted.
    pub var: String,
    /// Context the variable is mapped to.
    pub ctx: Ctx,
}

/// Looks up a variable, giving priority to the substitution.
pub fn lookup<'a>(env: &'a Env, subst: Option<&'a Subst>, var: &str) -> Option<&'a Ctx> {
    match subst {
        Some(subst) if subst.var == var => Some(&subst.ctx),
        _ => env.get(var),
    }
}

/// Kind of a context change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    /// Addition of a new context.
    Addition,
    /// Deletion of a live context.
    Deletion,
    /// New value for a live context.
    Update,
}
impl ChangeKind {
    /// Addition and deletion are opposite, updates have no opposite.
    pub fn is_opposite(self, other: Self) -> bool {
        use self::ChangeKind::*;
        matches!((self, other), (Addition, Deletion) | (Deletion, Addition))
    }
}
impl fmt::Display for ChangeKind {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChangeKind::Addition => write!(fmt, "+"),
            ChangeKind::Deletion => write!(fmt, "-"),
            ChangeKind::Update => write!(fmt, "~"),
        }
    }
}

/// A change in the set of contexts of a pattern.
///
/// The context of a deletion is the value being deleted, the context of an
/// update is the new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextChange {
    /// Kind of change.
    pub kind: ChangeKind,
    /// Pattern of the context.
    pub pat: String,
    /// Context.
    pub ctx: Ctx,
}
impl ContextChange {
    /// Constructor.
    pub fn new<S: Into<String>>(kind: ChangeKind, pat: S, ctx: Ctx) -> Self {
        ContextChange {
            kind,
            pat: pat.into(),
            ctx,
        }
    }
    /// Addition constructor.
    pub fn add<S: Into<String>>(pat: S, ctx: Ctx) -> Self {
        Self::new(ChangeKind::Addition, pat, ctx)
    }
    /// Deletion constructor.
    pub fn del<S: Into<String>>(pat: S, ctx: Ctx) -> Self {
        Self::new(ChangeKind::Deletion, pat, ctx)
    }
    /// Update constructor.
    pub fn upd<S: Into<String>>(pat: S, ctx: Ctx) -> Self {
        Self::new(ChangeKind::Update, pat, ctx)
    }

    /// Identity of the context changed.
    #[inline]
    pub fn id(&self) -> CtxId {
        self.ctx.id()
    }
}
impl fmt::Display for ContextChange {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "({} {} {})", self.kind, self.pat, self.ctx)
    }
}
