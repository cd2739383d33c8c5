//! Formulas, stored as flat arenas of nodes.
//!
//! A [`Formula`] is immutable once built by a [`FormulaBuilder`]. Besides the
//! nodes themselves it carries the per-pattern metadata the checker and the
//! scheduler need:
//!
//! - the variable a pattern is bound to and the quantifier binding it,
//! - the nesting depth of each pattern,
//! - the *inc+* and *inc-* sets: a change kind on a pattern is *inc+* if it can
//!   turn the rule from true to false, *inc-* if it can turn it from false to
//!   true.
//!
//! [`Formula`]: struct.Formula.html (Formula struct)
//! [`FormulaBuilder`]: struct.FormulaBuilder.html (FormulaBuilder struct)

use crate::{
    common::*,
    context::{ChangeKind, Context, ContextChange, Env},
    tree::{LinkKind, Truth},
};

mod build;

pub use self::build::FormulaBuilder;

/// Kind of quantifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QKind {
    /// Universal.
    Forall,
    /// Existential.
    Exists,
}
impl QKind {
    /// Truth of the quantifier over an empty domain.
    pub fn unit(self) -> bool {
        self == QKind::Forall
    }

    /// Folds the truth of some children.
    ///
    /// Consumes the whole iterator.
    pub fn fold<I: IntoIterator<Item = bool>>(self, truths: I) -> bool {
        let unit = self.unit();
        truths
            .into_iter()
            .fold(unit, |acc, t| if unit { acc && t } else { acc || t })
    }

    /// Truth of the children that explain the truth of the quantifier.
    ///
    /// False for forall, true for exists.
    pub fn witness_truth(self) -> bool {
        !self.unit()
    }

    /// Kind of the links generated by this quantifier.
    pub fn link_kind(self) -> LinkKind {
        match self {
            QKind::Forall => LinkKind::Violated,
            QKind::Exists => LinkKind::Satisfied,
        }
    }
}
impl fmt::Display for QKind {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QKind::Forall => write!(fmt, "forall"),
            QKind::Exists => write!(fmt, "exists"),
        }
    }
}

/// Restriction of the domain of a quantifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Only contexts with an identity greater than that of `dep`.
    Greater {
        /// Variable of an enclosing quantifier.
        dep: String,
    },
}
impl Filter {
    /// Constructor from a filter name.
    pub fn of_str<S: Into<String>>(name: &str, dep: S) -> Option<Self> {
        match name {
            "greater" => Some(Filter::Greater { dep: dep.into() }),
            _ => None,
        }
    }

    /// Variable the filter depends on.
    pub fn dep(&self) -> &str {
        match self {
            Filter::Greater { dep } => dep,
        }
    }

    /// True if the filter admits a context under some environment.
    ///
    /// The dependency is always bound in well-formed formulas.
    pub fn admits(&self, env: &Env, ctx: &Context) -> bool {
        match self {
            Filter::Greater { dep } => env
                .get(dep)
                .map(|bound| ctx.id() > bound.id())
                .unwrap_or(false),
        }
    }
}
impl fmt::Display for Filter {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Filter::Greater { dep } => write!(fmt, ":filter greater {}", dep),
        }
    }
}

/// A quantifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quant {
    /// Bound variable.
    pub var: String,
    /// Pattern the variable ranges over.
    pub pat: String,
    /// Body.
    pub sub: FIdx,
    /// Optional domain restriction.
    pub filter: Option<Filter>,
}
impl Quant {
    /// True if the domain of this quantifier admits a context.
    pub fn admits(&self, env: &Env, ctx: &Context) -> bool {
        self.filter
            .as_ref()
            .map(|filter| filter.admits(env, ctx))
            .unwrap_or(true)
    }

    /// Environment extended with a binding of the variable.
    pub fn bind(&self, env: &Env, ctx: &Arc<Context>) -> Arc<Env> {
        let mut env = env.clone();
        env.insert(self.var.clone(), ctx.clone());
        Arc::new(env)
    }
}

/// A boolean function application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BFunc {
    /// Predicate name.
    pub name: String,
    /// Parameter positions and the variables bound to them.
    pub params: Vec<(String, String)>,
}

/// A formula node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FNode {
    /// Universal quantifier.
    Forall(Quant),
    /// Existential quantifier.
    Exists(Quant),
    /// Conjunction.
    And(FIdx, FIdx),
    /// Disjunction.
    Or(FIdx, FIdx),
    /// Implication.
    Implies(FIdx, FIdx),
    /// Negation.
    Not(FIdx),
    /// Predicate application.
    BFunc(BFunc),
}
impl FNode {
    /// Quantifier information, if any.
    pub fn quant(&self) -> Option<(QKind, &Quant)> {
        match self {
            FNode::Forall(q) => Some((QKind::Forall, q)),
            FNode::Exists(q) => Some((QKind::Exists, q)),
            _ => None,
        }
    }

    /// Direct sub-formulas.
    pub fn kids(&self) -> Vec<FIdx> {
        match *self {
            FNode::Forall(ref q) | FNode::Exists(ref q) => vec![q.sub],
            FNode::And(a, b) | FNode::Or(a, b) | FNode::Implies(a, b) => vec![a, b],
            FNode::Not(a) => vec![a],
            FNode::BFunc(_) => vec![],
        }
    }
}

/// Repair operations that can be disabled on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RepairKind {
    /// Adding a context.
    Addition,
    /// Removing a context.
    Removal,
    /// Updating a context.
    Update,
}

/// How a change can impact the truth of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncType {
    /// Can turn the rule from true to false.
    Plus,
    /// Can turn the rule from false to true.
    Minus,
    /// Both.
    Both,
    /// The rule does not mention the pattern.
    None,
}
impl IncType {
    /// True for `Plus` and `Both`.
    pub fn is_plus(self) -> bool {
        matches!(self, IncType::Plus | IncType::Both)
    }
    /// True for `Minus` and `Both`.
    pub fn is_minus(self) -> bool {
        matches!(self, IncType::Minus | IncType::Both)
    }
}

/// Release conditions of a quantifier node.
///
/// `rc[kind]` is the set of virtual truths a change of kind `kind` can move
/// the node to, `re[kind]` the set of virtual truths it can release the node
/// from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseConds {
    /// Reachable virtual truths.
    pub rc: BTreeMap<ChangeKind, BTreeSet<Truth>>,
    /// Released virtual truths.
    pub re: BTreeMap<ChangeKind, BTreeSet<Truth>>,
}

/// A formula and its per-pattern metadata.
#[derive(Debug, Clone)]
pub struct Formula {
    /// Rule this formula belongs to.
    rule: String,
    /// Nodes.
    nodes: Vec<FNode>,
    /// Root.
    root: FIdx,
    /// Disabled repair operations.
    disabled: BTreeMap<FIdx, Vec<(RepairKind, String)>>,
    /// Maps variables to their pattern.
    var_to_pat: BTreeMap<String, String>,
    /// Maps patterns to the quantifier ranging over them.
    pat_to_fidx: BTreeMap<String, FIdx>,
    /// Maps patterns to their depth.
    pat_to_depth: BTreeMap<String, usize>,
    /// Maps depths to patterns.
    depth_to_pat: BTreeMap<usize, BTreeSet<String>>,
    /// Inc+ changes.
    inc_plus: BTreeSet<(ChangeKind, String)>,
    /// Inc- changes.
    inc_minus: BTreeSet<(ChangeKind, String)>,
}
impl ::std::ops::Index<FIdx> for Formula {
    type Output = FNode;
    fn index(&self, idx: FIdx) -> &FNode {
        &self.nodes[idx.get()]
    }
}
impl Formula {
    /// Rule this formula belongs to.
    pub fn rule(&self) -> &str {
        &self.rule
    }
    /// Root of the formula.
    pub fn root(&self) -> FIdx {
        self.root
    }
    /// Number of nodes, including the ones unreachable from the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    /// Always false, formulas have a root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    /// Disabled repair operations, by node.
    pub fn disabled(&self) -> &BTreeMap<FIdx, Vec<(RepairKind, String)>> {
        &self.disabled
    }

    /// Patterns mentioned, in order.
    pub fn pats(&self) -> impl Iterator<Item = &String> {
        self.pat_to_fidx.keys()
    }
    /// True if the formula quantifies over a pattern.
    pub fn mentions(&self, pat: &str) -> bool {
        self.pat_to_fidx.contains_key(pat)
    }
    /// Pattern of a variable.
    pub fn pat_of_var(&self, var: &str) -> Option<&str> {
        self.var_to_pat.get(var).map(|s| &s[..])
    }
    /// Quantifier ranging over a pattern.
    pub fn quant_of_pat(&self, pat: &str) -> Option<FIdx> {
        self.pat_to_fidx.get(pat).cloned()
    }
    /// Depth of a pattern.
    pub fn depth_of(&self, pat: &str) -> Option<usize> {
        self.pat_to_depth.get(pat).cloned()
    }
    /// Patterns by depth, deepest last.
    pub fn depth_to_pat(&self) -> &BTreeMap<usize, BTreeSet<String>> {
        &self.depth_to_pat
    }

    /// True if some filter depends on a variable.
    pub fn filter_depends_on(&self, var: &str) -> bool {
        self.nodes.iter().any(|node| {
            node.quant()
                .and_then(|(_, q)| q.filter.as_ref())
                .map(|filter| filter.dep() == var)
                .unwrap_or(false)
        })
    }

    /// Inc type of a change kind on a pattern.
    pub fn inc_type_of(&self, kind: ChangeKind, pat: &str) -> IncType {
        if !self.mentions(pat) {
            return IncType::None;
        }
        if kind == ChangeKind::Update {
            return IncType::Both;
        }
        let key = (kind, pat.to_string());
        match (self.inc_plus.contains(&key), self.inc_minus.contains(&key)) {
            (true, true) => IncType::Both,
            (true, false) => IncType::Plus,
            (false, true) => IncType::Minus,
            (false, false) => IncType::None,
        }
    }

    /// Inc type of a change.
    pub fn inc_type(&self, change: &ContextChange) -> IncType {
        self.inc_type_of(change.kind, &change.pat)
    }

    /// Release conditions of a quantifier given its cached truth.
    ///
    /// Advisory metadata, `None` if `fidx` is not a quantifier or the truth
    /// is unknown.
    pub fn release_conditions(&self, fidx: FIdx, truth: Truth) -> Option<ReleaseConds> {
        let (kind, _) = self[fidx].quant()?;
        let truth = truth.to_bool()?;
        let mut conds = ReleaseConds::default();
        let (add, del) = (ChangeKind::Addition, ChangeKind::Deletion);
        if truth == kind.unit() {
            conds.rc.entry(add).or_default().insert(Truth::Unknown);
            conds.re.entry(del).or_default().insert(Truth::Unknown);
        } else {
            let reach = conds.rc.entry(del).or_default();
            reach.insert(Truth::Unknown);
            reach.insert(Truth::of_bool(truth));
            conds.re.entry(add).or_default().insert(Truth::Unknown);
        }
        Some(conds)
    }

    /// Writes a node.
    fn write_node(&self, w: &mut fmt::Formatter, idx: FIdx) -> fmt::Result {
        match &self[idx] {
            FNode::Forall(q) | FNode::Exists(q) => {
                let kind = if let FNode::Forall(_) = self[idx] {
                    QKind::Forall
                } else {
                    QKind::Exists
                };
                write!(w, "({} {} {} ", kind, q.var, q.pat)?;
                if let Some(filter) = &q.filter {
                    write!(w, "{} ", filter)?
                }
                self.write_node(w, q.sub)?;
                write!(w, ")")
            }
            FNode::And(a, b) | FNode::Or(a, b) | FNode::Implies(a, b) => {
                let op = match self[idx] {
                    FNode::And(_, _) => "and",
                    FNode::Or(_, _) => "or",
                    _ => "implies",
                };
                write!(w, "({} ", op)?;
                self.write_node(w, *a)?;
                write!(w, " ")?;
                self.write_node(w, *b)?;
                write!(w, ")")
            }
            FNode::Not(a) => {
                write!(w, "(not ")?;
                self.write_node(w, *a)?;
                write!(w, ")")
            }
            FNode::BFunc(bfunc) => {
                write!(w, "(bfunc {}", bfunc.name)?;
                for (pos, var) in &bfunc.params {
                    write!(w, " ({} {})", pos, var)?
                }
                write!(w, ")")
            }
        }
    }
}
impl fmt::Display for Formula {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        self.write_node(fmt, self.root)
    }
}
