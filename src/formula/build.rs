//! Formula construction and validation.

use crate::{
    common::*,
    context::ChangeKind,
    formula::{BFunc, FNode, Filter, Formula, Quant, RepairKind},
};

/// Builds formulas bottom-up.
///
/// Constructors return the index of the node they create, which is then used
/// to build bigger nodes. Nothing is checked until [`build`][build].
///
/// ```
/// use ccmon::formula::FormulaBuilder;
/// let mut b = FormulaBuilder::new("not_still");
/// let leaf = b.bfunc("not_still", vec![("v1", "v")]);
/// let root = b.forall("v", "P", leaf);
/// let fml = b.build(root).unwrap();
/// assert_eq!(fml.depth_of("P"), Some(1));
/// ```
///
/// [build]: #method.build (build function)
pub struct FormulaBuilder {
    rule: String,
    nodes: Vec<FNode>,
    disabled: BTreeMap<FIdx, Vec<(RepairKind, String)>>,
}
impl FormulaBuilder {
    /// Constructor.
    pub fn new<S: Into<String>>(rule: S) -> Self {
        FormulaBuilder {
            rule: rule.into(),
            nodes: vec![],
            disabled: BTreeMap::new(),
        }
    }

    fn push(&mut self, node: FNode) -> FIdx {
        let idx = FIdx::from(self.nodes.len());
        self.nodes.push(node);
        idx
    }

    fn quant<S1, S2>(var: S1, pat: S2, sub: FIdx) -> Quant
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Quant {
            var: var.into(),
            pat: pat.into(),
            sub,
            filter: None,
        }
    }

    /// Universal quantifier.
    pub fn forall<S1, S2>(&mut self, var: S1, pat: S2, sub: FIdx) -> FIdx
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.push(FNode::Forall(Self::quant(var, pat, sub)))
    }
    /// Existential quantifier.
    pub fn exists<S1, S2>(&mut self, var: S1, pat: S2, sub: FIdx) -> FIdx
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.push(FNode::Exists(Self::quant(var, pat, sub)))
    }
    /// Conjunction.
    pub fn and(&mut self, lhs: FIdx, rhs: FIdx) -> FIdx {
        self.push(FNode::And(lhs, rhs))
    }
    /// Disjunction.
    pub fn or(&mut self, lhs: FIdx, rhs: FIdx) -> FIdx {
        self.push(FNode::Or(lhs, rhs))
    }
    /// Implication.
    pub fn implies(&mut self, lhs: FIdx, rhs: FIdx) -> FIdx {
        self.push(FNode::Implies(lhs, rhs))
    }
    /// Negation.
    pub fn not(&mut self, sub: FIdx) -> FIdx {
        self.push(FNode::Not(sub))
    }

    /// Predicate application.
    ///
    /// Numeric parameter positions are prefixed with `v`.
    pub fn bfunc<S, P, V>(&mut self, name: S, params: Vec<(P, V)>) -> FIdx
    where
        S: Into<String>,
        P: Into<String>,
        V: Into<String>,
    {
        let params = params
            .into_iter()
            .map(|(pos, var)| {
                let pos = pos.into();
                let pos = if !pos.is_empty() && pos.chars().all(|c| c.is_ascii_digit()) {
                    format!("v{}", pos)
                } else {
                    pos
                };
                (pos, var.into())
            })
            .collect();
        self.push(FNode::BFunc(BFunc {
            name: name.into(),
            params,
        }))
    }

    /// Sets the filter of a quantifier.
    pub fn filter<S: Into<String>>(&mut self, quant: FIdx, name: &str, dep: S) -> Res<()> {
        let filter = if let Some(filter) = Filter::of_str(name, dep) {
            filter
        } else {
            bail!(self.error(format!("unknown filter `{}`", name)))
        };
        if let Some(FNode::Forall(q)) | Some(FNode::Exists(q)) = self.nodes.get_mut(quant.get()) {
            q.filter = Some(filter);
            return Ok(());
        }
        bail!(self.error("filters can only apply to quantifiers"))
    }

    /// Disables a repair operation on a node.
    pub fn disable<S: Into<String>>(&mut self, node: FIdx, kind: RepairKind, pat: S) {
        self.disabled
            .entry(node)
            .or_default()
            .push((kind, pat.into()))
    }

    fn error<S: Into<String>>(&self, msg: S) -> Error {
        ErrorKind::RuleError(self.rule.clone(), msg.into()).into()
    }

    /// Validates the formula and computes its metadata.
    pub fn build(self, root: FIdx) -> Res<Formula> {
        if root.get() >= self.nodes.len() {
            bail!(self.error("root is not a node of the formula"))
        }
        let mut fml = Formula {
            rule: self.rule.clone(),
            nodes: self.nodes,
            root,
            disabled: self.disabled,
            var_to_pat: BTreeMap::new(),
            pat_to_fidx: BTreeMap::new(),
            pat_to_depth: BTreeMap::new(),
            depth_to_pat: BTreeMap::new(),
            inc_plus: BTreeSet::new(),
            inc_minus: BTreeSet::new(),
        };
        let mut scope = vec![];
        collect(&mut fml, root, true, &mut scope)?;
        for (pat, depth) in &fml.pat_to_depth {
            fml.depth_to_pat
                .entry(*depth)
                .or_default()
                .insert(pat.clone());
        }
        Ok(fml)
    }
}

/// Checks a node and its sub-formulas, fills the metadata. Returns the depth
/// of the node.
///
/// `pos` is the polarity of the node, `scope` the variables bound above it.
fn collect(fml: &mut Formula, idx: FIdx, pos: bool, scope: &mut Vec<String>) -> Res<usize> {
    let rule = fml.rule.clone();
    let rule_err = |msg: String| -> Error { ErrorKind::RuleError(rule.clone(), msg).into() };
    let node = fml[idx].clone();
    match node {
        FNode::Forall(ref q) | FNode::Exists(ref q) => {
            if scope.contains(&q.var) || fml.var_to_pat.contains_key(&q.var) {
                bail!(rule_err(format!("variable `{}` is bound twice", q.var)))
            }
            if fml.pat_to_fidx.contains_key(&q.pat) {
                bail!(rule_err(format!("pattern `{}` is quantified twice", q.pat)))
            }
            if let Some(filter) = &q.filter {
                if !scope.iter().any(|var| var == filter.dep()) {
                    bail!(rule_err(format!(
                        "filter of `{}` depends on unbound variable `{}`",
                        q.var,
                        filter.dep()
                    )))
                }
            }
            fml.var_to_pat.insert(q.var.clone(), q.pat.clone());
            fml.pat_to_fidx.insert(q.pat.clone(), idx);

            let universal = matches!(node, FNode::Forall(_));
            // An addition under a positive forall can falsify the rule.
            let (plus, minus) = if universal == pos {
                (ChangeKind::Addition, ChangeKind::Deletion)
            } else {
                (ChangeKind::Deletion, ChangeKind::Addition)
            };
            fml.inc_plus.insert((plus, q.pat.clone()));
            fml.inc_minus.insert((minus, q.pat.clone()));

            scope.push(q.var.clone());
            let depth = collect(fml, q.sub, pos, scope)?;
            scope.pop();
            fml.pat_to_depth.insert(q.pat.clone(), depth);
            Ok(depth + 1)
        }
        FNode::And(lhs, rhs) | FNode::Or(lhs, rhs) => {
            let l = collect(fml, lhs, pos, scope)?;
            let r = collect(fml, rhs, pos, scope)?;
            Ok(::std::cmp::max(l, r) + 1)
        }
        FNode::Implies(lhs, rhs) => {
            let l = collect(fml, lhs, !pos, scope)?;
            let r = collect(fml, rhs, pos, scope)?;
            Ok(::std::cmp::max(l, r) + 1)
        }
        FNode::Not(sub) => Ok(collect(fml, sub, !pos, scope)? + 1),
        FNode::BFunc(ref bfunc) => {
            for (pos, var) in &bfunc.params {
                if !scope.contains(var) {
                    bail!(rule_err(format!(
                        "parameter `{}` of `{}` is bound to unknown variable `{}`",
                        pos, bfunc.name, var
                    )))
                }
            }
            Ok(1)
        }
    }
}
