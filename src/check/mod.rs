//! Incremental consistency checking.
//!
//! A [`Checker`] owns the rules and a worker pool. Each rule owns its formula,
//! its instantiation tree and its fact store. Changes reach a rule as batches
//! through [`Checker::check_batch`][check], and are processed by one of the
//! [`Strategy`]s:
//!
//! - `ecc`: rebuilds the tree and re-evaluates it completely,
//! - `pcc`: processes the changes one at a time, only re-evaluating the nodes
//!   whose formula mentions the pattern changed,
//! - `pccm`: processes the whole batch at once, evaluating pre-existing
//!   children precisely and new children completely,
//! - `conc`: `ecc` with the topmost quantifiers fanned out to the pool,
//! - `cpcc_nb`: `pccm` with profitable quantifiers fanned out to the pool and
//!   truth values staged until the end of the cycle.
//!
//! All strategies yield the same truth values and the same witnesses.
//!
//! Evaluation only reads the tree: evaluators take a [`Cx`] and produce
//! [`Patch`]es, which the rule applies once evaluation is over.
//!
//! [`Checker`]: struct.Checker.html (Checker struct)
//! [check]: struct.Checker.html#method.check_batch
//! (check_batch function of Checker)
//! [`Strategy`]: enum.Strategy.html (Strategy enum)
//! [`Cx`]: struct.Cx.html (Cx struct)
//! [`Patch`]: ../tree/struct.Patch.html (Patch struct)

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    common::*,
    context::{ContextChange, FactStore},
    formula::{FNode, Formula, QKind},
    pred::PredRegistry,
    tree::{Link, Node, Patch, Truth, Tree},
};

mod conc;
mod cpcc_nb;
pub mod ecc;
mod links;
pub mod modify;
mod pcc;
mod pccm;
mod rule;
mod scratch;

pub use self::rule::Rule;
pub use self::scratch::Scratch;

/// Re-evaluation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Full re-evaluation.
    Ecc,
    /// Single-change incremental re-evaluation.
    Pcc,
    /// Batched incremental re-evaluation.
    Pccm,
    /// Concurrent full re-evaluation.
    Conc,
    /// Concurrent, non-blocking batched re-evaluation.
    CpccNb,
}
impl Strategy {
    /// All the strategies.
    pub fn all() -> [Strategy; 5] {
        use self::Strategy::*;
        [Ecc, Pcc, Pccm, Conc, CpccNb]
    }
    /// Names of all the strategies, as understood by `of_str`.
    pub fn names() -> [&'static str; 5] {
        ["ecc", "pcc", "pccm", "conc", "cpcc_nb"]
    }
    /// Name of a strategy.
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Ecc => "ecc",
            Strategy::Pcc => "pcc",
            Strategy::Pccm => "pccm",
            Strategy::Conc => "conc",
            Strategy::CpccNb => "cpcc_nb",
        }
    }
    /// Strategy from its name.
    pub fn of_str(s: &str) -> Option<Self> {
        Self::all().iter().cloned().find(|strat| strat.name() == s)
    }
}
impl fmt::Display for Strategy {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.name())
    }
}

/// Committed status of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStatus {
    /// Truth of the rule, unknown before the first successful cycle.
    pub truth: Truth,
    /// Minimal witnesses if the rule is false, empty otherwise.
    pub witnesses: Vec<Link>,
}
impl Default for RuleStatus {
    fn default() -> Self {
        RuleStatus {
            truth: Truth::Unknown,
            witnesses: vec![],
        }
    }
}
impl fmt::Display for RuleStatus {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.truth)?;
        for link in &self.witnesses {
            write!(fmt, " {}", link)?
        }
        Ok(())
    }
}

/// Outcome of a cycle of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Rule.
    pub rule: String,
    /// Status after the cycle.
    pub status: RuleStatus,
    /// Predicate error that aborted the cycle, if any.
    pub error: Option<String>,
}

/// Evaluation context, shared with the worker threads.
#[derive(Clone, Copy)]
pub struct Cx<'a> {
    /// Formula of the rule.
    pub fml: &'a Formula,
    /// Tree of the rule.
    pub tree: &'a Tree,
    /// Fact store of the rule.
    pub store: &'a FactStore,
    /// Predicates.
    pub preds: &'a PredRegistry,
    /// Per-cycle flags.
    pub scratch: &'a Scratch,
    /// Worker pool.
    pub pool: &'a ThreadPool,
    /// Only generate links on the path to a false root.
    pub mg: bool,
    /// Number of fan-outs dispatched to the pool.
    pub dispatches: &'a AtomicUsize,
}

/// Everything a rule needs from the checker to run a cycle.
pub(crate) struct Engine<'a> {
    pub preds: &'a PredRegistry,
    pub pool: &'a ThreadPool,
    pub mg: bool,
    pub profiler: &'a Profiler,
    pub dispatches: &'a AtomicUsize,
}

/// Evaluates some children of a node, fanning out to the pool if the node
/// can run concurrently.
///
/// Patches produced by the tasks are appended to `patch` in dispatch order.
pub(crate) fn eval_kids<T, R, F>(
    cx: &Cx,
    fidx: FIdx,
    kids: &[T],
    patch: &mut Patch,
    eval: F,
) -> Res<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T, &mut Patch) -> Res<R> + Sync + Send,
{
    if cx.scratch.conc(fidx) && kids.len() > 1 {
        cx.dispatches.fetch_add(1, Ordering::Relaxed);
        let results = fan_out(cx.pool, kids, |kid| {
            let mut patch = Patch::new();
            let res = eval(kid, &mut patch)?;
            Ok((res, patch))
        })?;
        let mut res = Vec::with_capacity(results.len());
        for (r, p) in results {
            patch.extend(p);
            res.push(r)
        }
        Ok(res)
    } else {
        kids.iter().map(|kid| eval(kid, patch)).collect()
    }
}

/// Maps `f` over some items, fanning out to the pool if the quantifier
/// `fidx` can run concurrently.
pub(crate) fn map_kids<T, R, F>(cx: &Cx, fidx: FIdx, items: &[T], f: F) -> Res<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Res<R> + Sync + Send,
{
    if cx.scratch.conc(fidx) && items.len() > 1 {
        cx.dispatches.fetch_add(1, Ordering::Relaxed);
        fan_out(cx.pool, items, f)
    } else {
        items.iter().map(f).collect()
    }
}

/// Context bound by a child of a quantifier node.
pub(crate) fn bound_of(tree: &Tree, kid: NodeIdx) -> Res<CtxId> {
    tree[kid]
        .bound()
        .ok_or_else(|| inconsistent(format!("child {} of a quantifier node is unbound", kid)))
}

/// Records the truth of some children of a quantifier node in its child map.
pub(crate) fn record_kids(
    tree: &Tree,
    node: NodeIdx,
    kids: &[NodeIdx],
    truths: &[bool],
    patch: &mut Patch,
) -> Res<()> {
    for (kid, truth) in kids.iter().zip(truths) {
        patch.kid_vt(node, bound_of(tree, *kid)?, *truth)
    }
    Ok(())
}

/// Folds the child map of a quantifier node.
pub(crate) fn fold_kids_vt(kind: QKind, node: &Node) -> Res<bool> {
    let truths = node
        .kids_vt()
        .values()
        .map(|truth| {
            truth
                .to_bool()
                .ok_or_else(|| inconsistent("unknown truth in a child map"))
        })
        .collect::<Res<Vec<_>>>()?;
    Ok(kind.fold(truths))
}

/// Truth of a connective node, children are evaluated in order by `eval`.
///
/// Both children of binary connectives are always evaluated.
pub(crate) fn connective<F>(fml: &Formula, node: &Node, mut eval: F) -> Res<bool>
where
    F: FnMut(NodeIdx) -> Res<bool>,
{
    let kids = node.kids();
    let kid = |i: usize| {
        kids.get(i).cloned().ok_or_else(|| {
            inconsistent(format!(
                "connective node for {} is missing child {}",
                node.fml(),
                i
            ))
        })
    };
    match fml[node.fml()] {
        FNode::And(_, _) => {
            let lhs = eval(kid(0)?)?;
            let rhs = eval(kid(1)?)?;
            Ok(lhs && rhs)
        }
        FNode::Or(_, _) => {
            let lhs = eval(kid(0)?)?;
            let rhs = eval(kid(1)?)?;
            Ok(lhs || rhs)
        }
        FNode::Implies(_, _) => {
            let lhs = eval(kid(0)?)?;
            let rhs = eval(kid(1)?)?;
            Ok(!lhs || rhs)
        }
        FNode::Not(_) => Ok(!eval(kid(0)?)?),
        FNode::Forall(_) | FNode::Exists(_) | FNode::BFunc(_) => bail!(inconsistent(format!(
            "formula node {} is not a connective",
            node.fml()
        ))),
    }
}

/// Owns the rules and dispatches batches to them.
pub struct Checker {
    /// Configuration.
    conf: CheckConf,
    /// Predicates.
    preds: PredRegistry,
    /// Rules by identifier.
    rules: BTreeMap<String, Rule>,
    /// Worker pool.
    pool: ThreadPool,
    /// Fan-outs since the last cycle.
    dispatches: AtomicUsize,
    /// Profiler.
    _profiler: Profiler,
}
impl Checker {
    /// Constructor, builds the worker pool.
    pub fn new(check_conf: CheckConf, preds: PredRegistry) -> Res<Self> {
        let pool = mk_pool(check_conf.threads)?;
        Ok(Checker {
            conf: check_conf,
            preds,
            rules: BTreeMap::new(),
            pool,
            dispatches: AtomicUsize::new(0),
            _profiler: Profiler::new(),
        })
    }

    /// Configuration.
    pub fn conf(&self) -> &CheckConf {
        &self.conf
    }
    /// Profiler.
    pub fn profiler(&self) -> &Profiler {
        &self._profiler
    }

    /// Registers a rule, and evaluates it over some initial contexts.
    ///
    /// Initial contexts over patterns the rule does not mention are ignored.
    pub fn add_rule(&mut self, fml: Formula, facts: &[ContextChange]) -> Res<CycleReport> {
        let id = fml.rule().to_string();
        if self.rules.contains_key(&id) {
            bail!(ErrorKind::RuleError(id, "rule is defined twice".into()))
        }
        let facts: Vec<_> = facts
            .iter()
            .filter(|change| fml.mentions(&change.pat))
            .cloned()
            .collect();
        let mut rule = Rule::new(fml);
        let engine = Engine {
            preds: &self.preds,
            pool: &self.pool,
            mg: self.conf.mg,
            profiler: &self._profiler,
            dispatches: &self.dispatches,
        };
        rule.cycle(&engine, Strategy::Ecc, &facts)?;
        log_info!("registered rule `{}`: {}", id, rule.status());
        let report = rule.report();
        self.rules.insert(id, rule);
        Ok(report)
    }

    /// A rule.
    pub fn rule(&self, id: &str) -> Res<&Rule> {
        self.rules
            .get(id)
            .ok_or_else(|| ErrorKind::UnknownRule(id.into()).into())
    }
    /// All the rules, in identifier order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }
    /// Identifiers of the rules quantifying over a pattern.
    pub fn rules_over(&self, pat: &str) -> Vec<String> {
        self.rules
            .iter()
            .filter(|(_, rule)| rule.formula().mentions(pat))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Runs a cycle of a rule on a batch of changes.
    ///
    /// Predicate errors do not make this function fail, they are reported
    /// in the result.
    pub fn check_batch(&mut self, id: &str, batch: &[ContextChange]) -> Res<CycleReport> {
        let rule = if let Some(rule) = self.rules.get_mut(id) {
            rule
        } else {
            bail!(ErrorKind::UnknownRule(id.into()))
        };
        let engine = Engine {
            preds: &self.preds,
            pool: &self.pool,
            mg: self.conf.mg,
            profiler: &self._profiler,
            dispatches: &self.dispatches,
        };
        let prof = &self._profiler;

        profile! { |prof| tick "total" }
        let res = rule.cycle(&engine, self.conf.strategy, batch);
        profile! { |prof| mark "total" }
        res?;

        profile! { |prof| "cycles" => add 1 }
        profile! { |prof| "changes" => add batch.len() }
        let dispatches = self.dispatches.swap(0, Ordering::Relaxed);
        profile! { |prof| "concurrent dispatches" => add dispatches }

        log_debug!("rule `{}` after {} change(s): {}", id, batch.len(), rule.status());
        Ok(rule.report())
    }

    /// Runs `f` on an evaluation context for a rule, with no per-cycle flag
    /// set.
    pub(crate) fn with_cx<R, F>(&self, id: &str, f: F) -> Res<R>
    where
        F: FnOnce(&Cx) -> Res<R>,
    {
        let rule = self.rule(id)?;
        let engine = Engine {
            preds: &self.preds,
            pool: &self.pool,
            mg: self.conf.mg,
            profiler: &self._profiler,
            dispatches: &self.dispatches,
        };
        let scratch = Scratch::new(rule.formula());
        let cx = rule.cx(&engine, &scratch);
        f(&cx)
    }

    /// Mutable access to a rule.
    pub(crate) fn rule_mut(&mut self, id: &str) -> Res<&mut Rule> {
        self.rules
            .get_mut(id)
            .ok_or_else(|| ErrorKind::UnknownRule(id.into()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names() {
        for (strat, name) in Strategy::all().iter().zip(Strategy::names().iter()) {
            assert_eq!(Strategy::of_str(name), Some(*strat));
            assert_eq!(&format!("{}", strat), name)
        }
        assert_eq!(Strategy::of_str("fast"), None)
    }
}
