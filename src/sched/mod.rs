//! Change scheduling.
//!
//! The [`Scheduler`] consumes the change stream and decides, for each rule
//! over the pattern of a change, when the change is checked.
//!
//! In `imd` mode every change is checked on its own. In `batch` mode changes
//! accumulate in a pending batch per rule, until
//!
//! - the *S-condition* holds: the change could mask an inc+ change of the
//!   batch, the batch is submitted and the change starts the next one, or
//! - the stream ends.
//!
//! Before being appended to a batch, a change is checked against the
//! *C-condition*: if it cancels a pending change of the opposite kind, the
//! two are merged and no cycle is needed for them. An addition followed by
//! the deletion of the same context annihilate. A deletion and an addition
//! that are indistinguishable for the rule, which [`probe`][probe] checks,
//! become a swap in the fact store.
//!
//! [`Scheduler`]: struct.Scheduler.html (Scheduler struct)
//! [probe]: probe/fn.probe.html (probe function)

use crate::{
    check::{Checker, CycleReport},
    common::*,
    context::{ChangeKind, ContextChange},
};

pub mod probe;

use self::probe::{probe, SideEffect};

/// Scheduling modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedMode {
    /// Every change on its own.
    Imd,
    /// S/C batching.
    Batch,
}
impl SchedMode {
    /// Mode from its name.
    pub fn of_str(s: &str) -> Option<Self> {
        match s {
            "imd" => Some(SchedMode::Imd),
            "batch" => Some(SchedMode::Batch),
            _ => None,
        }
    }
}
impl fmt::Display for SchedMode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchedMode::Imd => write!(fmt, "imd"),
            SchedMode::Batch => write!(fmt, "batch"),
        }
    }
}

/// A pending change merged by the C-condition.
enum Merge {
    /// Addition and deletion of the same context.
    Annihilate(usize),
    /// Deletion and addition that can be swapped.
    Swap(usize, SideEffect),
}

/// Dispatches changes to the rules of a checker.
pub struct Scheduler {
    /// Mode.
    mode: SchedMode,
    /// Checker.
    checker: Checker,
    /// Pending batch by rule.
    pending: BTreeMap<String, Vec<ContextChange>>,
    /// Next batch by rule, for the rules whose S-condition fired.
    next: BTreeMap<String, Vec<ContextChange>>,
    /// Contexts that are never merged.
    critical: BTreeSet<CtxId>,
}
impl Scheduler {
    /// Constructor.
    pub fn new(mode: SchedMode, checker: Checker) -> Self {
        Scheduler {
            mode,
            checker,
            pending: BTreeMap::new(),
            next: BTreeMap::new(),
            critical: BTreeSet::new(),
        }
    }

    /// Checker.
    pub fn checker(&self) -> &Checker {
        &self.checker
    }
    /// Checker, mutable.
    pub fn checker_mut(&mut self) -> &mut Checker {
        &mut self.checker
    }

    /// Prevents a context from being merged.
    pub fn add_critical(&mut self, id: CtxId) {
        self.critical.insert(id);
    }

    /// Pending batch of a rule.
    pub fn pending(&self, rule: &str) -> &[ContextChange] {
        self.pending.get(rule).map(|batch| &batch[..]).unwrap_or(&[])
    }

    /// Schedules a change, returns the reports of the cycles it triggered.
    pub fn schedule(&mut self, change: ContextChange) -> Res<Vec<CycleReport>> {
        let rules = self.checker.rules_over(&change.pat);
        match self.mode {
            SchedMode::Imd => {
                let mut reports = Vec::with_capacity(rules.len());
                for rule in rules {
                    reports.push(self.submit(&rule, &[change.clone()])?)
                }
                Ok(reports)
            }
            SchedMode::Batch => {
                for rule in &rules {
                    self.batch(rule, &change)?
                }
                self.do_schedule()
            }
        }
    }

    /// Submits all pending batches.
    pub fn flush(&mut self) -> Res<Vec<CycleReport>> {
        let mut reports = vec![];
        for (rule, batch) in ::std::mem::take(&mut self.pending) {
            if !batch.is_empty() {
                reports.push(self.submit(&rule, &batch)?)
            }
        }
        Ok(reports)
    }

    /// Submits a batch to the checker.
    fn submit(&mut self, rule: &str, batch: &[ContextChange]) -> Res<CycleReport> {
        {
            let prof = self.checker.profiler();
            profile! { |prof| "batches" => add 1 }
        }
        self.checker.check_batch(rule, batch)
    }

    /// Submits the pending batches of the rules with a next batch, which
    /// becomes pending.
    fn do_schedule(&mut self) -> Res<Vec<CycleReport>> {
        let mut reports = vec![];
        for (rule, next) in ::std::mem::take(&mut self.next) {
            let batch = ::std::mem::replace(self.pending.entry(rule.clone()).or_default(), next);
            if !batch.is_empty() {
                reports.push(self.submit(&rule, &batch)?)
            }
        }
        Ok(reports)
    }

    /// Puts a change in the pending batch of a rule, or merges it.
    fn batch(&mut self, rule: &str, change: &ContextChange) -> Res<()> {
        if self.pending(rule).is_empty() {
            self.pending
                .entry(rule.into())
                .or_default()
                .push(change.clone());
        } else if self.s_condition(rule, change)? {
            log_debug!("rule `{}`: {} starts a new batch", rule, change);
            self.next
                .entry(rule.into())
                .or_default()
                .push(change.clone())
        } else if !self.c_condition(rule, change)? {
            self.pending
                .entry(rule.into())
                .or_default()
                .push(change.clone())
        }
        Ok(())
    }

    /// True if the change could mask an inc+ change of the pending batch.
    fn s_condition(&self, rule: &str, change: &ContextChange) -> Res<bool> {
        let fml = self.checker.rule(rule)?.formula();
        let pending = self.pending(rule);
        Ok(fml.inc_type(change).is_minus()
            && pending.iter().any(|other| fml.inc_type(other).is_plus())
            && pending.iter().all(|other| other.id() != change.id()))
    }

    /// Tries to merge a change with a pending one, returns true if it did.
    fn c_condition(&mut self, rule: &str, change: &ContextChange) -> Res<bool> {
        if change.kind == ChangeKind::Update {
            return Ok(false);
        }
        let merge = if let Some(merge) = self.find_merge(rule, change)? {
            merge
        } else {
            return Ok(false);
        };

        let pos = match merge {
            Merge::Annihilate(pos) => pos,
            Merge::Swap(pos, effect) => {
                effect.apply(&mut self.checker)?;
                pos
            }
        };
        if let Some(pending) = self.pending.get_mut(rule) {
            let other = pending.remove(pos);
            log_debug!("rule `{}`: merged {} with {}", rule, other, change)
        }
        let prof = self.checker.profiler();
        profile! { |prof| "merged" => add 1 }
        Ok(true)
    }

    /// Looks for a pending change cancelled by `change`.
    fn find_merge(&self, rule: &str, change: &ContextChange) -> Res<Option<Merge>> {
        let rule_ref = self.checker.rule(rule)?;
        if rule_ref.is_dirty() {
            return Ok(None);
        }
        let fml = rule_ref.formula();
        let pending = self.pending(rule);

        for (pos, other) in pending.iter().enumerate() {
            if other.pat != change.pat || !other.kind.is_opposite(change.kind) {
                continue;
            }
            if self.critical.contains(&other.id()) || self.critical.contains(&change.id()) {
                continue;
            }
            let touched = pending.iter().enumerate().any(|(i, c)| {
                i != pos && (c.id() == other.id() || c.id() == change.id())
            });
            if touched {
                continue;
            }

            if other.id() == change.id() {
                if other.kind == ChangeKind::Addition {
                    return Ok(Some(Merge::Annihilate(pos)));
                }
            } else if fml.inc_type(change).is_minus() {
                continue;
            }

            let (del, add) = if change.kind == ChangeKind::Deletion {
                (change, other)
            } else {
                (other, change)
            };
            let del_ctx = if let Some(ctx) = rule_ref.store().get(&del.pat, del.id()) {
                ctx.clone()
            } else {
                continue;
            };

            let prof = self.checker.profiler();
            profile! { |prof| tick "probe" }
            let res = self
                .checker
                .with_cx(rule, |cx| probe(cx, &del.pat, &del_ctx, &add.ctx));
            profile! { |prof| mark "probe" }
            match res {
                Ok(Some(effect)) => return Ok(Some(Merge::Swap(pos, effect))),
                Ok(None) => (),
                Err(e) => {
                    if e.is_predicate_error() {
                        log_debug!("rule `{}`: probing {} failed: {}", rule, change, e)
                    } else {
                        return Err(e);
                    }
                }
            }
        }
        Ok(None)
    }
}
