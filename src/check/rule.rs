//! A rule: its formula, instantiation tree and fact store.

use crate::{
    check::{
        conc, cpcc_nb, ecc, links, modify, pcc, pccm, CycleReport, Cx, Engine, RuleStatus, Scratch,
        Strategy,
    },
    common::*,
    context::{ChangeKind, ContextChange, Ctx, Env, FactStore},
    formula::{Formula, ReleaseConds},
    tree::{Patch, Stage, Tree, Truth},
};

/// A rule and everything needed to check it incrementally.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Formula.
    fml: Formula,
    /// Instantiation tree.
    tree: Tree,
    /// Contexts of the patterns the formula mentions.
    store: FactStore,
    /// Status after the last successful cycle.
    status: RuleStatus,
    /// True if the tree cannot be trusted and must be rebuilt.
    dirty: bool,
    /// Predicate error of the last cycle, if any.
    last_error: Option<String>,
}
impl Rule {
    /// Rule with an empty tree, evaluated by its first cycle.
    pub fn new(fml: Formula) -> Self {
        Rule {
            fml,
            tree: Tree::new(),
            store: FactStore::new(),
            status: RuleStatus::default(),
            dirty: false,
            last_error: None,
        }
    }

    /// Identifier.
    pub fn id(&self) -> &str {
        self.fml.rule()
    }
    /// Formula.
    pub fn formula(&self) -> &Formula {
        &self.fml
    }
    /// Instantiation tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }
    /// Fact store.
    pub fn store(&self) -> &FactStore {
        &self.store
    }
    /// Status after the last successful cycle.
    pub fn status(&self) -> &RuleStatus {
        &self.status
    }
    /// True if the next cycle rebuilds the tree.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
    /// Predicate error of the last cycle.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_ref().map(|s| &s[..])
    }
    /// Report for the last cycle.
    pub fn report(&self) -> CycleReport {
        CycleReport {
            rule: self.id().into(),
            status: self.status.clone(),
            error: self.last_error.clone(),
        }
    }

    /// Release conditions of the quantifier nodes given their committed
    /// truth.
    pub fn release_conditions(&self) -> Vec<(NodeIdx, ReleaseConds)> {
        let mut res = vec![];
        for pat in self.fml.pats() {
            for node in self.tree.nodes_over(pat) {
                let node_ref = &self.tree[node];
                if let Some(conds) = self.fml.release_conditions(node_ref.fml(), node_ref.truth()) {
                    res.push((node, conds))
                }
            }
        }
        res
    }

    /// Evaluation context over this rule.
    pub(crate) fn cx<'a>(&'a self, engine: &Engine<'a>, scratch: &'a Scratch) -> Cx<'a> {
        Cx {
            fml: &self.fml,
            tree: &self.tree,
            store: &self.store,
            preds: engine.preds,
            scratch,
            pool: engine.pool,
            mg: engine.mg,
            dispatches: engine.dispatches,
        }
    }

    /// Runs a cycle on a batch.
    ///
    /// A predicate error aborts the cycle: the status is left untouched and
    /// the rule is rebuilt at its next cycle. Other errors are returned.
    pub(crate) fn cycle(
        &mut self,
        engine: &Engine,
        strategy: Strategy,
        batch: &[ContextChange],
    ) -> Res<()> {
        let prof = engine.profiler;
        let res = if self.dirty {
            profile! { |prof| "fallbacks" => add 1 }
            log_debug!("rule `{}` is dirty, rebuilding", self.id());
            self.full(engine, batch, false)
        } else if self.tree.is_empty() {
            self.full(engine, batch, false)
        } else {
            match strategy {
                Strategy::Ecc => self.full(engine, batch, false),
                Strategy::Conc => self.full(engine, batch, true),
                Strategy::Pcc => self.pcc_batch(engine, batch),
                Strategy::Pccm => self.batch_cycle(engine, batch, false),
                Strategy::CpccNb => self.batch_cycle(engine, batch, true),
            }
        };
        self.store.clear_deltas();

        match res {
            Ok(()) => {
                self.dirty = false;
                self.last_error = None;
                self.update_status()?;
                if_debug! {
                    self.tree.check(&self.fml)?
                }
                Ok(())
            }
            Err(e) => {
                if e.is_predicate_error() {
                    warn!("rule `{}`: {}, rebuilding at next cycle", self.id(), e);
                    self.dirty = true;
                    self.last_error = Some(e.to_string());
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Applies a batch and rebuilds the tree.
    fn full(&mut self, engine: &Engine, batch: &[ContextChange], conc: bool) -> Res<()> {
        self.store.apply_batch(batch)?;
        self.store.clear_deltas();
        self.rebuild(engine, conc)
    }

    /// Builds and evaluates the tree from scratch.
    fn rebuild(&mut self, engine: &Engine, conc: bool) -> Res<()> {
        let prof = engine.profiler;
        self.tree.clear();
        let mut scratch = Scratch::all(&self.fml);
        if conc {
            conc::mark_first_quantifiers(&self.fml, &mut scratch)
        }

        profile! { |prof| tick "modify" }
        let frag = ecc::build(
            &self.cx(engine, &scratch),
            self.fml.root(),
            Arc::new(Env::new()),
            None,
        );
        profile! { |prof| mark "modify" }
        let root = self.tree.graft(None, frag?, &self.fml)?;

        profile! { |prof| tick "truth" }
        let mut patch = Patch::new();
        let res = ecc::truth(&self.cx(engine, &scratch), root, None, &mut patch);
        profile! { |prof| mark "truth" }
        res?;
        self.tree.apply(patch, Stage::Commit)?;

        self.links(engine, &scratch)
    }

    /// Processes a batch one change at a time.
    ///
    /// Updates are split into the deletion of the old value and the addition
    /// of the new one. After a predicate error the remaining changes only
    /// reach the fact store, and the error is returned once the whole batch
    /// is applied.
    fn pcc_batch(&mut self, engine: &Engine, batch: &[ContextChange]) -> Res<()> {
        let mut res = Ok(());
        for change in batch {
            let steps = if change.kind == ChangeKind::Update {
                let old = if let Some(old) = self.store.get(&change.pat, change.id()) {
                    old.clone()
                } else {
                    bail!(inconsistent(format!(
                        "updating context `{}` absent from `{}`",
                        change.ctx, change.pat
                    )))
                };
                vec![
                    ContextChange::del(change.pat.clone(), old),
                    ContextChange::add(change.pat.clone(), change.ctx.clone()),
                ]
            } else {
                vec![change.clone()]
            };

            for step in steps {
                if res.is_ok() {
                    res = self.pcc_step(engine, &step);
                    if let Err(e) = &res {
                        if e.is_fatal() {
                            return res;
                        }
                    }
                } else {
                    self.store.apply_one(&step)?
                }
            }
        }
        res
    }

    /// Processes a single addition or deletion.
    fn pcc_step(&mut self, engine: &Engine, change: &ContextChange) -> Res<()> {
        let prof = engine.profiler;
        self.store.clear_deltas();
        self.store.apply_batch(::std::slice::from_ref(change))?;
        self.tree.begin_cycle();
        let scratch = Scratch::for_change(&self.fml, &change.pat);
        self.modify(engine, &scratch)?;

        let root = self.tree.get_root()?;
        profile! { |prof| tick "truth" }
        let mut patch = Patch::new();
        let res = pcc::truth(&self.cx(engine, &scratch), root, change, &mut patch);
        profile! { |prof| mark "truth" }
        res?;
        self.tree.apply(patch, Stage::Commit)?;

        self.links(engine, &scratch)
    }

    /// Processes a whole batch at once.
    ///
    /// In non-blocking mode, truths are staged and committed once links are
    /// generated.
    fn batch_cycle(&mut self, engine: &Engine, batch: &[ContextChange], nb: bool) -> Res<()> {
        let prof = engine.profiler;
        self.store.apply_batch(batch)?;
        self.tree.begin_cycle();
        let mut scratch = Scratch::for_batch(&self.fml, batch.iter().map(|c| c.pat.as_str()));
        if nb {
            cpcc_nb::mark_profitable(&self.fml, &self.store, &mut scratch)
        }
        self.modify(engine, &scratch)?;

        let root = self.tree.get_root()?;
        profile! { |prof| tick "truth" }
        let mut patch = Patch::new();
        let res = pccm::truth(&self.cx(engine, &scratch), root, &mut patch);
        profile! { |prof| mark "truth" }
        res?;
        let stage = if nb { Stage::Virtual } else { Stage::Commit };
        self.tree.apply(patch, stage)?;

        self.links(engine, &scratch)?;
        if nb {
            self.tree.commit()?
        }
        Ok(())
    }

    /// Plans and applies the structural changes of the current deltas.
    fn modify(&mut self, engine: &Engine, scratch: &Scratch) -> Res<()> {
        let prof = engine.profiler;
        profile! { |prof| tick "modify" }
        let edits = modify::plan(&self.cx(engine, scratch));
        let res = match edits {
            Ok(edits) => modify::apply(&mut self.tree, &self.fml, edits),
            Err(e) => Err(e),
        };
        profile! { |prof| mark "modify" }
        res
    }

    /// Generates the links of the tree.
    fn links(&mut self, engine: &Engine, scratch: &Scratch) -> Res<()> {
        let prof = engine.profiler;
        profile! { |prof| tick "links" }
        let mut patch = Patch::new();
        let res = links::generate(&self.cx(engine, scratch), &mut patch);
        profile! { |prof| mark "links" }
        res?;
        self.tree.apply(patch, Stage::Commit)
    }

    /// Updates the status from the root of the tree.
    fn update_status(&mut self) -> Res<()> {
        let root = &self.tree[self.tree.get_root()?];
        let truth = root.truth();
        let witnesses = if truth == Truth::False {
            root.links().map(|links| links.minimal()).unwrap_or_default()
        } else {
            vec![]
        };
        self.status = RuleStatus { truth, witnesses };
        Ok(())
    }

    /// Rebinds some branches from `del` to `add`, and swaps them in the fact
    /// store.
    ///
    /// Only legal if evaluating the branches with `add` yields the same
    /// truths, which is what probing checks.
    pub(crate) fn swap_branches(
        &mut self,
        pat: &str,
        var: &str,
        del: &Ctx,
        add: &Ctx,
        branches: &[NodeIdx],
    ) -> Res<()> {
        for branch in branches {
            self.tree.rebind(*branch, var, add)?
        }
        if del.id() != add.id() {
            self.tree.rename_links(var, del.id(), add.id())
        }
        self.store.swap(pat, del.id(), add.clone())?;
        self.update_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::Context, formula::FormulaBuilder, pred::PredRegistry};
    use std::sync::atomic::AtomicUsize;

    fn ctx(id: usize, state: &str) -> Ctx {
        let mut attrs = BTreeMap::new();
        attrs.insert("state".to_string(), state.to_string());
        Arc::new(Context::new(id.into(), attrs))
    }

    #[test]
    fn release_conditions_follow_truth() {
        let mut b = FormulaBuilder::new("r");
        let leaf = b.bfunc("not_still", vec![("v1", "v")]);
        let root = b.forall("v", "P", leaf);
        let fml = b.build(root).unwrap();
        let (preds, pool, profiler) = (
            PredRegistry::with_builtins(),
            mk_pool(1).unwrap(),
            Profiler::new(),
        );
        let dispatches = AtomicUsize::new(0);
        let engine = Engine {
            preds: &preds,
            pool: &pool,
            mg: true,
            profiler: &profiler,
            dispatches: &dispatches,
        };

        let mut rule = Rule::new(fml);
        let batch = vec![ContextChange::add("P", ctx(0, "1"))];
        rule.cycle(&engine, Strategy::Pcc, &batch).unwrap();
        assert_eq!(rule.status().truth, Truth::True);
        let conds = rule.release_conditions();
        assert_eq!(conds.len(), 1);
        assert!(conds[0].1.rc[&ChangeKind::Addition].contains(&Truth::Unknown));

        let batch = vec![ContextChange::add("P", ctx(1, "0"))];
        rule.cycle(&engine, Strategy::Pcc, &batch).unwrap();
        assert_eq!(rule.status().truth, Truth::False);
        let conds = rule.release_conditions();
        let reach = &conds[0].1.rc[&ChangeKind::Deletion];
        assert!(reach.contains(&Truth::False));
        assert!(conds[0].1.re.contains_key(&ChangeKind::Addition))
    }
}
