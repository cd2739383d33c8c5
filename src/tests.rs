//! Cross-module scenarios: strategies against each other, the scheduler, and
//! error recovery.

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use crate::{
    check::{Checker, Strategy},
    common::*,
    context::{ChangeKind, Context, ContextChange, ContextManager},
    formula::{Formula, FormulaBuilder},
    pred::PredRegistry,
    sched::{SchedMode, Scheduler},
    tree::{Link, LinkKind, Truth},
    workload::Generator,
};

fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn violated(bindings: &[(&str, usize)]) -> Link {
    Link::new(
        LinkKind::Violated,
        bindings
            .iter()
            .map(|(var, id)| (var.to_string(), CtxId::from(*id)))
            .collect(),
    )
}

/// `forall v P. not_still(v)`
fn not_still() -> Formula {
    let mut b = FormulaBuilder::new("not_still");
    let leaf = b.bfunc("not_still", vec![("v1", "v")]);
    let root = b.forall("v", "P", leaf);
    b.build(root).unwrap()
}

/// Rules mixing quantifiers, connectives and filters over `P` and `Q`.
fn rules() -> Vec<Formula> {
    let mut res = vec![];

    // forall v P. exists w Q. same_loc(v, w)
    let mut b = FormulaBuilder::new("covered");
    let leaf = b.bfunc("same_loc", vec![("v1", "v"), ("v2", "w")]);
    let ex = b.exists("w", "Q", leaf);
    let root = b.forall("v", "P", ex);
    res.push(b.build(root).unwrap());

    // forall v P. not_still(v) => exists w Q. same_loc(v, w)
    let mut b = FormulaBuilder::new("moving_covered");
    let moving = b.bfunc("not_still", vec![("v1", "v")]);
    let leaf = b.bfunc("same_loc", vec![("v1", "v"), ("v2", "w")]);
    let ex = b.exists("w", "Q", leaf);
    let imp = b.implies(moving, ex);
    let root = b.forall("v", "P", imp);
    res.push(b.build(root).unwrap());

    // forall v P. forall w Q :filter greater v. not same_loc(v, w)
    let mut b = FormulaBuilder::new("apart");
    let leaf = b.bfunc("same_loc", vec![("v1", "v"), ("v2", "w")]);
    let not = b.not(leaf);
    let inner = b.forall("w", "Q", not);
    b.filter(inner, "greater", "v").unwrap();
    let root = b.forall("v", "P", inner);
    res.push(b.build(root).unwrap());

    // exists v P. not_still(v) and forall w Q. not_still(w) or not same_loc(v, w)
    let mut b = FormulaBuilder::new("lonely_mover");
    let moving = b.bfunc("not_still", vec![("v1", "v")]);
    let w_moving = b.bfunc("not_still", vec![("v1", "w")]);
    let leaf = b.bfunc("same_loc", vec![("v1", "v"), ("v2", "w")]);
    let not = b.not(leaf);
    let or = b.or(w_moving, not);
    let all = b.forall("w", "Q", or);
    let and = b.and(moving, all);
    let root = b.exists("v", "P", and);
    res.push(b.build(root).unwrap());

    res
}

fn pats() -> BTreeMap<String, Vec<String>> {
    let mut pats = BTreeMap::new();
    for pat in &["P", "Q"] {
        pats.insert(
            pat.to_string(),
            vec!["location".to_string(), "state".to_string()],
        );
    }
    pats
}

fn checker(strategy: Strategy, mg: bool) -> Checker {
    let check_conf = CheckConf::new(strategy).mg(mg).threads(4);
    Checker::new(check_conf, PredRegistry::with_builtins()).unwrap()
}

/// All strategies, with and without `mg`.
fn configurations() -> Vec<(Strategy, bool)> {
    let mut res = vec![];
    for strategy in &Strategy::all() {
        for mg in &[true, false] {
            res.push((*strategy, *mg))
        }
    }
    res
}

#[test]
fn not_still_scenario() {
    for (strategy, mg) in configurations() {
        let mut checker = checker(strategy, mg);
        let report = checker.add_rule(not_still(), &[]).unwrap();
        assert_eq!(report.status.truth, Truth::True);

        let mut manager = ContextManager::new();
        let c0 = manager.add("P", attrs(&[("state", "1")])).unwrap();
        let c1 = manager.add("P", attrs(&[("state", "0")])).unwrap();
        let steps = vec![
            (c0, Truth::True, vec![]),
            (c1, Truth::False, vec![violated(&[("v", 1)])]),
            (
                manager.update(1.into(), "state", "1").unwrap(),
                Truth::True,
                vec![],
            ),
            (
                manager.update(0.into(), "state", "0").unwrap(),
                Truth::False,
                vec![violated(&[("v", 0)])],
            ),
            (manager.remove(0.into()).unwrap(), Truth::True, vec![]),
            (
                manager.add("P", attrs(&[("state", "0")])).unwrap(),
                Truth::False,
                vec![violated(&[("v", 2)])],
            ),
            // Two witnesses at once.
            (
                manager.add("P", attrs(&[("state", "0")])).unwrap(),
                Truth::False,
                vec![violated(&[("v", 2)]), violated(&[("v", 3)])],
            ),
            (
                manager.update(2.into(), "state", "1").unwrap(),
                Truth::False,
                vec![violated(&[("v", 3)])],
            ),
            (manager.remove(3.into()).unwrap(), Truth::True, vec![]),
        ];

        for (change, truth, witnesses) in steps {
            let report = checker.check_batch("not_still", &[change.clone()]).unwrap();
            assert_eq!(
                report.status.truth, truth,
                "{} (mg: {}) after {}",
                strategy, mg, change
            );
            assert_eq!(report.status.witnesses, witnesses, "{} (mg: {})", strategy, mg);
            assert!(report.error.is_none())
        }
    }
}

#[test]
fn strategies_agree_with_full_re_evaluation() {
    let mut manager = ContextManager::new();
    let changes = Generator::new(0xcc, &pats())
        .values(3)
        .changes(&mut manager, 300)
        .unwrap();

    let mut rng = XorShiftRng::seed_from_u64(0x5eed);
    let mut batches = vec![];
    let mut changes = &changes[..];
    while !changes.is_empty() {
        let len = rng.gen_range(1..6).min(changes.len());
        batches.push(&changes[..len]);
        changes = &changes[len..]
    }

    let mut reference = checker(Strategy::Ecc, false);
    let mut others: Vec<_> = configurations()
        .into_iter()
        .map(|(strategy, mg)| (strategy, mg, checker(strategy, mg)))
        .collect();
    for fml in rules() {
        reference.add_rule(fml.clone(), &[]).unwrap();
        for (_, _, checker) in &mut others {
            checker.add_rule(fml.clone(), &[]).unwrap();
        }
    }

    let ids: Vec<String> = rules().iter().map(|fml| fml.rule().to_string()).collect();
    for (count, batch) in batches.iter().enumerate() {
        for id in &ids {
            let expected = reference.check_batch(id, batch).unwrap();
            assert!(expected.error.is_none());
            for (strategy, mg, checker) in &mut others {
                let report = checker.check_batch(id, batch).unwrap();
                assert_eq!(
                    report, expected,
                    "rule `{}`, batch {}, {} (mg: {})",
                    id, count, strategy, mg
                );
            }
        }
    }
}

#[test]
fn witnesses_are_sound() {
    let mut manager = ContextManager::new();
    let changes = Generator::new(7, &pats())
        .values(3)
        .changes(&mut manager, 120)
        .unwrap();

    let fml = rules().remove(0);
    let mut checker = checker(Strategy::Ecc, true);
    checker.add_rule(fml, &[]).unwrap();

    let mut seen_false = false;
    for change in changes {
        let report = checker.check_batch("covered", &[change]).unwrap();
        let rule = checker.rule("covered").unwrap();
        let store = rule.store();
        if report.status.truth != Truth::False {
            assert!(report.status.witnesses.is_empty());
            continue;
        }
        seen_false = true;
        assert!(!report.status.witnesses.is_empty());
        for link in &report.status.witnesses {
            assert_eq!(link.kind(), LinkKind::Violated);
            let id = link.bindings()["v"];
            let p = store.get("P", id).unwrap();
            let covered = store
                .domain("Q")
                .iter()
                .any(|q| q.attr("location") == p.attr("location"));
            assert!(!covered, "{} is covered", p)
        }
    }
    assert!(seen_false)
}

#[test]
fn full_re_evaluation_is_idempotent() {
    let mut manager = ContextManager::new();
    let changes = Generator::new(3, &pats())
        .changes(&mut manager, 40)
        .unwrap();
    let mut checker = checker(Strategy::Ecc, false);
    for fml in rules() {
        checker.add_rule(fml, &changes_so_far(&changes)).unwrap();
    }
    for fml in rules() {
        let id = fml.rule();
        let first = checker.check_batch(id, &[]).unwrap();
        let len = checker.rule(id).unwrap().tree().len();
        let second = checker.check_batch(id, &[]).unwrap();
        assert_eq!(first, second);
        assert_eq!(len, checker.rule(id).unwrap().tree().len())
    }
}

/// Additions producing the contexts live after some changes.
fn changes_so_far(changes: &[ContextChange]) -> Vec<ContextChange> {
    let mut live: BTreeMap<CtxId, ContextChange> = BTreeMap::new();
    for change in changes {
        match change.kind {
            ChangeKind::Deletion => {
                live.remove(&change.id());
            }
            _ => {
                let add = ContextChange::add(change.pat.clone(), change.ctx.clone());
                live.insert(change.id(), add);
            }
        }
    }
    live.into_iter().map(|(_, change)| change).collect()
}

fn scheduler(mode: SchedMode) -> Scheduler {
    let mut checker = checker(Strategy::Pcc, true);
    checker.add_rule(not_still(), &[]).unwrap();
    Scheduler::new(mode, checker)
}

/// Scheduler over all the rules.
fn all_rules_scheduler(mode: SchedMode, strategy: Strategy, mg: bool) -> Scheduler {
    let mut checker = checker(strategy, mg);
    checker.add_rule(not_still(), &[]).unwrap();
    for fml in rules() {
        checker.add_rule(fml, &[]).unwrap();
    }
    Scheduler::new(mode, checker)
}

#[test]
fn merged_batches_match_sequential_processing() {
    let mut merged = 0;
    for seed in 0..8 {
        let mut manager = ContextManager::new();
        let changes = Generator::new(seed, &pats())
            .values(2)
            .changes(&mut manager, 60)
            .unwrap();

        let mut reference = checker(Strategy::Ecc, true);
        let facts = changes_so_far(&changes);
        reference.add_rule(not_still(), &facts).unwrap();
        for fml in rules() {
            reference.add_rule(fml, &facts).unwrap();
        }

        for (strategy, mg) in configurations() {
            let mut imd = all_rules_scheduler(SchedMode::Imd, strategy, mg);
            let mut batch = all_rules_scheduler(SchedMode::Batch, strategy, mg);
            for change in &changes {
                imd.schedule(change.clone()).unwrap();
                batch.schedule(change.clone()).unwrap();
            }
            imd.flush().unwrap();
            batch.flush().unwrap();
            merged += batch.checker().profiler().stat("merged");

            for rule in reference.rules() {
                let id = rule.id();
                let imd_status = imd.checker().rule(id).unwrap().status();
                let batch_status = batch.checker().rule(id).unwrap().status();
                assert_eq!(
                    imd_status,
                    rule.status(),
                    "rule `{}`, seed {}, {} (mg: {}), immediate",
                    id,
                    seed,
                    strategy,
                    mg
                );
                assert_eq!(
                    batch_status,
                    rule.status(),
                    "rule `{}`, seed {}, {} (mg: {}), batch",
                    id,
                    seed,
                    strategy,
                    mg
                );
            }
        }
    }
    assert!(merged > 0)
}

#[test]
fn immediate_mode() {
    let mut scheduler = scheduler(SchedMode::Imd);
    let mut manager = ContextManager::new();
    let reports = scheduler
        .schedule(manager.add("P", attrs(&[("state", "0")])).unwrap())
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status.truth, Truth::False);
    // No rule over `Q`.
    let reports = scheduler
        .schedule(manager.add("Q", attrs(&[("state", "0")])).unwrap())
        .unwrap();
    assert!(reports.is_empty());
    assert!(scheduler.flush().unwrap().is_empty())
}

#[test]
fn addition_and_deletion_annihilate() {
    let mut scheduler = scheduler(SchedMode::Batch);
    let mut manager = ContextManager::new();
    let c0 = manager.add("P", attrs(&[("state", "1")])).unwrap();
    assert!(scheduler.schedule(c0).unwrap().is_empty());
    scheduler.flush().unwrap();

    let before = scheduler.checker().rule("not_still").unwrap().clone();

    let c1 = manager.add("P", attrs(&[("state", "0")])).unwrap();
    assert!(scheduler.schedule(c1).unwrap().is_empty());
    assert_eq!(scheduler.pending("not_still").len(), 1);
    let del = manager.remove(1.into()).unwrap();
    assert!(scheduler.schedule(del).unwrap().is_empty());
    assert!(scheduler.pending("not_still").is_empty());
    assert!(scheduler.flush().unwrap().is_empty());

    let after = scheduler.checker().rule("not_still").unwrap();
    assert_eq!(after.status(), before.status());
    assert_eq!(after.tree().len(), before.tree().len());
    assert_eq!(after.store().domain("P"), before.store().domain("P"));
    assert_eq!(scheduler.checker().profiler().stat("merged"), 1)
}

/// Deletes context `0`, then adds it back with another state.
fn delete_and_re_add(scheduler: &mut Scheduler, state: &str) {
    let mut manager = ContextManager::new();
    let c0 = manager.add("P", attrs(&[("state", "1")])).unwrap();
    scheduler.schedule(c0.clone()).unwrap();
    scheduler.flush().unwrap();

    let del = manager.remove(0.into()).unwrap();
    assert!(scheduler.schedule(del).unwrap().is_empty());
    let back = ContextChange::add("P", Arc::new(c0.ctx.with_attr("state", state)));
    assert!(scheduler.schedule(back).unwrap().is_empty());
}

#[test]
fn indistinguishable_changes_merge() {
    let mut scheduler = scheduler(SchedMode::Batch);
    delete_and_re_add(&mut scheduler, "2");
    assert!(scheduler.pending("not_still").is_empty());
    let rule = scheduler.checker().rule("not_still").unwrap();
    assert_eq!(
        rule.store().get("P", 0.into()).and_then(|ctx| ctx.attr("state")),
        Some("2")
    );
    assert_eq!(rule.status().truth, Truth::True);
    assert!(scheduler.flush().unwrap().is_empty())
}

#[test]
fn observable_changes_do_not_merge() {
    let mut scheduler = scheduler(SchedMode::Batch);
    delete_and_re_add(&mut scheduler, "0");
    assert_eq!(scheduler.pending("not_still").len(), 2);
    let reports = scheduler.flush().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status.truth, Truth::False);
    assert_eq!(reports[0].status.witnesses, vec![violated(&[("v", 0)])])
}

#[test]
fn critical_contexts_do_not_merge() {
    let mut scheduler = scheduler(SchedMode::Batch);
    scheduler.add_critical(0.into());
    delete_and_re_add(&mut scheduler, "2");
    assert_eq!(scheduler.pending("not_still").len(), 2);
    let reports = scheduler.flush().unwrap();
    assert_eq!(reports[0].status.truth, Truth::True)
}

#[test]
fn masking_changes_start_a_new_batch() {
    let mut scheduler = scheduler(SchedMode::Batch);
    let mut manager = ContextManager::new();
    let c0 = manager.add("P", attrs(&[("state", "1")])).unwrap();
    scheduler.schedule(c0).unwrap();
    scheduler.flush().unwrap();

    // Falsifies the rule...
    let c1 = manager.add("P", attrs(&[("state", "0")])).unwrap();
    assert!(scheduler.schedule(c1).unwrap().is_empty());
    // ...so a deletion cannot join the batch.
    let del = manager.remove(0.into()).unwrap();
    let reports = scheduler.schedule(del).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status.truth, Truth::False);
    assert_eq!(scheduler.pending("not_still").len(), 1);

    let reports = scheduler.flush().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status.witnesses, vec![violated(&[("v", 1)])])
}

#[test]
fn predicate_errors_are_local() {
    for (strategy, mg) in configurations() {
        let mut checker = checker(strategy, mg);
        checker.add_rule(not_still(), &[]).unwrap();
        let mut manager = ContextManager::new();

        let c0 = manager.add("P", attrs(&[("state", "0")])).unwrap();
        let report = checker.check_batch("not_still", &[c0]).unwrap();
        assert_eq!(report.status.truth, Truth::False);

        // No state.
        let c1 = manager.add("P", BTreeMap::new()).unwrap();
        let report = checker.check_batch("not_still", &[c1]).unwrap();
        assert!(report.error.is_some(), "{} (mg: {})", strategy, mg);
        assert_eq!(report.status.truth, Truth::False);
        assert_eq!(report.status.witnesses, vec![violated(&[("v", 0)])]);
        assert!(checker.rule("not_still").unwrap().is_dirty());

        // Rebuilt from scratch.
        let fix = manager.update(1.into(), "state", "1").unwrap();
        let upd = manager.update(0.into(), "state", "1").unwrap();
        let report = checker.check_batch("not_still", &[fix, upd]).unwrap();
        assert!(report.error.is_none());
        assert_eq!(report.status.truth, Truth::True);
        let rule = checker.rule("not_still").unwrap();
        assert!(!rule.is_dirty());
        assert_eq!(rule.tree().len(), 3);
        assert_eq!(checker.profiler().stat("fallbacks"), 1)
    }
}

#[test]
fn inconsistencies_are_fatal() {
    for (strategy, mg) in configurations() {
        let mut checker = checker(strategy, mg);
        checker.add_rule(not_still(), &[]).unwrap();
        let ghost = ContextChange::del(
            "P",
            Arc::new(Context::new(7.into(), attrs(&[("state", "1")]))),
        );
        let err = checker.check_batch("not_still", &[ghost]).unwrap_err();
        assert!(err.is_fatal(), "{} (mg: {})", strategy, mg)
    }
}

#[test]
fn unknown_rules() {
    let mut checker = checker(Strategy::Pcc, true);
    let err = checker.check_batch("nope", &[]).unwrap_err();
    match err.kind() {
        ErrorKind::UnknownRule(id) => assert_eq!(id, "nope"),
        _ => panic!("expected an unknown rule error, got {}", err),
    }
    checker.add_rule(not_still(), &[]).unwrap();
    let err = checker.add_rule(not_still(), &[]).unwrap_err();
    assert!(format!("{}", err).contains("defined twice"))
}
