//! Concurrent, non-blocking batched re-evaluation.
//!
//! Evaluation is the batched one, quantifiers fan out when it is deemed
//! profitable and truths are staged as virtual truths until the end of the
//! cycle.

use crate::{check::Scratch, common::*, context::FactStore, formula::Formula};

/// Lets the affected quantifiers with enough independent work fan out.
///
/// A quantifier at depth two or more fans out if
///
/// - more than one context is added or updated and its body is unaffected,
/// - more than one old child survives and its body is affected, or
/// - some context is added and its body is affected.
pub fn mark_profitable(fml: &Formula, store: &FactStore, scratch: &mut Scratch) {
    for fidx in (0..fml.len()).map(FIdx::from) {
        let q = match fml[fidx].quant() {
            Some((_, q)) if scratch.affected(fidx) => q,
            _ => continue,
        };
        if fml.depth_of(&q.pat).map(|depth| depth < 2).unwrap_or(true) {
            continue;
        }
        let (add, _, upd) = store.delta_sizes(&q.pat);
        let survivors = store.pool_len(&q.pat).saturating_sub(add + upd);
        let sub_affected = scratch.affected(q.sub);
        let profitable = (add + upd > 1 && !sub_affected)
            || (survivors > 1 && sub_affected)
            || (add >= 1 && sub_affected);
        if profitable {
            scratch.set_conc(fidx)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::{Context, ContextChange},
        formula::FormulaBuilder,
    };

    fn change(pat: &str, id: usize) -> ContextChange {
        ContextChange::add(pat, Arc::new(Context::new(id.into(), BTreeMap::new())))
    }

    #[test]
    fn profitability() {
        // forall v P. exists w Q. same_loc(v, w)
        let mut b = FormulaBuilder::new("r");
        let leaf = b.bfunc("same_loc", vec![("v1", "v"), ("v2", "w")]);
        let inner = b.exists("w", "Q", leaf);
        let outer = b.forall("v", "P", inner);
        let fml = b.build(outer).unwrap();

        let mut store = FactStore::new();
        for id in 0..3 {
            store.apply_one(&change("P", id)).unwrap();
        }
        store.apply_batch(&[change("Q", 3), change("Q", 4)]).unwrap();

        // Q changes: the body of `outer` is affected and three P children
        // survive. `inner` is too shallow.
        let mut scratch = Scratch::for_change(&fml, "Q");
        mark_profitable(&fml, &store, &mut scratch);
        assert!(scratch.conc(outer));
        assert!(!scratch.conc(inner));

        // A single P addition with an unaffected body is not worth it.
        store.clear_deltas();
        store.apply_batch(&[change("P", 5)]).unwrap();
        let mut scratch = Scratch::for_change(&fml, "P");
        mark_profitable(&fml, &store, &mut scratch);
        assert!(!scratch.conc(outer));

        store.clear_deltas();
        store.apply_batch(&[change("P", 6), change("P", 7)]).unwrap();
        let mut scratch = Scratch::for_change(&fml, "P");
        mark_profitable(&fml, &store, &mut scratch);
        assert!(scratch.conc(outer))
    }
}
