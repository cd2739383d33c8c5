//! Concurrent full re-evaluation.
//!
//! Same as full re-evaluation, except that the topmost quantifiers build and
//! evaluate their children in the worker pool.

use crate::{
    check::Scratch,
    formula::{FNode, Formula},
};

/// Lets the quantifiers with no quantifier above them fan out.
pub fn mark_first_quantifiers(fml: &Formula, scratch: &mut Scratch) {
    let mut stack = vec![fml.root()];
    while let Some(fidx) = stack.pop() {
        match fml[fidx] {
            FNode::Forall(_) | FNode::Exists(_) => scratch.set_conc(fidx),
            _ => stack.extend(fml[fidx].kids()),
        }
    }
}
