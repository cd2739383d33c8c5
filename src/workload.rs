//! Random change streams.

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use crate::{
    common::*,
    context::{ContextChange, ContextManager},
};

/// Generates valid random changes over some patterns.
///
/// Additions create fresh contexts with random attribute values, deletions
/// and updates pick a live context. The proportions are one half, three
/// tenths and one fifth. A deletion or update over a pattern with no live
/// context becomes an addition.
pub struct Generator {
    /// Random generator.
    rng: XorShiftRng,
    /// Patterns and their attributes.
    pats: Vec<(String, Vec<String>)>,
    /// Attribute values are drawn from `0..values`.
    values: usize,
}
impl Generator {
    /// Constructor. Values range over `0..4` by default.
    pub fn new(seed: u64, pats: &BTreeMap<String, Vec<String>>) -> Self {
        Generator {
            rng: XorShiftRng::seed_from_u64(seed),
            pats: pats
                .iter()
                .map(|(pat, attrs)| (pat.clone(), attrs.clone()))
                .collect(),
            values: 4,
        }
    }

    /// Sets the size of the value domain.
    pub fn values(mut self, values: usize) -> Self {
        self.values = values.max(1);
        self
    }

    fn attrs(&mut self, attrs: &[String]) -> BTreeMap<String, String> {
        let mut res = BTreeMap::new();
        for attr in attrs {
            let val = self.rng.gen_range(0..self.values);
            res.insert(attr.clone(), val.to_string());
        }
        res
    }

    /// Next change, `None` if there are no patterns.
    pub fn next_change(&mut self, manager: &mut ContextManager) -> Res<Option<ContextChange>> {
        if self.pats.is_empty() {
            return Ok(None);
        }
        let (pat, attrs) = self.pats[self.rng.gen_range(0..self.pats.len())].clone();
        let live = manager.live_ids(&pat);
        let roll = self.rng.gen_range(0..10);

        let change = if roll < 5 || live.is_empty() {
            let attrs = self.attrs(&attrs);
            manager.add(pat, attrs)?
        } else {
            let id = live[self.rng.gen_range(0..live.len())];
            if roll < 8 || attrs.is_empty() {
                manager.remove(id)?
            } else {
                let attr = &attrs[self.rng.gen_range(0..attrs.len())];
                let val = self.rng.gen_range(0..self.values);
                manager.update(id, attr.clone(), val.to_string())?
            }
        };
        Ok(Some(change))
    }

    /// The next `n` changes.
    pub fn changes(&mut self, manager: &mut ContextManager, n: usize) -> Res<Vec<ContextChange>> {
        let mut res = Vec::with_capacity(n);
        for _ in 0..n {
            match self.next_change(manager)? {
                Some(change) => res.push(change),
                None => break,
            }
        }
        Ok(res)
    }
}
