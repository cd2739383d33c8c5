#![doc = r#"Profiling stuff.

In `bench` mode, `Profiler` is a unit structure. Also, all macros are
deactivated, so all profiling is completely removed.
"#]

use std::time::{Duration, Instant};

use crate::common::*;

/// Extends duration with a pretty printing.
pub trait DurationExt {
    /// Nice string representation.
    fn to_str(&self) -> String;
}
impl DurationExt for Duration {
    fn to_str(&self) -> String {
        format!("{}.{:0>9}", self.as_secs(), self.subsec_nanos())
    }
}

/// Profile Tree.
#[derive(PartialEq, Eq, Default)]
pub struct ProfileTree {
    /// Duration stored at this level.
    duration: Option<Duration>,
    /// Sub-branches.
    branches: BTreeMap<&'static str, ProfileTree>,
}
impl ProfileTree {
    /// Tree with nothing but the top level.
    pub fn top(top: Duration) -> Self {
        ProfileTree {
            duration: Some(top),
            branches: BTreeMap::new(),
        }
    }

    /// Inserts something in the tree.
    pub fn insert(&mut self, scope: Vec<&'static str>, duration: Duration) {
        let mut current = self;
        for scope in scope {
            current = current.branches.entry(scope).or_default();
        }
        current.duration = Some(duration)
    }

    /// Sum of the durations of the direct sub-branches.
    fn sub_duration(&self) -> Duration {
        self.branches.values().fold(Duration::from_secs(0), |acc, sub| {
            acc + sub.duration.unwrap_or_else(|| sub.sub_duration())
        })
    }

    /// Iterator on the tree, in topological order.
    pub fn iter<F>(&self, f: F)
    where
        F: Fn(&[&'static str], &Duration, Duration),
    {
        let top = self.duration.unwrap_or_else(|| self.sub_duration());
        f(&[], &top, self.sub_duration());
        self.iter_rec(&mut vec![], &f)
    }

    fn iter_rec<F>(&self, scope: &mut Vec<&'static str>, f: &F)
    where
        F: Fn(&[&'static str], &Duration, Duration),
    {
        for (&name, sub) in &self.branches {
            scope.push(name);
            let sub_duration = sub.sub_duration();
            let duration = sub.duration.unwrap_or(sub_duration);
            f(&scope[..], &duration, sub_duration);
            sub.iter_rec(scope, f);
            scope.pop();
        }
    }
}

/// Maps strings to counters.
pub type Stats = BTreeMap<String, usize>;
/// Provides a debug print function.
pub trait CanPrint {
    /// Debug print (multi-line).
    fn print(&self);
}
impl CanPrint for Stats {
    fn print(&self) {
        for (stat, count) in self {
            let stat_len = ::std::cmp::min(30, stat.len());
            println!(
                ";   {0: >1$}{2}: {3: >5}",
                "",
                30 - stat_len,
                conf.emph(stat),
                count
            )
        }
    }
}
impl CanPrint for ProfileTree {
    fn print(&self) {
        self.iter(|scope, time, sub_time| {
            let sub = if sub_time != Duration::from_secs(0) {
                format!(" ({}s)", sub_time.to_str())
            } else {
                "".into()
            };
            if let Some(last) = scope.last() {
                println!(
                    "; {0: >1$}|- {2}s {3}{4}",
                    "",
                    2 * scope.len(),
                    time.to_str(),
                    last,
                    sub
                )
            } else {
                println!("; total {}s{}", time.to_str(), sub)
            }
        })
    }
}

/// Profiling structure, only in `not(bench)`.
///
/// Maintains statistics using a map indexed by strings.
///
/// Internally, the structures are wrapped in `RefCell`s so that mutation
/// does not require `& mut self`. Hence a profiler never leaves the thread
/// driving the cycles, workers do not profile.
#[cfg(not(feature = "bench"))]
pub struct Profiler {
    /// String-indexed durations.
    map: ::std::cell::RefCell<HashMap<Vec<&'static str>, (Option<Instant>, Duration)>>,
    /// Starting tick, for total time.
    start: Instant,
    /// Other statistics.
    stats: ::std::cell::RefCell<Stats>,
}
#[cfg(feature = "bench")]
pub struct Profiler;

impl Default for Profiler {
    fn default() -> Self {
        Profiler::new()
    }
}

impl Profiler {
    /// Constructor.
    #[cfg(not(feature = "bench"))]
    pub fn new() -> Self {
        use std::cell::RefCell;
        Profiler {
            map: RefCell::new(HashMap::new()),
            start: Instant::now(),
            stats: RefCell::new(Stats::new()),
        }
    }
    /// Constructor.
    #[cfg(feature = "bench")]
    pub fn new() -> Self {
        Profiler
    }

    /// Acts on a statistic.
    #[cfg(not(feature = "bench"))]
    pub fn stat_do<F, S>(&self, stat: S, f: F)
    where
        F: Fn(usize) -> usize,
        S: Into<String>,
    {
        let mut map = self.stats.borrow_mut();
        let val = map.entry(stat.into()).or_insert(0);
        *val = f(*val)
    }

    /// Value of a statistic, zero if it was never touched.
    #[cfg(not(feature = "bench"))]
    pub fn stat(&self, stat: &str) -> usize {
        self.stats.borrow().get(stat).cloned().unwrap_or(0)
    }
    /// Value of a statistic, always zero in bench mode.
    #[cfg(feature = "bench")]
    pub fn stat(&self, _: &str) -> usize {
        0
    }

    /// Ticks.
    #[cfg(not(feature = "bench"))]
    pub fn tick(&self, scope: Vec<&'static str>) {
        if scope.is_empty() {
            panic!("Profile: can't use scope `total`")
        }
        let mut map = self.map.borrow_mut();
        let time = map
            .entry(scope)
            .or_insert_with(|| (None, Duration::from_secs(0)));
        time.0 = Some(Instant::now())
    }

    /// Registers the time since the last tick.
    ///
    /// Panics if there was no tick since the last time registration.
    #[cfg(not(feature = "bench"))]
    pub fn mark(&self, scope: Vec<&'static str>) {
        if scope.is_empty() {
            panic!("Profile: can't use scope `total`")
        }
        let mut map = self.map.borrow_mut();
        if let Some(&mut (ref mut tick, ref mut sum)) = map.get_mut(&scope) {
            if let Some(instant) = tick.take() {
                *sum += Instant::now().duration_since(instant)
            }
        } else {
            panic!("profiling: trying to mark the time without ticking first")
        }
    }

    /// Extracts a profile tree.
    #[cfg(not(feature = "bench"))]
    pub fn extract_tree(&self) -> (ProfileTree, Stats) {
        let mut tree = ProfileTree::top(Instant::now().duration_since(self.start));
        for (scope, &(ref should_be_none, ref time)) in self.map.borrow().iter() {
            if should_be_none.is_some() {
                warn!(
                    "Profile::extract_tree: still have a live instant for {:?}",
                    scope
                )
            }
            tree.insert(scope.clone(), *time)
        }
        (tree, self.stats.borrow().clone())
    }

    /// Prints the profiling info.
    #[cfg(not(feature = "bench"))]
    pub fn print<S1: AsRef<str>, S2: AsRef<str>>(&self, name: S1, pref: S2) {
        let (tree, stats) = self.extract_tree();
        println!("; |===| {}{} profiling:", pref.as_ref(), conf.emph(name.as_ref()));
        tree.print();
        if !stats.is_empty() {
            println!("; |");
            println!("; | stats:");
            stats.print()
        }
        println!("; |===|")
    }
}

#[cfg(all(test, not(feature = "bench")))]
mod tests {
    use super::*;

    #[test]
    fn stats_and_scopes() {
        let profiler = Profiler::new();
        profile! { |profiler| "cycles" => add 2 }
        profile! { |profiler| "cycles" => add 1 }
        profile! { |profiler| tick "truth" }
        profile! { |profiler| mark "truth" }
        assert_eq!(profiler.stat("cycles"), 3);
        assert_eq!(profiler.stat("merged"), 0);
        let (tree, stats) = profiler.extract_tree();
        assert_eq!(stats.get("cycles"), Some(&3));
        let seen = ::std::cell::RefCell::new(vec![]);
        tree.iter(|scope, _, _| seen.borrow_mut().push(scope.to_vec()));
        assert_eq!(seen.into_inner(), vec![vec![], vec!["truth"]])
    }
}
