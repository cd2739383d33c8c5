//! Base types and functions.

pub use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
pub use std::fmt;
pub use std::io::{Read, Write};
pub use std::sync::Arc;

pub use either::Either;
pub use rayon::prelude::*;
pub use rayon::ThreadPool;

pub use crate::errors::*;

#[macro_use]
pub mod macros;
pub mod config;
pub mod profiling;
mod revision;
mod wrappers;

pub use self::config::*;
pub use self::profiling::{CanPrint, Profiler};
pub use self::wrappers::*;

use std::sync::atomic::{AtomicBool, Ordering};

/// If true, `conf` is built from the command line.
static FROM_CLI: AtomicBool = AtomicBool::new(false);

/// Makes the global configuration read the command-line arguments.
///
/// Must be called before the first access to `conf`, only the binary does
/// this. Library users and tests get the default configuration.
pub fn from_cli() {
    FROM_CLI.store(true, Ordering::SeqCst)
}

lazy_static! {
    /// Configuration from clap, or the default one if `from_cli` was not
    /// called.
    pub static ref conf: Config = if FROM_CLI.load(Ordering::SeqCst) {
        Config::clap()
    } else {
        Config::default()
    };
    static ref version_string: String = if let Some(rev) = revision::REVISION {
        format!("{} ({})", crate_version!(), rev)
    } else {
        crate_version!().to_string()
    };
    /// Version with revision info.
    pub static ref version: &'static str = &version_string;
}

// |===| Helpers.

/// Prints the stats if asked. Does nothing in bench mode.
#[cfg(feature = "bench")]
pub fn print_stats(_: &str, _: &Profiler) {}
/// Prints the stats if asked. Does nothing in bench mode.
#[cfg(not(feature = "bench"))]
pub fn print_stats(name: &str, profiler: &Profiler) {
    if conf.stats {
        println!();
        profiler.print(name, "");
        println!();
    }
}

/// Builds the fixed-size worker pool used by concurrent strategies.
pub fn mk_pool(threads: usize) -> Res<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("ccmon-worker-{}", i))
        .build()
        .chain_err(|| format!("while building a pool of {} worker(s)", threads))
}

/// Turns a panic payload into a task failure.
pub fn task_failure(payload: Box<dyn ::std::any::Any + Send>) -> Error {
    let msg = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    ErrorKind::TaskFailure(msg).into()
}

/// Runs `f` on all `items` in the pool, one task per item.
///
/// All tasks are awaited before anything is returned. Results come back in
/// dispatch order, and the first error in that order is the one propagated.
/// A task that panics yields a [`TaskFailure`][task].
///
/// Runs sequentially in the current thread when there is at most one item.
///
/// [task]: ../errors/enum.ErrorKind.html#variant.TaskFailure
/// (TaskFailure variant of the ErrorKind enum)
pub fn fan_out<T, R, F>(pool: &ThreadPool, items: &[T], f: F) -> Res<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Res<R> + Sync + Send,
{
    use std::panic::{catch_unwind, AssertUnwindSafe};

    if items.len() <= 1 {
        return items.iter().map(f).collect();
    }

    let results: Vec<::std::thread::Result<Res<R>>> = pool.install(|| {
        items
            .par_iter()
            .map(|item| catch_unwind(AssertUnwindSafe(|| f(item))))
            .collect()
    });

    let mut res = Vec::with_capacity(results.len());
    let mut err = None;
    for result in results {
        match result {
            Ok(Ok(r)) => res.push(r),
            Ok(Err(e)) => {
                if err.is_none() {
                    err = Some(e)
                }
            }
            Err(payload) => {
                let e = task_failure(payload);
                // Task failures win over local errors.
                if err.as_ref().map(|e: &Error| !e.is_fatal()).unwrap_or(true) {
                    err = Some(e)
                }
            }
        }
    }
    if let Some(e) = err {
        Err(e)
    } else {
        Ok(res)
    }
}
