//! Incremental consistency checking of first-order rules over evolving
//! contexts.
//!
//! A *rule* is a first-order formula quantifying over *patterns*, sets of
//! contexts that evolve through a stream of additions, deletions and updates.
//! After each change, `ccmon` reports whether each rule still holds and, when
//! it does not, the *links* (bindings of quantified variables) that explain
//! the violation.
//!
//! Rules are not re-evaluated from scratch: each rule maintains an
//! instantiation tree mirroring its formula, which the [`check`] strategies
//! update incrementally. The [`sched`]uler decides when changes are checked,
//! merging changes that cancel each other.
//!
//! [`check`]: check/index.html (check module)
//! [`sched`]: sched/index.html (sched module)

#![doc(test(attr(deny(warnings))))]
#![allow(non_upper_case_globals)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

pub mod errors;
#[macro_use]
pub mod common;
pub mod check;
pub mod context;
pub mod formula;
pub mod parse;
pub mod pred;
pub mod sched;
pub mod tree;
pub mod workload;

#[cfg(test)]
mod tests;

use crate::{
    check::{Checker, CycleReport},
    common::*,
    parse::{Item, ItemRead, ParserCxt},
    pred::PredRegistry,
    sched::Scheduler,
    workload::Generator,
};

/// Reads the input file, or `stdin` if none, and works.
pub fn work() -> Res<()> {
    if let Some(file_path) = conf.in_file() {
        use std::fs::OpenOptions;
        let file = OpenOptions::new()
            .read(true)
            .open(file_path)
            .chain_err(|| format!("while opening input file `{}`", conf.emph(file_path)))?;
        read_and_work(file, false)?;
    } else {
        read_and_work(::std::io::stdin(), false)?;
    }
    Ok(())
}

/// Prints the status of a rule after a cycle.
fn print_report(report: &CycleReport, links: bool) {
    let truth = report.status.truth.to_string();
    let truth = match report.status.truth.to_bool() {
        Some(true) => conf.happy(truth),
        Some(false) => conf.bad(truth),
        None => conf.sad(truth),
    };
    print!("({} {}", conf.emph(&report.rule), truth);
    if links {
        for link in &report.status.witnesses {
            print!(" {}", link)
        }
    }
    println!(")")
}

/// Reads from a `Read`er, using the global configuration.
///
/// - `stop_on_err`: forces to stop at the first parse error, only used in
///   tests. Otherwise parse errors are printed and the item is skipped.
///
/// Returns the scheduler, after the last pending batches were flushed.
pub fn read_and_work<R: Read>(reader: R, stop_on_err: bool) -> Res<Scheduler> {
    read_and_work_with(reader, conf.check.clone(), &conf.sched, conf.links, stop_on_err)
}

/// Reads from a `Read`er, with an explicit configuration.
pub fn read_and_work_with<R: Read>(
    reader: R,
    check: CheckConf,
    sched: &SchedConf,
    links: bool,
    stop_on_err: bool,
) -> Res<Scheduler> {
    let checker = Checker::new(check, PredRegistry::with_builtins())?;
    let mut scheduler = Scheduler::new(sched.mode, checker);

    let mut reader = ::std::io::BufReader::new(reader);
    // String buffer.
    let buf = &mut String::with_capacity(2000);
    // Parser context, knows the patterns and the live contexts.
    let mut parser_cxt = ParserCxt::new();
    // Line offset of the parser.
    let mut line_off = 0;
    // Items of the current buffer.
    let mut items = vec![];

    'parse_work: loop {
        buf.clear();
        let lines_parsed = reader.read_item(buf).chain_err(|| "while reading input")?;
        if lines_parsed == 0 {
            break 'parse_work;
        }

        items.clear();
        let parse_res = parser_cxt.parser(buf, line_off).parse(&mut items);
        line_off += lines_parsed;
        if let Err(e) = parse_res {
            if stop_on_err {
                return Err(e);
            }
            print_err(&e)
        }

        for item in items.drain(..) {
            match item {
                Item::Rule(fml) => {
                    let facts = parser_cxt.manager().snapshot();
                    let report = scheduler.checker_mut().add_rule(fml, &facts)?;
                    print_report(&report, links)
                }
                Item::Change(change) => {
                    log_debug!("change {}", change);
                    for report in scheduler.schedule(change)? {
                        print_report(&report, links)
                    }
                }
                Item::Critical(ids) => {
                    for id in ids {
                        scheduler.add_critical(id)
                    }
                }
                Item::Check => {
                    for report in scheduler.flush()? {
                        print_report(&report, links)
                    }
                    println!("(check");
                    for rule in scheduler.checker().rules() {
                        print!("  ");
                        print_report(&rule.report(), links)
                    }
                    println!(")")
                }
            }
        }
    }

    if let Some(count) = sched.gen {
        log_info!("generating {} random change(s), seed {}", count, sched.seed);
        let mut gen = Generator::new(sched.seed, parser_cxt.pats());
        for _ in 0..count {
            let change = if let Some(change) = gen.next_change(parser_cxt.manager_mut())? {
                change
            } else {
                warn!("no pattern declared, cannot generate changes");
                break;
            };
            log_debug!("change {}", change);
            for report in scheduler.schedule(change)? {
                print_report(&report, links)
            }
        }
    }

    for report in scheduler.flush()? {
        print_report(&report, links)
    }

    print_stats("top", scheduler.checker().profiler());

    Ok(scheduler)
}
