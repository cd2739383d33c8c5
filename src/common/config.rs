//! Ccmon's global configuration.

use ansi_term::{Colour, Style};
use clap::Arg;

use crate::{check::Strategy, common::*, sched::SchedMode};

/// Clap `App` with static lifetimes.
pub type App = ::clap::Command<'static>;
/// Clap `ArgMatches`.
pub type Matches = ::clap::ArgMatches;

/// Checker configuration.
///
/// This is the only part of the configuration the checking engine sees, it is
/// passed explicitly so that several checkers with different strategies can
/// live side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConf {
    /// Re-evaluation strategy.
    pub strategy: Strategy,
    /// Generate links for substantial nodes only.
    pub mg: bool,
    /// Size of the worker pool.
    pub threads: usize,
}
impl Default for CheckConf {
    fn default() -> Self {
        CheckConf {
            strategy: Strategy::Pcc,
            mg: true,
            threads: 8,
        }
    }
}
impl CheckConf {
    /// Constructor.
    pub fn new(strategy: Strategy) -> Self {
        CheckConf {
            strategy,
            ..Self::default()
        }
    }

    /// Sets the `mg` flag.
    pub fn mg(mut self, mg: bool) -> Self {
        self.mg = mg;
        self
    }

    /// Sets the number of workers.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Adds clap options to a clap App.
    pub fn add_args(app: App, mut order: usize) -> App {
        let mut order = || {
            order += 1;
            order
        };

        app.arg(
            Arg::new("strategy")
                .long("strategy")
                .help("re-evaluation strategy")
                .possible_values(Strategy::names())
                .default_value("pcc")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("mg")
                .long("mg")
                .help("only generate links for nodes explaining a violation")
                .validator(bool_validator)
                .value_name(bool_format)
                .default_value("on")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .help("size of the worker pool used by concurrent strategies")
                .validator(|s| bounded_int_validator(s, 1, 512))
                .value_name("int")
                .default_value("8")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
    }

    /// Creates itself from some matches.
    pub fn new_of(matches: &Matches) -> Self {
        let strategy = matches
            .value_of("strategy")
            .and_then(Strategy::of_str)
            .expect("unreachable(strategy): default is provided and input validated");
        let mg = bool_of_matches(matches, "mg");
        let threads = int_of_matches(matches, "threads");
        CheckConf {
            strategy,
            mg,
            threads,
        }
    }
}

/// Scheduler and workload configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedConf {
    /// Scheduling mode.
    pub mode: SchedMode,
    /// Number of random changes to generate, if any.
    pub gen: Option<usize>,
    /// Seed of the random workload.
    pub seed: u64,
}
impl Default for SchedConf {
    fn default() -> Self {
        SchedConf {
            mode: SchedMode::Batch,
            gen: None,
            seed: 42,
        }
    }
}
impl SchedConf {
    /// Adds clap options to a clap App.
    pub fn add_args(app: App, mut order: usize) -> App {
        let mut order = || {
            order += 1;
            order
        };

        app.arg(
            Arg::new("sched")
                .long("sched")
                .help("scheduling mode, `imd` checks each change on its own")
                .possible_values(["imd", "batch"])
                .default_value("batch")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("gen")
                .long("gen")
                .help("generates that many random changes after the input, `0` for none")
                .validator(int_validator)
                .value_name("int")
                .default_value("0")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .help("seed of the random change generator")
                .validator(int_validator)
                .value_name("int")
                .default_value("42")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order())
                .hide(true),
        )
    }

    /// Creates itself from some matches.
    pub fn new(matches: &Matches) -> Self {
        let mode = matches
            .value_of("sched")
            .and_then(SchedMode::of_str)
            .expect("unreachable(sched): default is provided and input validated");
        let gen = match int_of_matches(matches, "gen") {
            0 => None,
            n => Some(n),
        };
        let seed = int_of_matches(matches, "seed") as u64;
        SchedConf { mode, gen, seed }
    }
}

/// Global configuration.
pub struct Config {
    file: Option<String>,
    /// Verbosity.
    pub verb: usize,
    /// Statistics flag.
    pub stats: bool,
    /// Print links of violated rules.
    pub links: bool,
    /// Styles, for coloring.
    styles: Styles,
    /// Checker configuration.
    pub check: CheckConf,
    /// Scheduler configuration.
    pub sched: SchedConf,
}
impl Default for Config {
    fn default() -> Self {
        Config {
            file: None,
            verb: 0,
            stats: false,
            links: true,
            styles: Styles::new(false),
            check: CheckConf::default(),
            sched: SchedConf::default(),
        }
    }
}
impl ColorExt for Config {
    fn styles(&self) -> &Styles {
        &self.styles
    }
}
impl Config {
    /// Input file.
    #[inline]
    pub fn in_file(&self) -> Option<&String> {
        self.file.as_ref()
    }

    /// Log level corresponding to the verbosity.
    pub fn log_level(&self) -> ::log::LevelFilter {
        use log::LevelFilter::*;
        match self.verb {
            0 => Warn,
            1 => Info,
            2 => Debug,
            _ => Trace,
        }
    }

    /// Parses command-line arguments and generates the configuration.
    pub fn clap() -> Self {
        let mut app = App::new(crate_name!());
        app = Self::add_args(app, 0);
        app = CheckConf::add_args(app, 100);
        app = SchedConf::add_args(app, 200);

        let matches = app.get_matches();

        // Input file.
        let file = matches.value_of("input file").map(|s| s.to_string());

        // Verbosity
        let mut verb = 0;
        for _ in 0..matches.occurrences_of("verb") {
            verb += 1
        }
        for _ in 0..matches.occurrences_of("quiet") {
            if verb > 0 {
                verb -= 1
            }
        }

        // Colors.
        let color = ::atty::is(::atty::Stream::Stdout) && bool_of_matches(&matches, "color");
        let styles = Styles::new(color);

        // Profiling.
        let stats = bool_of_matches(&matches, "stats");

        // Links.
        let links = bool_of_matches(&matches, "links");

        let check = CheckConf::new_of(&matches);
        let sched = SchedConf::new(&matches);

        Config {
            file,
            verb,
            stats,
            links,
            styles,
            check,
            sched,
        }
    }

    /// Adds clap options to a clap App.
    pub fn add_args(app: App, mut order: usize) -> App {
        let mut order = || {
            order += 1;
            order
        };

        app.version(*version)
            .about("Incremental consistency checking of first-order rules over evolving contexts.")
            .arg(
                Arg::new("input file")
                    .help("sets the input file to use (rules and changes)")
                    .index(1)
                    .display_order(order()),
            )
            .arg(
                Arg::new("verb")
                    .short('v')
                    .help("increases verbosity")
                    .takes_value(false)
                    .multiple_occurrences(true)
                    .display_order(order()),
            )
            .arg(
                Arg::new("quiet")
                    .short('q')
                    .help("decreases verbosity")
                    .takes_value(false)
                    .multiple_occurrences(true)
                    .display_order(order()),
            )
            .arg(
                Arg::new("color")
                    .long("color")
                    .short('c')
                    .help("(de)activates coloring (off if output is not a tty)")
                    .validator(bool_validator)
                    .value_name(bool_format)
                    .default_value("on")
                    .takes_value(true)
                    .number_of_values(1)
                    .display_order(order()),
            )
            .arg(
                Arg::new("stats")
                    .long("stats")
                    .short('s')
                    .help("reports some statistics at the end of the run")
                    .validator(bool_validator)
                    .value_name(bool_format)
                    .default_value("no")
                    .takes_value(true)
                    .number_of_values(1)
                    .display_order(order()),
            )
            .arg(
                Arg::new("links")
                    .long("links")
                    .help("prints the links explaining violations")
                    .validator(bool_validator)
                    .value_name(bool_format)
                    .default_value("on")
                    .takes_value(true)
                    .number_of_values(1)
                    .display_order(order()),
            )
    }
}

/// Contains some styles for coloring.
#[derive(Debug, Clone)]
pub struct Styles {
    /// Emphasis style.
    emph: Style,
    /// Happy style.
    hap: Style,
    /// Sad style.
    sad: Style,
    /// Bad style.
    bad: Style,
}
impl Default for Styles {
    fn default() -> Self {
        Styles::new(true)
    }
}
impl ColorExt for Styles {
    fn styles(&self) -> &Styles {
        self
    }
}
impl Styles {
    /// Creates some styles.
    pub fn new(colored: bool) -> Self {
        Styles {
            emph: if colored {
                Style::new().bold()
            } else {
                Style::new()
            },
            hap: if colored {
                Colour::Green.normal().bold()
            } else {
                Style::new()
            },
            sad: if colored {
                Colour::Yellow.normal().bold()
            } else {
                Style::new()
            },
            bad: if colored {
                Colour::Red.normal().bold()
            } else {
                Style::new()
            },
        }
    }
}

/// Can color things.
pub trait ColorExt {
    /// The styles in the colorizer: emph, happy, sad, and bad.
    fn styles(&self) -> &Styles;
    /// String emphasis.
    #[inline]
    fn emph<S: AsRef<str>>(&self, s: S) -> String {
        format!("{}", self.styles().emph.paint(s.as_ref()))
    }
    /// Happy string.
    #[inline]
    fn happy<S: AsRef<str>>(&self, s: S) -> String {
        format!("{}", self.styles().hap.paint(s.as_ref()))
    }
    /// Sad string.
    #[inline]
    fn sad<S: AsRef<str>>(&self, s: S) -> String {
        format!("{}", self.styles().sad.paint(s.as_ref()))
    }
    /// Bad string.
    #[inline]
    fn bad<S: AsRef<str>>(&self, s: S) -> String {
        format!("{}", self.styles().bad.paint(s.as_ref()))
    }
}

/// Format for booleans.
pub static bool_format: &str = "on/true|no/off/false";

/// Boolean of a string.
pub fn bool_of_str(s: &str) -> Option<bool> {
    match s {
        "on" | "true" => Some(true),
        "no" | "off" | "false" => Some(false),
        _ => None,
    }
}

/// Boolean of some matches.
///
/// Assumes a default is provided and the input has been validated with
/// `bool_validator`.
pub fn bool_of_matches(matches: &Matches, key: &str) -> bool {
    matches
        .value_of(key)
        .and_then(bool_of_str)
        .expect("failed to retrieve boolean argument")
}

/// Integer of some matches.
///
/// Assumes a default is provided and the input has been validated with
/// `int_validator`.
pub fn int_of_matches(matches: &Matches, key: &str) -> usize {
    matches
        .value_of(key)
        .and_then(|s| s.parse::<usize>().ok())
        .expect("failed to retrieve integer argument")
}

/// Validates integer input.
pub fn int_validator(s: &str) -> Result<(), String> {
    match s.parse::<usize>() {
        Ok(_) => Ok(()),
        Err(_) => Err(format!("expected an integer, got `{}`", s)),
    }
}

/// Validates integer input between some bounds.
pub fn bounded_int_validator(s: &str, lo: usize, hi: usize) -> Result<(), String> {
    match s.parse::<usize>() {
        Ok(val) => {
            if lo <= val && val <= hi {
                Ok(())
            } else {
                Err(format!(
                    "expected a value between {} and {}, got `{}`",
                    lo, hi, val
                ))
            }
        }
        Err(_) => Err(format!("expected an integer, got `{}`", s)),
    }
}

/// Validates boolean input.
pub fn bool_validator(s: &str) -> Result<(), String> {
    if bool_of_str(s).is_some() {
        Ok(())
    } else {
        Err(format!("expected `on/true` or `off/false`, got `{}`", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validators() {
        assert!(bool_validator("on").is_ok());
        assert!(bool_validator("off").is_ok());
        assert!(bool_validator("maybe").is_err());
        assert!(int_validator("7").is_ok());
        assert!(int_validator("-7").is_err());
        assert!(bounded_int_validator("0", 1, 512).is_err());
        assert!(bounded_int_validator("13", 1, 512).is_ok());
    }

    #[test]
    fn sub_confs_from_matches() {
        let mut app = App::new("ccmon");
        app = CheckConf::add_args(app, 0);
        app = SchedConf::add_args(app, 100);
        let matches = app.get_matches_from(vec![
            "ccmon",
            "--strategy",
            "cpcc_nb",
            "--mg",
            "off",
            "--threads",
            "3",
            "--sched",
            "imd",
            "--gen",
            "10",
        ]);
        let check = CheckConf::new_of(&matches);
        assert_eq!(check.strategy, Strategy::CpccNb);
        assert!(!check.mg);
        assert_eq!(check.threads, 3);
        let sched = SchedConf::new(&matches);
        assert_eq!(sched.mode, SchedMode::Imd);
        assert_eq!(sched.gen, Some(10));
        assert_eq!(sched.seed, 42);
    }
}
