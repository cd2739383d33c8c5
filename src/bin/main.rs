//! Entry point for the binary.

use std::io::Write;

use ccmon::common::*;

/// Log record formatter.
fn format(record: &::log::Record) -> String {
    use log::Level::*;
    let mut s = String::new();
    match record.level() {
        Error => {
            s.push_str(&format!("({} \"", conf.bad("error")));
            let mut pref = "";
            for line in format!("{}", record.args()).lines() {
                s.push_str(pref);
                s.push_str(line);
                pref = "\n  "
            }
            s.push_str("\")")
        }
        Warn => {
            s.push_str(&format!("; {}", conf.sad("|===| Warning:")));
            for line in format!("{}", record.args()).lines() {
                s.push_str(&format!("\n; {} {}", conf.sad("|"), line))
            }
            s.push_str(&format!("\n; {}", conf.sad("|===|")))
        }
        Trace => {
            s.push_str(&format!("; |===| Trace ({}):", conf.emph(record.target())));
            for line in format!("{}", record.args()).lines() {
                s.push_str(&format!("\n; | {}", line))
            }
            s.push_str("\n; |===|")
        }
        Info | Debug => {
            let mut pref = "; ";
            for line in format!("{}", record.args()).lines() {
                s.push_str(pref);
                s.push_str(line);
                pref = "\n; "
            }
        }
    }
    s
}

fn main() {
    from_cli();

    // Initialize log.
    let res = env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .format(|buf, record| writeln!(buf, "{}", format(record)))
        .filter_level(conf.log_level())
        .try_init();
    if let Err(e) = res {
        println!("({} \"failed to initialize logging: {}\")", conf.bad("error"), e);
        ::std::process::exit(2)
    }

    // Work and report error if any.
    if let Err(errs) = ccmon::work() {
        print_err(&errs);
        ::std::process::exit(2)
    } else {
        ::std::process::exit(0)
    }
}
