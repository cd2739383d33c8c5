//! Error types.
//!
//! Errors come in three flavors.
//!
//! - [`ErrorKind::PredicateError`][pred] is local to a rule: the cycle of that
//!   rule is aborted and the rule is rebuilt from scratch at its next cycle,
//!   other rules are not affected ;
//! - [`ErrorKind::Inconsistent`][inc] and [`ErrorKind::TaskFailure`][task] are
//!   fatal, the instantiation tree cannot be trusted anymore and the run must
//!   stop ;
//! - everything else (parse errors, malformed rules, IO) is reported to the
//!   caller as is.
//!
//! [pred]: enum.ErrorKind.html#variant.PredicateError
//! (PredicateError variant of the ErrorKind enum)
//! [inc]: enum.ErrorKind.html#variant.Inconsistent
//! (Inconsistent variant of the ErrorKind enum)
//! [task]: enum.ErrorKind.html#variant.TaskFailure
//! (TaskFailure variant of the ErrorKind enum)

use crate::common::*;

/// Parse error data.
#[derive(Debug)]
pub struct ParseErrorData {
    /// Error message.
    pub msg: String,
    /// Portion of the line *before* the error token.
    pub pref: String,
    /// Token that caused the error.
    pub token: String,
    /// Portion of the line *after* the error token.
    pub suff: String,
    /// Line of the error, if known.
    pub line: Option<usize>,
}
impl fmt::Display for ParseErrorData {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let line_str = if let Some(line) = self.line {
            format!("{} ", line)
        } else {
            "".into()
        };
        write!(fmt, "{}", self.msg)?;
        if let Some(line) = self.line {
            writeln!(
                fmt,
                " at [{}]:",
                conf.emph(&format!("{}:{}", line, self.pref.len() + 1))
            )?
        } else {
            writeln!(fmt, ":")?
        }
        writeln!(fmt, "{0: ^1$}|", "", line_str.len())?;
        writeln!(
            fmt,
            "{}| {}{}{}",
            &line_str,
            conf.emph(&self.pref),
            conf.bad(&self.token),
            conf.emph(&self.suff)
        )?;
        write!(
            fmt,
            "{0: ^1$}| {0: ^2$}{3}",
            "",
            line_str.len(),
            self.pref.len(),
            conf.bad(&format!("{0:^>1$}", "", self.token.len().max(1)))
        )
    }
}

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Res;
    }

    foreign_links {
        Io(::std::io::Error) #[doc = "IO error."];
    }

    errors {
        #[doc = "Predicate evaluation error, local to a rule."]
        PredicateError(pred: String, msg: String) {
            description("predicate evaluation error")
            display("predicate `{}`: {}", pred, msg)
        }
        #[doc = "Structural consistency violation, fatal."]
        Inconsistent(msg: String) {
            description("structural consistency violation")
            display("consistency violation: {}", msg)
        }
        #[doc = "A worker task failed, fatal."]
        TaskFailure(msg: String) {
            description("worker task failure")
            display("worker task failed: {}", msg)
        }
        #[doc = "Malformed rule."]
        RuleError(rule: String, msg: String) {
            description("malformed rule")
            display("in rule `{}`: {}", rule, msg)
        }
        #[doc = "Parse error."]
        ParseError(data: ParseErrorData) {
            description("parse error")
            display("{}", data)
        }
        #[doc = "Unknown rule identifier."]
        UnknownRule(rule: String) {
            description("unknown rule")
            display("unknown rule `{}`", rule)
        }
    }
}

impl Error {
    /// True if the error must abort the whole run.
    ///
    /// Structural consistency violations and worker failures leave the
    /// instantiation tree in an untrustworthy state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            *self.kind(),
            ErrorKind::Inconsistent(_) | ErrorKind::TaskFailure(_)
        )
    }

    /// True if the kind of the error is
    /// [`ErrorKind::PredicateError`][pred].
    ///
    /// [pred]: enum.ErrorKind.html#variant.PredicateError
    /// (ErrorKind's PredicateError variant)
    pub fn is_predicate_error(&self) -> bool {
        matches!(*self.kind(), ErrorKind::PredicateError(_, _))
    }

    /// True if the kind of the error is [`ErrorKind::ParseError`][parse].
    ///
    /// [parse]: enum.ErrorKind.html#variant.ParseError
    /// (ErrorKind's ParseError variant)
    pub fn is_parse_error(&self) -> bool {
        matches!(*self.kind(), ErrorKind::ParseError(_))
    }
}

/// Predicate error constructor.
pub fn pred_err<S1: Into<String>, S2: Into<String>>(pred: S1, msg: S2) -> Error {
    ErrorKind::PredicateError(pred.into(), msg.into()).into()
}

/// Consistency violation constructor.
pub fn inconsistent<S: Into<String>>(msg: S) -> Error {
    ErrorKind::Inconsistent(msg.into()).into()
}

/// Prints an error.
pub fn print_err(errs: &Error) {
    println!("({} \"", conf.bad("error"));
    for err in errs.iter() {
        for line in format!("{}", err).lines() {
            println!("  {}", line)
        }
    }
    println!("\")")
}
