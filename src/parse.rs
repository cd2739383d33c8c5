//! Input format parser.
//!
//! An input file is a sequence of s-expression items:
//!
//! ```text
//! ; Declarations.
//! (pattern P state location)
//! (rule r (forall v P (bfunc not_still (v1 v))))
//! ; Change stream.
//! (+ P car1 (state "1") (location "a"))
//! (~ P car1 (state "0"))
//! (- P car1)
//! (critical car2)
//! (check)
//! ```
//!
//! Parsing is done with two structures, as for the term parsers this crate
//! grew out of. [`ParserCxt`] is the *context*: it remembers the declared
//! patterns and owns the [`ContextManager`] resolving context names. A
//! [`Parser`] borrows the context and wraps the text being parsed, it
//! provides cursor-like functionalities and the actual parsing functions.
//!
//! ```rust
//! use ccmon::parse::{Item, ParserCxt};
//! let mut cxt = ParserCxt::new();
//! let mut items = vec![];
//! cxt.parser("\
//!     (pattern P state)
//!     (rule r (forall v P (bfunc not_still (v1 v))))
//!     (+ P car1 (state \"1\"))
//! ", 0).parse(&mut items).unwrap();
//! assert_eq!(items.len(), 2);
//! match &items[1] {
//!     Item::Change(change) => assert_eq!(change.ctx.name(), "car1"),
//!     _ => panic!("expected a change"),
//! }
//! ```
//!
//! [`ParserCxt`]: struct.ParserCxt.html (ParserCxt struct)
//! [`Parser`]: struct.Parser.html (Parser struct)
//! [`ContextManager`]: ../context/struct.ContextManager.html
//! (ContextManager struct)

use crate::{
    common::*,
    context::{ContextChange, ContextManager},
    formula::{Formula, FormulaBuilder, RepairKind},
};

/// Keywords, cannot be used as identifiers.
pub mod keywords {
    /// Universal quantifier.
    pub static forall: &str = "forall";
    /// Existential quantifier.
    pub static exists: &str = "exists";
    /// Conjunction.
    pub static and: &str = "and";
    /// Disjunction.
    pub static or: &str = "or";
    /// Implication.
    pub static implies: &str = "implies";
    /// Negation.
    pub static not: &str = "not";
    /// Predicate application.
    pub static bfunc: &str = "bfunc";

    /// Top-level commands.
    pub mod cmd {
        /// Pattern declaration.
        pub static pattern: &str = "pattern";
        /// Rule definition.
        pub static rule: &str = "rule";
        /// Critical contexts.
        pub static critical: &str = "critical";
        /// Flush and report.
        pub static check: &str = "check";
        /// Addition.
        pub static add: &str = "+";
        /// Deletion.
        pub static del: &str = "-";
        /// Update.
        pub static upd: &str = "~";
    }

    /// Quantifier attributes.
    pub mod attr {
        /// Filter.
        pub static filter: &str = ":filter";
        /// Contexts cannot be added.
        pub static non_addable: &str = ":non-addable";
        /// Contexts cannot be removed.
        pub static non_removable: &str = ":non-removable";
        /// Contexts cannot be updated.
        pub static non_updatable: &str = ":non-updatable";
        /// None of the above.
        pub static immutable: &str = ":immutable";
    }

    /// True if the string is a keyword.
    pub fn is_keyword(s: &str) -> bool {
        [forall, exists, and, or, implies, not, bfunc].contains(&s)
            || [cmd::pattern, cmd::rule, cmd::critical, cmd::check].contains(&s)
    }
}

/// Characters allowed in identifiers, besides alphanumeric ones.
static id_special_chars: &[char] = &['_', '-', '.', '\'', '#', '@', '$', '!', '?', '/'];

fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || id_special_chars.contains(&c)
}

/// Extends `BufRead` with s-expression item reading.
pub trait ItemRead {
    /// Reads the next item into `buf`, appending.
    ///
    /// Returns the number of lines read, zero at `eof`. Stops at the end of
    /// the first line where parentheses are balanced again. Parentheses in
    /// strings and comments are ignored.
    fn read_item(&mut self, buf: &mut String) -> Res<usize>;
}
impl<T: ::std::io::BufRead> ItemRead for T {
    fn read_item(&mut self, buf: &mut String) -> Res<usize> {
        let mut lines = 0;
        let mut depth: isize = 0;
        let mut opened = false;
        let mut in_string = false;
        let mut start = buf.len();

        'read_lines: while self.read_line(buf)? != 0 {
            lines += 1;
            'inspect_chars: for c in buf[start..].chars() {
                match c {
                    '"' => in_string = !in_string,
                    _ if in_string => (),
                    ';' => break 'inspect_chars,
                    '(' => {
                        opened = true;
                        depth += 1
                    }
                    ')' => depth -= 1,
                    _ => (),
                }
            }
            if opened && depth == 0 || depth < 0 {
                // Done, or something's wrong and the parser will say so.
                break 'read_lines;
            }
            start = buf.len()
        }

        Ok(lines)
    }
}

/// Position in the text.
///
/// Used mostly for backtracking the parser, and for errors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pos(usize);
impl ::std::ops::Deref for Pos {
    type Target = usize;
    fn deref(&self) -> &usize {
        &self.0
    }
}

/// Something the driver must act on.
#[derive(Debug, Clone)]
pub enum Item {
    /// A new rule.
    Rule(Formula),
    /// A change of the stream.
    Change(ContextChange),
    /// Contexts that must never be merged away.
    Critical(Vec<CtxId>),
    /// Flush the pending batches and report.
    Check,
}

/// Parser context, survives individual items.
#[derive(Debug, Default)]
pub struct ParserCxt {
    /// Declared patterns and their attributes.
    pats: BTreeMap<String, Vec<String>>,
    /// Live contexts.
    manager: ContextManager,
}
impl ParserCxt {
    /// Constructor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a parser for some text.
    ///
    /// `line_off` is the number of lines before the text, for errors.
    pub fn parser<'cxt, 's>(
        &'cxt mut self,
        string: &'s str,
        line_off: usize,
    ) -> Parser<'cxt, 's> {
        Parser {
            cxt: self,
            string,
            cursor: 0,
            line_off,
        }
    }

    /// Declared patterns, with their attributes.
    pub fn pats(&self) -> &BTreeMap<String, Vec<String>> {
        &self.pats
    }
    /// Context manager.
    pub fn manager(&self) -> &ContextManager {
        &self.manager
    }
    /// Context manager, mutable.
    pub fn manager_mut(&mut self) -> &mut ContextManager {
        &mut self.manager
    }
}

/// Parser structure. Generated from a `ParserCxt`.
pub struct Parser<'cxt, 's> {
    /// Parsing context.
    cxt: &'cxt mut ParserCxt,
    /// Text being read.
    string: &'s str,
    /// Current position in the text.
    cursor: usize,
    /// Line offset, for errors.
    line_off: usize,
}

impl<'cxt, 's> Parser<'cxt, 's> {
    /// Returns the text that hasn't been parsed yet.
    pub fn rest(&self) -> &str {
        &self.string[self.cursor..]
    }

    /// Generates a parse error at the current position.
    fn error_here<S: Into<String>>(&self, msg: S) -> ErrorKind {
        self.error(self.pos(), msg)
    }

    /// Generates a parse error at the given position.
    fn error<S: Into<String>>(&self, Pos(pos): Pos, msg: S) -> ErrorKind {
        let mut line = self.line_off;
        let mut start = 0;
        for text in self.string.split_inclusive('\n') {
            line += 1;
            let content = text.trim_end_matches(&['\n', '\r'][..]);
            if pos <= start + content.len() {
                let col = pos - start;
                let (pref, rest) = content.split_at(col);
                let (token, suff) = match rest.chars().next() {
                    Some(c) => rest.split_at(c.len_utf8()),
                    None => ("\\n", ""),
                };
                return ErrorKind::ParseError(ParseErrorData {
                    msg: msg.into(),
                    pref: pref.into(),
                    token: token.into(),
                    suff: suff.into(),
                    line: Some(line),
                });
            }
            start += text.len()
        }
        ErrorKind::ParseError(ParseErrorData {
            msg: msg.into(),
            pref: "".into(),
            token: "<eof>".into(),
            suff: "".into(),
            line: Some(line),
        })
    }

    /// True if there's still things to parse.
    #[inline]
    fn has_next(&self) -> bool {
        self.cursor < self.string.len()
    }
    /// The next character, does not move the cursor.
    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }
    /// The next character.
    fn next(&mut self) -> Option<char> {
        let next = self.peek();
        if let Some(c) = next {
            self.cursor += c.len_utf8()
        }
        next
    }

    /// Backtracks to a precise position.
    pub fn backtrack_to(&mut self, Pos(pos): Pos) {
        self.cursor = pos
    }
    /// Current position.
    pub fn pos(&self) -> Pos {
        Pos(self.cursor)
    }

    /// Consumes whitespaces and comments.
    pub fn ws_cmt(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.cursor += rest.len() - trimmed.len();
            if self.peek() == Some(';') {
                while let Some(c) = self.next() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Tries parsing a string.
    pub fn tag_opt(&mut self, tag: &str) -> bool {
        if self.rest().starts_with(tag) {
            self.cursor += tag.len();
            true
        } else {
            false
        }
    }
    /// Parses a string or fails.
    pub fn tag(&mut self, tag: &str) -> Res<()> {
        if self.tag_opt(tag) {
            Ok(())
        } else {
            bail!(self.error_here(format!("expected `{}`", conf.emph(tag))))
        }
    }

    /// Parses a word, a tag not followed by an identifier character.
    pub fn word_opt(&mut self, word: &str) -> bool {
        let pos = self.pos();
        if self.tag_opt(word) {
            if self.peek().map(is_id_char).unwrap_or(false) {
                self.backtrack_to(pos);
                false
            } else {
                true
            }
        } else {
            false
        }
    }
    /// Parses a word or fails.
    pub fn word(&mut self, word: &str) -> Res<()> {
        if self.word_opt(word) {
            Ok(())
        } else {
            bail!(self.error_here(format!("expected `{}`", conf.emph(word))))
        }
    }

    /// Tries to parse an identifier, fails on keywords.
    pub fn ident_opt(&mut self) -> Res<Option<(Pos, &'s str)>> {
        let start = self.pos();
        match self.peek() {
            Some(c) if c.is_alphabetic() || id_special_chars.contains(&c) => (),
            _ => return Ok(None),
        }
        while self.peek().map(is_id_char).unwrap_or(false) {
            self.next();
        }
        let id = &self.string[*start..self.cursor];
        if keywords::is_keyword(id) {
            bail!(self.error(start, format!("illegal use of keyword `{}`", conf.bad(id))))
        }
        Ok(Some((start, id)))
    }
    /// Parses an identifier or fails.
    pub fn ident(&mut self) -> Res<(Pos, &'s str)> {
        if let Some(id) = self.ident_opt()? {
            Ok(id)
        } else {
            bail!(self.error_here("expected an identifier"))
        }
    }

    /// Parses a value: a double-quoted string or a bare token.
    ///
    /// Strings have no escape sequences.
    pub fn value_opt(&mut self) -> Res<Option<(Pos, &'s str)>> {
        let start = self.pos();
        if self.tag_opt("\"") {
            match self.rest().find('"') {
                Some(len) => {
                    let val = &self.string[self.cursor..self.cursor + len];
                    self.cursor += len + 1;
                    Ok(Some((start, val)))
                }
                None => bail!(self.error(start, "unclosed string literal")),
            }
        } else {
            while self.peek().map(is_id_char).unwrap_or(false) {
                self.next();
            }
            if self.cursor == *start {
                Ok(None)
            } else {
                Ok(Some((start, &self.string[*start..self.cursor])))
            }
        }
    }
    /// Parses a value or fails.
    pub fn value(&mut self) -> Res<(Pos, &'s str)> {
        if let Some(val) = self.value_opt()? {
            Ok(val)
        } else {
            bail!(self.error_here("expected a value"))
        }
    }

    /// Parses a declared pattern.
    fn pat(&mut self) -> Res<&'s str> {
        let (pos, pat) = self.ident()?;
        if !self.cxt.pats.contains_key(pat) {
            bail!(self.error(pos, format!("unknown pattern `{}`", conf.bad(pat))))
        }
        Ok(pat)
    }

    /// Parses a live context name, yields its identity.
    fn live(&mut self, pat: Option<&str>) -> Res<CtxId> {
        let (pos, name) = self.value()?;
        let id = if let Some(id) = self.cxt.manager.by_name(name) {
            id
        } else {
            bail!(self.error(pos, format!("unknown context `{}`", conf.bad(name))))
        };
        if let Some(pat) = pat {
            if self.cxt.manager.pattern_of(id) != Some(pat) {
                bail!(self.error(
                    pos,
                    format!("context `{}` is not a `{}`", conf.bad(name), pat)
                ))
            }
        }
        Ok(id)
    }

    /// Parses `(attr "val")` pairs.
    fn attrs(&mut self) -> Res<BTreeMap<String, String>> {
        let mut attrs = BTreeMap::new();
        self.ws_cmt();
        while self.tag_opt("(") {
            self.ws_cmt();
            let (pos, attr) = self.ident()?;
            self.ws_cmt();
            let (_, val) = self.value()?;
            self.ws_cmt();
            self.tag(")")?;
            self.ws_cmt();
            if attr == "name" {
                bail!(self.error(pos, "contexts are named by their second argument"))
            }
            if attrs.insert(attr.to_string(), val.to_string()).is_some() {
                bail!(self.error(pos, format!("attribute `{}` given twice", conf.bad(attr))))
            }
        }
        Ok(attrs)
    }

    /// Parses a pattern declaration.
    fn pattern_dec(&mut self) -> Res<bool> {
        if !self.word_opt(keywords::cmd::pattern) {
            return Ok(false);
        }
        self.ws_cmt();
        let (pos, pat) = self.ident()?;
        if self.cxt.pats.contains_key(pat) {
            bail!(self.error(pos, format!("pattern `{}` is declared twice", conf.bad(pat))))
        }
        let mut attrs = vec![];
        self.ws_cmt();
        while let Some((_, attr)) = self.ident_opt()? {
            attrs.push(attr.to_string());
            self.ws_cmt()
        }
        self.cxt.pats.insert(pat.into(), attrs);
        Ok(true)
    }

    /// Parses a rule definition.
    fn rule(&mut self) -> Res<Option<Formula>> {
        let start = self.pos();
        if !self.word_opt(keywords::cmd::rule) {
            return Ok(None);
        }
        self.ws_cmt();
        let (_, id) = self.ident()?;
        self.ws_cmt();
        let mut builder = FormulaBuilder::new(id);
        let root = self.formula(&mut builder)?;
        match builder.build(root) {
            Ok(fml) => Ok(Some(fml)),
            Err(e) => Err(e).chain_err(|| self.error(start, "in this rule")),
        }
    }

    /// Parses a formula.
    fn formula(&mut self, b: &mut FormulaBuilder) -> Res<FIdx> {
        self.tag("(")?;
        self.ws_cmt();
        let start = self.pos();

        let res = if self.word_opt(keywords::forall) {
            self.quantifier(b, true)?
        } else if self.word_opt(keywords::exists) {
            self.quantifier(b, false)?
        } else if self.word_opt(keywords::not) {
            self.ws_cmt();
            let sub = self.formula(b)?;
            b.not(sub)
        } else if self.word_opt(keywords::bfunc) {
            self.ws_cmt();
            let (_, name) = self.ident()?;
            let mut params = vec![];
            self.ws_cmt();
            while self.tag_opt("(") {
                self.ws_cmt();
                let (_, pos) = self.value()?;
                self.ws_cmt();
                let (_, var) = self.ident()?;
                self.ws_cmt();
                self.tag(")")?;
                self.ws_cmt();
                params.push((pos, var))
            }
            b.bfunc(name, params)
        } else {
            let binary: Option<fn(&mut FormulaBuilder, FIdx, FIdx) -> FIdx> =
                if self.word_opt(keywords::and) {
                    Some(FormulaBuilder::and)
                } else if self.word_opt(keywords::or) {
                    Some(FormulaBuilder::or)
                } else if self.word_opt(keywords::implies) {
                    Some(FormulaBuilder::implies)
                } else {
                    None
                };
            if let Some(mk) = binary {
                self.ws_cmt();
                let lhs = self.formula(b)?;
                self.ws_cmt();
                let rhs = self.formula(b)?;
                mk(b, lhs, rhs)
            } else {
                bail!(self.error(start, "expected a formula"))
            }
        };

        self.ws_cmt();
        self.tag(")")?;
        Ok(res)
    }

    /// Parses the rest of a quantifier.
    fn quantifier(&mut self, b: &mut FormulaBuilder, forall: bool) -> Res<FIdx> {
        self.ws_cmt();
        let (_, var) = self.ident()?;
        self.ws_cmt();
        let pat = self.pat()?;

        let mut filter = None;
        let mut disabled = vec![];
        loop {
            self.ws_cmt();
            let pos = self.pos();
            if self.word_opt(keywords::attr::filter) {
                self.ws_cmt();
                let (_, name) = self.ident()?;
                self.ws_cmt();
                let (_, dep) = self.ident()?;
                filter = Some((pos, name, dep))
            } else if self.word_opt(keywords::attr::non_addable) {
                disabled.push(RepairKind::Addition)
            } else if self.word_opt(keywords::attr::non_removable) {
                disabled.push(RepairKind::Removal)
            } else if self.word_opt(keywords::attr::non_updatable) {
                disabled.push(RepairKind::Update)
            } else if self.word_opt(keywords::attr::immutable) {
                disabled.extend(&[RepairKind::Addition, RepairKind::Removal, RepairKind::Update])
            } else if self.peek() == Some(':') {
                bail!(self.error_here("unknown quantifier attribute"))
            } else {
                break;
            }
        }

        let sub = self.formula(b)?;
        let quant = if forall {
            b.forall(var, pat, sub)
        } else {
            b.exists(var, pat, sub)
        };
        if let Some((pos, name, dep)) = filter {
            if let Err(e) = b.filter(quant, name, dep) {
                return Err(e).chain_err(|| self.error(pos, "in this filter"));
            }
        }
        for kind in disabled {
            b.disable(quant, kind, pat)
        }
        Ok(quant)
    }

    /// Parses a change.
    fn change(&mut self) -> Res<Option<ContextChange>> {
        let start = self.pos();
        let change = if self.word_opt(keywords::cmd::add) {
            self.ws_cmt();
            let pat = self.pat()?;
            self.ws_cmt();
            let (pos, name) = self.value()?;
            if self.cxt.manager.by_name(name).is_some() {
                bail!(self.error(pos, format!("context `{}` is already live", conf.bad(name))))
            }
            let mut attrs = self.attrs()?;
            attrs.insert("name".into(), name.into());
            self.cxt.manager.add(pat, attrs)
        } else if self.word_opt(keywords::cmd::del) {
            self.ws_cmt();
            let pat = self.pat()?;
            self.ws_cmt();
            let id = self.live(Some(pat))?;
            self.cxt.manager.remove(id)
        } else if self.word_opt(keywords::cmd::upd) {
            self.ws_cmt();
            let pat = self.pat()?;
            self.ws_cmt();
            let id = self.live(Some(pat))?;
            let attrs = self.attrs()?;
            if attrs.is_empty() {
                bail!(self.error_here("expected at least one attribute"))
            }
            self.cxt.manager.update_attrs(id, attrs)
        } else {
            return Ok(None);
        };
        match change {
            Ok(change) => Ok(Some(change)),
            Err(e) => Err(e).chain_err(|| self.error(start, "in this change")),
        }
    }

    /// Parses a list of critical contexts.
    fn critical(&mut self) -> Res<Option<Vec<CtxId>>> {
        if !self.word_opt(keywords::cmd::critical) {
            return Ok(None);
        }
        let mut ids = vec![];
        self.ws_cmt();
        while self.peek().map(|c| c != ')').unwrap_or(false) {
            ids.push(self.live(None)?);
            self.ws_cmt()
        }
        Ok(Some(ids))
    }

    /// Parses all the items in the text.
    ///
    /// Items are pushed as they are parsed, so `items` holds everything
    /// before the error on failure.
    pub fn parse(mut self, items: &mut Vec<Item>) -> Res<()> {
        self.ws_cmt();
        while self.has_next() {
            self.tag("(").chain_err(|| self.error_here("opening top-level item"))?;
            self.ws_cmt();

            let item = if self.pattern_dec()? {
                None
            } else if let Some(fml) = self.rule()? {
                Some(Item::Rule(fml))
            } else if let Some(change) = self.change()? {
                Some(Item::Change(change))
            } else if let Some(ids) = self.critical()? {
                Some(Item::Critical(ids))
            } else if self.word_opt(keywords::cmd::check) {
                Some(Item::Check)
            } else {
                bail!(self.error_here("expected top-level item"))
            };
            items.extend(item);

            self.ws_cmt();
            self.tag(")")?;
            self.ws_cmt()
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ChangeKind;

    fn parse(cxt: &mut ParserCxt, s: &str) -> Res<Vec<Item>> {
        let mut items = vec![];
        cxt.parser(s, 0).parse(&mut items)?;
        Ok(items)
    }

    fn parse_err(cxt: &mut ParserCxt, s: &str) -> (String, String, String, Option<usize>) {
        let err = parse(cxt, s).unwrap_err();
        match err.kind() {
            ErrorKind::ParseError(data) => (
                data.msg.clone(),
                data.pref.clone(),
                data.token.clone(),
                data.line,
            ),
            _ => panic!("expected a parse error, got {}", err),
        }
    }

    #[test]
    fn items() {
        let mut cxt = ParserCxt::new();
        let items = parse(
            &mut cxt,
            r#"
(pattern P state location) ; cars
(pattern Q location)
(rule r
  (forall v P :immutable
    (exists w Q :filter greater v
      (and (bfunc not_still (1 v)) (bfunc same_loc (v1 v) (v2 w)))
    )
  )
)
(+ P car1 (state "1") (location a))
(+ Q gate (location a))
(~ P car1 (state "0"))
(critical car1 gate)
(- P car1)
(check)
            "#,
        )
        .unwrap();
        assert_eq!(cxt.pats()["P"], vec!["state", "location"]);
        assert_eq!(items.len(), 7);

        let fml = match &items[0] {
            Item::Rule(fml) => fml,
            item => panic!("expected a rule, got {:?}", item),
        };
        assert_eq!(fml.rule(), "r");
        assert_eq!(fml.depth_of("P"), Some(3));
        assert_eq!(fml.depth_of("Q"), Some(2));
        assert!(fml.filter_depends_on("v"));
        let root = fml.root();
        assert_eq!(fml.disabled()[&root].len(), 3);

        let kinds: Vec<_> = items[1..5]
            .iter()
            .filter_map(|item| match item {
                Item::Change(change) => Some(change.kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Addition, ChangeKind::Addition, ChangeKind::Update]
        );
        match &items[3] {
            Item::Change(change) => {
                assert_eq!(change.ctx.attr("state"), Some("0"));
                assert_eq!(change.ctx.attr("location"), Some("a"));
                assert_eq!(change.id(), CtxId::from(0))
            }
            item => panic!("expected an update, got {:?}", item),
        }
        match &items[4] {
            Item::Critical(ids) => assert_eq!(ids, &vec![CtxId::from(0), CtxId::from(1)]),
            item => panic!("expected critical contexts, got {:?}", item),
        }
        assert!(matches!(items[6], Item::Check));
        assert_eq!(cxt.manager().len(), 1)
    }

    #[test]
    fn errors() {
        let mut cxt = ParserCxt::new();
        parse(&mut cxt, "(pattern P state)").unwrap();

        let (msg, _, token, line) = parse_err(&mut cxt, "(+ Q car1)");
        assert_eq!(msg, "unknown pattern `Q`");
        assert_eq!(token, "Q");
        assert_eq!(line, Some(1));

        let (msg, pref, _, line) = parse_err(&mut cxt, "\n\n(- P car1)");
        assert_eq!(msg, "unknown context `car1`");
        assert_eq!(pref, "(- P ");
        assert_eq!(line, Some(3));

        let (msg, ..) = parse_err(&mut cxt, "(rule r (forall and P (bfunc f (v1 v))))");
        assert_eq!(msg, "illegal use of keyword `and`");

        let (msg, ..) = parse_err(&mut cxt, "(rule r (forall v P :whatever (bfunc f (v1 v))))");
        assert_eq!(msg, "unknown quantifier attribute");

        // Rule errors are chained under a parse error.
        let err = parse(&mut cxt, "(rule r (forall v P (bfunc f (v1 w))))").unwrap_err();
        assert!(err.is_parse_error());
        assert!(err.iter().count() > 1);

        parse(&mut cxt, "(+ P car1)").unwrap();
        let (msg, ..) = parse_err(&mut cxt, "(+ P car1)");
        assert_eq!(msg, "context `car1` is already live")
    }

    #[test]
    fn item_reading() {
        let text = "\
            ; comment (\n\
            (rule r\n  (forall v P (bfunc f (v1 v))))\n\
            (+ P a (s \")\")) (- P a)\n\
        ";
        let mut reader = ::std::io::BufReader::new(text.as_bytes());
        let mut buf = String::new();
        assert_eq!(reader.read_item(&mut buf).unwrap(), 3);
        buf.clear();
        assert_eq!(reader.read_item(&mut buf).unwrap(), 1);
        assert!(buf.contains("(- P a)"));
        buf.clear();
        assert_eq!(reader.read_item(&mut buf).unwrap(), 0)
    }
}
