//! Predicate registry, evaluates the leaves of formulas.
//!
//! A predicate is a named function from the contexts bound to its parameter
//! positions to a boolean. Positions are strings such as `v1`, `v2`. Failing
//! to find a predicate, a position, or an attribute is a
//! [`PredicateError`][pred], which is local to the rule being checked.
//!
//! [pred]: ../errors/enum.ErrorKind.html#variant.PredicateError
//! (PredicateError variant of the ErrorKind enum)

use crate::{
    common::*,
    context::{self, Context, Ctx, Env, Subst},
    formula::BFunc,
};

/// Arguments of a predicate application.
pub struct Args<'a> {
    /// Name of the predicate, for error reporting.
    pred: &'a str,
    /// Contexts bound to each position.
    params: Vec<(&'a str, &'a Ctx)>,
}
impl<'a> Args<'a> {
    /// Constructor.
    pub fn new(pred: &'a str, params: Vec<(&'a str, &'a Ctx)>) -> Self {
        Args { pred, params }
    }

    /// Context bound to a position.
    pub fn ctx(&self, pos: &str) -> Res<&'a Context> {
        for &(p, ctx) in &self.params {
            if p == pos {
                return Ok(&**ctx);
            }
        }
        bail!(pred_err(self.pred, format!("position `{}` is unbound", pos)))
    }

    /// Value of an attribute of the context bound to a position.
    pub fn attr(&self, pos: &str, attr: &str) -> Res<&'a str> {
        let ctx = self.ctx(pos)?;
        ctx.attr(attr).ok_or_else(|| {
            pred_err(
                self.pred,
                format!("context `{}` has no attribute `{}`", ctx, attr),
            )
        })
    }

    /// Numeric value of an attribute of the context bound to a position.
    pub fn num(&self, pos: &str, attr: &str) -> Res<i64> {
        let val = self.attr(pos, attr)?;
        val.trim().parse().map_err(|_| {
            pred_err(
                self.pred,
                format!("attribute `{}` of `{}` is not a number: `{}`", attr, pos, val),
            )
        })
    }
}

/// A predicate.
pub type PredFn = Box<dyn Fn(&Args) -> Res<bool> + Send + Sync>;

/// Named predicates.
#[derive(Default)]
pub struct PredRegistry {
    preds: HashMap<String, PredFn>,
}
impl fmt::Debug for PredRegistry {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut names: Vec<_> = self.preds.keys().collect();
        names.sort();
        write!(fmt, "PredRegistry {:?}", names)
    }
}
impl PredRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in predicates.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register("not_still", |args| Ok(args.attr("v1", "state")? != "0"));
        reg.register("earlier_than", |args| {
            Ok(args.num("v1", "timestamp")? > args.num("v2", "timestamp")?)
        });
        reg.register("same_loc", |args| {
            Ok(args.attr("v1", "location")? == args.attr("v2", "location")?)
        });
        reg.register("same_time", |args| {
            let diff = args.num("v1", "timestamp")? - args.num("v2", "timestamp")?;
            Ok(0 < diff && diff < 100)
        });
        reg.register("prev_location", |args| {
            Ok(args.attr("v1", "prev")? == args.attr("v2", "location")?)
        });
        reg
    }

    /// Registers a predicate, replacing the previous one with the same name.
    pub fn register<S, F>(&mut self, name: S, pred: F)
    where
        S: Into<String>,
        F: Fn(&Args) -> Res<bool> + Send + Sync + 'static,
    {
        self.preds.insert(name.into(), Box::new(pred));
    }

    /// True if a predicate is known, either registered or in a built-in
    /// family.
    pub fn contains(&self, name: &str) -> bool {
        self.preds.contains_key(name) || Family::of_str(name).is_some()
    }

    /// Evaluates a predicate application.
    ///
    /// Variables are looked up in the substitution first.
    pub fn eval(&self, bfunc: &BFunc, env: &Env, subst: Option<&Subst>) -> Res<bool> {
        let name = &bfunc.name;
        let mut params = Vec::with_capacity(bfunc.params.len());
        for (pos, var) in &bfunc.params {
            if let Some(ctx) = context::lookup(env, subst, var) {
                params.push((pos.as_str(), ctx))
            } else {
                bail!(pred_err(
                    name.as_str(),
                    format!("variable `{}` of position `{}` is unbound", var, pos)
                ))
            }
        }
        let args = Args::new(name, params);
        if let Some(pred) = self.preds.get(name) {
            pred(&args)
        } else if let Some(family) = Family::of_str(name) {
            family.eval(&args)
        } else {
            bail!(pred_err(name.as_str(), "unknown predicate"))
        }
    }
}

/// Families of predicates resolved from their name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Family<'a> {
    /// `equal_const_<attr>_<value>`
    EqualConst(&'a str, &'a str),
    /// `equal_<a1>_<a2>`
    Equal(&'a str, &'a str),
}
impl<'a> Family<'a> {
    fn of_str(name: &'a str) -> Option<Self> {
        let split = |s: &'a str| {
            let mut parts = s.splitn(2, '_');
            match (parts.next(), parts.next()) {
                (Some(lft), Some(rgt)) if !lft.is_empty() && !rgt.is_empty() => Some((lft, rgt)),
                _ => None,
            }
        };
        if let Some(rest) = name.strip_prefix("equal_const_") {
            split(rest).map(|(attr, val)| Family::EqualConst(attr, val))
        } else if let Some(rest) = name.strip_prefix("equal_") {
            split(rest).map(|(a1, a2)| Family::Equal(a1, a2))
        } else {
            None
        }
    }

    fn eval(&self, args: &Args) -> Res<bool> {
        match *self {
            Family::EqualConst(attr, val) => Ok(args.attr("v1", attr)? == val),
            Family::Equal(a1, a2) => Ok(args.attr("v1", a1)? == args.attr("v2", a2)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(id: usize, attrs: &[(&str, &str)]) -> Ctx {
        let attrs = attrs
            .iter()
            .map(|(a, v)| (a.to_string(), v.to_string()))
            .collect();
        Arc::new(Context::new(id.into(), attrs))
    }

    fn bfunc(name: &str, vars: &[&str]) -> BFunc {
        BFunc {
            name: name.into(),
            params: vars
                .iter()
                .enumerate()
                .map(|(i, var)| (format!("v{}", i + 1), var.to_string()))
                .collect(),
        }
    }

    fn env(bindings: Vec<(&str, Ctx)>) -> Env {
        bindings
            .into_iter()
            .map(|(var, ctx)| (var.to_string(), ctx))
            .collect()
    }

    #[test]
    fn builtins() {
        let reg = PredRegistry::with_builtins();
        let a = ctx(0, &[("state", "1"), ("location", "l1"), ("timestamp", "150")]);
        let b = ctx(1, &[("state", "0"), ("location", "l1"), ("prev", "l1")]);
        let b = Arc::new(b.with_attr("timestamp", "100"));
        let env = env(vec![("x", a), ("y", b)]);

        assert!(reg.eval(&bfunc("not_still", &["x"]), &env, None).unwrap());
        assert!(!reg.eval(&bfunc("not_still", &["y"]), &env, None).unwrap());
        assert!(reg.eval(&bfunc("same_loc", &["x", "y"]), &env, None).unwrap());
        assert!(reg.eval(&bfunc("earlier_than", &["x", "y"]), &env, None).unwrap());
        assert!(reg.eval(&bfunc("same_time", &["x", "y"]), &env, None).unwrap());
        assert!(!reg.eval(&bfunc("same_time", &["y", "x"]), &env, None).unwrap());
        assert!(reg.eval(&bfunc("prev_location", &["y", "x"]), &env, None).unwrap());
    }

    #[test]
    fn families() {
        let reg = PredRegistry::with_builtins();
        assert!(reg.contains("equal_const_state_0"));
        assert!(reg.contains("equal_location_prev"));
        assert!(!reg.contains("equal_"));
        assert!(!reg.contains("unequal"));

        let a = ctx(0, &[("state", "0"), ("location", "l2")]);
        let b = ctx(1, &[("prev", "l2")]);
        let env = env(vec![("x", a), ("y", b)]);
        let state_0 = bfunc("equal_const_state_0", &["x"]);
        assert!(reg.eval(&state_0, &env, None).unwrap());
        let loc_prev = bfunc("equal_location_prev", &["x", "y"]);
        assert!(reg.eval(&loc_prev, &env, None).unwrap());
        // Value with underscores.
        let odd = bfunc("equal_const_state_a_b", &["x"]);
        assert!(!reg.eval(&odd, &env, None).unwrap());
    }

    #[test]
    fn substitution_and_errors() {
        let reg = PredRegistry::with_builtins();
        let a = ctx(0, &[("state", "1")]);
        let env = env(vec![("x", a)]);
        let subst = Subst {
            var: "x".into(),
            ctx: ctx(4, &[("state", "0")]),
        };
        let not_still = bfunc("not_still", &["x"]);
        assert!(reg.eval(&not_still, &env, None).unwrap());
        assert!(!reg.eval(&not_still, &env, Some(&subst)).unwrap());

        let unknown = reg.eval(&bfunc("unknown", &["x"]), &env, None);
        assert!(unknown.unwrap_err().is_predicate_error());
        let unbound = reg.eval(&bfunc("not_still", &["z"]), &env, None);
        assert!(unbound.unwrap_err().is_predicate_error());
        let missing = reg.eval(&bfunc("same_loc", &["x", "x"]), &env, None);
        assert!(missing.unwrap_err().is_predicate_error());
        let nan = env_with_ts("soon");
        let nan = reg.eval(&bfunc("earlier_than", &["x", "x"]), &nan, None);
        assert!(nan.unwrap_err().is_predicate_error());
    }

    fn env_with_ts(ts: &str) -> Env {
        env(vec![("x", ctx(0, &[("timestamp", ts)]))])
    }
}
