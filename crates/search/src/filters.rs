//! Post-filter pipeline: timestamp ranges, field predicates, and the
//! opt-in sort / dedupe / limit steps.

use anyhow::{bail, Context, Result};
use cdxj::timestamp::{normalize_lower, normalize_upper};
use cdxj::{surt_and_timestamp, CdxjRecord, ParseMode};
use regex::Regex;
use serde_json::Value;

/// Comparison operator of a field predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldOp {
    Eq,
    Ne,
    Match,
    NotMatch,
}

/// One `field<op>value` predicate over the JSON payload.
#[derive(Debug)]
pub struct FieldPredicate {
    field: String,
    op: FieldOp,
    value: String,
    regex: Option<Regex>,
}

impl FieldPredicate {
    /// Parses `status=200`, `status!=404`, `mime~text/.*` or `mime!~image/.*`.
    ///
    /// # Errors
    ///
    /// Fails on an expression without an operator or with an invalid regex
    /// (a broken predicate is a configuration error, unlike blocklist
    /// patterns which degrade to warnings).
    pub fn parse(expr: &str) -> Result<Self> {
        let (field, op, value) = if let Some((f, v)) = expr.split_once("!~") {
            (f, FieldOp::NotMatch, v)
        } else if let Some((f, v)) = expr.split_once('~') {
            (f, FieldOp::Match, v)
        } else if let Some((f, v)) = expr.split_once("!=") {
            (f, FieldOp::Ne, v)
        } else if let Some((f, v)) = expr.split_once('=') {
            (f, FieldOp::Eq, v)
        } else {
            bail!("invalid filter expression {expr:?} (expected field=value, field!=value, field~regex or field!~regex)");
        };

        let field = field.trim().to_string();
        let value = value.trim().to_string();
        if field.is_empty() {
            bail!("invalid filter expression {expr:?} (empty field name)");
        }

        let regex = match op {
            FieldOp::Match | FieldOp::NotMatch => Some(
                Regex::new(&value)
                    .with_context(|| format!("invalid regex in filter expression {expr:?}"))?,
            ),
            _ => None,
        };

        Ok(Self {
            field,
            op,
            value,
            regex,
        })
    }

    /// Evaluates the predicate against a parsed payload. A missing field
    /// compares as the empty string.
    fn matches(&self, json: &serde_json::Map<String, Value>) -> bool {
        let actual = match json.get(&self.field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        match self.op {
            FieldOp::Eq => actual == self.value,
            FieldOp::Ne => actual != self.value,
            FieldOp::Match => self.regex.as_ref().is_some_and(|r| r.is_match(&actual)),
            FieldOp::NotMatch => !self.regex.as_ref().is_some_and(|r| r.is_match(&actual)),
        }
    }
}

/// Combined timestamp-range and field-predicate filter. Predicates AND
/// together; an empty filter matches everything.
#[derive(Debug, Default)]
pub struct LineFilter {
    from: Option<String>,
    to: Option<String>,
    predicates: Vec<FieldPredicate>,
}

impl LineFilter {
    pub fn new(from_ts: Option<&str>, to_ts: Option<&str>, exprs: &[String]) -> Result<Self> {
        Ok(Self {
            from: from_ts.map(normalize_lower),
            to: to_ts.map(normalize_upper),
            predicates: exprs
                .iter()
                .map(|e| FieldPredicate::parse(e))
                .collect::<Result<_>>()?,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.predicates.is_empty()
    }

    /// Whether `line` passes the range and every predicate.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        let (_, timestamp) = surt_and_timestamp(line);

        if let Some(from) = &self.from {
            if timestamp < from.as_str() {
                return false;
            }
        }
        if let Some(to) = &self.to {
            if timestamp > to.as_str() {
                return false;
            }
        }

        if self.predicates.is_empty() {
            return true;
        }
        let Ok(record) = CdxjRecord::parse(line, ParseMode::Lenient, "filter", 0) else {
            return false;
        };
        self.predicates.iter().all(|p| p.matches(&record.json))
    }
}

/// Sorts lines by `(surt, timestamp)`, stably.
pub fn sort_lines(lines: &mut [String]) {
    lines.sort_by(|a, b| surt_and_timestamp(a).cmp(&surt_and_timestamp(b)));
}

/// Collapses *consecutive* runs of equal `(surt, timestamp)` down to their
/// first line. Non-adjacent duplicates survive.
pub fn dedupe_consecutive(lines: &mut Vec<String>) {
    lines.dedup_by(|b, a| surt_and_timestamp(a) == surt_and_timestamp(b));
}
