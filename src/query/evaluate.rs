//! Matching expression trees against in-memory records
//!
//! The query API does the authoritative filtering server side; this is the
//! same filter applied to objects the caller already holds.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::ast::{parse_date, parse_number, Comparison, Expression, LogicalOp, Operator};
use crate::config::FilterConfig;

/// Key under which a map record lists its searchable text
pub const TEXT_KEY: &str = "__text__";
/// Key under which a map record lists `Object:id` relevance entries
pub const RELEVANT_KEY: &str = "__relevant__";

/// Read access to one object's attributes
pub trait Record {
    /// All values of a (possibly dotted) attribute; empty when absent
    fn attribute(&self, path: &str) -> Vec<String>;

    /// Text a bare text search is matched against
    fn searchable_text(&self) -> Vec<String>;

    /// Whether this object is mapped to `object_name` with one of `ids`
    fn is_relevant_to(&self, _object_name: &str, _ids: &[String]) -> bool {
        false
    }
}

/// Attribute map record: keys are attribute paths, values are all the
/// attribute's values. [`TEXT_KEY`] holds searchable text and
/// [`RELEVANT_KEY`] holds `Object:id` entries.
impl Record for HashMap<String, Vec<String>> {
    fn attribute(&self, path: &str) -> Vec<String> {
        self.get(path).cloned().unwrap_or_default()
    }

    fn searchable_text(&self) -> Vec<String> {
        self.attribute(TEXT_KEY)
    }

    fn is_relevant_to(&self, object_name: &str, ids: &[String]) -> bool {
        self.attribute(RELEVANT_KEY).iter().any(|entry| {
            entry
                .split_once(':')
                .map_or(false, |(object, id)| object == object_name && ids.iter().any(|i| i == id))
        })
    }
}

/// Adds the values of configured attributes to a record's searchable text
struct SearchFields<'a> {
    record: &'a dyn Record,
    fields: &'a [String],
}

impl Record for SearchFields<'_> {
    fn attribute(&self, path: &str) -> Vec<String> {
        self.record.attribute(path)
    }

    fn searchable_text(&self) -> Vec<String> {
        let mut text = self.record.searchable_text();
        for field in self.fields {
            text.extend(self.record.attribute(field));
        }
        text
    }

    fn is_relevant_to(&self, object_name: &str, ids: &[String]) -> bool {
        self.record.is_relevant_to(object_name, ids)
    }
}

/// Empty filters match everything
pub fn matches(expr: Option<&Expression>, record: &dyn Record) -> bool {
    expr.map_or(true, |e| e.evaluate(record))
}

/// [`matches`], with text searches also covering
/// [`FilterConfig::default_search_fields`]
pub fn matches_with(expr: Option<&Expression>, record: &dyn Record, config: &FilterConfig) -> bool {
    expr.map_or(true, |e| e.evaluate_with(record, config))
}

impl Expression {
    /// Evaluate the filter against one record
    pub fn evaluate(&self, record: &dyn Record) -> bool {
        match self {
            Expression::Binary(b) => match b.op() {
                LogicalOp::And => b.left().evaluate(record) && b.right().evaluate(record),
                LogicalOp::Or => b.left().evaluate(record) || b.right().evaluate(record),
            },
            Expression::Unary(u) => !u.operand().evaluate(record),
            Expression::Comparison(c) => evaluate_comparison(c, record),
            Expression::Relevance(r) => record.is_relevant_to(r.object_name(), r.ids()),
            Expression::TextSearch(t) => {
                let found = contains_any(&record.searchable_text(), t.text());
                found != t.is_exclusion()
            }
        }
    }

    /// Evaluate with text searches also matching the configured search fields
    pub fn evaluate_with(&self, record: &dyn Record, config: &FilterConfig) -> bool {
        self.evaluate(&SearchFields {
            record,
            fields: &config.default_search_fields,
        })
    }
}

fn evaluate_comparison(c: &Comparison, record: &dyn Record) -> bool {
    let expected = c.right().as_text();

    if c.op().is_text_search() {
        let found = contains_any(&record.searchable_text(), expected);
        return found != c.op().is_negated();
    }

    let values = record.attribute(c.left());
    let positive = values.iter().any(|value| {
        let ordering = compare_values(value, expected);
        match c.op() {
            Operator::Equal | Operator::NotEqual => ordering == Ordering::Equal,
            Operator::Contains | Operator::NotContains => {
                value.to_lowercase().contains(&expected.to_lowercase())
            }
            Operator::LessThan => ordering == Ordering::Less,
            Operator::GreaterThan => ordering == Ordering::Greater,
            Operator::LessOrEqual => ordering != Ordering::Greater,
            Operator::GreaterOrEqual => ordering != Ordering::Less,
            Operator::TextSearch | Operator::ExcludeTextSearch => false,
        }
    });

    positive != c.op().is_negated()
}

fn contains_any(haystacks: &[String], needle: &str) -> bool {
    let needle = needle.to_lowercase();
    haystacks.iter().any(|h| h.to_lowercase().contains(&needle))
}

/// Compare as numbers, then as dates, then as case-insensitive text
fn compare_values(left: &str, right: &str) -> Ordering {
    if let (Some(l), Some(r)) = (parse_number(left), parse_number(right)) {
        return l.partial_cmp(&r).unwrap_or(Ordering::Equal);
    }
    if let (Some(l), Some(r)) = (parse_date(left), parse_date(right)) {
        return l.cmp(&r);
    }
    left.to_lowercase().cmp(&right.to_lowercase())
}
