//! Query API payloads
//!
//! Serializes expression trees into the JSON wire format the query endpoint
//! accepts, reads them back, and assembles full query requests.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "object_name": "Control",
//!   "filters": {
//!     "expression": {
//!       "left": { "left": "title", "op": { "name": "~" }, "right": "access", "value_type": "word" },
//!       "op": { "name": "AND" },
//!       "right": { "object_name": "Program", "op": { "name": "relevant" }, "ids": ["12"], "filter_ids_type": "id" }
//!     }
//!   },
//!   "type": "values"
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::trace;

use super::ast::{Expression, FilterIdsType, Literal, LogicalOp, Operator};
use super::query_string::FilterParser;
use crate::config::FilterConfig;
use crate::error::FilterError;
use crate::Result;

/// Render an expression in the query API's JSON form
pub fn to_wire(expr: &Expression) -> Value {
    match expr {
        Expression::Binary(b) => json!({
            "left": to_wire(b.left()),
            "op": { "name": b.op().as_str() },
            "right": to_wire(b.right()),
        }),
        Expression::Comparison(c) => json!({
            "left": c.left(),
            "op": { "name": c.op().as_str() },
            "right": c.right().as_text(),
            "value_type": c.right().kind(),
        }),
        Expression::Unary(u) => json!({
            "op": { "name": u.op().as_str() },
            "exp": to_wire(u.operand()),
        }),
        Expression::Relevance(r) => json!({
            "object_name": r.object_name(),
            "op": { "name": r.op() },
            "ids": r.ids(),
            "filter_ids_type": r.filter_ids_type(),
        }),
        Expression::TextSearch(t) => json!({
            "op": { "name": t.op().as_str() },
            "text": t.text(),
        }),
    }
}

/// Render an optional expression; an empty filter is `{}`
pub fn to_wire_optional(expr: Option<&Expression>) -> Value {
    expr.map_or_else(|| Value::Object(Map::new()), to_wire)
}

/// Read an expression back from its JSON form
///
/// Returns `Ok(None)` for the empty object.
pub fn from_wire(value: &Value) -> Result<Option<Expression>> {
    let map = value
        .as_object()
        .ok_or_else(|| FilterError::InvalidWire("expression must be a JSON object".to_string()))?;
    if map.is_empty() {
        return Ok(None);
    }
    parse_wire_node(map).map(Some)
}

fn parse_wire_node(map: &Map<String, Value>) -> Result<Expression> {
    let op_name = map
        .get("op")
        .and_then(|op| op.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| FilterError::InvalidWire("missing op.name".to_string()))?;

    match op_name.to_uppercase().as_str() {
        "AND" | "OR" => {
            let op = if op_name.eq_ignore_ascii_case("AND") {
                LogicalOp::And
            } else {
                LogicalOp::Or
            };
            let left = wire_child(map, "left")?;
            let right = wire_child(map, "right")?;
            return Ok(Expression::binary(op, left, right));
        }
        "NOT" => return Ok(Expression::not(wire_child(map, "exp")?)),
        "RELEVANT" => return parse_wire_relevance(map),
        _ => {}
    }

    let op = Operator::from_symbol(op_name)
        .ok_or_else(|| FilterError::InvalidWire(format!("unknown operator '{}'", op_name)))?;

    if op.is_text_search() && map.contains_key("text") {
        let text = wire_str(map, "text")?;
        return Ok(match op {
            Operator::ExcludeTextSearch => Expression::exclude_text_search(text),
            _ => Expression::text_search(text),
        });
    }

    let left = wire_str(map, "left")?;
    let right = wire_str(map, "right")?;
    let literal = match map.get("value_type").and_then(Value::as_str) {
        Some(kind) => Literal::from_kind(kind, right)?,
        None => Literal::classify(right),
    };
    Ok(Expression::comparison(left, op, literal))
}

fn parse_wire_relevance(map: &Map<String, Value>) -> Result<Expression> {
    let object_name = wire_str(map, "object_name")?;
    let ids = map
        .get("ids")
        .and_then(Value::as_array)
        .ok_or_else(|| FilterError::InvalidWire("relevant needs an ids array".to_string()))?
        .iter()
        .map(|id| match id {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(FilterError::InvalidWire(format!("invalid id {}", other))),
        })
        .collect::<Result<Vec<String>>>()?;

    let ids_type = match map.get("filter_ids_type") {
        Some(v) => serde_json::from_value(v.clone())?,
        None => FilterIdsType::infer(&ids),
    };
    Expression::relevant_with_type(object_name, ids, ids_type)
}

fn wire_child(map: &Map<String, Value>, key: &str) -> Result<Expression> {
    let child = map
        .get(key)
        .ok_or_else(|| FilterError::InvalidWire(format!("missing '{}'", key)))?;
    from_wire(child)?.ok_or_else(|| FilterError::InvalidWire(format!("empty '{}'", key)))
}

fn wire_str<'a>(map: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| FilterError::InvalidWire(format!("'{}' must be a string", key)))
}

/// Combine two optional filters; an empty side yields the other
pub fn join(left: Option<Expression>, right: Option<Expression>, op: LogicalOp) -> Option<Expression> {
    match (left, right) {
        (Some(l), Some(r)) => Some(Expression::binary(op, l, r)),
        (Some(e), None) | (None, Some(e)) => Some(e),
        (None, None) => None,
    }
}

/// Shape of the query result
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    /// Full objects
    #[default]
    Values,
    /// Only matching ids
    Ids,
    /// Only the number of matches
    Count,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub name: String,
    #[serde(default)]
    pub desc: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Filters {
    pub expression: Value,
}

/// A complete request body for the query endpoint
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryRequest {
    pub object_name: String,
    pub filters: Filters,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub result_type: ResultType,
    /// Half-open `[from, to)` page window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<[usize; 2]>,
}

impl QueryRequest {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Builder for [`QueryRequest`]
#[derive(Clone, Debug)]
pub struct QueryBuilder {
    object_name: String,
    expression: Option<Expression>,
    order_by: Vec<OrderBy>,
    fields: Option<Vec<String>>,
    result_type: ResultType,
    limit: Option<[usize; 2]>,
}

impl QueryBuilder {
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            expression: None,
            order_by: Vec::new(),
            fields: None,
            result_type: ResultType::Values,
            limit: None,
        }
    }

    /// AND a filter onto whatever is already set
    pub fn filter(mut self, expr: Option<Expression>) -> Self {
        self.expression = join(self.expression.take(), expr, LogicalOp::And);
        self
    }

    /// Restrict to objects related to `object_name` with one of `ids`
    pub fn relevant_to<I, S>(self, object_name: impl Into<String>, ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let relevance = Expression::relevant(object_name, ids)?;
        Ok(self.filter(Some(relevance)))
    }

    pub fn order_by(mut self, name: impl Into<String>, desc: bool) -> Self {
        self.order_by.push(OrderBy {
            name: name.into(),
            desc,
        });
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn result_type(mut self, result_type: ResultType) -> Self {
        self.result_type = result_type;
        self
    }

    pub fn limit(mut self, from: usize, to: usize) -> Result<Self> {
        if from >= to {
            return Err(FilterError::InvalidExpression(format!(
                "limit window [{}, {}) is empty",
                from, to
            )));
        }
        self.limit = Some([from, to]);
        Ok(self)
    }

    pub fn expression(&self) -> Option<&Expression> {
        self.expression.as_ref()
    }

    pub fn build(self) -> QueryRequest {
        trace!(
            object_name = %self.object_name,
            has_filter = self.expression.is_some(),
            "building query request"
        );
        QueryRequest {
            filters: Filters {
                expression: to_wire_optional(self.expression.as_ref()),
            },
            object_name: self.object_name,
            order_by: self.order_by,
            fields: self.fields,
            result_type: self.result_type,
            limit: self.limit,
        }
    }
}

/// Parse filter text and wrap it in a request for `object_name`
pub fn build_query(object_name: &str, text: &str, config: &FilterConfig) -> Result<QueryRequest> {
    let expression = FilterParser::new(config.clone()).parse(text)?;
    let mut builder = QueryBuilder::new(object_name).filter(expression);
    if let Some(page) = config.default_limit {
        builder = builder.limit(0, page)?;
    }
    Ok(builder.build())
}
