//! Filter expression compiler
//!
//! This module turns filter text typed into a search box into a typed
//! expression tree, supporting:
//! - Boolean logic (AND, OR, NOT) with grouping
//! - Attribute comparisons (`=`, `!=`, `~`, `!~`, `<`, `>`, `<=`, `>=`)
//! - Free text search and exclusion
//! - Relevance to mapped objects (`#Program,12#`)
//!
//! The tree can be evaluated against in-memory records or serialized into
//! a query API request.
//!
//! # Example
//!
//! ```rust
//! use grcfilter::query::{parse, QueryBuilder};
//!
//! let expr = parse(r#"title = "Foo" AND status != Draft"#).unwrap();
//! let request = QueryBuilder::new("Control").filter(expr).build();
//! assert_eq!(request.filters.expression["op"]["name"], "AND");
//! ```

pub mod ast;
pub mod builder;
pub mod evaluate;
pub mod mapping;
pub mod query_string;

pub use ast::{
    BinaryExpression, Comparison, Expression, FilterIdsType, Literal, LogicalOp, Operator,
    RelevanceExpression, TextSearch, UnaryExpression, UnaryOp,
};
pub use builder::{build_query, from_wire, join, to_wire, QueryBuilder, QueryRequest, ResultType};
pub use evaluate::{matches, matches_with, Record};
pub use mapping::CanonicalMappings;
pub use query_string::{parse, FilterParser};
