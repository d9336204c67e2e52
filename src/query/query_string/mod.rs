//! Filter query string parser
//!
//! Supports syntax like:
//! - `title = "Foo" AND status != Draft`
//! - `person.email ~ example.com OR NOT owner = alice`
//! - `(due_date < 2024-01-01 OR due_date >= 01/31/2025) AND #Program,12,15#`
//! - `quarterly review` (text search over the default fields)
//! - `!~ deprecated` (exclude text search)
//!
//! Keywords `AND`, `OR` and `NOT` are case-insensitive. Attribute names and
//! literal contents are case-sensitive.
//!
//! # Example
//!
//! ```rust
//! use grcfilter::query::query_string::parse;
//!
//! let expr = parse("title = Foo AND status != Draft").unwrap().unwrap();
//! assert_eq!(expr.node_type(), "binary");
//! assert!(parse("").unwrap().is_none());
//! ```

pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Spanned, Token};
pub use parser::{parse, FilterParser};
