pub mod config;
pub mod error;
pub mod query;

pub use config::FilterConfig;
pub use error::{FilterError, ParseError, Result};
pub use query::{parse, Expression, FilterParser, QueryBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
