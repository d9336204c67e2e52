use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::FilterError;
use crate::Result;

/// Filter compiler configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Longest query accepted by the parser, in characters
    pub max_query_length: usize,
    /// Deepest nesting of parentheses and `NOT` the parser accepts
    pub max_depth: usize,
    /// Attributes a bare text search is matched against, on top of the
    /// record's own searchable text
    pub default_search_fields: Vec<String>,
    /// Page size applied to built queries when the caller sets none
    pub default_limit: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_query_length: 4096,
            max_depth: 128,
            default_search_fields: vec![
                "title".to_string(),
                "description".to_string(),
                "notes".to_string(),
            ],
            default_limit: None,
        }
    }
}

impl FilterConfig {
    /// Load a configuration from JSON; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FilterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check the configuration for values the compiler cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_query_length == 0 {
            return Err(FilterError::Config(
                "max_query_length must be greater than zero".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(FilterError::Config(
                "max_depth must be greater than zero".to_string(),
            ));
        }
        if self.default_limit == Some(0) {
            return Err(FilterError::Config(
                "default_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
