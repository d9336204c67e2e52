//! Canonical mapping cache
//!
//! Maps each object type to the set of types it can be related to. The
//! cache belongs to whoever builds queries; the parser never touches it.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::ast::Expression;
use crate::error::FilterError;
use crate::Result;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CanonicalMappings {
    relatable: BTreeMap<String, BTreeSet<String>>,
}

impl CanonicalMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON object of `{"Type": ["Relatable", ...]}`
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
        let mut mappings = Self::new();
        for (object, relatable) in raw {
            mappings.insert(object, relatable);
        }
        Ok(mappings)
    }

    /// Record that `object` can be related to each of `relatable`
    ///
    /// Relations are symmetric, so the reverse entries are added too.
    pub fn insert<I, S>(&mut self, object: impl Into<String>, relatable: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let object = object.into();
        for target in relatable {
            let target = target.into();
            self.relatable
                .entry(target.clone())
                .or_default()
                .insert(object.clone());
            self.relatable.entry(object.clone()).or_default().insert(target);
        }
    }

    pub fn relatable(&self, object: &str) -> Option<&BTreeSet<String>> {
        self.relatable.get(object)
    }

    pub fn can_relate(&self, object: &str, target: &str) -> bool {
        self.relatable
            .get(object)
            .map_or(false, |targets| targets.contains(target))
    }

    pub fn len(&self) -> usize {
        self.relatable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relatable.is_empty()
    }

    /// Check every relevance node of a query on `target` objects
    pub fn validate_relevance(&self, expr: &Expression, target: &str) -> Result<()> {
        for relevance in expr.relevance_expressions() {
            if !self.can_relate(relevance.object_name(), target) {
                tracing::debug!(
                    object = relevance.object_name(),
                    query_object = target,
                    "relevance filter names an unmapped type"
                );
                return Err(FilterError::UnmappedRelevance {
                    object: relevance.object_name().to_string(),
                    target: target.to_string(),
                });
            }
        }
        Ok(())
    }
}
