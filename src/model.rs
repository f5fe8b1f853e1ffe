//! The data-access seam.
//!
//! tsu does not ship an ORM. Anything that can find one record implements
//! [`Model`] and can be handed to a [`Getter`](crate::middleware::Getter).
//! Records travel as [`serde_json::Value`] so they can be stored in the
//! per-request hook map and read back by dotted path.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LookupError;

/// Allow-list of eager-loadable relations, keyed by the short name clients
/// send in `?includes=`.
pub type IncludeTable = HashMap<String, IncludeDescriptor>;

/// How to eager-load one relation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeDescriptor {
    /// Name of the related model.
    pub model: String,
    /// Alias the relation is exposed under.
    #[serde(rename = "as")]
    pub alias: String,
    /// Inner join (`true`) or outer join (`false`).
    #[serde(default)]
    pub required: bool,
    /// Columns to select from the related model; all when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<String>>,
    /// Nested relations of the related model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<IncludeDescriptor>,
}

impl IncludeDescriptor {
    pub fn new(model: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            alias: alias.into(),
            required: false,
            attributes: None,
            include: Vec::new(),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    pub fn include(mut self, nested: IncludeDescriptor) -> Self {
        self.include.push(nested);
        self
    }
}

/// Options for a single-row find: `{ where: { field: value }, include?: [...] }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FindOptions {
    #[serde(rename = "where", skip_serializing_if = "Map::is_empty")]
    pub filter: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<IncludeDescriptor>>,
}

impl FindOptions {
    /// Equality filter on one field.
    pub fn by(field: impl Into<String>, value: Value) -> Self {
        let mut filter = Map::new();
        filter.insert(field.into(), value);
        Self { filter, include: None }
    }

    pub fn with_include(mut self, include: Option<Vec<IncludeDescriptor>>) -> Self {
        self.include = include;
        self
    }
}

/// A queryable record type.
///
/// `find_one` and `find_by_pk` resolve to `Ok(None)` when nothing matches;
/// `Err` is reserved for the backend failing.
#[async_trait]
pub trait Model: Send + Sync + 'static {
    /// Model name, used in logs.
    fn name(&self) -> &str;

    /// Primary key field used when no explicit field is configured.
    fn primary_key(&self) -> &str {
        "id"
    }

    /// Relations clients may eager-load, if any.
    fn includes(&self) -> Option<&IncludeTable> {
        None
    }

    async fn find_one(&self, options: FindOptions) -> Result<Option<Value>, LookupError>;

    async fn find_by_pk(&self, key: Value, options: FindOptions) -> Result<Option<Value>, LookupError>;
}
