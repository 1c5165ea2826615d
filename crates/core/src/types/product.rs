//! Product details as served by the catalog.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Price, ProductId};

/// The catalog record for a single product.
///
/// Only `id` is typed. Every other field is kept exactly as the catalog sent
/// it and written back unchanged, so the readers below are best-effort views
/// that return `None` when a field is missing or has an unexpected shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub id: ProductId,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl ProductDetails {
    /// A product with no fields besides its id.
    #[must_use]
    pub fn new(id: ProductId) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    /// Set a display field. `id` is not a field and is ignored.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        if key != "id" {
            self.fields.insert(key.to_string(), value.into());
        }
        self
    }

    /// Raw value of a display field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub(crate) fn remove_field(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Product name, from `title` or else `name`.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.field("title")
            .or_else(|| self.field("name"))
            .and_then(Value::as_str)
    }

    /// Unit price, if `price` holds a non-negative number or numeric string.
    #[must_use]
    pub fn price(&self) -> Option<Price> {
        self.field("price")
            .and_then(|value| Price::deserialize(value).ok())
    }

    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.field("image").and_then(Value::as_str)
    }
}
