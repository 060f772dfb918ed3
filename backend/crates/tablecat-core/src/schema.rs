//! Catalog schema: which fields are indexed and which one prefixes row keys.

use crate::error::{CatalogError, Result};
use std::collections::HashSet;

/// Ordered, immutable set of index fields plus the designated row-key field.
///
/// Changing a schema without migrating stored rows invalidates their keys,
/// so a `Schema` is built once per catalog and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    index_fields: Vec<String>,
    row_key_field: String,
}

impl Schema {
    pub fn new<I, S>(index_fields: I, row_key_field: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index_fields: Vec<String> = index_fields.into_iter().map(Into::into).collect();
        let row_key_field = row_key_field.into();

        if index_fields.is_empty() {
            return Err(CatalogError::InvalidSchema(
                "at least one index field is required".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(index_fields.len());
        for field in &index_fields {
            if field.is_empty() {
                return Err(CatalogError::InvalidSchema(
                    "index field names cannot be empty".to_string(),
                ));
            }
            if !seen.insert(field.as_str()) {
                return Err(CatalogError::InvalidSchema(format!(
                    "duplicate index field '{}'",
                    field
                )));
            }
        }

        if row_key_field.is_empty() {
            return Err(CatalogError::InvalidSchema("row-key field cannot be empty".to_string()));
        }

        Ok(Self {
            index_fields,
            row_key_field,
        })
    }

    /// Split a comma-separated field list such as `"email, phone,name"`.
    pub fn parse_index_fields(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn index_fields(&self) -> &[String] {
        &self.index_fields
    }

    pub fn row_key_field(&self) -> &str {
        &self.row_key_field
    }

    pub fn is_indexed(&self, field: &str) -> bool {
        self.index_fields.iter().any(|f| f == field)
    }

    /// Fields a record must carry: every index field, then the row-key field.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        let extra = (!self.is_indexed(&self.row_key_field)).then_some(self.row_key_field.as_str());
        self.index_fields.iter().map(String::as_str).chain(extra)
    }
}
