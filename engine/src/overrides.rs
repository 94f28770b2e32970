//! Catalog overrides
//!
//! Externally supplied column and table data that takes precedence over
//! what SQLite introspection reports. Everything here is plain data that
//! can be built in code or loaded from JSON:
//!
//! ```json
//! {
//!   "people": {
//!     "columns": {
//!       "address": {
//!         "type": "RECORD",
//!         "mode": "REPEATED",
//!         "fields": [{ "name": "street", "type": "STRING" }]
//!       }
//!     },
//!     "attributes": { "labels": { "team": "x" } }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocol::Mode;

/// Override for one column. Unset fields keep the introspected value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_null: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Nested fields of a RECORD column
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSpec>,

    /// A further override applied to the merged column, looked up by the
    /// merged column's name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, ColumnOverride>,
}

impl ColumnOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn field_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = Some(field_type.into());
        self
    }

    pub fn not_null(mut self, not_null: bool) -> Self {
        self.not_null = Some(not_null);
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn column(mut self, name: impl Into<String>, column: ColumnOverride) -> Self {
        self.columns.insert(name.into(), column);
        self
    }
}

/// A nested field of a RECORD column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSpec>,

    /// Override applied to this field, looked up by its name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, ColumnOverride>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            mode: None,
            description: None,
            fields: Vec::new(),
            columns: BTreeMap::new(),
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn column(mut self, name: impl Into<String>, column: ColumnOverride) -> Self {
        self.columns.insert(name.into(), column);
        self
    }
}

/// Overrides for one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOverride {
    pub columns: BTreeMap<String, ColumnOverride>,

    /// Ad hoc table attributes. `description` and `view_query` replace the
    /// resolved values; other names are reported as extra attributes.
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl TableOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, column: ColumnOverride) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Overrides for all tables, keyed by local table name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogOverrides {
    tables: BTreeMap<String, TableOverride>,
}

impl CatalogOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>, table_override: TableOverride) -> Self {
        self.insert(table, table_override);
        self
    }

    pub fn insert(&mut self, table: impl Into<String>, table_override: TableOverride) {
        self.tables.insert(table.into(), table_override);
    }

    pub fn table(&self, table: &str) -> Option<&TableOverride> {
        self.tables.get(table)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_from_json() {
        let overrides: CatalogOverrides = serde_json::from_value(serde_json::json!({
            "people": {
                "columns": {
                    "address": {
                        "type": "RECORD",
                        "mode": "REPEATED",
                        "fields": [{"name": "street", "type": "STRING"}]
                    },
                    "id": {"notNull": true}
                },
                "attributes": {"labels": {"team": "x"}}
            }
        }))
        .unwrap();

        let people = overrides.table("people").unwrap();
        assert_eq!(
            people.columns["address"],
            ColumnOverride::new()
                .field_type("RECORD")
                .mode(Mode::Repeated)
                .field(FieldSpec::new("street", "STRING"))
        );
        assert_eq!(people.columns["id"].not_null, Some(true));
        assert_eq!(people.attributes["labels"], serde_json::json!({"team": "x"}));
        assert!(overrides.table("other").is_none());
    }

    #[test]
    fn test_nested_field_columns_from_json() {
        let column: ColumnOverride = serde_json::from_value(serde_json::json!({
            "type": "RECORD",
            "fields": [{
                "name": "street",
                "type": "STRING",
                "columns": {"street": {"mode": "REQUIRED", "description": "line one"}}
            }]
        }))
        .unwrap();

        assert_eq!(
            column.fields[0],
            FieldSpec::new("street", "STRING").column(
                "street",
                ColumnOverride::new().mode(Mode::Required).description("line one")
            )
        );
    }

    #[test]
    fn test_serialize_skips_unset() {
        let column = ColumnOverride::new().description("d");
        assert_eq!(
            serde_json::to_value(&column).unwrap(),
            serde_json::json!({"description": "d"})
        );
    }
}
