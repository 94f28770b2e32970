//! BigQuery REST API Protocol Types
//!
//! Descriptor types returned by the catalog and the cursor. They serialize
//! to the camelCase JSON shape of the BigQuery v2 REST resources.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reference to a table (`project.dataset.table`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableReference {
    /// Parse `table`, `dataset.table` or `project.dataset.table`.
    ///
    /// Missing parts default to `default_project` and an empty dataset.
    pub fn parse(reference: &str, default_project: &str) -> Result<Self> {
        let parts: Vec<&str> = reference.split('.').collect();
        if parts.iter().any(|part| part.trim().is_empty()) {
            return Err(Error::InvalidTableReference(reference.to_string()));
        }

        let (project, dataset, table) = match parts.as_slice() {
            [table] => (default_project, "", *table),
            [dataset, table] => (default_project, *dataset, *table),
            [project, dataset, table] => (*project, *dataset, *table),
            _ => return Err(Error::InvalidTableReference(reference.to_string())),
        };

        Ok(Self {
            project_id: project.to_string(),
            dataset_id: dataset.to_string(),
            table_id: table.trim_matches('`').to_string(),
        })
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.dataset_id.is_empty() {
            write!(f, "{}.{}", self.project_id, self.table_id)
        } else {
            write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
        }
    }
}

/// Reference to a dataset (`project.dataset`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    pub project_id: String,
    pub dataset_id: String,
}

impl DatasetReference {
    /// Parse `dataset` or `project.dataset`.
    pub fn parse(reference: &str, default_project: &str) -> Result<Self> {
        match reference.split('.').collect::<Vec<_>>().as_slice() {
            [dataset] if !dataset.is_empty() => Ok(Self {
                project_id: default_project.to_string(),
                dataset_id: dataset.to_string(),
            }),
            [project, dataset] if !project.is_empty() && !dataset.is_empty() => Ok(Self {
                project_id: project.to_string(),
                dataset_id: dataset.to_string(),
            }),
            _ => Err(Error::InvalidTableReference(reference.to_string())),
        }
    }
}

impl fmt::Display for DatasetReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.project_id, self.dataset_id)
    }
}

/// Entry of a table listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableListItem {
    pub table_reference: TableReference,

    /// Upper-cased SQLite object type (`TABLE`, `VIEW`, `INDEX`, ...)
    #[serde(rename = "type")]
    pub table_type: String,
}

/// Column mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    Nullable,
    Required,
    Repeated,
}

impl Mode {
    pub fn from_not_null(not_null: bool) -> Self {
        if not_null {
            Mode::Required
        } else {
            Mode::Nullable
        }
    }
}

/// Schema field of a table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,

    /// Logical type as declared (`INT64`, `ARRAY_INT64_`, `RECORD`, ...)
    #[serde(rename = "type")]
    pub field_type: String,

    pub mode: Mode,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Nested fields (RECORD columns only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<ColumnDescriptor>,
}

/// Resolved table or view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    pub table_reference: TableReference,

    /// Upper-cased SQLite object type
    #[serde(rename = "type")]
    pub table_type: String,

    pub schema: Vec<ColumnDescriptor>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Defining query of a view, starting at its first `select`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_query: Option<String>,

    /// Ad hoc attributes supplied through overrides
    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.schema.iter().find(|column| column.name == name)
    }
}

/// Result column of a cursor: name and declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescription {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<String>,
}
