//! BigQuery Catalog Adapter
//!
//! Rebuilds table, column and view descriptors from SQLite introspection,
//! merged with the comment side-table and the configured overrides.
//! Descriptors are rebuilt on every call.

use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::comments::{CommentStore, COMMENTS_TABLE};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::overrides::{ColumnOverride, FieldSpec};
use crate::protocol::{
    ColumnDescriptor, DatasetReference, Mode, TableDescriptor, TableListItem, TableReference,
};

pub struct Catalog<'a> {
    conn: &'a Connection,
    config: &'a SessionConfig,
}

/// Column data before it becomes a descriptor
struct FieldInput {
    name: String,
    field_type: String,
    not_null: bool,
    mode: Option<Mode>,
    description: Option<String>,
    fields: Vec<FieldSpec>,
}

impl<'a> Catalog<'a> {
    pub fn new(conn: &'a Connection, config: &'a SessionConfig) -> Self {
        Self { conn, config }
    }

    /// Resolve `[project.][dataset.]table` into a descriptor.
    pub fn resolve_table(&self, reference: &str) -> Result<TableDescriptor> {
        let table_reference = TableReference::parse(reference, &self.config.project)?;
        let table = table_reference.table_id.clone();
        tracing::debug!("Resolving table {}", table_reference);

        let object = self
            .conn
            .query_row(
                "SELECT type, sql FROM sqlite_master WHERE name = ?1",
                params![table],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;
        let Some((object_type, object_sql)) = object else {
            return Err(Error::NotFound(table_reference.to_string()));
        };

        let table_override = self.config.overrides.table(&table);

        // Comments go into the column overrides, ahead of their descriptions
        let mut comments = CommentStore::new(self.conn).lookup(&table)?;
        let description = comments.remove("");
        let mut columns = table_override
            .map(|t| t.columns.clone())
            .unwrap_or_default();
        for (column, comment) in comments {
            columns.entry(column).or_default().description = Some(comment);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT name, type, \"notnull\" FROM pragma_table_info(?1) ORDER BY cid")?;
        let introspected = stmt
            .query_map(params![table], |row| {
                Ok(FieldInput {
                    name: row.get(0)?,
                    field_type: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    mode: None,
                    description: None,
                    fields: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let schema = introspected
            .into_iter()
            .map(|input| build_field(input, Some(&columns)))
            .collect();

        let view_query = match (object_type.as_str(), object_sql) {
            ("view", Some(sql)) => view_query(&sql),
            _ => None,
        };

        let mut descriptor = TableDescriptor {
            table_reference,
            table_type: object_type.to_uppercase(),
            schema,
            description,
            view_query,
            attributes: BTreeMap::new(),
        };

        if let Some(table_override) = table_override {
            for (name, value) in &table_override.attributes {
                match name.as_str() {
                    "description" => descriptor.description = value.as_str().map(str::to_string),
                    "view_query" | "viewQuery" => {
                        descriptor.view_query = value.as_str().map(str::to_string)
                    }
                    _ => {
                        descriptor.attributes.insert(name.clone(), value.clone());
                    }
                }
            }
        }

        Ok(descriptor)
    }

    pub fn list_datasets(&self) -> Result<Vec<DatasetReference>> {
        self.config
            .datasets
            .iter()
            .map(|dataset| DatasetReference::parse(dataset, &self.config.project))
            .collect()
    }

    /// Every catalog object except the comment side-table.
    pub fn list_tables(&self, dataset: &DatasetReference) -> Result<Vec<TableListItem>> {
        let mut stmt = self
            .conn
            .prepare("SELECT type, name FROM sqlite_master WHERE name != ?1")?;
        let rows = stmt.query_map(params![COMMENTS_TABLE], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut tables = Vec::new();
        for row in rows {
            let (object_type, name) = row?;
            tables.push(TableListItem {
                table_reference: TableReference {
                    project_id: dataset.project_id.clone(),
                    dataset_id: dataset.dataset_id.clone(),
                    table_id: name,
                },
                table_type: object_type.to_uppercase(),
            });
        }
        Ok(tables)
    }
}

/// Build one descriptor. A matching override is merged over the input and
/// the result is built again against the override's own `columns` map.
fn build_field(
    input: FieldInput,
    columns: Option<&BTreeMap<String, ColumnOverride>>,
) -> ColumnDescriptor {
    if let Some(custom) = columns.and_then(|columns| columns.get(&input.name)) {
        let merged = FieldInput {
            name: custom.name.clone().unwrap_or(input.name),
            field_type: custom.field_type.clone().unwrap_or(input.field_type),
            not_null: custom.not_null.unwrap_or(input.not_null),
            mode: custom.mode.or(input.mode),
            description: custom.description.clone().or(input.description),
            fields: if custom.fields.is_empty() {
                input.fields
            } else {
                custom.fields.clone()
            },
        };
        let nested = (!custom.columns.is_empty()).then_some(&custom.columns);
        return build_field(merged, nested);
    }

    ColumnDescriptor {
        mode: input.mode.unwrap_or(Mode::from_not_null(input.not_null)),
        name: input.name,
        field_type: input.field_type,
        description: input.description,
        fields: input.fields.into_iter().map(build_nested).collect(),
    }
}

fn build_nested(spec: FieldSpec) -> ColumnDescriptor {
    let columns = spec.columns;
    build_field(
        FieldInput {
            name: spec.name,
            field_type: spec.field_type,
            not_null: false,
            mode: spec.mode,
            description: spec.description,
            fields: spec.fields,
        },
        (!columns.is_empty()).then_some(&columns),
    )
}

/// Stored view SQL from its first case-insensitive `select`.
fn view_query(sql: &str) -> Option<String> {
    sql.to_ascii_lowercase()
        .find("select")
        .map(|start| sql[start..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::{CatalogOverrides, TableOverride};

    fn setup(sql: &str) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        CommentStore::new(&conn).install().unwrap();
        conn.execute_batch(sql).unwrap();
        conn
    }

    #[test]
    fn test_resolve_table_introspection() {
        let conn = setup("CREATE TABLE t (id INT64 NOT NULL, name STRING, tags ARRAY_INT64_)");
        let config = SessionConfig::default();
        let table = Catalog::new(&conn, &config).resolve_table("mydataset.t").unwrap();

        assert_eq!(table.table_reference.to_string(), "authproj.mydataset.t");
        assert_eq!(table.table_type, "TABLE");
        assert_eq!(table.schema.len(), 3);
        assert_eq!(table.schema[0].mode, Mode::Required);
        assert_eq!(table.schema[1].mode, Mode::Nullable);
        assert_eq!(table.schema[2].field_type, "ARRAY_INT64_");
        assert!(table.description.is_none());
        assert!(table.view_query.is_none());
    }

    #[test]
    fn test_resolve_missing_table() {
        let conn = setup("");
        let config = SessionConfig::default();
        let err = Catalog::new(&conn, &config).resolve_table("nope").unwrap_err();
        assert!(matches!(err, Error::NotFound(name) if name == "authproj.nope"));
    }

    #[test]
    fn test_comments_become_descriptions() {
        let conn = setup("CREATE TABLE t (x INT64, y INT64)");
        let store = CommentStore::new(&conn);
        store.upsert("t", "", "the table").unwrap();
        store.upsert("t", "x", "the x").unwrap();

        let config = SessionConfig::default();
        let table = Catalog::new(&conn, &config).resolve_table("t").unwrap();

        assert_eq!(table.description.as_deref(), Some("the table"));
        assert_eq!(table.column("x").unwrap().description.as_deref(), Some("the x"));
        assert!(table.column("y").unwrap().description.is_none());
    }

    #[test]
    fn test_comment_wins_over_override_description() {
        let conn = setup("CREATE TABLE t (x INT64)");
        CommentStore::new(&conn).upsert("t", "x", "from comment").unwrap();

        let config = SessionConfig::default().with_overrides(CatalogOverrides::new().with_table(
            "t",
            TableOverride::new().column(
                "x",
                ColumnOverride::new().description("from override").mode(Mode::Repeated),
            ),
        ));
        let table = Catalog::new(&conn, &config).resolve_table("t").unwrap();

        let x = table.column("x").unwrap();
        assert_eq!(x.description.as_deref(), Some("from comment"));
        assert_eq!(x.mode, Mode::Repeated);
    }

    #[test]
    fn test_override_nested_fields_and_recursion() {
        let conn = setup("CREATE TABLE t (addr STRUCT_street_STRING_ NOT NULL)");
        let config = SessionConfig::default().with_overrides(CatalogOverrides::new().with_table(
            "t",
            TableOverride::new().column(
                "addr",
                ColumnOverride::new()
                    .name("address")
                    .field_type("RECORD")
                    .field(FieldSpec::new("street", "STRING"))
                    .column("address", ColumnOverride::new().not_null(false)),
            ),
        ));
        let table = Catalog::new(&conn, &config).resolve_table("t").unwrap();

        let address = &table.schema[0];
        assert_eq!(address.name, "address");
        assert_eq!(address.field_type, "RECORD");
        assert_eq!(address.mode, Mode::Nullable);
        assert_eq!(address.fields.len(), 1);
        assert_eq!(address.fields[0].name, "street");
        assert_eq!(address.fields[0].mode, Mode::Nullable);
    }

    #[test]
    fn test_override_applies_to_nested_fields() {
        let conn = setup("CREATE TABLE t (addr STRUCT_street_STRING_)");
        let config = SessionConfig::default().with_overrides(CatalogOverrides::new().with_table(
            "t",
            TableOverride::new().column(
                "addr",
                ColumnOverride::new().field_type("RECORD").field(
                    FieldSpec::new("street", "STRING")
                        .field(FieldSpec::new("number", "INT64").column(
                            "number",
                            ColumnOverride::new().field_type("INTEGER"),
                        ))
                        .column(
                            "street",
                            ColumnOverride::new()
                                .mode(Mode::Required)
                                .description("line one"),
                        ),
                ),
            ),
        ));
        let table = Catalog::new(&conn, &config).resolve_table("t").unwrap();

        let street = &table.schema[0].fields[0];
        assert_eq!(street.name, "street");
        assert_eq!(street.mode, Mode::Required);
        assert_eq!(street.description.as_deref(), Some("line one"));
        assert_eq!(street.fields[0].field_type, "INTEGER");
        assert_eq!(street.fields[0].mode, Mode::Nullable);
    }

    #[test]
    fn test_view_query_and_attributes() {
        let conn = setup("CREATE TABLE t (x INT64); CREATE VIEW v AS SELECT x FROM t");
        let config = SessionConfig::default().with_overrides(CatalogOverrides::new().with_table(
            "v",
            TableOverride::new()
                .attribute("description", "a view")
                .attribute("labels", serde_json::json!({"a": "b"})),
        ));
        let view = Catalog::new(&conn, &config).resolve_table("v").unwrap();

        assert_eq!(view.table_type, "VIEW");
        assert_eq!(view.view_query.as_deref(), Some("SELECT x FROM t"));
        assert_eq!(view.description.as_deref(), Some("a view"));
        assert_eq!(view.attributes["labels"], serde_json::json!({"a": "b"}));
    }

    #[test]
    fn test_list_datasets_and_tables() {
        let conn = setup("CREATE TABLE a (x INT64); CREATE VIEW b AS SELECT x FROM a");
        let config = SessionConfig::default();
        let catalog = Catalog::new(&conn, &config);

        let datasets = catalog.list_datasets().unwrap();
        let names: Vec<_> = datasets.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["myproject.mydataset", "myproject.yourdataset"]);

        let tables = catalog.list_tables(&datasets[0]).unwrap();
        let listed: Vec<_> = tables
            .iter()
            .map(|t| (t.table_reference.table_id.as_str(), t.table_type.as_str()))
            .collect();
        assert_eq!(listed, vec![("a", "TABLE"), ("b", "VIEW")]);
        assert_eq!(tables[0].table_reference.dataset_id, "mydataset");
    }
}
