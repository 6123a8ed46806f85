//! SQLite-backed key-value store.
//!
//! All declared tables share one items table. Keys are stored as their JSON
//! encoding, attributes as a JSON object. Secondary indexes are SQLite
//! expression indexes over `json_extract(attributes, '$.<attribute>')`, so
//! they are maintained by SQLite on every write.

use super::{
    is_valid_attribute_name, AttributeValue, BillingMode, Filter, Item, KeyValueStore,
    PrimaryKey, TableDescription, TableSchema, TableStatus,
};
use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, SqlType, Table, VersionedSchema, BASE_DB_VERSION, DEFAULT_TIMESTAMP,
};
use anyhow::{bail, Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

const TABLES_TABLE_V_0: Table = Table {
    name: "kv_tables",
    columns: &[
        sqlite_column!("name", &SqlType::Text, is_primary_key = true),
        sqlite_column!("schema", &SqlType::Text, non_null = true),
        sqlite_column!("billing_mode", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const ITEMS_TABLE_V_0: Table = Table {
    name: "kv_items",
    columns: &[
        sqlite_column!("table_name", &SqlType::Text, non_null = true),
        sqlite_column!("hash_key", &SqlType::Text, non_null = true),
        sqlite_column!(
            "range_key",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!("attributes", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_kv_items_table", "table_name")],
    unique_constraints: &[&["table_name", "hash_key", "range_key"]],
};

pub const KV_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[TABLES_TABLE_V_0, ITEMS_TABLE_V_0],
    migration: None,
}];

pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

fn attribute_expression(attribute: &str) -> String {
    format!("json_extract(attributes, '$.{}')", attribute)
}

fn sql_index_name(table: &str, index: &str) -> String {
    let sanitized: String = format!("{}_{}", table, index)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("kvidx_{}", sanitized)
}

fn encode_key(value: &AttributeValue) -> Result<String> {
    serde_json::to_string(value).context("Failed to encode key")
}

fn sql_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Number(n) => Value::Integer(*n),
        AttributeValue::Text(s) => Value::Text(s.clone()),
    }
}

/// Appends `AND <expr> = ?N` clauses for the filters, numbering parameters
/// after the ones already bound.
fn append_filters(sql: &mut String, values: &mut Vec<Value>, filters: &[Filter]) -> Result<()> {
    for filter in filters {
        if !is_valid_attribute_name(&filter.attribute) {
            bail!("Invalid filter attribute {:?}", filter.attribute);
        }
        values.push(sql_value(&filter.value));
        sql.push_str(&format!(
            " AND {} = ?{}",
            attribute_expression(&filter.attribute),
            values.len()
        ));
    }
    Ok(())
}

fn collect_items(conn: &Connection, sql: &str, values: Vec<Value>) -> Result<Vec<Item>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<String>, _>>()?;
    rows.iter()
        .map(|json| serde_json::from_str(json).context("Corrupted item attributes"))
        .collect()
}

fn migrate_if_needed(conn: &Connection) -> Result<()> {
    let latest_version = KV_VERSIONED_SCHEMAS.len() - 1;
    let latest_schema = &KV_VERSIONED_SCHEMAS[latest_version];

    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?;
    if table_count == 0 {
        info!("Creating key-value db schema at version {}", latest_version);
        return latest_schema.create(conn);
    }

    let db_version: usize = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .context("Failed to read database version")?;
    if db_version < BASE_DB_VERSION {
        bail!("Database version {} is not a key-value store", db_version);
    }
    let version = db_version - BASE_DB_VERSION;
    let schema = KV_VERSIONED_SCHEMAS
        .get(version)
        .with_context(|| format!("Database version {} is too new", version))?;
    schema.validate(conn)?;

    let mut current_version = version;
    for schema in KV_VERSIONED_SCHEMAS.iter().skip(version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating key-value db from version {} to {}",
                current_version, schema.version
            );
            migration_fn(conn)?;
            current_version = schema.version;
        }
    }
    conn.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
    Ok(())
}

impl SqliteKvStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            db_path.as_ref(),
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open key-value database {:?}", db_path.as_ref()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrate_if_needed(&conn)?;
        let table_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM kv_tables", [], |r| r.get(0))?;
        info!("Opened key-value store with {} tables", table_count);
        Ok(SqliteKvStore {
            conn: Mutex::new(conn),
        })
    }

    fn load_schema(conn: &Connection, name: &str) -> Result<TableSchema> {
        let schema_json: Option<String> = conn
            .query_row(
                "SELECT schema FROM kv_tables WHERE name = ?1",
                params![name],
                |r| r.get(0),
            )
            .optional()?;
        let schema_json = schema_json.with_context(|| format!("Table {} not found", name))?;
        serde_json::from_str(&schema_json)
            .with_context(|| format!("Corrupted schema for table {}", name))
    }
}

impl KeyValueStore for SqliteKvStore {
    fn create_table(&self, schema: &TableSchema) -> Result<()> {
        schema.validate()?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM kv_tables WHERE name = ?1",
                params![schema.name],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if exists {
            bail!("Table {} already exists", schema.name);
        }

        tx.execute(
            "INSERT INTO kv_tables (name, schema, billing_mode) VALUES (?1, ?2, ?3)",
            params![
                schema.name,
                serde_json::to_string(schema)?,
                BillingMode::Provisioned.as_str()
            ],
        )?;
        for index in &schema.indexes {
            let mut columns = vec![attribute_expression(&index.key.hash)];
            if let Some(range) = &index.key.range {
                columns.push(attribute_expression(range));
            }
            tx.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS \"{}\" ON kv_items(table_name, {})",
                    sql_index_name(&schema.name, &index.name),
                    columns.join(", ")
                ),
                [],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn describe_table(&self, name: &str) -> Result<Option<TableDescription>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT schema, billing_mode FROM kv_tables WHERE name = ?1",
                params![name],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let (schema_json, billing_mode) = match row {
            Some(row) => row,
            None => return Ok(None),
        };
        Ok(Some(TableDescription {
            schema: serde_json::from_str(&schema_json)
                .with_context(|| format!("Corrupted schema for table {}", name))?,
            status: TableStatus::Active,
            billing_mode: BillingMode::from_db_str(&billing_mode)
                .with_context(|| format!("Unknown billing mode {}", billing_mode))?,
        }))
    }

    fn update_billing_mode(&self, name: &str, mode: BillingMode) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE kv_tables SET billing_mode = ?1 WHERE name = ?2",
            params![mode.as_str(), name],
        )?;
        if updated == 0 {
            bail!("Table {} not found", name);
        }
        Ok(())
    }

    fn scan(&self, table: &str, filters: &[Filter]) -> Result<Vec<Item>> {
        let conn = self.conn.lock().unwrap();
        Self::load_schema(&conn, table)?;

        let mut sql = "SELECT attributes FROM kv_items WHERE table_name = ?1".to_string();
        let mut values = vec![Value::Text(table.to_owned())];
        append_filters(&mut sql, &mut values, filters)?;
        sql.push_str(" ORDER BY rowid");
        collect_items(&conn, &sql, values)
    }

    fn query(
        &self,
        table: &str,
        index: Option<&str>,
        hash: &AttributeValue,
        filters: &[Filter],
    ) -> Result<Vec<Item>> {
        let conn = self.conn.lock().unwrap();
        let schema = Self::load_schema(&conn, table)?;

        let mut values = vec![Value::Text(table.to_owned())];
        let mut sql = match index {
            Some(index_name) => {
                let index = schema
                    .index(index_name)
                    .with_context(|| format!("Table {} has no index {}", table, index_name))?;
                values.push(sql_value(hash));
                format!(
                    "SELECT attributes FROM kv_items WHERE table_name = ?1 AND {} = ?2",
                    attribute_expression(&index.key.hash)
                )
            }
            None => {
                values.push(Value::Text(encode_key(hash)?));
                "SELECT attributes FROM kv_items WHERE table_name = ?1 AND hash_key = ?2"
                    .to_string()
            }
        };
        append_filters(&mut sql, &mut values, filters)?;
        sql.push_str(" ORDER BY rowid");
        collect_items(&conn, &sql, values)
    }

    fn put(&self, table: &str, item: Item) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let schema = Self::load_schema(&conn, table)?;
        let key = schema.primary_key_of(&item)?;
        let range_key = match &key.range {
            Some(range) => encode_key(range)?,
            None => String::new(),
        };
        conn.execute(
            "INSERT INTO kv_items (table_name, hash_key, range_key, attributes) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(table_name, hash_key, range_key) DO UPDATE SET attributes = excluded.attributes",
            params![
                table,
                encode_key(&key.hash)?,
                range_key,
                serde_json::to_string(&item)?
            ],
        )
        .with_context(|| format!("Failed to put item into {}", table))?;
        Ok(())
    }

    fn delete(&self, table: &str, key: &PrimaryKey) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        Self::load_schema(&conn, table)?;
        let range_key = match &key.range {
            Some(range) => encode_key(range)?,
            None => String::new(),
        };
        conn.execute(
            "DELETE FROM kv_items WHERE table_name = ?1 AND hash_key = ?2 AND range_key = ?3",
            params![table, encode_key(&key.hash)?, range_key],
        )?;
        Ok(())
    }
}
