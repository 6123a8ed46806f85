//! In-process key-value store.
//!
//! Keeps items in insertion order and can simulate the slow parts of a
//! managed store: tables that stay in `Creating` for a number of polls and
//! billing-mode switches that fail a number of times before succeeding.

use super::{
    matches_all, AttributeValue, BillingMode, Filter, Item, KeyValueStore, PrimaryKey,
    TableDescription, TableSchema, TableStatus,
};
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::sync::Mutex;

struct MemoryTable {
    description: TableDescription,
    pending_activation_polls: u32,
    pending_billing_failures: u32,
    items: Vec<(PrimaryKey, Item)>,
}

#[derive(Default)]
pub struct MemoryKvStore {
    tables: Mutex<HashMap<String, MemoryTable>>,
    activation_polls: u32,
    billing_failures: u32,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// New tables report `Creating` for this many `describe_table` calls.
    pub fn with_activation_polls(mut self, polls: u32) -> Self {
        self.activation_polls = polls;
        self
    }

    /// Billing-mode updates on a new table fail this many times.
    pub fn with_billing_failures(mut self, failures: u32) -> Self {
        self.billing_failures = failures;
        self
    }
}

impl KeyValueStore for MemoryKvStore {
    fn create_table(&self, schema: &TableSchema) -> Result<()> {
        schema.validate()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.contains_key(&schema.name) {
            bail!("Table {} already exists", schema.name);
        }
        tables.insert(
            schema.name.clone(),
            MemoryTable {
                description: TableDescription {
                    schema: schema.clone(),
                    status: TableStatus::Creating,
                    billing_mode: BillingMode::Provisioned,
                },
                pending_activation_polls: self.activation_polls,
                pending_billing_failures: self.billing_failures,
                items: vec![],
            },
        );
        Ok(())
    }

    fn describe_table(&self, name: &str) -> Result<Option<TableDescription>> {
        let mut tables = self.tables.lock().unwrap();
        let table = match tables.get_mut(name) {
            Some(table) => table,
            None => return Ok(None),
        };
        if table.description.status == TableStatus::Creating {
            if table.pending_activation_polls == 0 {
                table.description.status = TableStatus::Active;
            } else {
                table.pending_activation_polls -= 1;
            }
        }
        Ok(Some(table.description.clone()))
    }

    fn update_billing_mode(&self, name: &str, mode: BillingMode) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let table = tables
            .get_mut(name)
            .with_context(|| format!("Table {} not found", name))?;
        if table.description.status != TableStatus::Active {
            bail!("Table {} is still being created", name);
        }
        if table.pending_billing_failures > 0 {
            table.pending_billing_failures -= 1;
            bail!("Billing mode of table {} is being updated, try again", name);
        }
        table.description.billing_mode = mode;
        Ok(())
    }

    fn scan(&self, table: &str, filters: &[Filter]) -> Result<Vec<Item>> {
        let tables = self.tables.lock().unwrap();
        let table = tables
            .get(table)
            .with_context(|| format!("Table {} not found", table))?;
        Ok(table
            .items
            .iter()
            .map(|(_, item)| item)
            .filter(|item| matches_all(item, filters))
            .cloned()
            .collect())
    }

    fn query(
        &self,
        table: &str,
        index: Option<&str>,
        hash: &AttributeValue,
        filters: &[Filter],
    ) -> Result<Vec<Item>> {
        let tables = self.tables.lock().unwrap();
        let memory_table = tables
            .get(table)
            .with_context(|| format!("Table {} not found", table))?;
        let schema = &memory_table.description.schema;
        let hash_attribute = match index {
            Some(index_name) => {
                &schema
                    .index(index_name)
                    .with_context(|| format!("Table {} has no index {}", table, index_name))?
                    .key
                    .hash
            }
            None => &schema.key.hash,
        };
        Ok(memory_table
            .items
            .iter()
            .map(|(_, item)| item)
            .filter(|item| item.get(hash_attribute) == Some(hash))
            .filter(|item| matches_all(item, filters))
            .cloned()
            .collect())
    }

    fn put(&self, table: &str, item: Item) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let memory_table = tables
            .get_mut(table)
            .with_context(|| format!("Table {} not found", table))?;
        let key = memory_table.description.schema.primary_key_of(&item)?;
        match memory_table.items.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = item,
            None => memory_table.items.push((key, item)),
        }
        Ok(())
    }

    fn delete(&self, table: &str, key: &PrimaryKey) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let memory_table = tables
            .get_mut(table)
            .with_context(|| format!("Table {} not found", table))?;
        memory_table.items.retain(|(k, _)| k != key);
        Ok(())
    }
}
