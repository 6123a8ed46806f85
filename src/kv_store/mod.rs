//! Key-value store abstraction with secondary indexes.
//!
//! Tables are declared with a hash key, an optional range key and any number
//! of secondary indexes projecting all attributes. Items are flat attribute
//! maps. Writes are atomic per item only.

mod memory_store;
mod provisioning;
mod sqlite_store;

pub use memory_store::MemoryKvStore;
pub use provisioning::{ensure_table, ProvisioningError, ProvisioningPolicy};
pub use sqlite_store::SqliteKvStore;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(i64),
    Text(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Number(value as i64)
    }
}

pub type Item = BTreeMap<String, AttributeValue>;

/// Reads a string attribute, failing if it is missing or not a string.
pub fn get_text(item: &Item, name: &str) -> Result<String> {
    match item.get(name) {
        Some(AttributeValue::Text(s)) => Ok(s.clone()),
        Some(other) => bail!("Attribute {} is not a string: {}", name, other),
        None => bail!("Missing attribute {}", name),
    }
}

/// Reads a numeric attribute, failing if it is missing or not a number.
pub fn get_number(item: &Item, name: &str) -> Result<i64> {
    match item.get(name) {
        Some(AttributeValue::Number(n)) => Ok(*n),
        Some(other) => bail!("Attribute {} is not a number: {}", name, other),
        None => bail!("Missing attribute {}", name),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    pub hash: String,
    pub range: Option<String>,
}

impl KeySchema {
    pub fn hash_only(hash: &str) -> Self {
        KeySchema {
            hash: hash.to_owned(),
            range: None,
        }
    }

    pub fn hash_range(hash: &str, range: &str) -> Self {
        KeySchema {
            hash: hash.to_owned(),
            range: Some(range.to_owned()),
        }
    }
}

/// A secondary index. Every index projects all attributes of the item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIndex {
    pub name: String,
    pub key: KeySchema,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub key: KeySchema,
    pub indexes: Vec<SecondaryIndex>,
}

pub(crate) fn is_valid_attribute_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_valid_object_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

impl TableSchema {
    pub fn new(name: &str, key: KeySchema) -> Self {
        TableSchema {
            name: name.to_owned(),
            key,
            indexes: vec![],
        }
    }

    pub fn with_index(mut self, name: &str, key: KeySchema) -> Self {
        self.indexes.push(SecondaryIndex {
            name: name.to_owned(),
            key,
        });
        self
    }

    pub fn index(&self, name: &str) -> Option<&SecondaryIndex> {
        self.indexes.iter().find(|index| index.name == name)
    }

    /// Checks names before they are used to build backend statements.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_object_name(&self.name) {
            bail!("Invalid table name {:?}", self.name);
        }
        let key_schemas =
            std::iter::once(&self.key).chain(self.indexes.iter().map(|index| &index.key));
        for key in key_schemas {
            for attribute in std::iter::once(&key.hash).chain(key.range.iter()) {
                if !is_valid_attribute_name(attribute) {
                    bail!(
                        "Invalid key attribute {:?} in table {}",
                        attribute,
                        self.name
                    );
                }
            }
        }
        for (position, index) in self.indexes.iter().enumerate() {
            if !is_valid_object_name(&index.name) {
                bail!("Invalid index name {:?} in table {}", index.name, self.name);
            }
            if self.indexes[..position].iter().any(|i| i.name == index.name) {
                bail!("Duplicate index {} in table {}", index.name, self.name);
            }
        }
        Ok(())
    }

    /// Extracts the primary key of an item according to this schema.
    pub fn primary_key_of(&self, item: &Item) -> Result<PrimaryKey> {
        let hash = item
            .get(&self.key.hash)
            .cloned()
            .with_context(|| format!("Item is missing hash key {}", self.key.hash))?;
        let range = match &self.key.range {
            Some(range_name) => Some(
                item.get(range_name)
                    .cloned()
                    .with_context(|| format!("Item is missing range key {}", range_name))?,
            ),
            None => None,
        };
        Ok(PrimaryKey { hash, range })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrimaryKey {
    pub hash: AttributeValue,
    pub range: Option<AttributeValue>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    Creating,
    Active,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingMode {
    Provisioned,
    OnDemand,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::Provisioned => "provisioned",
            BillingMode::OnDemand => "on_demand",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "provisioned" => Some(BillingMode::Provisioned),
            "on_demand" => Some(BillingMode::OnDemand),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableDescription {
    pub schema: TableSchema,
    pub status: TableStatus,
    pub billing_mode: BillingMode,
}

/// Equality condition on a single attribute, applied after key selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    pub attribute: String,
    pub value: AttributeValue,
}

impl Filter {
    pub fn eq<V: Into<AttributeValue>>(attribute: &str, value: V) -> Self {
        Filter {
            attribute: attribute.to_owned(),
            value: value.into(),
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        item.get(&self.attribute) == Some(&self.value)
    }
}

pub fn matches_all(item: &Item, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| filter.matches(item))
}

/// Trait for key-value storage backends.
///
/// New tables start with `BillingMode::Provisioned` and may report
/// `TableStatus::Creating` for a while after `create_table`.
pub trait KeyValueStore: Send + Sync {
    /// Creates a table. Fails if a table with the same name exists.
    fn create_table(&self, schema: &TableSchema) -> Result<()>;

    /// Returns Ok(None) if the table does not exist.
    fn describe_table(&self, name: &str) -> Result<Option<TableDescription>>;

    fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.describe_table(name)?.is_some())
    }

    fn update_billing_mode(&self, name: &str, mode: BillingMode) -> Result<()>;

    /// Returns every item of the table that satisfies all the filters.
    fn scan(&self, table: &str, filters: &[Filter]) -> Result<Vec<Item>>;

    /// Returns the items whose hash key, in the table or in the given
    /// secondary index, equals `hash`, narrowed by the filters.
    fn query(
        &self,
        table: &str,
        index: Option<&str>,
        hash: &AttributeValue,
        filters: &[Filter],
    ) -> Result<Vec<Item>>;

    /// Inserts or replaces the item with the same primary key.
    fn put(&self, table: &str, item: Item) -> Result<()>;

    /// Deletes the item with the given primary key. Deleting a missing item
    /// is not an error.
    fn delete(&self, table: &str, key: &PrimaryKey) -> Result<()>;
}
