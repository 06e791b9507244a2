use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::validate_segment;
use super::Entity;
use super::EntityKind;
use crate::Error;
use crate::Result;

/// Composite key of a table: `(db_namespace, table_name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    pub namespace: String,
    pub table_name: String,
}

impl TableKey {
    pub fn new(
        namespace: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            table_name: table_name.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.table_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    UInt64,
    Int64,
    Double,
    #[default]
    String,
    DateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub repeated: bool,
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Partitioner {
    #[default]
    TimeWindow,
    Uint64,
    String,
}

/// Schema and placement metadata of one table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableConfig {
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
    pub partitioner: Partitioner,
    pub num_shards: Option<u32>,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Version of the stored definition; on update it is the base version
    /// the optimistic concurrency check compares against
    #[serde(skip)]
    pub version: u64,
    pub customer: String,
    pub table_name: String,
    /// Tombstone flag; a deleted table is still a versioned value
    pub deleted: bool,
    pub config: TableConfig,
}

impl TableDefinition {
    pub fn new(
        customer: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            customer: customer.into(),
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn with_config(
        mut self,
        config: TableConfig,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn table_key(&self) -> TableKey {
        TableKey::new(self.customer.clone(), self.table_name.clone())
    }
}

impl Entity for TableDefinition {
    type Key = TableKey;

    const KIND: EntityKind = EntityKind::Table;

    fn key(&self) -> Self::Key {
        self.table_key()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(
        &mut self,
        version: u64,
    ) {
        self.version = version;
    }

    fn validate(&self) -> Result<()> {
        validate_segment("customer", &self.customer)?;
        validate_segment("table_name", &self.table_name)?;

        for key_column in &self.config.primary_key {
            if !self.config.columns.iter().any(|c| &c.name == key_column) {
                return Err(Error::InvalidArgument(format!(
                    "primary key column '{key_column}' is not defined in table {}",
                    self.table_key()
                )));
            }
        }

        if self.config.num_shards == Some(0) {
            return Err(Error::InvalidArgument("num_shards must be greater than 0".into()));
        }

        Ok(())
    }
}
