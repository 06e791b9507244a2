use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::validate_segment;
use super::Entity;
use super::EntityKind;
use crate::Result;

/// Namespace-level settings; the parent scope of tables
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamespaceConfig {
    #[serde(skip)]
    pub version: u64,
    /// Namespace identifier (customer key)
    pub customer: String,
    pub properties: BTreeMap<String, String>,
}

impl NamespaceConfig {
    pub fn new(customer: impl Into<String>) -> Self {
        Self {
            customer: customer.into(),
            ..Default::default()
        }
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl Entity for NamespaceConfig {
    type Key = String;

    const KIND: EntityKind = EntityKind::Namespace;

    fn key(&self) -> Self::Key {
        self.customer.clone()
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
        validate_segment("customer", &self.customer)
    }
}
