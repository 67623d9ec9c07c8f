//! Type-name to driver mapping, built once at startup

use crate::driver::ResourceDriver;
use crate::error::{Result, TfcoreError};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<dyn ResourceDriver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under its type name. Its schema is checked here so
    /// a malformed declaration fails at startup instead of mid-reconcile.
    pub fn register(&mut self, driver: Arc<dyn ResourceDriver>) -> Result<()> {
        let type_name = driver.type_name().to_string();
        if driver.schema().type_name != type_name {
            return Err(TfcoreError::Schema(format!(
                "driver '{}' declares a schema for '{}'",
                type_name,
                driver.schema().type_name
            )));
        }
        driver.schema().check()?;

        if self.drivers.contains_key(&type_name) {
            return Err(TfcoreError::Schema(format!(
                "driver for '{}' registered twice",
                type_name
            )));
        }

        tracing::debug!("Registered driver for {}", type_name);
        self.drivers.insert(type_name, driver);
        Ok(())
    }

    pub fn with(mut self, driver: Arc<dyn ResourceDriver>) -> Result<Self> {
        self.register(driver)?;
        Ok(self)
    }

    pub fn get(&self, type_name: &str) -> Result<Arc<dyn ResourceDriver>> {
        self.drivers
            .get(type_name)
            .cloned()
            .ok_or_else(|| TfcoreError::UnknownResourceType(type_name.to_string()))
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }
}
