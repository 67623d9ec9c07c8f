pub mod api;
pub mod config;
pub mod platforms;
pub mod resources;

pub use config::ProviderConfig;
pub use platforms::{AttributeMap, PlatformTable, SnsTables};

use std::sync::Arc;
use tfcore::DriverRegistry;

/// Builds the drivers for every resource type this crate manages
pub struct AwsProvider {
    client: api::Client,
    tables: Arc<SnsTables>,
}

impl AwsProvider {
    pub fn new(config: &ProviderConfig) -> tfcore::Result<Self> {
        let client = api::Client::with_config(
            config.endpoint.as_str(),
            &config.token,
            api::ClientConfig {
                request_timeout: config.request_timeout,
                ..Default::default()
            },
        )?;

        Ok(Self {
            client,
            tables: Arc::new(SnsTables::default()),
        })
    }

    /// Replace the SNS platform and attribute tables
    pub fn with_tables(mut self, tables: SnsTables) -> Self {
        self.tables = Arc::new(tables);
        self
    }

    pub fn client(&self) -> &api::Client {
        &self.client
    }

    pub fn registry(&self) -> tfcore::Result<DriverRegistry> {
        DriverRegistry::new()
            .with(Arc::new(resources::SnsApplicationDriver::new(
                self.client.clone(),
                self.tables.clone(),
            )))?
            .with(Arc::new(resources::VpcEndpointDriver::new(
                self.client.clone(),
            )?))
    }
}
