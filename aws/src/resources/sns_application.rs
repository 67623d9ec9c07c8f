//! SNS platform application driver

use crate::api::sns::{CreatePlatformApplicationRequest, PlatformAttributes};
use crate::api::{ApiError, Client};
use crate::platforms::SnsTables;
use async_trait::async_trait;
use std::sync::Arc;
use tfcore::driver::{
    CreateRequest, CreateResponse, DeleteRequest, ReadRequest, ReadResponse, ResourceDriver,
    UpdateRequest, UpdateResponse,
};
use tfcore::validator::{NumberRangeValidator, OneOfValidator};
use tfcore::{
    AttributeBuilder, AttributeValue, Attributes, Context, Result, Schema, SchemaBuilder,
    TfcoreError,
};

pub const TYPE_NAME: &str = "aws_sns_application";

const PLATFORM_CREDENTIAL: &str = "PlatformCredential";
const PLATFORM_PRINCIPAL: &str = "PlatformPrincipal";

pub struct SnsApplicationDriver {
    client: Client,
    tables: Arc<SnsTables>,
    schema: Schema,
}

impl SnsApplicationDriver {
    pub fn new(client: Client, tables: Arc<SnsTables>) -> Self {
        let schema = Self::schema_for(&tables);
        Self {
            client,
            tables,
            schema,
        }
    }

    /// The accepted platforms come from the injected table
    pub fn schema_for(tables: &SnsTables) -> Schema {
        SchemaBuilder::new(TYPE_NAME)
            .version(0)
            .description("Manages an SNS platform application")
            .attribute(
                AttributeBuilder::string("name")
                    .description("Application name")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("platform")
                    .description("Push notification platform (e.g., APNS, GCM)")
                    .required()
                    .force_new()
                    .validator(OneOfValidator::new(tables.platforms.names()))
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("credential")
                    .description("Platform credential; only its fingerprint is stored")
                    .required()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("principal")
                    .description("Platform principal; required by some platforms")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("created_topic")
                    .description("Topic notified when an endpoint is created")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("deleted_topic")
                    .description("Topic notified when an endpoint is deleted")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("updated_topic")
                    .description("Topic notified when an endpoint is updated")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("failure_topic")
                    .description("Topic notified on delivery failure")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("success_iam_role")
                    .description("Role used to log successful deliveries")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("failure_iam_role")
                    .description("Role used to log failed deliveries")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("success_sample_rate")
                    .description("Percentage of successful deliveries to log")
                    .optional()
                    .validator(NumberRangeValidator {
                        min: Some(0.0),
                        max: Some(100.0),
                    })
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("arn")
                    .description("Platform application ARN")
                    .computed()
                    .build(),
            )
            .build()
    }

    fn requires_principal(&self, platform: &str) -> Result<bool> {
        self.tables
            .platforms
            .requires_principal(platform)
            .ok_or_else(|| {
                TfcoreError::validation_at(
                    "platform",
                    format!("Platform {} is not supported", platform),
                )
            })
    }

    /// Principal is mandatory for some platforms; checked before any request
    fn principal<'a>(&self, config: &'a Attributes, platform: &str) -> Result<Option<&'a str>> {
        let principal = optional_str(config, "principal");
        if self.requires_principal(platform)? && principal.is_none() {
            return Err(TfcoreError::validation_at(
                "principal",
                format!("Principal is required for {}", platform),
            ));
        }
        Ok(principal)
    }
}

fn optional_str<'a>(config: &'a Attributes, name: &str) -> Option<&'a str> {
    config
        .get(name)
        .and_then(AttributeValue::as_str)
        .filter(|s| !s.is_empty())
}

fn required_str<'a>(config: &'a Attributes, name: &str) -> Result<&'a str> {
    optional_str(config, name)
        .ok_or_else(|| TfcoreError::validation_at(name, "required attribute is missing"))
}

#[async_trait]
impl ResourceDriver for SnsApplicationDriver {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, config: &Attributes) -> Result<()> {
        self.principal(config, required_str(config, "platform")?)?;
        Ok(())
    }

    async fn create(&self, _ctx: Context, request: CreateRequest) -> Result<CreateResponse> {
        let config = &request.desired;
        let name = required_str(config, "name")?;
        let platform = required_str(config, "platform")?;
        self.principal(config, platform)?;

        let mut attributes = PlatformAttributes::new();
        attributes.insert(
            PLATFORM_CREDENTIAL.to_string(),
            required_str(config, "credential")?.to_string(),
        );
        for (field, remote) in self.tables.attributes.iter() {
            if let Some(value) = optional_str(config, field) {
                attributes.insert(remote.to_string(), value.to_string());
            }
        }

        tracing::debug!("SNS create application: {}", name);

        let arn = self
            .client
            .sns()
            .create_platform_application(&CreatePlatformApplicationRequest {
                name: name.to_string(),
                platform: platform.to_string(),
                attributes,
            })
            .await?;

        tracing::info!("Created SNS application {} ({})", name, arn);

        let mut observed = Attributes::new();
        observed.insert("arn".to_string(), AttributeValue::from(arn.as_str()));
        Ok(CreateResponse { id: arn, observed })
    }

    async fn read(&self, _ctx: Context, request: ReadRequest) -> Result<ReadResponse> {
        let remote = self
            .client
            .sns()
            .get_platform_application_attributes(&request.id)
            .await?;

        // Stateful remote properties (subscription counts, owner, ...) have
        // no field and are skipped
        let mut observed = Attributes::new();
        for (field, remote_name) in self.tables.attributes.iter() {
            if let Some(value) = remote.get(remote_name) {
                tracing::debug!("Reading {} => {} -> {}", field, remote_name, value);
                observed.insert(field.to_string(), AttributeValue::from(value.as_str()));
            }
        }
        observed.insert("arn".to_string(), AttributeValue::from(request.id.as_str()));

        Ok(ReadResponse { observed })
    }

    async fn update(&self, _ctx: Context, request: UpdateRequest) -> Result<UpdateResponse> {
        let config = &request.config;
        let platform = required_str(config, "platform")?;
        let principal = self.principal(config, platform)?;

        let mut attributes = PlatformAttributes::new();
        for change in &request.changes {
            if let Some(remote) = self.tables.attributes.remote_name(&change.name) {
                let value = change
                    .new
                    .as_ref()
                    .and_then(AttributeValue::as_str)
                    .unwrap_or_default();
                tracing::debug!("Updating {}", remote);
                attributes.insert(remote.to_string(), value.to_string());
            }
        }

        // Credential and principal must be sent together; the stored
        // credential is only a fingerprint, so both come from config
        if request.changes.has_change("credential") {
            attributes.insert(
                PLATFORM_CREDENTIAL.to_string(),
                required_str(config, "credential")?.to_string(),
            );
            if self.requires_principal(platform)? {
                if let Some(principal) = principal {
                    attributes.insert(PLATFORM_PRINCIPAL.to_string(), principal.to_string());
                }
            }
        }

        if attributes.is_empty() {
            tracing::debug!("No remote attributes changed for {}", request.id);
        } else {
            self.client
                .sns()
                .set_platform_application_attributes(&request.id, &attributes)
                .await?;
        }

        Ok(UpdateResponse {
            observed: Attributes::new(),
        })
    }

    async fn delete(&self, _ctx: Context, request: DeleteRequest) -> Result<()> {
        tracing::debug!("SNS delete application: {}", request.id);

        match self
            .client
            .sns()
            .delete_platform_application(&request.id)
            .await
        {
            Ok(()) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
