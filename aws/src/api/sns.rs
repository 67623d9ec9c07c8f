//! SNS platform application API

use super::error::ApiError;
use super::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Platform application attributes keyed by their remote name
/// (`PlatformCredential`, `EventEndpointCreated`, ...)
pub type PlatformAttributes = BTreeMap<String, String>;

/// Request body for POST /sns/platform-applications
#[derive(Debug, Serialize)]
pub struct CreatePlatformApplicationRequest {
    pub name: String,
    pub platform: String,
    pub attributes: PlatformAttributes,
}

#[derive(Debug, Deserialize)]
struct CreatePlatformApplicationResponse {
    platform_application_arn: String,
}

#[derive(Debug, Deserialize)]
struct GetPlatformApplicationResponse {
    #[serde(default)]
    attributes: PlatformAttributes,
}

#[derive(Debug, Serialize)]
struct SetPlatformApplicationAttributesRequest<'a> {
    attributes: &'a PlatformAttributes,
}

pub struct SnsApi<'a> {
    client: &'a Client,
}

impl<'a> SnsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(arn: &str) -> String {
        format!("/sns/platform-applications/{}", urlencoding::encode(arn))
    }

    /// Returns the platform application ARN
    pub async fn create_platform_application(
        &self,
        request: &CreatePlatformApplicationRequest,
    ) -> Result<String, ApiError> {
        let response: CreatePlatformApplicationResponse = self
            .client
            .post("/sns/platform-applications", request)
            .await?;
        Ok(response.platform_application_arn)
    }

    pub async fn get_platform_application_attributes(
        &self,
        arn: &str,
    ) -> Result<PlatformAttributes, ApiError> {
        let response: GetPlatformApplicationResponse = self.client.get(&Self::path(arn)).await?;
        Ok(response.attributes)
    }

    pub async fn set_platform_application_attributes(
        &self,
        arn: &str,
        attributes: &PlatformAttributes,
    ) -> Result<(), ApiError> {
        let path = format!("{}/attributes", Self::path(arn));
        let _: serde_json::Value = self
            .client
            .put(&path, &SetPlatformApplicationAttributesRequest { attributes })
            .await?;
        Ok(())
    }

    pub async fn delete_platform_application(&self, arn: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(arn)).await
    }
}
