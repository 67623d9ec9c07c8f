//! EC2 VPC endpoint API

use super::error::ApiError;
use super::Client;
use serde::{Deserialize, Serialize};

/// VPC endpoint as reported by the control plane
#[derive(Debug, Clone, Deserialize)]
pub struct VpcEndpoint {
    pub vpc_endpoint_id: String,
    pub vpc_id: String,
    pub service_name: String,
    /// pending | available | deleting | deleted
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub policy_document: Option<String>,
    #[serde(default)]
    pub route_table_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct CreateVpcEndpointRequest {
    pub vpc_id: String,
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_table_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_document: Option<String>,
}

/// Request body for PATCH /ec2/vpc-endpoints/{id}
#[derive(Debug, Default, Serialize)]
pub struct ModifyVpcEndpointRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_route_table_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove_route_table_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_document: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub reset_policy: bool,
}

impl ModifyVpcEndpointRequest {
    pub fn is_empty(&self) -> bool {
        self.add_route_table_ids.is_empty()
            && self.remove_route_table_ids.is_empty()
            && self.policy_document.is_none()
            && !self.reset_policy
    }
}

#[derive(Debug, Deserialize)]
struct VpcEndpointResponse {
    vpc_endpoint: VpcEndpoint,
}

pub struct Ec2Api<'a> {
    client: &'a Client,
}

impl<'a> Ec2Api<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn path(id: &str) -> String {
        format!("/ec2/vpc-endpoints/{}", urlencoding::encode(id))
    }

    pub async fn create_vpc_endpoint(
        &self,
        request: &CreateVpcEndpointRequest,
    ) -> Result<VpcEndpoint, ApiError> {
        let response: VpcEndpointResponse = self.client.post("/ec2/vpc-endpoints", request).await?;
        Ok(response.vpc_endpoint)
    }

    pub async fn describe_vpc_endpoint(&self, id: &str) -> Result<VpcEndpoint, ApiError> {
        let response: VpcEndpointResponse = self.client.get(&Self::path(id)).await?;
        Ok(response.vpc_endpoint)
    }

    pub async fn modify_vpc_endpoint(
        &self,
        id: &str,
        request: &ModifyVpcEndpointRequest,
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self.client.patch(&Self::path(id), request).await?;
        Ok(())
    }

    pub async fn delete_vpc_endpoint(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&Self::path(id)).await
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn describe_tolerates_missing_optional_fields() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/ec2/vpc-endpoints/vpce-1")
            .with_body(
                r#"{"vpc_endpoint":{"vpc_endpoint_id":"vpce-1","vpc_id":"vpc-1","service_name":"com.amazonaws.us-east-1.s3"}}"#,
            )
            .create_async()
            .await;

        let client = Client::new(&server.url(), "token").unwrap();
        let endpoint = client.ec2().describe_vpc_endpoint("vpce-1").await.unwrap();

        assert_eq!(endpoint.vpc_id, "vpc-1");
        assert!(endpoint.state.is_none());
        assert!(endpoint.route_table_ids.is_none());
    }

    #[tokio::test]
    async fn modify_omits_empty_fields() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PATCH", "/ec2/vpc-endpoints/vpce-1")
            .match_body(Matcher::Json(serde_json::json!({
                "add_route_table_ids": ["rtb-3"]
            })))
            .with_body(r#"{"return":true}"#)
            .create_async()
            .await;

        let client = Client::new(&server.url(), "token").unwrap();
        let request = ModifyVpcEndpointRequest {
            add_route_table_ids: vec!["rtb-3".to_string()],
            ..Default::default()
        };
        client
            .ec2()
            .modify_vpc_endpoint("vpce-1", &request)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[test]
    fn empty_modification_is_detected() {
        assert!(ModifyVpcEndpointRequest::default().is_empty());
        assert!(!ModifyVpcEndpointRequest {
            reset_policy: true,
            ..Default::default()
        }
        .is_empty());
    }
}
