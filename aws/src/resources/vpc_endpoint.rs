//! VPC endpoint driver

use crate::api::ec2::{CreateVpcEndpointRequest, ModifyVpcEndpointRequest, VpcEndpoint};
use crate::api::{ApiError, Client};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tfcore::driver::{
    CreateRequest, CreateResponse, DeleteRequest, ReadRequest, ReadResponse, ResourceDriver,
    UpdateRequest, UpdateResponse,
};
use tfcore::validator::{JsonDocumentValidator, StringPatternValidator};
use tfcore::{
    AttributeBuilder, AttributeValue, Attributes, Context, Result, Schema, SchemaBuilder,
    TfcoreError,
};

pub const TYPE_NAME: &str = "aws_vpc_endpoint";

pub struct VpcEndpointDriver {
    client: Client,
    schema: Schema,
}

impl VpcEndpointDriver {
    pub fn new(client: Client) -> Result<Self> {
        Ok(Self {
            client,
            schema: Self::schema_static()?,
        })
    }

    pub fn schema_static() -> Result<Schema> {
        Ok(SchemaBuilder::new(TYPE_NAME)
            .version(0)
            .description("Manages a VPC endpoint")
            .attribute(
                AttributeBuilder::string("vpc_id")
                    .description("VPC the endpoint lives in")
                    .required()
                    .force_new()
                    .validator(StringPatternValidator::new(
                        r"^vpc-[0-9a-f]+$",
                        "a VPC id (vpc-xxxxxxxx)",
                    )?)
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("service_name")
                    .description("Service the endpoint connects to (e.g., com.amazonaws.us-east-1.s3)")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::list("route_tables")
                    .description("Route tables associated with the endpoint")
                    .optional()
                    .computed()
                    .order_insensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("policy_document")
                    .description("Access policy as a JSON document")
                    .optional()
                    .computed()
                    .validator(JsonDocumentValidator)
                    .build(),
            )
            .attribute(
                AttributeBuilder::string("state")
                    .description("pending | available | deleting | deleted")
                    .computed()
                    .build(),
            )
            .build())
    }
}

fn config_str<'a>(config: &'a Attributes, name: &str) -> Result<&'a str> {
    config
        .get(name)
        .and_then(AttributeValue::as_str)
        .ok_or_else(|| TfcoreError::validation_at(name, "required attribute is missing"))
}

fn endpoint_attributes(endpoint: VpcEndpoint) -> Attributes {
    let mut observed = Attributes::new();
    observed.insert("vpc_id".to_string(), endpoint.vpc_id.into());
    observed.insert("service_name".to_string(), endpoint.service_name.into());
    observed.insert(
        "route_tables".to_string(),
        endpoint.route_table_ids.unwrap_or_default().into(),
    );
    if let Some(policy) = endpoint.policy_document {
        observed.insert("policy_document".to_string(), policy.into());
    }
    if let Some(state) = endpoint.state {
        observed.insert("state".to_string(), state.into());
    }
    observed
}

/// Route tables to attach and detach to go from `old` to `new`
fn route_table_delta(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let old: BTreeSet<&String> = old.iter().collect();
    let new: BTreeSet<&String> = new.iter().collect();
    (
        new.difference(&old).map(|s| s.to_string()).collect(),
        old.difference(&new).map(|s| s.to_string()).collect(),
    )
}

#[async_trait]
impl ResourceDriver for VpcEndpointDriver {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn create(&self, _ctx: Context, request: CreateRequest) -> Result<CreateResponse> {
        let config = &request.desired;
        let create = CreateVpcEndpointRequest {
            vpc_id: config_str(config, "vpc_id")?.to_string(),
            service_name: config_str(config, "service_name")?.to_string(),
            route_table_ids: config
                .get("route_tables")
                .and_then(AttributeValue::as_list)
                .map(<[String]>::to_vec),
            policy_document: config
                .get("policy_document")
                .and_then(AttributeValue::as_str)
                .map(str::to_string),
        };

        tracing::debug!("VPC endpoint create config: {:?}", create);

        let endpoint = self.client.ec2().create_vpc_endpoint(&create).await?;
        let id = endpoint.vpc_endpoint_id.clone();
        tracing::info!("Created VPC endpoint {}", id);

        Ok(CreateResponse {
            id,
            observed: endpoint_attributes(endpoint),
        })
    }

    async fn read(&self, _ctx: Context, request: ReadRequest) -> Result<ReadResponse> {
        let endpoint = self.client.ec2().describe_vpc_endpoint(&request.id).await?;

        // A deleted endpoint lingers in describe output for a while
        if endpoint.state.as_deref() == Some("deleted") {
            return Err(TfcoreError::NotFound(request.id));
        }

        Ok(ReadResponse {
            observed: endpoint_attributes(endpoint),
        })
    }

    async fn update(&self, _ctx: Context, request: UpdateRequest) -> Result<UpdateResponse> {
        let mut modify = ModifyVpcEndpointRequest::default();

        if let Some(change) = request.changes.get("route_tables") {
            let old = change
                .old
                .as_ref()
                .and_then(AttributeValue::as_list)
                .unwrap_or_default();
            let new = change
                .new
                .as_ref()
                .and_then(AttributeValue::as_list)
                .unwrap_or_default();
            let (add, remove) = route_table_delta(old, new);
            modify.add_route_table_ids = add;
            modify.remove_route_table_ids = remove;
        }

        if let Some(change) = request.changes.get("policy_document") {
            match change.new.as_ref().and_then(AttributeValue::as_str) {
                Some(policy) => modify.policy_document = Some(policy.to_string()),
                None => modify.reset_policy = true,
            }
        }

        if modify.is_empty() {
            tracing::debug!("No remote changes for VPC endpoint {}", request.id);
        } else {
            tracing::debug!("VPC endpoint {} modify: {:?}", request.id, modify);
            self.client
                .ec2()
                .modify_vpc_endpoint(&request.id, &modify)
                .await?;
        }

        Ok(UpdateResponse {
            observed: Attributes::new(),
        })
    }

    async fn delete(&self, _ctx: Context, request: DeleteRequest) -> Result<()> {
        match self.client.ec2().delete_vpc_endpoint(&request.id).await {
            Ok(()) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
