//! Resource driver trait and its request/response types
//!
//! One driver per managed-object type. The reconciler owns ordering,
//! retries, timeouts and persistence; drivers only translate between
//! attributes and the remote API.

use crate::context::Context;
use crate::diff::ChangeSet;
use crate::error::Result;
use crate::schema::Schema;
use crate::types::Attributes;
use async_trait::async_trait;

/// CRUD operations for one resource type
/// Type name should be constant and match the key used in the registry
#[async_trait]
pub trait ResourceDriver: Send + Sync {
    /// Type name should be constant (e.g., "aws_sns_application")
    fn type_name(&self) -> &str;

    /// Schema for this type - build it once and cache it in the driver
    fn schema(&self) -> &Schema;

    /// Cross-field preconditions the schema cannot express. Runs on the
    /// prepared configuration before any remote call of a pass, including
    /// the delete half of a replacement.
    fn validate(&self, _config: &Attributes) -> Result<()> {
        Ok(())
    }

    /// Called exactly once per resource lifetime; assigns the identifier
    async fn create(&self, ctx: Context, request: CreateRequest) -> Result<CreateResponse>;

    /// Returns `TfcoreError::NotFound` if the remote object no longer exists
    async fn read(&self, ctx: Context, request: ReadRequest) -> Result<ReadResponse>;

    /// Applies exactly the fields in `request.changes`; never sees ForceNew changes
    async fn update(&self, ctx: Context, request: UpdateRequest) -> Result<UpdateResponse>;

    /// Deleting an identifier that is already gone is success
    async fn delete(&self, ctx: Context, request: DeleteRequest) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Desired attributes with defaults applied and computed markers removed
    pub desired: Attributes,
}

#[derive(Debug, Clone)]
pub struct CreateResponse {
    pub id: String,
    /// Whatever the create call reported back; may be partial
    pub observed: Attributes,
}

#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ReadResponse {
    pub observed: Attributes,
}

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub id: String,
    /// Non-ForceNew changes only
    pub changes: ChangeSet,
    /// Full desired configuration, for cross-field rules
    pub config: Attributes,
}

#[derive(Debug, Clone)]
pub struct UpdateResponse {
    pub observed: Attributes,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub id: String,
}
