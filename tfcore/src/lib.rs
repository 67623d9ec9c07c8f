//! tfcore - declarative resource reconciliation engine
//!
//! Diffs desired configuration against persisted state and drives each
//! managed object through Create, Read, Update and Delete against a remote
//! control plane, one [`ResourceDriver`] per object type.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Engine modules
pub mod config;
pub mod diff;
pub mod driver;
pub mod lock;
pub mod reconciler;
pub mod registry;
pub mod retry;
pub mod state;

// Helper modules
pub mod fingerprint;
pub mod validator;

// Re-exports for convenience
pub use config::EngineConfig;
pub use context::Context;
pub use diff::{diff, Change, ChangeSet};
pub use driver::{
    CreateRequest, CreateResponse, DeleteRequest, ReadRequest, ReadResponse, ResourceDriver,
    UpdateRequest, UpdateResponse,
};
pub use error::{RemoteErrorClass, Result, TfcoreError};
pub use reconciler::{Action, Lifecycle, Outcome, Plan, ReconcileReport, ReconcileResult, Reconciler};
pub use registry::DriverRegistry;
pub use retry::{call_remote, RetryConfig};
pub use schema::{Attribute, AttributeBuilder, AttributeType, Schema, SchemaBuilder};
pub use state::{FileStateStore, MemoryStateStore, StateStore};
pub use types::{AttributeValue, Attributes, DesiredConfig, Mutability, ResourceAddress, ResourceSpec};
