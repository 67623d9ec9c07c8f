//! Reconciler: drives each resource through its CRUD lifecycle
//!
//! Per resource:
//!
//! ```text
//! Absent -> Creating -> Present -> Updating -> Present
//! Present -> Deleting -> Absent
//! Present -> Replacing (delete old, create new) -> Present
//! ```
//!
//! State is written only after a remote call has definitively returned.
//! A failed Create leaves nothing behind; a failed Delete keeps the stored
//! entry; a Create failing after the Delete half of a replacement leaves the
//! resource Absent.

use crate::config::EngineConfig;
use crate::context::Context;
use crate::diff::{diff, ChangeSet};
use crate::driver::{CreateRequest, DeleteRequest, ReadRequest, ResourceDriver, UpdateRequest};
use crate::error::{Result, TfcoreError};
use crate::fingerprint;
use crate::lock::LockTable;
use crate::registry::DriverRegistry;
use crate::retry::call_remote;
use crate::schema::Schema;
use crate::state::StateStore;
use crate::types::{AttributeValue, Attributes, DesiredConfig, ResourceAddress, ResourceSpec};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Lifecycle states of a single resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
    Replacing,
}

/// What a pass is going to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NoOp,
    Create,
    Update,
    Replace,
    Delete,
}

/// What a pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Created,
    Updated,
    Replaced,
    Deleted,
}

/// Dry-run result for one resource
#[derive(Debug, Clone)]
pub struct Plan {
    pub address: ResourceAddress,
    pub action: Action,
    pub changes: ChangeSet,
}

#[derive(Debug, Clone)]
pub struct ReconcileResult {
    pub address: ResourceAddress,
    /// None once the resource is gone
    pub id: Option<String>,
    pub attributes: Attributes,
    pub outcome: Outcome,
    /// Non-fatal problems, e.g. a failed read-after-write
    pub warnings: Vec<String>,
}

/// One entry per address touched by [`Reconciler::apply`]
#[derive(Debug)]
pub struct ReconcileReport {
    pub address: ResourceAddress,
    pub result: Result<ReconcileResult>,
}

enum Step {
    /// Nothing declared, nothing stored
    Nothing,
    /// Stored entry without an identifier and no longer declared
    Forget,
    Create {
        config: Attributes,
    },
    Keep {
        config: Attributes,
        stored: ResourceSpec,
        id: String,
    },
    Update {
        config: Attributes,
        stored: ResourceSpec,
        id: String,
        changes: ChangeSet,
    },
    Replace {
        config: Attributes,
        id: String,
        changes: ChangeSet,
    },
    Delete {
        id: String,
    },
}

impl Step {
    /// Prepared configuration the pass will send, if any
    fn config(&self) -> Option<&Attributes> {
        match self {
            Step::Create { config }
            | Step::Keep { config, .. }
            | Step::Update { config, .. }
            | Step::Replace { config, .. } => Some(config),
            Step::Nothing | Step::Forget | Step::Delete { .. } => None,
        }
    }

    fn action(&self) -> Action {
        match self {
            Step::Nothing | Step::Keep { .. } => Action::NoOp,
            Step::Forget | Step::Delete { .. } => Action::Delete,
            Step::Create { .. } => Action::Create,
            Step::Update { .. } => Action::Update,
            Step::Replace { .. } => Action::Replace,
        }
    }
}

pub struct Reconciler {
    registry: DriverRegistry,
    store: Arc<dyn StateStore>,
    config: EngineConfig,
    locks: LockTable,
}

impl Reconciler {
    pub fn new(registry: DriverRegistry, store: Arc<dyn StateStore>, config: EngineConfig) -> Self {
        Self {
            registry,
            store,
            config,
            locks: LockTable::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Compute what a pass would do without calling the remote system
    pub async fn plan(
        &self,
        address: &ResourceAddress,
        desired: Option<&Attributes>,
    ) -> Result<Plan> {
        let driver = self.registry.get(&address.type_name)?;
        let stored = self.store.get(address).await?;
        let step = checked_step(driver.as_ref(), desired, stored)?;

        let changes = match &step {
            Step::Create { config } => diff(driver.schema(), config, None)?,
            Step::Update { changes, .. } | Step::Replace { changes, .. } => changes.clone(),
            _ => ChangeSet::new(),
        };

        Ok(Plan {
            address: address.clone(),
            action: step.action(),
            changes,
        })
    }

    /// Run one reconciliation pass for a single resource. `desired = None`
    /// means the resource is no longer declared.
    pub async fn reconcile(
        &self,
        ctx: &Context,
        address: &ResourceAddress,
        desired: Option<Attributes>,
    ) -> Result<ReconcileResult> {
        let driver = self.registry.get(&address.type_name)?;
        let _lock = self.locks.acquire(address).await;

        let stored = self.store.get(address).await?;
        let step = checked_step(driver.as_ref(), desired.as_ref(), stored)?;

        match step {
            Step::Nothing => Ok(ReconcileResult {
                address: address.clone(),
                id: None,
                attributes: Attributes::new(),
                outcome: Outcome::Unchanged,
                warnings: vec![],
            }),
            Step::Forget => {
                self.store.delete(address).await?;
                Ok(ReconcileResult {
                    address: address.clone(),
                    id: None,
                    attributes: Attributes::new(),
                    outcome: Outcome::Deleted,
                    warnings: vec![],
                })
            }
            Step::Create { config } => {
                self.create(ctx, driver.as_ref(), address, config, Outcome::Created)
                    .await
            }
            Step::Keep { config, stored, id } => {
                self.keep(ctx, driver.as_ref(), address, config, stored, id)
                    .await
            }
            Step::Update {
                config,
                stored,
                id,
                changes,
            } => {
                self.update(ctx, driver.as_ref(), address, config, stored, id, changes)
                    .await
            }
            Step::Replace {
                config,
                id,
                changes,
            } => {
                tracing::info!(
                    "{}: replacing because of {:?}",
                    address,
                    changes.replacement_reasons()
                );
                transition(address, Lifecycle::Present, Lifecycle::Replacing);
                self.delete(ctx, driver.as_ref(), address, &id).await?;
                self.create(ctx, driver.as_ref(), address, config, Outcome::Replaced)
                    .await
            }
            Step::Delete { id } => {
                self.delete(ctx, driver.as_ref(), address, &id).await?;
                Ok(ReconcileResult {
                    address: address.clone(),
                    id: None,
                    attributes: Attributes::new(),
                    outcome: Outcome::Deleted,
                    warnings: vec![],
                })
            }
        }
    }

    /// Drift detection: read the remote object and fold what it reports into
    /// the stored snapshot. A vanished object removes the stale entry.
    pub async fn refresh(
        &self,
        ctx: &Context,
        address: &ResourceAddress,
    ) -> Result<Option<ResourceSpec>> {
        let driver = self.registry.get(&address.type_name)?;
        let _lock = self.locks.acquire(address).await;

        let Some(stored) = self.store.get(address).await? else {
            return Ok(None);
        };
        let Some(id) = stored.id.clone() else {
            return Ok(Some(stored));
        };

        match self
            .remote(ctx, address, "read", || {
                driver.read(ctx.clone(), ReadRequest { id: id.clone() })
            })
            .await
        {
            Ok(response) => {
                let refreshed = merge_observed(driver.schema(), stored.clone(), &response.observed);
                if refreshed != stored {
                    tracing::info!("{}: drift detected, refreshing stored state", address);
                    self.store.put(address, refreshed.clone()).await?;
                }
                Ok(Some(refreshed))
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!("{}: {} no longer exists remotely", address, id);
                self.store.delete(address).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Reconcile every declared resource, and delete every stored resource
    /// that is no longer declared. Distinct resources run concurrently up to
    /// the configured parallelism. Schema errors abort before any remote call.
    pub async fn apply(
        self: &Arc<Self>,
        ctx: &Context,
        desired: &DesiredConfig,
    ) -> Result<Vec<ReconcileReport>> {
        for address in desired.addresses() {
            let driver = self.registry.get(&address.type_name)?;
            if let Some(attrs) = desired.get(&address) {
                let checked =
                    prepare(driver.schema(), attrs).and_then(|config| driver.validate(&config));
                if let Err(e @ TfcoreError::Schema(_)) = checked {
                    return Err(e);
                }
            }
        }

        let mut addresses: BTreeSet<ResourceAddress> = desired.addresses().collect();
        addresses.extend(self.store.list().await?);

        tracing::info!(
            "Reconciling {} resource(s) with parallelism {}",
            addresses.len(),
            self.config.parallelism
        );

        let semaphore = Arc::new(Semaphore::new(self.config.parallelism));
        let mut handles = Vec::with_capacity(addresses.len());

        for address in addresses {
            let reconciler = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let ctx = ctx.clone();
            let attrs = desired.get(&address).cloned();
            let task_address = address.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| TfcoreError::Internal(e.to_string()))?;
                reconciler.reconcile(&ctx, &task_address, attrs).await
            });
            handles.push((address, handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (address, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(TfcoreError::Internal(format!(
                    "reconciliation task failed: {}",
                    e
                ))),
            };
            if let Err(e) = &result {
                tracing::error!("{}: {}", address, e);
            }
            reports.push(ReconcileReport { address, result });
        }

        Ok(reports)
    }

    async fn create(
        &self,
        ctx: &Context,
        driver: &dyn ResourceDriver,
        address: &ResourceAddress,
        config: Attributes,
        outcome: Outcome,
    ) -> Result<ReconcileResult> {
        transition(address, Lifecycle::Absent, Lifecycle::Creating);

        let created = match self
            .remote(ctx, address, "create", || {
                driver.create(
                    ctx.clone(),
                    CreateRequest {
                        desired: config.clone(),
                    },
                )
            })
            .await
        {
            Ok(created) => created,
            Err(e) => {
                transition(address, Lifecycle::Creating, Lifecycle::Absent);
                return Err(e);
            }
        };

        let mut warnings = vec![];
        let observed = self
            .observe(ctx, driver, address, &created.id, created.observed, &mut warnings)
            .await;

        let spec = materialize(driver.schema(), created.id, &config, &observed, None);
        self.store.put(address, spec.clone()).await?;
        transition(address, Lifecycle::Creating, Lifecycle::Present);

        Ok(ReconcileResult {
            address: address.clone(),
            id: spec.id,
            attributes: spec.attributes,
            outcome,
            warnings,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn update(
        &self,
        ctx: &Context,
        driver: &dyn ResourceDriver,
        address: &ResourceAddress,
        config: Attributes,
        stored: ResourceSpec,
        id: String,
        changes: ChangeSet,
    ) -> Result<ReconcileResult> {
        transition(address, Lifecycle::Present, Lifecycle::Updating);
        let changes = changes.updatable();

        let updated = match self
            .remote(ctx, address, "update", || {
                driver.update(
                    ctx.clone(),
                    UpdateRequest {
                        id: id.clone(),
                        changes: changes.clone(),
                        config: config.clone(),
                    },
                )
            })
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                transition(address, Lifecycle::Updating, Lifecycle::Present);
                return Err(e);
            }
        };

        let mut warnings = vec![];
        let observed = self
            .observe(ctx, driver, address, &id, updated.observed, &mut warnings)
            .await;

        let spec = materialize(driver.schema(), id, &config, &observed, Some(&stored.attributes));
        self.store.put(address, spec.clone()).await?;
        transition(address, Lifecycle::Updating, Lifecycle::Present);

        Ok(ReconcileResult {
            address: address.clone(),
            id: spec.id,
            attributes: spec.attributes,
            outcome: Outcome::Updated,
            warnings,
        })
    }

    async fn keep(
        &self,
        ctx: &Context,
        driver: &dyn ResourceDriver,
        address: &ResourceAddress,
        config: Attributes,
        stored: ResourceSpec,
        id: String,
    ) -> Result<ReconcileResult> {
        let mut warnings = vec![];
        let mut spec = stored;

        if self.config.refresh_on_noop {
            match self
                .remote(ctx, address, "read", || {
                    driver.read(ctx.clone(), ReadRequest { id: id.clone() })
                })
                .await
            {
                Ok(response) => {
                    let refreshed = merge_computed(driver.schema(), spec.clone(), &response.observed);
                    if refreshed != spec {
                        self.store.put(address, refreshed.clone()).await?;
                        spec = refreshed;
                    }
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!("{}: {} vanished remotely, recreating", address, id);
                    self.store.delete(address).await?;
                    transition(address, Lifecycle::Present, Lifecycle::Absent);
                    return self
                        .create(ctx, driver, address, config, Outcome::Created)
                        .await;
                }
                Err(e) => {
                    tracing::warn!("{}: refresh failed: {}", address, e);
                    warnings.push(format!("refresh failed: {}", e));
                }
            }
        }

        Ok(ReconcileResult {
            address: address.clone(),
            id: spec.id,
            attributes: spec.attributes,
            outcome: Outcome::Unchanged,
            warnings,
        })
    }

    async fn delete(
        &self,
        ctx: &Context,
        driver: &dyn ResourceDriver,
        address: &ResourceAddress,
        id: &str,
    ) -> Result<()> {
        transition(address, Lifecycle::Present, Lifecycle::Deleting);

        let result = self
            .remote(ctx, address, "delete", || {
                driver.delete(ctx.clone(), DeleteRequest { id: id.to_string() })
            })
            .await;

        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!("{}: {} already absent", address, id);
            }
            Err(e) => {
                transition(address, Lifecycle::Deleting, Lifecycle::Present);
                return Err(e);
            }
        }

        self.store.delete(address).await?;
        transition(address, Lifecycle::Deleting, Lifecycle::Absent);
        Ok(())
    }

    /// Read-after-write. A failed read is a warning, never a failure: the
    /// write already happened and its identifier must be persisted.
    async fn observe(
        &self,
        ctx: &Context,
        driver: &dyn ResourceDriver,
        address: &ResourceAddress,
        id: &str,
        mut observed: Attributes,
        warnings: &mut Vec<String>,
    ) -> Attributes {
        if !self.config.read_after_write {
            return observed;
        }

        match self
            .remote(ctx, address, "read", || {
                driver.read(ctx.clone(), ReadRequest { id: id.to_string() })
            })
            .await
        {
            Ok(response) => {
                observed.extend(response.observed);
            }
            Err(e) => {
                tracing::warn!("{}: read after write failed: {}", address, e);
                warnings.push(format!("read after write failed: {}", e));
            }
        }
        observed
    }

    async fn remote<T, F, Fut>(
        &self,
        ctx: &Context,
        address: &ResourceAddress,
        operation: &str,
        call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = ctx.call_timeout().unwrap_or(self.config.call_timeout);
        let label = format!("{} {}", operation, address);
        tracing::debug!("{}", label);
        call_remote(ctx, &self.config.retry, timeout, &label, call).await
    }
}

fn transition(address: &ResourceAddress, from: Lifecycle, to: Lifecycle) {
    tracing::info!("{}: {:?} -> {:?}", address, from, to);
}

/// Defaults, validation, and pending markers stripped: what drivers receive
fn prepare(schema: &Schema, desired: &Attributes) -> Result<Attributes> {
    let mut config = desired.clone();
    schema.apply_defaults(&mut config);
    schema.validate_config(&config)?;
    config.retain(|_, v| !v.is_computed());
    Ok(config)
}

/// [`decide`] plus the driver's own preconditions on whatever will be sent
fn checked_step(
    driver: &dyn ResourceDriver,
    desired: Option<&Attributes>,
    stored: Option<ResourceSpec>,
) -> Result<Step> {
    let step = decide(driver.schema(), desired, stored)?;
    if let Some(config) = step.config() {
        driver.validate(config)?;
    }
    Ok(step)
}

fn decide(
    schema: &Schema,
    desired: Option<&Attributes>,
    stored: Option<ResourceSpec>,
) -> Result<Step> {
    let stored = stored.map(|s| {
        let id = s.id.clone();
        (s, id)
    });

    match (desired, stored) {
        (None, None) => Ok(Step::Nothing),
        (None, Some((_, None))) => Ok(Step::Forget),
        (None, Some((_, Some(id)))) => Ok(Step::Delete { id }),
        (Some(desired), stored) => {
            let config = prepare(schema, desired)?;
            let Some((stored, Some(id))) = stored else {
                diff(schema, &config, None)?;
                return Ok(Step::Create { config });
            };

            check_sealed(schema, &stored)?;
            let changes = diff(schema, &config, Some(&stored))?;
            if changes.is_empty() {
                Ok(Step::Keep { config, stored, id })
            } else if changes.requires_replace() {
                Ok(Step::Replace {
                    config,
                    id,
                    changes,
                })
            } else {
                Ok(Step::Update {
                    config,
                    stored,
                    id,
                    changes,
                })
            }
        }
    }
}

/// Sensitive values in the store must be fingerprints; anything else means
/// the snapshot was written by hand or by another tool
fn check_sealed(schema: &Schema, stored: &ResourceSpec) -> Result<()> {
    for attr in schema.attributes.iter().filter(|a| a.sensitive) {
        let sealed = match stored.get(&attr.name) {
            Some(AttributeValue::String(s)) => fingerprint::is_fingerprint(s),
            Some(AttributeValue::List(items)) => {
                items.iter().all(|s| fingerprint::is_fingerprint(s))
            }
            _ => true,
        };
        if !sealed {
            return Err(TfcoreError::State(format!(
                "stored value of sensitive attribute '{}' is not a fingerprint",
                attr.name
            )));
        }
    }
    Ok(())
}

/// Build the snapshot persisted after a successful write. Configured values
/// win; computed values come from the remote (or the previous snapshot);
/// sensitive values are fingerprinted.
fn materialize(
    schema: &Schema,
    id: String,
    config: &Attributes,
    observed: &Attributes,
    previous: Option<&Attributes>,
) -> ResourceSpec {
    let mut attributes = Attributes::new();

    for attr in &schema.attributes {
        let remote = || {
            observed
                .get(&attr.name)
                .or_else(|| previous.and_then(|p| p.get(&attr.name)))
                .cloned()
        };

        let value = if attr.sensitive {
            config.get(&attr.name).map(fingerprint::seal)
        } else if attr.is_computed_only() {
            remote()
        } else if let Some(value) = config.get(&attr.name) {
            Some(value.clone())
        } else if attr.computed {
            remote()
        } else {
            None
        };

        if let Some(value) = value.filter(|v| !v.is_computed()) {
            attributes.insert(attr.name.clone(), value);
        }
    }

    ResourceSpec {
        type_name: schema.type_name.clone(),
        id: Some(id),
        attributes,
        mutability: schema.mutability(),
    }
}

/// Fold every reported non-sensitive value into the snapshot
fn merge_observed(schema: &Schema, mut spec: ResourceSpec, observed: &Attributes) -> ResourceSpec {
    for attr in schema.attributes.iter().filter(|a| !a.sensitive) {
        if let Some(value) = observed.get(&attr.name).filter(|v| !v.is_computed()) {
            spec.attributes.insert(attr.name.clone(), value.clone());
        }
    }
    spec
}

/// Fold only computed values into the snapshot
fn merge_computed(schema: &Schema, mut spec: ResourceSpec, observed: &Attributes) -> ResourceSpec {
    for attr in schema.attributes.iter().filter(|a| a.computed && !a.sensitive) {
        if let Some(value) = observed.get(&attr.name).filter(|v| !v.is_computed()) {
            spec.attributes.insert(attr.name.clone(), value.clone());
        }
    }
    spec
}
