//! State Store: last-known materialized state of every managed object
//!
//! The store is authoritative for "does this resource exist remotely"
//! between reconciliation passes. Writes happen only after a remote call has
//! definitively succeeded or failed.

use crate::error::{Result, TfcoreError};
use crate::types::{ResourceAddress, ResourceSpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, address: &ResourceAddress) -> Result<Option<ResourceSpec>>;

    async fn put(&self, address: &ResourceAddress, spec: ResourceSpec) -> Result<()>;

    /// Removing an absent entry is not an error
    async fn delete(&self, address: &ResourceAddress) -> Result<()>;

    async fn list(&self) -> Result<Vec<ResourceAddress>>;
}

/// Non-durable store for tests and dry runs
#[derive(Default)]
pub struct MemoryStateStore {
    resources: RwLock<BTreeMap<ResourceAddress, ResourceSpec>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, address: &ResourceAddress) -> Result<Option<ResourceSpec>> {
        Ok(self.resources.read().await.get(address).cloned())
    }

    async fn put(&self, address: &ResourceAddress, spec: ResourceSpec) -> Result<()> {
        self.resources.write().await.insert(address.clone(), spec);
        Ok(())
    }

    async fn delete(&self, address: &ResourceAddress) -> Result<()> {
        self.resources.write().await.remove(address);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ResourceAddress>> {
        Ok(self.resources.read().await.keys().cloned().collect())
    }
}

const STATE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    serial: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    resources: Vec<StoredResource>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredResource {
    name: String,
    #[serde(flatten)]
    spec: ResourceSpec,
}

struct Snapshot {
    serial: u64,
    resources: BTreeMap<ResourceAddress, ResourceSpec>,
}

/// Durable JSON snapshot on disk. Every write bumps `serial` and replaces
/// the file atomically (temp file + rename).
pub struct FileStateStore {
    path: PathBuf,
    snapshot: RwLock<Snapshot>,
}

impl FileStateStore {
    /// Open an existing state file, or start empty if it does not exist yet
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let snapshot = match tokio::fs::read(&path).await {
            Ok(data) => {
                let file: StateFile = serde_json::from_slice(&data)?;
                if file.version != STATE_FORMAT_VERSION {
                    return Err(TfcoreError::State(format!(
                        "unsupported state format version {} in {}",
                        file.version,
                        path.display()
                    )));
                }
                let resources = file
                    .resources
                    .into_iter()
                    .map(|r| {
                        (
                            ResourceAddress::new(r.spec.type_name.clone(), r.name),
                            r.spec,
                        )
                    })
                    .collect();
                Snapshot {
                    serial: file.serial,
                    resources,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot {
                serial: 0,
                resources: BTreeMap::new(),
            },
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            "Opened state {} (serial {}, {} resources)",
            path.display(),
            snapshot.serial,
            snapshot.resources.len()
        );

        Ok(Self {
            path,
            snapshot: RwLock::new(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn serial(&self) -> u64 {
        self.snapshot.read().await.serial
    }

    async fn persist(&self, snapshot: &mut Snapshot) -> Result<()> {
        let serial = snapshot.serial + 1;

        let file = StateFile {
            version: STATE_FORMAT_VERSION,
            serial,
            updated_at: Some(Utc::now()),
            resources: snapshot
                .resources
                .iter()
                .map(|(address, spec)| StoredResource {
                    name: address.name.clone(),
                    spec: spec.clone(),
                })
                .collect(),
        };
        let data = serde_json::to_vec_pretty(&file)?;

        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        snapshot.serial = serial;

        tracing::debug!(
            "Wrote state {} (serial {})",
            self.path.display(),
            snapshot.serial
        );
        Ok(())
    }
}

/// `state.json` -> `state.json.tmp`, so files differing only by extension
/// never share a temp file
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, address: &ResourceAddress) -> Result<Option<ResourceSpec>> {
        Ok(self.snapshot.read().await.resources.get(address).cloned())
    }

    async fn put(&self, address: &ResourceAddress, spec: ResourceSpec) -> Result<()> {
        let mut snapshot = self.snapshot.write().await;
        let previous = snapshot.resources.insert(address.clone(), spec);
        if let Err(e) = self.persist(&mut snapshot).await {
            // Keep memory consistent with what is on disk
            match previous {
                Some(previous) => snapshot.resources.insert(address.clone(), previous),
                None => snapshot.resources.remove(address),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete(&self, address: &ResourceAddress) -> Result<()> {
        let mut snapshot = self.snapshot.write().await;
        let Some(previous) = snapshot.resources.remove(address) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&mut snapshot).await {
            snapshot.resources.insert(address.clone(), previous);
            return Err(e);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ResourceAddress>> {
        Ok(self.snapshot.read().await.resources.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: &str) -> ResourceSpec {
        ResourceSpec::new("aws_sns_application")
            .with_id(id)
            .with_attribute("name", "app1")
    }

    #[tokio::test]
    async fn memory_store_round_trips_entries() {
        let store = MemoryStateStore::new();
        let address = ResourceAddress::new("aws_sns_application", "app1");

        assert!(store.get(&address).await.unwrap().is_none());

        store.put(&address, app("arn:1")).await.unwrap();
        assert_eq!(
            store.get(&address).await.unwrap().unwrap().id.as_deref(),
            Some("arn:1")
        );
        assert_eq!(store.list().await.unwrap(), vec![address.clone()]);

        store.delete(&address).await.unwrap();
        assert!(store.get(&address).await.unwrap().is_none());
        // Deleting again is fine
        store.delete(&address).await.unwrap();
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let address = ResourceAddress::new("aws_sns_application", "app1");

        {
            let store = FileStateStore::open(&path).await.unwrap();
            assert_eq!(store.serial().await, 0);
            store.put(&address, app("arn:1")).await.unwrap();
            assert_eq!(store.serial().await, 1);
        }

        let store = FileStateStore::open(&path).await.unwrap();
        assert_eq!(store.serial().await, 1);
        let spec = store.get(&address).await.unwrap().unwrap();
        assert_eq!(spec.id.as_deref(), Some("arn:1"));
        assert_eq!(spec.get_str("name"), Some("app1"));

        store.delete(&address).await.unwrap();
        assert_eq!(store.serial().await, 2);
        assert!(store.list().await.unwrap().is_empty());
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn sibling_state_files_keep_separate_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("state.json");
        let yaml = dir.path().join("state.yaml");

        assert_eq!(temp_path(&json), dir.path().join("state.json.tmp"));
        assert_ne!(temp_path(&json), temp_path(&yaml));

        let address = ResourceAddress::new("aws_sns_application", "app1");
        let a = FileStateStore::open(&json).await.unwrap();
        let b = FileStateStore::open(&yaml).await.unwrap();
        let (ra, rb) = tokio::join!(a.put(&address, app("arn:a")), b.put(&address, app("arn:b")));
        ra.unwrap();
        rb.unwrap();

        let reopened = FileStateStore::open(&yaml).await.unwrap();
        assert_eq!(
            reopened.get(&address).await.unwrap().unwrap().id.as_deref(),
            Some("arn:b")
        );
    }

    #[tokio::test]
    async fn deleting_absent_entry_does_not_bump_serial() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(dir.path().join("state.json"))
            .await
            .unwrap();

        store
            .delete(&ResourceAddress::new("aws_vpc_endpoint", "gone"))
            .await
            .unwrap();
        assert_eq!(store.serial().await, 0);
    }

    #[tokio::test]
    async fn unknown_format_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, br#"{"version":99,"serial":3,"resources":[]}"#)
            .await
            .unwrap();

        assert!(matches!(
            FileStateStore::open(&path).await,
            Err(TfcoreError::State(_))
        ));
    }
}
