//! Per-resource exclusive locks
//!
//! A pass holds its resource's lock from the first store read to the last
//! store write, so two passes for the same address never interleave.

use crate::types::ResourceAddress;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = Arc<Mutex<HashMap<ResourceAddress, Arc<AsyncMutex<()>>>>>;

/// Entries exist only while a pass holds or waits for the address
#[derive(Default)]
pub struct LockTable {
    locks: LockMap,
}

/// Held for the duration of one reconciliation pass
pub struct ResourceLock {
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockMap,
    address: ResourceAddress,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, address: &ResourceAddress) -> ResourceLock {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(address.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        ResourceLock {
            guard: Some(lock.lock_owned().await),
            locks: Arc::clone(&self.locks),
            address: address.clone(),
        }
    }

    /// Addresses currently held or waited on
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ResourceLock {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Only the table's own reference left: nobody holds or waits
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(&self.address)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_address_is_exclusive() {
        let table = Arc::new(LockTable::new());
        let address = ResourceAddress::new("aws_sns_application", "app1");

        let held = table.acquire(&address).await;

        let contender = {
            let table = table.clone();
            let address = address.clone();
            tokio::spawn(async move {
                let _lock = table.acquire(&address).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("lock should be released")
            .unwrap();
    }

    #[tokio::test]
    async fn released_entries_are_dropped() {
        let table = Arc::new(LockTable::new());
        let address = ResourceAddress::new("aws_vpc_endpoint", "s3");

        let held = table.acquire(&address).await;
        assert_eq!(table.len(), 1);

        let waiter = {
            let table = table.clone();
            let address = address.clone();
            tokio::spawn(async move {
                let _lock = table.acquire(&address).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The waiter still needs the entry
        drop(held);
        assert_eq!(table.len(), 1);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should get the lock")
            .unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn distinct_addresses_do_not_block() {
        let table = LockTable::new();
        let _a = table
            .acquire(&ResourceAddress::new("aws_sns_application", "a"))
            .await;

        tokio::time::timeout(
            Duration::from_secs(1),
            table.acquire(&ResourceAddress::new("aws_sns_application", "b")),
        )
        .await
        .expect("different address must not wait");
    }
}
