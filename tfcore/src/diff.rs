//! Diff engine: desired configuration against the stored snapshot
//!
//! The stored side is always the State Store snapshot, never a live read.
//! Sensitive attributes are stored as fingerprints, so the desired value is
//! fingerprinted before comparison; the change entry still carries the
//! plaintext as `new` because the driver has to send it.

use crate::error::{Result, TfcoreError};
use crate::fingerprint;
use crate::schema::{Attribute, Schema};
use crate::types::{AttributeValue, Attributes, ResourceSpec};
use std::collections::BTreeSet;

/// One attribute-level difference
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub name: String,
    pub old: Option<AttributeValue>,
    pub new: Option<AttributeValue>,
    pub forces_replacement: bool,
}

/// Ordered attribute changes for one resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Change> {
        self.changes.iter().find(|c| c.name == name)
    }

    pub fn has_change(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn requires_replace(&self) -> bool {
        self.changes.iter().any(|c| c.forces_replacement)
    }

    /// Names of the changes that force replacement
    pub fn replacement_reasons(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.forces_replacement)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// The subset that may be sent in an in-place Update
    pub fn updatable(&self) -> ChangeSet {
        ChangeSet {
            changes: self
                .changes
                .iter()
                .filter(|c| !c.forces_replacement)
                .cloned()
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Compare desired attributes (defaults already applied) with the stored
/// snapshot. `stored = None` means no prior state, so every configured value
/// is an addition and nothing forces replacement.
pub fn diff(schema: &Schema, desired: &Attributes, stored: Option<&ResourceSpec>) -> Result<ChangeSet> {
    if stored.is_none() {
        if let Some(missing) = schema
            .attributes
            .iter()
            .find(|a| a.required && a.force_new && !desired.contains_key(&a.name))
        {
            return Err(TfcoreError::validation_at(
                &missing.name,
                "required attribute is missing and cannot be changed after creation",
            ));
        }
    }

    let mut names: BTreeSet<&str> = desired.keys().map(String::as_str).collect();
    if let Some(stored) = stored {
        names.extend(stored.attributes.keys().map(String::as_str));
    }

    let mut changes = ChangeSet::new();
    // Schema order keeps the change-set stable across runs
    for attr in schema.attributes.iter().filter(|a| names.contains(a.name.as_str())) {
        if attr.is_computed_only() {
            continue;
        }

        let new = desired.get(&attr.name).filter(|v| !v.is_computed());
        let old = stored.and_then(|s| s.attributes.get(&attr.name));

        let Some(new) = new else {
            // Remote-chosen value when unset in configuration
            if attr.computed {
                continue;
            }
            if let Some(old) = old {
                changes.push(Change {
                    name: attr.name.clone(),
                    old: Some(old.clone()),
                    new: None,
                    forces_replacement: attr.force_new,
                });
            }
            continue;
        };

        if let Some(old) = old {
            if values_equal(attr, old, new) {
                continue;
            }
        }

        changes.push(Change {
            name: attr.name.clone(),
            old: old.cloned(),
            new: Some(new.clone()),
            forces_replacement: attr.force_new && stored.is_some(),
        });
    }

    tracing::debug!(
        "diff for {}: {} change(s), replace={}",
        schema.type_name,
        changes.len(),
        changes.requires_replace()
    );

    Ok(changes)
}

/// `stored` is what the State Store holds; `desired` is plaintext config
fn values_equal(attr: &Attribute, stored: &AttributeValue, desired: &AttributeValue) -> bool {
    let desired = if attr.sensitive {
        fingerprint::seal(desired)
    } else {
        desired.clone()
    };

    match (stored, &desired) {
        (AttributeValue::List(a), AttributeValue::List(b)) if attr.order_insensitive => {
            a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
        }
        (a, b) => a == b,
    }
}
