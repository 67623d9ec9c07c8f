//! Lookup tables for SNS platform applications
//!
//! Both tables are plain values handed to the driver at construction, so
//! tests and callers can swap them without touching process-wide state.

use std::collections::BTreeMap;

/// Platform name to "requires a principal"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTable {
    platforms: BTreeMap<String, bool>,
}

impl Default for PlatformTable {
    fn default() -> Self {
        Self::new([
            ("ADM", true),
            ("APNS", true),
            ("APNS_SANDBOX", true),
            ("GCM", false),
        ])
    }
}

impl PlatformTable {
    pub fn new<I, S>(platforms: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        Self {
            platforms: platforms
                .into_iter()
                .map(|(name, principal)| (name.into(), principal))
                .collect(),
        }
    }

    /// `None` for unsupported platforms
    pub fn requires_principal(&self, platform: &str) -> Option<bool> {
        self.platforms.get(platform).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }
}

/// Schema field name to remote attribute name, for the attributes that can
/// be changed in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMap {
    entries: BTreeMap<String, String>,
}

impl Default for AttributeMap {
    fn default() -> Self {
        Self::new([
            ("principal", "PlatformPrincipal"),
            ("created_topic", "EventEndpointCreated"),
            ("deleted_topic", "EventEndpointDeleted"),
            ("updated_topic", "EventEndpointUpdated"),
            ("failure_topic", "EventDeliveryFailure"),
            ("success_iam_role", "SuccessFeedbackRoleArn"),
            ("failure_iam_role", "FailureFeedbackRoleArn"),
            ("success_sample_rate", "SuccessFeedbackSampleRate"),
        ])
    }
}

impl AttributeMap {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(field, remote)| (field.into(), remote.into()))
                .collect(),
        }
    }

    pub fn remote_name(&self, field: &str) -> Option<&str> {
        self.entries.get(field).map(String::as_str)
    }

    /// (field, remote name) pairs in field order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(field, remote)| (field.as_str(), remote.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnsTables {
    pub platforms: PlatformTable,
    pub attributes: AttributeMap,
}
