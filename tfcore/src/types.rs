//! Core value and resource types
//!
//! Attribute values are narrow: strings, ordered string lists,
//! booleans, and a marker for values that only the remote system can supply.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const COMPUTED_MARKER: &str = "__computed__";

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    String(String),
    /// Ordered list of strings; the schema decides whether order matters
    List(Vec<String>),
    Bool(bool),
    /// Known only after the remote system reports it. Never sent in a request.
    Computed,
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttributeValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, AttributeValue::Computed)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "string",
            AttributeValue::List(_) => "list",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Computed => "computed",
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(l: Vec<String>) -> Self {
        AttributeValue::List(l)
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(l: Vec<&str>) -> Self {
        AttributeValue::List(l.into_iter().map(str::to_string).collect())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{:?}", s),
            AttributeValue::List(l) => write!(f, "{:?}", l),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Computed => f.write_str("(known after apply)"),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            AttributeValue::String(s) => serializer.serialize_str(s),
            AttributeValue::List(l) => l.serialize(serializer),
            AttributeValue::Bool(b) => serializer.serialize_bool(*b),
            AttributeValue::Computed => serializer.serialize_str(COMPUTED_MARKER),
        }
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct AttributeValueVisitor;

        impl<'de> Visitor<'de> for AttributeValueVisitor {
            type Value = AttributeValue;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string, a list of strings, or a boolean")
            }

            fn visit_bool<E>(self, value: bool) -> std::result::Result<AttributeValue, E>
            where
                E: de::Error,
            {
                Ok(AttributeValue::Bool(value))
            }

            fn visit_str<E>(self, value: &str) -> std::result::Result<AttributeValue, E>
            where
                E: de::Error,
            {
                if value == COMPUTED_MARKER {
                    Ok(AttributeValue::Computed)
                } else {
                    Ok(AttributeValue::String(value.to_string()))
                }
            }

            fn visit_string<E>(self, value: String) -> std::result::Result<AttributeValue, E>
            where
                E: de::Error,
            {
                if value == COMPUTED_MARKER {
                    Ok(AttributeValue::Computed)
                } else {
                    Ok(AttributeValue::String(value))
                }
            }

            // Numbers in configuration are accepted as their string form
            fn visit_i64<E>(self, value: i64) -> std::result::Result<AttributeValue, E>
            where
                E: de::Error,
            {
                Ok(AttributeValue::String(value.to_string()))
            }

            fn visit_u64<E>(self, value: u64) -> std::result::Result<AttributeValue, E>
            where
                E: de::Error,
            {
                Ok(AttributeValue::String(value.to_string()))
            }

            fn visit_f64<E>(self, value: f64) -> std::result::Result<AttributeValue, E>
            where
                E: de::Error,
            {
                Ok(AttributeValue::String(value.to_string()))
            }

            fn visit_seq<V>(self, mut seq: V) -> std::result::Result<AttributeValue, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<String>()? {
                    items.push(item);
                }
                Ok(AttributeValue::List(items))
            }
        }

        deserializer.deserialize_any(AttributeValueVisitor)
    }
}

/// Attribute name to value, iterated in name order
pub type Attributes = BTreeMap<String, AttributeValue>;

/// How a change to an attribute is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
    Updatable,
    ForceNew,
}

/// Last-known materialized state of one managed object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub type_name: String,
    /// Assigned by the remote system on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub mutability: BTreeMap<String, Mutability>,
}

impl ResourceSpec {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
            attributes: Attributes::new(),
            mutability: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttributeValue::as_str)
    }
}

/// Identifies one declared resource: `type.name`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceAddress {
    pub type_name: String,
    pub name: String,
}

impl ResourceAddress {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.name)
    }
}

/// Desired configuration: resource type, then resource name, then attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesiredConfig {
    pub resources: BTreeMap<String, BTreeMap<String, Attributes>>,
}

impl DesiredConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: ResourceAddress, attributes: Attributes) {
        self.resources
            .entry(address.type_name)
            .or_default()
            .insert(address.name, attributes);
    }

    pub fn get(&self, address: &ResourceAddress) -> Option<&Attributes> {
        self.resources
            .get(&address.type_name)
            .and_then(|by_name| by_name.get(&address.name))
    }

    pub fn addresses(&self) -> impl Iterator<Item = ResourceAddress> + '_ {
        self.resources.iter().flat_map(|(type_name, by_name)| {
            by_name
                .keys()
                .map(move |name| ResourceAddress::new(type_name.clone(), name.clone()))
        })
    }

    pub fn from_json(data: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Build an `Attributes` map from name/value pairs
#[macro_export]
macro_rules! attributes {
    () => { $crate::types::Attributes::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut attrs = $crate::types::Attributes::new();
        $(attrs.insert($name.to_string(), $crate::types::AttributeValue::from($value));)+
        attrs
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_value_deserializes_from_json() {
        let attrs: Attributes = serde_json::from_str(
            r#"{"name":"app1","route_tables":["rtb-1","rtb-2"],"enabled":true,"arn":"__computed__","rate":100}"#,
        )
        .unwrap();

        assert_eq!(attrs["name"], AttributeValue::from("app1"));
        assert_eq!(attrs["route_tables"], AttributeValue::from(vec!["rtb-1", "rtb-2"]));
        assert_eq!(attrs["enabled"], AttributeValue::Bool(true));
        assert!(attrs["arn"].is_computed());
        assert_eq!(attrs["rate"].as_str(), Some("100"));
    }

    #[test]
    fn attribute_value_rejects_nested_lists() {
        let result: std::result::Result<AttributeValue, _> = serde_json::from_str(r#"[["a"]]"#);
        assert!(result.is_err());
    }

    #[test]
    fn resource_spec_serializes_without_missing_id() {
        let spec = ResourceSpec::new("aws_sns_application").with_attribute("name", "app1");
        let json = serde_json::to_value(&spec).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["attributes"]["name"], "app1");
    }

    #[test]
    fn desired_config_lists_addresses_in_order() {
        let config = DesiredConfig::from_json(
            br#"{
                "aws_vpc_endpoint": {"s3": {"vpc_id": "vpc-1"}},
                "aws_sns_application": {"b": {"name": "b"}, "a": {"name": "a"}}
            }"#,
        )
        .unwrap();

        let addresses: Vec<String> = config.addresses().map(|a| a.to_string()).collect();
        assert_eq!(
            addresses,
            vec![
                "aws_sns_application.a",
                "aws_sns_application.b",
                "aws_vpc_endpoint.s3"
            ]
        );
        assert!(config
            .get(&ResourceAddress::new("aws_vpc_endpoint", "s3"))
            .is_some());
    }

    #[test]
    fn attributes_macro_builds_map() {
        let attrs = crate::attributes! {
            "name" => "app1",
            "enabled" => true,
        };
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["enabled"].as_bool(), Some(true));
    }
}
