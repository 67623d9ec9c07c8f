//! Attribute schema for resource types
//!
//! Each driver declares its fields once through [`SchemaBuilder`]; the schema
//! is then used to validate desired configuration, fill defaults, and tell
//! the diff engine which changes force replacement.

use crate::error::{Result, TfcoreError};
use crate::types::{AttributeValue, Attributes, Mutability};
use crate::validator::Validator;
use std::collections::{BTreeMap, HashSet};

/// Value type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    List, // of strings
    Bool,
}

impl AttributeType {
    fn accepts(&self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (AttributeType::String, AttributeValue::String(_))
                | (AttributeType::List, AttributeValue::List(_))
                | (AttributeType::Bool, AttributeValue::Bool(_))
                | (_, AttributeValue::Computed)
        )
    }

    fn name(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::List => "list",
            AttributeType::Bool => "bool",
        }
    }
}

/// A single configuration field
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    /// Any change requires delete-then-create
    pub force_new: bool,
    /// Persisted only as a fingerprint
    pub sensitive: bool,
    /// Lists compared as sets
    pub order_insensitive: bool,
    pub default: Option<AttributeValue>,
    pub validators: Vec<Box<dyn Validator>>,
}

// Manual Debug implementation since validators don't implement Debug
impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("force_new", &self.force_new)
            .field("sensitive", &self.sensitive)
            .field("order_insensitive", &self.order_insensitive)
            .field("default", &self.default)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .finish()
    }
}

impl Attribute {
    /// Populated only by the remote system; never part of a diff
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    pub fn mutability(&self) -> Mutability {
        if self.force_new {
            Mutability::ForceNew
        } else {
            Mutability::Updatable
        }
    }
}

/// Fluent builder for attributes
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                force_new: false,
                sensitive: false,
                order_insensitive: false,
                default: None,
                validators: Vec::new(),
            },
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, AttributeType::String)
    }

    pub fn list(name: &str) -> Self {
        Self::new(name, AttributeType::List)
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, AttributeType::Bool)
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.attribute.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn order_insensitive(mut self) -> Self {
        self.attribute.order_insensitive = true;
        self
    }

    pub fn default(mut self, value: impl Into<AttributeValue>) -> Self {
        self.attribute.default = Some(value.into());
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.attribute.validators.push(Box::new(validator));
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// Schema of one resource type. Attributes keep declaration order.
#[derive(Debug)]
pub struct Schema {
    pub type_name: String,
    pub version: i64,
    pub description: String,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Field name to attribute definition
    pub fn fields(&self) -> BTreeMap<&str, &Attribute> {
        self.attributes
            .iter()
            .map(|a| (a.name.as_str(), a))
            .collect()
    }

    pub fn mutability(&self) -> BTreeMap<String, Mutability> {
        self.attributes
            .iter()
            .filter(|a| !a.is_computed_only())
            .map(|a| (a.name.clone(), a.mutability()))
            .collect()
    }

    /// Check the schema declaration itself
    pub fn check(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for attr in &self.attributes {
            let where_ = format!("{}.{}", self.type_name, attr.name);

            if attr.name.is_empty() {
                return Err(TfcoreError::Schema(format!(
                    "{}: attribute with empty name",
                    self.type_name
                )));
            }
            if !seen.insert(attr.name.as_str()) {
                return Err(TfcoreError::Schema(format!("{}: declared twice", where_)));
            }
            if attr.required && attr.computed {
                return Err(TfcoreError::Schema(format!(
                    "{}: required and computed are mutually exclusive",
                    where_
                )));
            }
            if attr.required && attr.default.is_some() {
                return Err(TfcoreError::Schema(format!(
                    "{}: required attributes cannot have a default",
                    where_
                )));
            }
            if attr.force_new && attr.is_computed_only() {
                return Err(TfcoreError::Schema(format!(
                    "{}: force_new has no meaning on a computed-only attribute",
                    where_
                )));
            }
            if !attr.required && !attr.optional && !attr.computed {
                return Err(TfcoreError::Schema(format!(
                    "{}: must be required, optional, or computed",
                    where_
                )));
            }
            if let Some(default) = &attr.default {
                if default.is_computed() || !attr.r#type.accepts(default) {
                    return Err(TfcoreError::Schema(format!(
                        "{}: default {} does not match type {}",
                        where_,
                        default,
                        attr.r#type.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate desired configuration against this schema. Unknown fields are
    /// schema errors; everything else wrong with a value is a validation error.
    pub fn validate_config(&self, config: &Attributes) -> Result<()> {
        for (name, value) in config {
            let attr = self.field(name).ok_or_else(|| {
                TfcoreError::Schema(format!(
                    "unknown attribute '{}' for {}",
                    name, self.type_name
                ))
            })?;

            if !attr.r#type.accepts(value) {
                return Err(TfcoreError::validation_at(
                    name,
                    format!("expected {}, got {}", attr.r#type.name(), value.kind()),
                ));
            }
            if value.is_computed() {
                if !attr.computed {
                    return Err(TfcoreError::validation_at(
                        name,
                        "only computed attributes may be left pending",
                    ));
                }
                continue;
            }
            if attr.is_computed_only() {
                return Err(TfcoreError::validation_at(
                    name,
                    "computed attribute cannot be set in configuration",
                ));
            }
            for validator in &attr.validators {
                validator.validate(value, name)?;
            }
        }

        for attr in self.attributes.iter().filter(|a| a.required) {
            if !config.contains_key(&attr.name) {
                return Err(TfcoreError::validation_at(
                    &attr.name,
                    "required attribute is missing",
                ));
            }
        }

        Ok(())
    }

    /// Fill defaults for attributes absent from configuration
    pub fn apply_defaults(&self, config: &mut Attributes) {
        for attr in &self.attributes {
            if let Some(default) = &attr.default {
                config
                    .entry(attr.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
    }
}

/// Fluent builder for schemas
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new(type_name: &str) -> Self {
        Self {
            schema: Schema {
                type_name: type_name.to_string(),
                version: 0,
                description: String::new(),
                attributes: Vec::new(),
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.description = desc.to_string();
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.attributes.push(attr);
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}
