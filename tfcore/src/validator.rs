use crate::error::{Result, TfcoreError};
use crate::types::AttributeValue;

/// Per-attribute check run against desired configuration before any remote call
pub trait Validator: Send + Sync {
    fn description(&self) -> String;

    fn validate(&self, value: &AttributeValue, attribute_path: &str) -> Result<()>;
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        format!("string length in [{:?}, {:?}]", self.min, self.max)
    }

    fn validate(&self, value: &AttributeValue, attribute_path: &str) -> Result<()> {
        if let Some(s) = value.as_str() {
            if let Some(min) = self.min {
                if s.len() < min {
                    return Err(TfcoreError::validation_at(
                        attribute_path,
                        format!("must have minimum length of {} (got {})", min, s.len()),
                    ));
                }
            }
            if let Some(max) = self.max {
                if s.len() > max {
                    return Err(TfcoreError::validation_at(
                        attribute_path,
                        format!("must have maximum length of {} (got {})", max, s.len()),
                    ));
                }
            }
        }
        Ok(())
    }
}

pub struct StringPatternValidator {
    pub pattern: regex::Regex,
    pub description: String,
}

impl StringPatternValidator {
    pub fn new(pattern: &str, description: impl Into<String>) -> Result<Self> {
        let pattern = regex::Regex::new(pattern)
            .map_err(|e| TfcoreError::Schema(format!("invalid pattern {:?}: {}", pattern, e)))?;
        Ok(Self {
            pattern,
            description: description.into(),
        })
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn validate(&self, value: &AttributeValue, attribute_path: &str) -> Result<()> {
        if let Some(s) = value.as_str() {
            if !self.pattern.is_match(s) {
                return Err(TfcoreError::validation_at(
                    attribute_path,
                    format!("value '{}' must match {}", s, self.description),
                ));
            }
        }
        Ok(())
    }
}

/// Accepts only values from a fixed set
pub struct OneOfValidator {
    pub allowed: Vec<String>,
}

impl OneOfValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for OneOfValidator {
    fn description(&self) -> String {
        format!("one of {:?}", self.allowed)
    }

    fn validate(&self, value: &AttributeValue, attribute_path: &str) -> Result<()> {
        if let Some(s) = value.as_str() {
            if !self.allowed.iter().any(|a| a == s) {
                return Err(TfcoreError::validation_at(
                    attribute_path,
                    format!("'{}' is not supported, expected one of {:?}", s, self.allowed),
                ));
            }
        }
        Ok(())
    }
}

/// Range check for numeric values carried as strings
pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        format!("number in [{:?}, {:?}]", self.min, self.max)
    }

    fn validate(&self, value: &AttributeValue, attribute_path: &str) -> Result<()> {
        let Some(s) = value.as_str() else {
            return Ok(());
        };
        let n: f64 = s.parse().map_err(|_| {
            TfcoreError::validation_at(attribute_path, format!("'{}' is not a number", s))
        })?;
        if let Some(min) = self.min {
            if n < min {
                return Err(TfcoreError::validation_at(
                    attribute_path,
                    format!("must be at least {} (got {})", min, n),
                ));
            }
        }
        if let Some(max) = self.max {
            if n > max {
                return Err(TfcoreError::validation_at(
                    attribute_path,
                    format!("must be at most {} (got {})", max, n),
                ));
            }
        }
        Ok(())
    }
}

pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        format!("list length in [{:?}, {:?}]", self.min, self.max)
    }

    fn validate(&self, value: &AttributeValue, attribute_path: &str) -> Result<()> {
        if let Some(items) = value.as_list() {
            if let Some(min) = self.min {
                if items.len() < min {
                    return Err(TfcoreError::validation_at(
                        attribute_path,
                        format!("must have at least {} items (got {})", min, items.len()),
                    ));
                }
            }
            if let Some(max) = self.max {
                if items.len() > max {
                    return Err(TfcoreError::validation_at(
                        attribute_path,
                        format!("must have at most {} items (got {})", max, items.len()),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// String must parse as a JSON document
pub struct JsonDocumentValidator;

impl Validator for JsonDocumentValidator {
    fn description(&self) -> String {
        "valid JSON document".to_string()
    }

    fn validate(&self, value: &AttributeValue, attribute_path: &str) -> Result<()> {
        if let Some(s) = value.as_str() {
            serde_json::from_str::<serde_json::Value>(s).map_err(|e| {
                TfcoreError::validation_at(attribute_path, format!("invalid JSON document: {}", e))
            })?;
        }
        Ok(())
    }
}
