//! Structured Output
//!
//! An agent with an output schema must answer with a single JSON document.
//! The schema is advertised to the provider and the final answer is parsed
//! and validated before it is accepted.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};

/// Domain validation beyond what deserialization enforces
pub trait Validate {
    /// Every violated constraint, one message each
    fn validate(&self) -> std::result::Result<(), Vec<String>>;
}

/// Output schema attached to an agent
pub trait OutputSchema: Send + Sync {
    /// Schema name, used in errors and prompts
    fn name(&self) -> &str;

    /// JSON schema advertised to the model
    fn json_schema(&self) -> Value;

    /// Parse and validate a model answer, returning the normalized JSON value
    fn parse(&self, text: &str) -> Result<Value>;
}

/// [`OutputSchema`] backed by a Rust type
pub struct TypedSchema<T> {
    name: String,
    schema: Value,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            _marker: PhantomData,
        }
    }
}

impl<T> TypedSchema<T>
where
    T: DeserializeOwned + Serialize + Validate,
{
    /// Parse into the typed value
    pub fn parse_typed(&self, text: &str) -> Result<T> {
        let body = strip_code_fence(text);
        let value: T = serde_json::from_str(body).map_err(|e| AgentError::SchemaValidation {
            schema: self.name.clone(),
            reason: e.to_string(),
        })?;

        value.validate().map_err(|violations| AgentError::SchemaValidation {
            schema: self.name.clone(),
            reason: violations.join("; "),
        })?;

        Ok(value)
    }
}

impl<T> OutputSchema for TypedSchema<T>
where
    T: DeserializeOwned + Serialize + Validate,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn json_schema(&self) -> Value {
        self.schema.clone()
    }

    fn parse(&self, text: &str) -> Result<Value> {
        let typed = self.parse_typed(text)?;
        Ok(serde_json::to_value(typed)?)
    }
}

/// Strip a surrounding Markdown code fence, if any.
///
/// Models asked for "only JSON" still wrap it in ```json fences now and then.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    match rest.find('\n') {
        Some(idx) => rest[idx + 1..].trim(),
        None => rest.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Pair {
        left: String,
        #[serde(default)]
        right: Vec<u8>,
    }

    impl Validate for Pair {
        fn validate(&self) -> std::result::Result<(), Vec<String>> {
            if self.left.is_empty() {
                return Err(vec!["left must not be empty".into()]);
            }
            Ok(())
        }
    }

    fn schema() -> TypedSchema<Pair> {
        TypedSchema::new("Pair", json!({"type": "object"}))
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_normalizes_defaults() {
        let value = schema().parse("```json\n{\"left\": \"x\"}\n```").unwrap();
        assert_eq!(value, json!({"left": "x", "right": []}));
    }

    #[test]
    fn test_parse_reports_violations() {
        let err = schema().parse(r#"{"left": ""}"#).unwrap_err();
        match err {
            AgentError::SchemaValidation { schema, reason } => {
                assert_eq!(schema, "Pair");
                assert!(reason.contains("left must not be empty"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(schema().parse("not json").is_err());
    }
}
