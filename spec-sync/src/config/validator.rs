use crate::config::error::{ConfigError, Result};
use crate::config::loader::SyncConfig;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

/// Schema validator for [`SyncConfig`]
pub struct SchemaValidator {
    schema: JSONSchema,
}

impl SchemaValidator {
    /// Create a validator from the schema embedded at compile time.
    pub fn new() -> Result<Self> {
        let schema_str = include_str!("schemas/sync_config.schema.json");
        let schema_value: Value = serde_json::from_str(schema_str).map_err(|e| {
            ConfigError::SchemaValidationError(format!("Failed to parse sync schema: {e}"))
        })?;

        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema_value)
            .map_err(|e| {
                ConfigError::SchemaValidationError(format!("Failed to compile sync schema: {e}"))
            })?;

        Ok(Self { schema })
    }

    /// Validate a config, listing every failure with its instance path.
    pub fn validate(&self, config: &SyncConfig) -> Result<()> {
        let config_value = serde_json::to_value(config).map_err(|e| {
            ConfigError::SchemaValidationError(format!("Failed to serialize config: {e}"))
        })?;

        if let Err(errors) = self.schema.validate(&config_value) {
            let error_messages: Vec<String> = errors
                .map(|e| {
                    let path_str = e.instance_path.to_string();
                    let path = if path_str.is_empty() {
                        "root".to_string()
                    } else {
                        path_str
                    };
                    format!("{e} at '{path}'")
                })
                .collect();

            return Err(ConfigError::SchemaValidationError(format!(
                "Configuration validation failed ({} error{}):\n  - {}",
                error_messages.len(),
                if error_messages.len() == 1 { "" } else { "s" },
                error_messages.join("\n  - ")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_default_config() {
        let validator = SchemaValidator::new().expect("Failed to create validator");
        let result = validator.validate(&SyncConfig::default());
        assert!(result.is_ok(), "Default config should be valid: {result:?}");
    }

    #[test]
    fn test_audit_limit_out_of_range() {
        let mut config = SyncConfig::default();
        config.audit.limit = 0;

        let validator = SchemaValidator::new().expect("Failed to create validator");
        let err = validator.validate(&config).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/audit/limit"), "unexpected message: {msg}");
    }

    #[test]
    fn test_empty_dir_and_duplicate_labels_reported_together() {
        let mut config = SyncConfig::default();
        config.layout.living_docs_dir = PathBuf::new();
        config.sync.tracker_labels = vec!["a".to_string(), "a".to_string()];

        let validator = SchemaValidator::new().expect("Failed to create validator");
        let msg = validator.validate(&config).unwrap_err().to_string();
        assert!(msg.contains("2 errors"), "unexpected message: {msg}");
    }
}
