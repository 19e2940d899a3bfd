use serde::Deserialize;

use crate::event_sourcing::core::StoreError;
use crate::event_sourcing::store::router::validate_identifier;

// ============================================================================
// Store Configuration
// ============================================================================

const DEFAULT_SCHEMA: &str = "dbo";

/// Page size used by replay when the caller does not pick one.
const DEFAULT_STREAM_BATCH_SIZE: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database schema holding the `<Context>Events` / `<Context>Snapshots`
    /// tables.
    pub schema: String,
    /// Envelope rows fetched per replay query.
    pub default_stream_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            default_stream_batch_size: DEFAULT_STREAM_BATCH_SIZE,
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by `EVENT_STORE_SCHEMA` and
    /// `EVENT_STORE_STREAM_BATCH_SIZE`.
    pub fn from_env() -> Result<Self, StoreError> {
        let mut config = Self::default();

        if let Ok(schema) = std::env::var("EVENT_STORE_SCHEMA") {
            config.schema = schema;
        }

        if let Ok(batch) = std::env::var("EVENT_STORE_STREAM_BATCH_SIZE") {
            config.default_stream_batch_size = batch.trim().parse().map_err(|_| {
                StoreError::InvalidArgument(format!(
                    "EVENT_STORE_STREAM_BATCH_SIZE must be a positive integer, got '{batch}'"
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_default_stream_batch_size(mut self, batch_size: usize) -> Self {
        self.default_stream_batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_identifier("schema", &self.schema)?;
        if self.default_stream_batch_size == 0 {
            return Err(StoreError::InvalidArgument(
                "default stream batch size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.schema, "dbo");
        assert_eq!(config.default_stream_batch_size, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"default_stream_batch_size": 50}"#).unwrap();
        assert_eq!(config.schema, "dbo");
        assert_eq!(config.default_stream_batch_size, 50);
    }

    #[test]
    fn test_validation() {
        assert!(StoreConfig::default().with_schema("event_log").validate().is_ok());
        assert!(StoreConfig::default().with_schema("bad schema").validate().is_err());
        assert!(StoreConfig::default()
            .with_default_stream_batch_size(0)
            .validate()
            .is_err());
    }
}
