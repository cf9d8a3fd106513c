use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};

/// Tunables for an [`AtomicAppendWriter`](crate::AtomicAppendWriter).
///
/// The batch handle is not part of this struct since it is a live object;
/// pass it to the builder instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Fixed suffix for the staging key. `None` generates a random one.
    pub staging_key_suffix: Option<String>,
    /// Read buffer size used by `copy_from`.
    pub read_chunk_size: usize,
    /// Capacity of the session event channel.
    pub event_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            staging_key_suffix: None,
            read_chunk_size: 64 * 1024,
            event_capacity: 64,
        }
    }
}

impl WriterConfig {
    /// Parse a config from TOML. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> StreamResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StreamError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set a fixed staging key suffix.
    pub fn with_staging_key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.staging_key_suffix = Some(suffix.into());
        self
    }

    pub fn validate(&self) -> StreamResult<()> {
        if matches!(self.staging_key_suffix.as_deref(), Some("")) {
            return Err(StreamError::Config(
                "staging_key_suffix must not be empty".into(),
            ));
        }
        if self.read_chunk_size == 0 {
            return Err(StreamError::Config("read_chunk_size must be positive".into()));
        }
        if self.event_capacity == 0 {
            return Err(StreamError::Config("event_capacity must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = WriterConfig::default();
        assert!(c.staging_key_suffix.is_none());
        assert_eq!(c.read_chunk_size, 64 * 1024);
        assert_eq!(c.event_capacity, 64);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn parse_partial_toml() {
        let c = WriterConfig::from_toml_str(
            r#"
            staging_key_suffix = ".tmp"
            read_chunk_size = 4096
            "#,
        )
        .unwrap();
        assert_eq!(c.staging_key_suffix.as_deref(), Some(".tmp"));
        assert_eq!(c.read_chunk_size, 4096);
        assert_eq!(c.event_capacity, 64);
    }

    #[test]
    fn empty_suffix_rejected() {
        let err = WriterConfig::default()
            .with_staging_key_suffix("")
            .validate()
            .unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let err = WriterConfig::from_toml_str("read_chunk_size = 0").unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn malformed_toml_rejected() {
        let err = WriterConfig::from_toml_str("read_chunk_size = \"big\"").unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }
}
