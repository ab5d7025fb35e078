//! Configuration for joins and merges

use serde::{Deserialize, Serialize};

/// What a join does when two parents share an id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Later parent replaces the earlier one in the id map; both stay in
    /// the ordered parent list
    #[default]
    Overwrite,

    /// Fail construction with [`JoinError::DuplicateParent`](crate::JoinError::DuplicateParent)
    Reject,
}

/// Join configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Duplicate parent id handling
    pub duplicate_policy: DuplicatePolicy,
}

impl JoinConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With duplicate policy
    #[inline]
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Parse from JSON; missing fields take their defaults
    ///
    /// # Errors
    /// Returns the parse error for malformed input
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Merge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Value key read from each input to label its cause
    pub name_key: String,
    /// Label for the first input when it has no name value
    pub first_label: String,
    /// Label for the second input when it has no name value
    pub second_label: String,
}

impl MergeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With name key
    #[inline]
    #[must_use]
    pub fn with_name_key(mut self, key: impl Into<String>) -> Self {
        self.name_key = key.into();
        self
    }

    /// With fallback labels
    #[inline]
    #[must_use]
    pub fn with_labels(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.first_label = first.into();
        self.second_label = second.into();
        self
    }

    /// Parse from JSON; missing fields take their defaults
    ///
    /// # Errors
    /// Returns the parse error for malformed input
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            name_key: "name".to_string(),
            first_label: "context-1".to_string(),
            second_label: "context-2".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_config_defaults_to_overwrite() {
        assert_eq!(JoinConfig::new().duplicate_policy, DuplicatePolicy::Overwrite);
    }

    #[test]
    fn join_config_from_json() {
        let config = JoinConfig::from_json(r#"{"duplicate_policy":"reject"}"#).unwrap();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);

        let empty = JoinConfig::from_json("{}").unwrap();
        assert_eq!(empty, JoinConfig::default());
    }

    #[test]
    fn merge_config_partial_json_keeps_defaults() {
        let config = MergeConfig::from_json(r#"{"name_key":"label"}"#).unwrap();
        assert_eq!(config.name_key, "label");
        assert_eq!(config.first_label, "context-1");
        assert_eq!(config.second_label, "context-2");
    }

    #[test]
    fn merge_config_builder() {
        let config = MergeConfig::new().with_labels("left", "right");
        assert_eq!(config.first_label, "left");
        assert_eq!(config.second_label, "right");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(MergeConfig::from_json("{not json").is_err());
    }
}
