//! # Contract Configuration Module
//!
//! Process-wide settings for marker parsing and contract generation. A
//! [`ContractConfig`] is built once at startup and shared read-only (as
//! `Arc<ContractConfig>`) by the schema generator, the introspector and every
//! compiled binding plan.
//!
//! ## Environment Variables
//!
//! ### `BRRTB_TAG_PREFIX`
//!
//! Marker key holding documentation/constraint props. Default: `oai`.
//!
//! ### `BRRTB_GROUP_SEPARATOR` / `BRRTB_ITEM_SEPARATOR`
//!
//! Separators used to pack props into one marker value
//! (`description=Page;enum=a,b`). Defaults: `;` and `,`. The item separator is
//! also used to split packed multi-value parameters (`?ids=1,2,3`).
//!
//! ### `BRRTB_SCHEMA_COLLISION`
//!
//! What to do when two distinct types sanitize to the same schema name:
//! `overwrite` (default, last registration wins) or `reject`. Unrecognised
//! values keep the default and log a warning.
//!
//! ### `BRRTB_STRUCTURAL_VALIDATION`
//!
//! `on` (default) installs the JSON Schema backed structural validator;
//! `off` skips structural validation entirely.
//!
//! ## Usage
//!
//! ```rust
//! use brrtbind::config::ContractConfig;
//!
//! let config = ContractConfig::from_env();
//! assert!(config.validate().is_ok());
//! ```

use crate::error::ContractError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::warn;

/// Marker keys that identify parameter locations and the body field.
pub const RESERVED_MARKERS: [&str; 6] = ["path", "query", "header", "cookie", "body", "required"];

/// Behaviour when two distinct types resolve to the same schema name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Last registration wins; the earlier node is replaced and a warning is logged.
    #[default]
    Overwrite,
    /// Registration fails with [`ContractError::SchemaNameCollision`].
    Reject,
}

impl CollisionPolicy {
    /// Parse a policy name; `None` for anything unrecognised.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" | "replace" => Some(CollisionPolicy::Overwrite),
            "reject" | "error" | "fail" => Some(CollisionPolicy::Reject),
            _ => None,
        }
    }
}

/// Immutable contract-generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ContractConfig {
    /// Marker key carrying documentation/constraint props (default `oai`)
    pub tag_prefix: String,
    /// Separator between props inside one marker value (default `;`)
    pub group_separator: String,
    /// Separator between list items inside one prop or parameter value (default `,`)
    pub item_separator: String,
    /// Schema name collision behaviour
    pub schema_collision: CollisionPolicy,
    /// Whether the JSON Schema structural validator is installed
    pub structural_validation: bool,
    /// Value of the document's `openapi` field
    pub openapi_version: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            tag_prefix: "oai".to_string(),
            group_separator: ";".to_string(),
            item_separator: ",".to_string(),
            schema_collision: CollisionPolicy::Overwrite,
            structural_validation: true,
            openapi_version: "3.1.0".to_string(),
        }
    }
}

/// Read `name` through `parse`, keeping `default` when unset or unrecognised.
fn env_or<T: std::fmt::Debug>(name: &str, default: T, parse: impl Fn(&str) -> Option<T>) -> T {
    let Ok(raw) = env::var(name) else {
        return default;
    };
    parse(&raw).unwrap_or_else(|| {
        warn!(
            variable = name,
            value = %raw,
            default = ?default,
            "Unrecognised configuration value, keeping default"
        );
        default
    })
}

fn parse_switch(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

impl ContractConfig {
    /// Load configuration from environment variables, using defaults for unset values.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tag_prefix: env::var("BRRTB_TAG_PREFIX").unwrap_or(defaults.tag_prefix),
            group_separator: env::var("BRRTB_GROUP_SEPARATOR")
                .unwrap_or(defaults.group_separator),
            item_separator: env::var("BRRTB_ITEM_SEPARATOR").unwrap_or(defaults.item_separator),
            schema_collision: env_or(
                "BRRTB_SCHEMA_COLLISION",
                defaults.schema_collision,
                CollisionPolicy::parse,
            ),
            structural_validation: env_or(
                "BRRTB_STRUCTURAL_VALIDATION",
                defaults.structural_validation,
                parse_switch,
            ),
            openapi_version: defaults.openapi_version,
        }
    }

    /// Load configuration from a TOML, YAML or JSON file (chosen by extension).
    ///
    /// Missing keys take their default values. The loaded configuration is
    /// checked with [`ContractConfig::validate`].
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let config: ContractConfig = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Builder-style override of the collision policy.
    #[must_use]
    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.schema_collision = policy;
        self
    }

    /// Builder-style toggle for structural validation.
    #[must_use]
    pub fn with_structural_validation(mut self, enabled: bool) -> Self {
        self.structural_validation = enabled;
        self
    }

    /// Check that separators and prefix can be parsed unambiguously.
    pub fn validate(&self) -> Result<(), ContractError> {
        let invalid = |reason: &str| ContractError::InvalidConfig(reason.to_string());
        if self.tag_prefix.trim().is_empty() {
            return Err(invalid("tag_prefix must not be empty"));
        }
        if RESERVED_MARKERS.contains(&self.tag_prefix.as_str()) {
            return Err(invalid("tag_prefix collides with a location or body marker"));
        }
        if self.group_separator.is_empty() || self.item_separator.is_empty() {
            return Err(invalid("separators must not be empty"));
        }
        if self.group_separator == self.item_separator {
            return Err(invalid("group and item separators must differ"));
        }
        if self.group_separator == "=" || self.item_separator == "=" {
            return Err(invalid("'=' is reserved for prop assignment"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ContractConfig::default();
        assert_eq!(config.tag_prefix, "oai");
        assert_eq!(config.group_separator, ";");
        assert_eq!(config.item_separator, ",");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_ambiguous_separators() {
        let mut config = ContractConfig::default();
        config.item_separator = ";".to_string();
        assert!(config.validate().is_err());

        let mut config = ContractConfig::default();
        config.group_separator = "=".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_reserved_prefix() {
        let mut config = ContractConfig::default();
        config.tag_prefix = "query".to_string();
        assert!(matches!(
            config.validate(),
            Err(ContractError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_collision_policy_parse() {
        assert_eq!(CollisionPolicy::parse("reject"), Some(CollisionPolicy::Reject));
        assert_eq!(CollisionPolicy::parse("ERROR"), Some(CollisionPolicy::Reject));
        assert_eq!(CollisionPolicy::parse(" Overwrite "), Some(CollisionPolicy::Overwrite));
        assert_eq!(CollisionPolicy::parse("rejct"), None);
    }

    #[test]
    fn test_unrecognised_env_value_keeps_default() {
        let name = "BRRTB_TEST_COLLISION_TYPO";
        std::env::set_var(name, "rejct");
        let policy = env_or(name, CollisionPolicy::Reject, CollisionPolicy::parse);
        std::env::remove_var(name);
        assert_eq!(policy, CollisionPolicy::Reject);

        std::env::set_var(name, "overwrite");
        let policy = env_or(name, CollisionPolicy::Reject, CollisionPolicy::parse);
        std::env::remove_var(name);
        assert_eq!(policy, CollisionPolicy::Overwrite);

        assert!(env_or("BRRTB_TEST_UNSET", true, parse_switch));
    }

    #[test]
    fn test_parse_switch() {
        assert_eq!(parse_switch("off"), Some(false));
        assert_eq!(parse_switch("On"), Some(true));
        assert_eq!(parse_switch("maybe"), None);
    }
}
