//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Tool configuration derived from defaults, configuration files, and
/// environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "DROPSNAP")]
pub struct DropsnapConfig {
    /// Base URL for the DigitalOcean v2 API.
    #[ortho_config(default = "https://api.digitalocean.com/v2".to_owned())]
    pub api_url: String,
    /// Tag used to select droplets for batch backups when no explicit tag
    /// is given on the command line.
    #[ortho_config(default = "auto-backup".to_owned())]
    pub tag_name: String,
    /// API token. When absent the token store is consulted instead.
    pub token: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error
/// messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl DropsnapConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to dropsnap.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments.
    /// Values merge defaults, configuration files, and environment
    /// variables in that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("dropsnap")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is
    /// empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.api_url,
            &FieldMetadata::new("API base URL", "DROPSNAP_API_URL", "api_url"),
        )?;
        Self::require_field(
            &self.tag_name,
            &FieldMetadata::new("backup tag name", "DROPSNAP_TAG_NAME", "tag_name"),
        )?;
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn config(api_url: &str, tag_name: &str) -> DropsnapConfig {
        DropsnapConfig {
            api_url: api_url.to_owned(),
            tag_name: tag_name.to_owned(),
            token: None,
        }
    }

    #[rstest]
    fn load_without_cli_args_yields_a_valid_configuration() {
        let loaded = DropsnapConfig::load_without_cli_args()
            .unwrap_or_else(|err| panic!("load should merge defaults: {err}"));

        assert!(loaded.validate().is_ok());
        assert!(!loaded.api_url.is_empty());
        assert!(!loaded.tag_name.is_empty());
    }

    #[rstest]
    fn validate_accepts_populated_fields() {
        assert!(
            config("https://api.digitalocean.com/v2", "auto-backup")
                .validate()
                .is_ok()
        );
    }

    #[rstest]
    #[case("", "auto-backup", "API base URL")]
    #[case("https://api.digitalocean.com/v2", "  ", "backup tag name")]
    fn validate_rejects_blank_fields(
        #[case] api_url: &str,
        #[case] tag_name: &str,
        #[case] expected_fragment: &str,
    ) {
        let err = config(api_url, tag_name)
            .validate()
            .expect_err("blank field should fail validation");

        let ConfigError::MissingField(message) = err else {
            panic!("expected MissingField, got {err:?}");
        };
        assert!(
            message.contains(expected_fragment),
            "message should name the field: {message}"
        );
    }
}
