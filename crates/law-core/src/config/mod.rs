//! Registry client configuration
//!
//! Layering order: built-in defaults, then a TOML file, then `LAW_*`
//! environment variables. [`RegistryConfig::validate`] runs last and reports
//! every problem at once.

mod validation;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ErrorCategory;

pub use validation::{ConfigValidator, ValidationError};

/// Address of the deployed LAW registry contract.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x6EDB450DB1C1955113859e8E4dFD968162E0db30";

/// Token symbol shown next to balances.
pub const DEFAULT_TOKEN_SYMBOL: &str = "LAW";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "LAW_";

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that failed to load
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File content is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(String),

    /// Values failed validation
    #[error("config validation failed: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

impl ConfigError {
    /// Always [`ErrorCategory::Config`].
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Config
    }
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Settings for the registry client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Address of the registry contract
    pub contract_address: String,
    /// Symbol displayed next to balances
    pub token_symbol: String,
    /// Confirmations required before a transaction counts as final
    pub confirmations: u64,
    /// Maximum number of per-address lookup chains in flight during a refresh
    pub lookup_concurrency: usize,
    /// Refresh the registry immediately after connecting
    pub refresh_on_connect: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            token_symbol: DEFAULT_TOKEN_SYMBOL.to_string(),
            confirmations: 1,
            lookup_concurrency: 16,
            refresh_on_connect: true,
        }
    }
}

impl RegistryConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `LAW_*` variables from the process environment.
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `LAW_*` overrides from an explicit variable list.
    ///
    /// Unknown `LAW_*` keys are ignored so unrelated tooling can share the prefix.
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match name {
                "CONTRACT_ADDRESS" => self.contract_address = value.to_string(),
                "TOKEN_SYMBOL" => self.token_symbol = value.to_string(),
                "CONFIRMATIONS" => self.confirmations = parse_env(name, value)?,
                "LOOKUP_CONCURRENCY" => self.lookup_concurrency = parse_env(name, value)?,
                "REFRESH_ON_CONNECT" => self.refresh_on_connect = parse_env(name, value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut validator = ConfigValidator::new();
        validator
            .non_empty("contract_address", &self.contract_address)
            .format(
                "contract_address",
                &self.contract_address,
                "address without whitespace",
                |s| !s.trim().chars().any(char::is_whitespace),
            )
            .non_empty("token_symbol", &self.token_symbol)
            .range("confirmations", self.confirmations, Some(1), None)
            .range(
                "lookup_concurrency",
                self.lookup_concurrency as u64,
                Some(1),
                None,
            );
        validator.finish().map_err(ConfigError::Invalid)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Parse(format!("{ENV_PREFIX}{name}: cannot parse '{value}'")))
}
