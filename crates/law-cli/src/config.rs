//! CLI configuration file
//!
//! ```toml
//! [registry]
//! contract_address = "0x6EDB450DB1C1955113859e8E4dFD968162E0db30"
//! confirmations = 1
//!
//! [local_ledger]
//! owner = "0xOwner"
//!
//! [[local_ledger.seed]]
//! username = "alice"
//! address = "0xA11CE"
//! balance = "100"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use law_app::LocalLedger;
use law_core::{Address, RegistryConfig};
use serde::Deserialize;

/// Default minter of the local ledger.
pub const DEFAULT_OWNER: &str = "0x0000000000000000000000000000000000000001";

/// Whole CLI configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Registry client settings
    pub registry: RegistryConfig,
    /// In-process ledger the shell talks to
    pub local_ledger: LocalLedgerConfig,
}

/// In-process ledger settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalLedgerConfig {
    /// Address allowed to mint
    pub owner: String,
    /// Users registered before the shell starts
    pub seed: Vec<SeedUser>,
}

impl Default for LocalLedgerConfig {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            seed: Vec::new(),
        }
    }
}

/// One pre-registered user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedUser {
    /// Username
    pub username: String,
    /// Address
    pub address: String,
    /// Initial balance as a base-10 integer
    pub balance: String,
}

impl CliConfig {
    /// Load from `path` if given, apply `LAW_*` overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Self::from_toml_str(&content)?
            }
            None => Self::default(),
        };
        config.registry.merge_with_env()?;
        config.registry.validate()?;
        Ok(config)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid configuration file")
    }

    /// Deploy the local ledger at the configured contract and seed it.
    pub fn build_ledger(&self) -> Result<LocalLedger> {
        let contract = Address::parse(&self.registry.contract_address)?;
        let owner = Address::parse(&self.local_ledger.owner)
            .context("invalid local_ledger.owner")?;
        let ledger = LocalLedger::new(contract, owner);
        for user in &self.local_ledger.seed {
            ledger
                .seed(&user.username, &user.address, &user.balance)
                .with_context(|| format!("cannot seed user {}", user.username))?;
        }
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[registry]
contract_address = "0xC0"
token_symbol = "TST"

[local_ledger]
owner = "0xOWNER"

[[local_ledger.seed]]
username = "alice"
address = "0xA"
balance = "100"

[[local_ledger.seed]]
username = "bob"
address = "0xB"
balance = "50"
"#;

    #[test]
    fn test_parse_sample() {
        let config = CliConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.registry.token_symbol, "TST");
        assert_eq!(config.registry.confirmations, 1);
        assert_eq!(config.local_ledger.seed.len(), 2);
    }

    #[test]
    fn test_build_seeded_ledger() {
        let ledger = CliConfig::from_toml_str(SAMPLE).unwrap().build_ledger().unwrap();
        assert_eq!(ledger.addresses(), vec!["0xA".to_string(), "0xB".to_string()]);
        assert_eq!(ledger.owner().as_str(), "0xOWNER");
    }

    #[test]
    fn test_duplicate_seed_is_rejected() {
        let mut config = CliConfig::from_toml_str(SAMPLE).unwrap();
        config.local_ledger.seed.push(SeedUser {
            username: "alice".to_string(),
            address: "0xC".to_string(),
            balance: "1".to_string(),
        });
        assert!(config.build_ledger().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = CliConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.registry.contract_address, "0xC0");
    }

    #[test]
    fn test_defaults_without_file() {
        let config = CliConfig::from_toml_str("").unwrap();
        assert_eq!(config.local_ledger.owner, DEFAULT_OWNER);
        assert!(config.local_ledger.seed.is_empty());
    }
}
