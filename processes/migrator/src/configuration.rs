//! Migrator configuration: built-in defaults layered under an optional
//! site-specific file and `EXODUS_*` environment overrides.

use std::path::Path;

use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use exodus_common::CurrencySet;
use exodus_module_event_writer::EventConfig;
use exodus_module_genesis_writer::GenesisParams;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MigratorConfig {
    /// Symbols the snapshot's balances are denominated in
    pub currencies: CurrencySet,

    /// Conversion and naming parameters for the output files
    pub genesis: GenesisParams,

    /// Per-account witness vote cap
    pub max_witness_votes: usize,

    /// Event log domain toggles
    pub events: EventConfig,
}

impl MigratorConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::from_str(
            include_str!("../config.default.toml"),
            FileFormat::Toml,
        ));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let full_config = builder
            .add_source(Environment::with_prefix("EXODUS"))
            .build()?;
        Ok(full_config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_parse() {
        let config = MigratorConfig::load(None).unwrap();
        assert_eq!(config.max_witness_votes, 30);
        assert_eq!(config.currencies.primary.code(), "GLS");
        assert_eq!(config.genesis.scope, "gls");
        assert!(config.events.transfers);
    }

    #[test]
    fn site_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max-witness-votes = 25").unwrap();
        writeln!(file, "[events]").unwrap();
        writeln!(file, "rewards = false").unwrap();
        file.flush().unwrap();

        let config = MigratorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.max_witness_votes, 25);
        assert!(!config.events.rewards);
        // Untouched keys keep their defaults
        assert!(config.events.transfers);
        assert_eq!(config.currencies.vesting.code(), "GESTS");
    }
}
