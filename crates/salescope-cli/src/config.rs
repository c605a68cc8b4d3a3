use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Operator account the CLI authenticates against. Only a digest of the
/// password is ever stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operator {
    pub username: String,
    pub password_sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store_url: String,
    pub store_key: String,
    pub operator: Operator,
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::home_dir()
            .context("could not determine home directory")?
            .join(".config/salescope");
        Ok(dir)
    }

    fn path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load `~/.config/salescope/config.toml`, then apply
    /// `SALESCOPE_STORE_URL` / `SALESCOPE_STORE_KEY` overrides.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        let content = fs::read_to_string(&path).with_context(|| {
            format!(
                "could not read {} (it needs store_url, store_key and an [operator] section)",
                path.display()
            )
        })?;
        let mut config: Config =
            toml::from_str(&content).with_context(|| format!("invalid config at {}", path.display()))?;

        if let Ok(url) = std::env::var("SALESCOPE_STORE_URL") {
            config.store_url = url;
        }
        if let Ok(key) = std::env::var("SALESCOPE_STORE_KEY") {
            config.store_key = key;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config {
            store_url: "https://store.example.test".to_string(),
            store_key: "anon-key".to_string(),
            operator: Operator {
                username: "admin".to_string(),
                password_sha256: "ab".repeat(32),
            },
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.store_url, config.store_url);
        assert_eq!(back.operator.username, "admin");
    }

    #[test]
    fn config_rejects_missing_operator() {
        let text = "store_url = \"x\"\nstore_key = \"y\"\n";
        assert!(toml::from_str::<Config>(text).is_err());
    }
}
