use std::path::{Path, PathBuf};
use std::{env, fs, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::paillier::math::DEFAULT_MR_ROUNDS;
use crate::paillier::p_encrypt::Blinding;
use crate::paillier::p_keygen::{validate_key_bits, KeygenOptions};

/// Surcharge du chemin de la base de clés
pub const DB_PATH_ENV: &str = "PAILLIER_VAULT_DB";

const APP_DIR: &str = "paillier_vault";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Lecture de {path} impossible : {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Configuration TOML invalide : {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration incohérente : {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub keygen:     KeygenConfig,
    pub encryption: EncryptionConfig,
    pub store:      StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeygenConfig {
    /// Taille du module n en bits
    pub bits:                u64,
    pub miller_rabin_rounds: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub blinding: Blinding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for KeygenConfig {
    fn default() -> Self {
        KeygenConfig { bits: 2048, miller_rabin_rounds: DEFAULT_MR_ROUNDS }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig { path: default_store_path() }
    }
}

impl KeygenConfig {
    pub fn options(&self) -> KeygenOptions {
        KeygenOptions { rounds: self.miller_rabin_rounds }
    }
}

/// $XDG_CONFIG_HOME/paillier_vault/config.toml ou $HOME/.config/...
pub fn default_config_path() -> Option<PathBuf> {
    let base = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join(APP_DIR).join("config.toml"))
}

/// $XDG_DATA_HOME/paillier_vault/keys.db, $HOME/.local/share/..., sinon ./keys.db
pub fn default_store_path() -> PathBuf {
    env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share")))
        .map(|base| base.join(APP_DIR).join("keys.db"))
        .unwrap_or_else(|| PathBuf::from("keys.db"))
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        debug!(path = %path.display(), "configuration chargée");
        Ok(config)
    }

    /// Fichier explicite, sinon fichier par défaut s'il existe, sinon valeurs
    /// par défaut. La variable PAILLIER_VAULT_DB s'applique en dernier.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::load(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(env::var_os(DB_PATH_ENV).map(PathBuf::from));
        Ok(config)
    }

    pub fn apply_overrides(&mut self, db_path: Option<PathBuf>) {
        if let Some(p) = db_path {
            self.store.path = p;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_key_bits(self.keygen.bits).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.keygen.miller_rabin_rounds == 0 {
            return Err(ConfigError::Invalid("miller_rabin_rounds doit être >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.keygen.bits, 2048);
        assert_eq!(config.keygen.miller_rabin_rounds, 40);
        assert_eq!(config.encryption.blinding, Blinding::Random);
    }

    #[test]
    fn test_full_toml() {
        let raw = r#"
            [keygen]
            bits = 1024
            miller_rabin_rounds = 64

            [encryption]
            blinding = "legacy_deterministic"

            [store]
            path = "/tmp/vault/keys.db"
        "#;
        let config = Config::from_toml_str(raw).unwrap();
        assert_eq!(config.keygen.bits, 1024);
        assert_eq!(config.keygen.options().rounds, 64);
        assert_eq!(config.encryption.blinding, Blinding::LegacyDeterministic);
        assert_eq!(config.store.path, PathBuf::from("/tmp/vault/keys.db"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(Config::from_toml_str("[keygen]\nbits = 1023"), Err(ConfigError::Invalid(_))));
        assert!(matches!(Config::from_toml_str("[keygen]\nbits = 256"), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            Config::from_toml_str("[keygen]\nmiller_rabin_rounds = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(Config::from_toml_str("[encryption]\nblinding = \"nope\""), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file_and_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[keygen]\nbits = 512\n").unwrap();

        let mut config = Config::load(&path).unwrap();
        assert_eq!(config.keygen.bits, 512);

        config.apply_overrides(Some(PathBuf::from("/elsewhere/keys.db")));
        assert_eq!(config.store.path, PathBuf::from("/elsewhere/keys.db"));
        config.apply_overrides(None);
        assert_eq!(config.store.path, PathBuf::from("/elsewhere/keys.db"));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
