mod config;

pub use config::{
    Config, ConfigError, KeygenConfig, EncryptionConfig, StoreConfig,
    default_config_path, default_store_path, DB_PATH_ENV,
};
