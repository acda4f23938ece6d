use std::path::PathBuf;

use thiserror::Error;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    IoError(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    TomlDeError(#[from] toml::de::Error),
    #[error("no config file at {}", path.display())]
    ConfigNotFound { path: PathBuf },
}
