use std::path::{Path, PathBuf};

use super::error::{ConfigError, ConfigResult};

/// Explicit config location, takes precedence over every other lookup.
pub const CONFIG_ENV: &str = "FORMA_CONFIG";

const LOCAL_CONFIG: &str = "./config.toml";

/// Resolution order: `$FORMA_CONFIG`, then `./config.toml` when `use_local`,
/// then the per-user config directory, then `./config.toml` again.
pub fn find_config_file(use_local: bool) -> PathBuf {
    let explicit = std::env::var_os(CONFIG_ENV)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    resolve_config_file(explicit, use_local, user_config_file())
}

fn resolve_config_file(
    explicit: Option<PathBuf>,
    use_local: bool,
    user_file: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if use_local {
        return PathBuf::from(LOCAL_CONFIG);
    }

    user_file
        .filter(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG))
}

fn user_config_file() -> Option<PathBuf> {
    #[cfg(unix)]
    let base = std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"));
    #[cfg(windows)]
    let base = std::env::var_os("APPDATA").map(PathBuf::from);
    #[cfg(not(any(unix, windows)))]
    let base: Option<PathBuf> = None;

    base.map(|dir| dir.join(crate::APPLICATION_NAME).join("config.toml"))
}

pub fn read_config(use_local: bool) -> ConfigResult<Vec<u8>> {
    read_config_at(&find_config_file(use_local))
}

pub fn read_config_at(filename: &Path) -> ConfigResult<Vec<u8>> {
    tracing::trace!("looking for config at: {}", filename.display());
    if !filename.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: filename.to_path_buf(),
        });
    }

    let filename = filename.canonicalize()?;
    tracing::debug!("using {} as configuration file", filename.display());
    Ok(std::fs::read(filename)?)
}
