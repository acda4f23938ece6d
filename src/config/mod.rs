use std::path::{Path, PathBuf};

use serde::Deserialize;

static CONFIG: OnceCell<Config> = OnceCell::const_new();

mod config_dir;
pub use config_dir::{CONFIG_ENV, find_config_file, read_config, read_config_at};

mod error;
pub use error::{ConfigError, ConfigResult};
use tokio::sync::OnceCell;

#[derive(Debug, Deserialize)]
pub struct Config {
    host: Host,
    app: App,
}

#[derive(Debug, Deserialize)]
pub struct Host {
    bindto: String,
}

#[derive(Debug, Deserialize)]
pub struct App {
    jwt: String,
    database_uri: String,
    #[serde(default)]
    docs: bool,
    #[serde(default = "default_uploads_dir")]
    uploads_dir: PathBuf,
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Config {
    #[tracing::instrument]
    pub async fn get_or_init(use_local: bool) -> &'static Config {
        CONFIG
            .get_or_init(|| async {
                match read_config(use_local).and_then(|bytes| Self::parse(&bytes)) {
                    Ok(c) => c,
                    Err(e) => {
                        crate::error::log_error(&e);
                        tracing::error!("set {CONFIG_ENV} or create ./config.toml");
                        std::process::exit(1);
                    }
                }
            })
            .await
    }

    pub fn parse(bytes: &[u8]) -> ConfigResult<Self> {
        Ok(toml::from_slice(bytes)?)
    }

    #[inline]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[inline]
    pub fn app(&self) -> &App {
        &self.app
    }
}

impl Host {
    #[inline]
    pub fn bindto(&self) -> &str {
        &self.bindto
    }
}

impl App {
    #[inline]
    pub fn jwt(&self) -> &str {
        &self.jwt
    }

    #[inline]
    pub fn database_uri(&self) -> &str {
        &self.database_uri
    }

    #[inline]
    pub fn docs(&self) -> bool {
        self.docs
    }

    /// Root directory every stored asset path is relative to.
    #[inline]
    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn config_test() {
        let config = Config::get_or_init(true).await;
        assert_eq!(config.host().bindto(), "127.0.0.1:5000"); // defaults
        assert_eq!(config.app().uploads_dir(), Path::new("uploads"));
    }

    #[test]
    fn optional_app_keys_default() {
        let config = Config::parse(
            br#"
            [host]
            bindto = "0.0.0.0:8080"
            [app]
            jwt = "s"
            database_uri = "postgres://db/forma"
            "#,
        )
        .unwrap();
        assert!(!config.app().docs());
        assert_eq!(config.app().uploads_dir(), Path::new("uploads"));
        assert_eq!(config.app().database_uri(), "postgres://db/forma");
    }

    #[test]
    fn missing_section_is_rejected() {
        assert!(matches!(
            Config::parse(b"[host]\nbindto = \"x\""),
            Err(ConfigError::TomlDeError(_))
        ));
    }
}
