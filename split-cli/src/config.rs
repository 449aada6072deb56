//! `fairshare.toml` settings.
//!
//! Every key is optional. Command-line flags take precedence over the file,
//! and `FAIRSHARE_SHARE_API_URL` takes precedence over `share_api_url`.
//!
//! ```toml
//! share_api_url = "https://api.fairshare.example"
//! public_url = "https://fairshare.example/"
//! data_dir = "/var/lib/fairshare"
//! log_level = "debug"
//! log_file = "fairshare.log"
//! locales = ["en-GB"]
//! user = "alex@example.com"
//!
//! [database]
//! backend = "sqlite"
//! connection_string = "fairshare.db"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use split_core::db::DbConfig;
use tracing::debug;
use url::Url;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "fairshare.toml";

pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000/";

const DATA_DIR_NAME: &str = "fairshare";
const DATABASE_FILE: &str = "fairshare.db";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub share_api_url: Option<String>,
    pub public_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub database: DatabaseSection,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub locales: Vec<String>,
    /// Signed-in user for named configurations.
    pub user: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSection {
    pub backend: Option<String>,
    pub connection_string: Option<String>,
}

impl AppConfig {
    /// Reads `path`, or [`DEFAULT_CONFIG_FILE`] when it exists.
    ///
    /// An explicit path that cannot be read is an error; a missing default
    /// file just yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    debug!("no {DEFAULT_CONFIG_FILE}; using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file '{}'", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Where the local snapshot and the default database live.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DATA_DIR_NAME)
        })
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            backend: self
                .database
                .backend
                .clone()
                .unwrap_or_else(|| "sqlite".to_string()),
            connection_string: self
                .database
                .connection_string
                .clone()
                .unwrap_or_else(|| self.data_dir().join(DATABASE_FILE).display().to_string()),
        }
    }

    pub fn public_url(&self) -> Result<Url> {
        let raw = self.public_url.as_deref().unwrap_or(DEFAULT_PUBLIC_URL);
        Url::parse(raw).with_context(|| format!("invalid public_url '{raw}'"))
    }

    /// Configured locales, or the `LANG` environment variable.
    pub fn locales(&self) -> Vec<String> {
        if !self.locales.is_empty() {
            return self.locales.clone();
        }
        std::env::var("LANG")
            .ok()
            .and_then(|lang| lang.split('.').next().map(|l| l.replace('_', "-")))
            .filter(|l| !l.is_empty() && l != "C" && l != "POSIX")
            .into_iter()
            .collect()
    }
}
