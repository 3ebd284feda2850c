//! Application configuration and its on-disk discovery.
//!
//! A config file is TOML:
//!
//! ```toml
//! [nautobot]
//! url = "https://nautobot.example.com"
//! token = "0123456789abcdef"
//! ssl_verify = false
//!
//! [logging]
//! level = "info"
//!
//! [schema]
//! path = "schema.toml"   # relative to the config file
//!
//! [[custom_fields]]
//! name = "net"
//! type = "select"
//! ```
//!
//! `ConfigLocator` finds the file; `SotConfig::load` reads it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use veritas_contracts::{
    error::{VeritasError, VeritasResult},
    schema::CustomFieldDef,
};

use crate::registry::SchemaRegistry;

/// Connection settings for the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NautobotConfig {
    pub url: String,
    pub token: String,
    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_ssl_verify() -> bool {
    true
}

fn default_api_version() -> String {
    "2.0".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive such as `info` or `veritas_core=debug`.
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSource {
    /// Alternative endpoint schema document. The built-in nautobot schema is
    /// used when absent.
    pub path: Option<PathBuf>,
}

/// Everything the query layer reads from its config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SotConfig {
    pub nautobot: Option<NautobotConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub schema: SchemaSource,
    #[serde(default)]
    pub custom_fields: Vec<CustomFieldDef>,
}

impl SotConfig {
    pub fn from_toml_str(s: &str) -> VeritasResult<Self> {
        toml::from_str(s).map_err(|e| VeritasError::ConfigError {
            reason: format!("failed to parse config TOML: {}", e),
        })
    }

    /// Read the config file at `path`. A relative `[schema].path` is
    /// resolved against the directory holding the config file.
    pub fn load(path: &Path) -> VeritasResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| VeritasError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        let mut config = Self::from_toml_str(&contents)?;

        if let (Some(schema_path), Some(dir)) = (config.schema.path.as_ref(), path.parent()) {
            if schema_path.is_relative() {
                config.schema.path = Some(dir.join(schema_path));
            }
        }

        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Build the schema registry this config describes.
    pub fn registry(&self) -> VeritasResult<SchemaRegistry> {
        let mut registry = match &self.schema.path {
            Some(path) => SchemaRegistry::from_file(path)?,
            None => SchemaRegistry::builtin()?,
        };
        for cf in &self.custom_fields {
            registry.register_custom_field(cf.clone());
        }
        Ok(registry)
    }
}

/// Finds an application's config file.
///
/// Search order, first existing file wins:
///
/// 1. `config_file`, when it is an absolute path
/// 2. `~/.veritas/<subdir>/<appname>/<file>`
/// 3. `<app_path>/<file>`
/// 4. `<app_path>/conf/<file>`
/// 5. `/etc/veritas/<subdir>/<appname>/<file>`
///
/// `<file>` is `config_file` when given, otherwise `<appname>.toml`.
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    appname: String,
    app_path: PathBuf,
    config_file: Option<String>,
    subdir: String,
    home: Option<PathBuf>,
    etc: PathBuf,
}

impl ConfigLocator {
    pub fn new(appname: impl Into<String>, app_path: impl Into<PathBuf>) -> Self {
        Self {
            appname: appname.into(),
            app_path: app_path.into(),
            config_file: None,
            subdir: "miniapps".to_string(),
            home: std::env::var_os("HOME").map(PathBuf::from),
            etc: PathBuf::from("/etc/veritas"),
        }
    }

    pub fn config_file(mut self, file: impl Into<String>) -> Self {
        self.config_file = Some(file.into());
        self
    }

    pub fn subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = subdir.into();
        self
    }

    /// Override the home directory (defaults to `$HOME`).
    pub fn home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Override the system directory (defaults to `/etc/veritas`).
    pub fn etc(mut self, etc: impl Into<PathBuf>) -> Self {
        self.etc = etc.into();
        self
    }

    fn filename(&self) -> String {
        self.config_file
            .clone()
            .unwrap_or_else(|| format!("{}.toml", self.appname))
    }

    /// Every location searched, in precedence order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let filename = self.filename();
        let mut out = Vec::new();

        if let Some(explicit) = &self.config_file {
            let path = PathBuf::from(explicit);
            if path.is_absolute() {
                out.push(path);
            }
        }
        if let Some(home) = &self.home {
            out.push(
                home.join(".veritas")
                    .join(&self.subdir)
                    .join(&self.appname)
                    .join(&filename),
            );
        }
        out.push(self.app_path.join(&filename));
        out.push(self.app_path.join("conf").join(&filename));
        out.push(self.etc.join(&self.subdir).join(&self.appname).join(&filename));
        out
    }

    /// The first candidate that exists.
    pub fn locate(&self) -> Option<PathBuf> {
        self.candidates().into_iter().find(|p| p.is_file())
    }

    /// Locate and load the config file.
    pub fn load(&self) -> VeritasResult<SotConfig> {
        let path = self.locate().ok_or_else(|| VeritasError::ConfigError {
            reason: format!("no config file found for app '{}'", self.appname),
        })?;
        SotConfig::load(&path)
    }
}
