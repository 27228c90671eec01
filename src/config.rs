//! Loads the server [`Config`] from a YAML file, with environment variable
//! overrides:
//!
//! ```yaml
//! listen_addr: "127.0.0.1:8080"
//! content_dir: content
//! static_dir: static
//! development: false
//! reload_cooldown_secs: 5
//! ```
//!
//! Relative directories in the file are resolved against the directory
//! holding the file.

use crate::util::open;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variable overriding [`Config::listen_addr`].
pub const LISTEN_ADDR_VAR: &str = "LISTEN_ADDR";

/// Environment variable overriding [`Config::content_dir`].
pub const CONTENT_DIR_VAR: &str = "CONTENT_DIR";

/// Environment variable overriding [`Config::static_dir`].
pub const STATIC_DIR_VAR: &str = "STATIC_DIR";

/// Environment variable overriding [`Config::development`]. Only `1` enables
/// development mode.
pub const DEVELOPMENT_VAR: &str = "DEVELOPMENT";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The address the server listens on.
    pub listen_addr: String,

    /// The root of the content tree.
    pub content_dir: PathBuf,

    /// The directory served under `/static/`.
    pub static_dir: PathBuf,

    /// Reload the content before every content request.
    pub development: bool,

    /// The minimum number of seconds between two reloads requested through
    /// the reload endpoint.
    pub reload_cooldown_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: String::from("127.0.0.1:8080"),
            content_dir: PathBuf::from("content"),
            static_dir: PathBuf::from("static"),
            development: false,
            reload_cooldown_secs: 5,
        }
    }
}

impl Config {
    /// Reads the config file at `path`, applies environment overrides, and
    /// validates the result.
    pub fn from_file(path: &Path) -> Result<Config> {
        info!(path = %path.display(), "loading config");
        let mut config: Config = serde_yaml::from_reader(open(path, "config")?)
            .map_err(|e| {
                anyhow!("Parsing config file `{}`: {}", path.display(), e)
            })?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses a config from YAML text, resolving relative directories against
    /// `base`.
    pub fn from_yaml(text: &str, base: &Path) -> Result<Config> {
        let mut config: Config = serde_yaml::from_str(text)?;
        config.resolve_relative_to(base);
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        if self.content_dir.is_relative() {
            self.content_dir = base.join(&self.content_dir);
        }
        if self.static_dir.is_relative() {
            self.static_dir = base.join(&self.static_dir);
        }
    }

    /// Overrides fields from environment variables. `var` looks a variable
    /// up by name; empty values are ignored.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, var: F) {
        let var = |name: &str| var(name).filter(|value| !value.is_empty());
        if let Some(value) = var(LISTEN_ADDR_VAR) {
            info!(var = LISTEN_ADDR_VAR, value = %value, "config override");
            self.listen_addr = value;
        }
        if let Some(value) = var(CONTENT_DIR_VAR) {
            info!(var = CONTENT_DIR_VAR, value = %value, "config override");
            self.content_dir = PathBuf::from(value);
        }
        if let Some(value) = var(STATIC_DIR_VAR) {
            info!(var = STATIC_DIR_VAR, value = %value, "config override");
            self.static_dir = PathBuf::from(value);
        }
        if let Some(value) = var(DEVELOPMENT_VAR) {
            info!(var = DEVELOPMENT_VAR, value = %value, "config override");
            self.development = value == "1";
        }
    }

    /// Checks that the config is usable before anything is started.
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            return Err(anyhow!("`listen_addr` must not be empty"));
        }
        if !self.content_dir.is_dir() {
            return Err(anyhow!(
                "Content directory `{}` not found",
                self.content_dir.display()
            ));
        }
        if !self.static_dir.is_dir() {
            return Err(anyhow!(
                "Static directory `{}` not found",
                self.static_dir.display()
            ));
        }
        Ok(())
    }

    pub fn reload_cooldown(&self) -> Duration {
        Duration::from_secs(self.reload_cooldown_secs)
    }
}
