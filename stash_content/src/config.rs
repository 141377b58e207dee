use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable that contains the asset root.
pub const ASSET_PATH_VAR: &str = "STASH_ASSET_PATH";
pub const CASE_SENSITIVE_VAR: &str = "STASH_CASE_SENSITIVE";
pub const FOLLOW_LINKS_VAR: &str = "STASH_FOLLOW_LINKS";
pub const DECODE_THREADS_VAR: &str = "STASH_DECODE_THREADS";

/// Configuration of an [`AssetStore`](crate::AssetStore).
///
/// # Example
///
/// ```rust
/// use stash_content::Config;
/// let config = Config::from_yaml_str("root: assets\ncase_sensitive: false").unwrap();
/// assert_eq!(config, Config::new("assets").with_case_sensitive(false));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory that is scanned for assets. Relative paths are relative to the working directory.
    pub root: PathBuf,

    /// When `false`, keys are lower case and lookups ignore case.
    #[serde(default = "default_true")]
    pub case_sensitive: bool,

    /// Whether symbolic links are followed while scanning the root.
    #[serde(default = "default_true")]
    pub follow_links: bool,

    /// Number of threads that decode assets. `0` lets the thread pool decide.
    #[serde(default)]
    pub decode_threads: usize,
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            case_sensitive: true,
            follow_links: true,
            decode_threads: 0,
        }
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    pub fn with_decode_threads(mut self, decode_threads: usize) -> Self {
        self.decode_threads = decode_threads;
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|err| Error::Config(err.to_string()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Reads the configuration from the `STASH_*` environment variables.
    ///
    /// [`ASSET_PATH_VAR`] is required, all other variables are optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration from variables that are provided by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let root = lookup(ASSET_PATH_VAR).ok_or_else(|| Error::Config(format!("'{ASSET_PATH_VAR}' is not set")))?;
        let mut config = Self::new(root);
        if let Some(value) = lookup(CASE_SENSITIVE_VAR) {
            config.case_sensitive = parse_bool(CASE_SENSITIVE_VAR, &value)?;
        }
        if let Some(value) = lookup(FOLLOW_LINKS_VAR) {
            config.follow_links = parse_bool(FOLLOW_LINKS_VAR, &value)?;
        }
        if let Some(value) = lookup(DECODE_THREADS_VAR) {
            config.decode_threads = value
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("'{DECODE_THREADS_VAR}' must be a number but is '{value}'")))?;
        }
        Ok(config)
    }

    /// Returns the root as an absolute path.
    pub fn absolute_root(&self) -> Result<PathBuf> {
        if self.root.is_absolute() {
            Ok(self.root.clone())
        } else {
            Ok(env::current_dir()?.join(&self.root))
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("'{name}' must be a boolean but is '{value}'"))),
    }
}
