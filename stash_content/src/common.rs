use std::{
    fmt::{self, Formatter},
    io,
    path::{Path, PathBuf},
    result,
};

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("Invalid path '{path}' for root '{root}'")]
    InvalidPath { path: PathBuf, root: PathBuf },
    #[error("Cyclic path: {0}")]
    CyclicPath(PathBuf),
    #[error("Failed to decode '{path}': {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("Extension not registered: {0}")]
    ExtensionNotRegistered(String),
    #[error("Asset not found: {0}")]
    AssetNotFound(AssetKey),
    #[error("Asset {key} has type {found} but {expected} was requested")]
    TypeMismatch {
        key: AssetKey,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("The global asset store has not been configured")]
    NotConfigured,
    #[error("The global asset store has already been initialized")]
    AlreadyConfigured,
    #[error("The global asset store is unavailable because loading '{0}' failed")]
    Unavailable(PathBuf),
    #[error("Failed to start thread pool")]
    FailedToStartThreadPool,
    #[error("IoError: {0}")]
    IoError(#[from] io::Error),
}

impl Error {
    /// Creates an [`Error::Decode`] for the file at `path`.
    pub fn decode(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Identifies the asset. It's the path of the asset file relative to the asset root.
///
/// The key is always stored in its normalized form: components are separated by a
/// single `/`, there is no leading separator and neither empty nor `.` components
/// remain. Backslashes are treated as separators so that keys written on Windows
/// address the same assets everywhere.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetKey(String);

impl AssetKey {
    /// Creates a new [`AssetKey`] from a relative path and normalizes it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stash_content::AssetKey;
    /// let asset_key = AssetKey::new("./textures\\sub//character.png");
    /// assert_eq!(asset_key.as_str(), "textures/sub/character.png");
    /// ```
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy().replace('\\', "/");
        let key = path
            .split('/')
            .filter(|component| !component.is_empty() && *component != ".")
            .collect::<Vec<_>>()
            .join("/");
        Self(key)
    }

    /// Returns the key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key as a relative path.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use std::ffi::OsStr;
    /// use stash_content::AssetKey;
    /// let asset_key = AssetKey::new("textures/character.png");
    /// assert_eq!(asset_key.as_path().extension(), Some(OsStr::new("png")));
    /// ```
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Joins the key onto `root` using the separator of the platform.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use std::path::Path;
    /// use stash_content::AssetKey;
    /// let asset_key = AssetKey::new("textures/character.png");
    /// assert_eq!(asset_key.to_path(Path::new("/assets")), Path::new("/assets").join("textures").join("character.png"));
    /// ```
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |path, component| path.join(component))
    }

    /// Returns the key with all characters in lower case.
    pub fn to_lowercase(&self) -> Self {
        Self(self.0.to_lowercase())
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "AssetKey({})", self.as_str())
    }
}

impl From<&str> for AssetKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AssetKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&Path> for AssetKey {
    fn from(value: &Path) -> Self {
        Self::new(value)
    }
}

impl From<&AssetKey> for AssetKey {
    fn from(value: &AssetKey) -> Self {
        value.clone()
    }
}

/// Returns the lower case extension of the file at `path`.
pub(crate) fn extract_extension_from_path(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_lowercase())
}
