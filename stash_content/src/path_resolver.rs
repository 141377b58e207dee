use std::path::{Component, Path, PathBuf};

use stash_shared::pathdiff;

use crate::{AssetKey, Error, Result};

/// Derives [`AssetKey`]s from paths below the asset root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    case_sensitive: bool,
}

impl PathResolver {
    /// Creates a case sensitive [`PathResolver`] for the given root directory.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stash_content::PathResolver;
    /// let root = std::env::temp_dir().join("assets");
    /// let resolver = PathResolver::new(&root);
    /// let asset_key = resolver.resolve(&root.join("textures").join("a.png")).unwrap();
    /// assert_eq!(asset_key.as_str(), "textures/a.png");
    /// ```
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: normalize_lexically(root.as_ref()),
            case_sensitive: true,
        }
    }

    /// When `case_sensitive` is false, all keys are lower case and paths that only differ in case map to the same key.
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Returns the normalized root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the path of a file below the root into its [`AssetKey`].
    ///
    /// Both paths are normalized lexically before the root is removed, so `.` and `..`
    /// components are allowed as long as the result is still located below the root.
    /// Fails with [`Error::InvalidPath`] when the path is not below the root, is the
    /// root itself or contains components that are not valid UTF-8.
    pub fn resolve(&self, path: &Path) -> Result<AssetKey> {
        let invalid = || Error::InvalidPath {
            path: path.to_owned(),
            root: self.root.clone(),
        };

        let normalized = normalize_lexically(path);
        let relative = pathdiff::diff_paths(&normalized, &self.root).ok_or_else(invalid)?;

        // Anything other than plain names means that the path leaves the root.
        let mut components = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => components.push(name.to_str().ok_or_else(invalid)?),
                _ => return Err(invalid()),
            }
        }
        if components.is_empty() {
            return Err(invalid());
        }

        Ok(self.normalize_key(AssetKey::new(components.join("/"))))
    }

    /// Applies the case policy of the resolver to a key given by a consumer.
    pub fn normalize_key(&self, asset_key: AssetKey) -> AssetKey {
        if self.case_sensitive {
            asset_key
        } else {
            asset_key.to_lowercase()
        }
    }

    /// Returns the path of the file that the key was resolved from.
    pub fn absolute_path(&self, asset_key: &AssetKey) -> PathBuf {
        asset_key.to_path(&self.root)
    }
}

/// Removes `.` components and resolves `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let ends_with_name = matches!(normalized.components().next_back(), Some(Component::Normal(_)));
                if ends_with_name {
                    normalized.pop();
                } else if !normalized.has_root() {
                    // There is nothing above the root but a relative path may start with `..`.
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
