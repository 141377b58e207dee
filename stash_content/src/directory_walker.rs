use std::path::{Path, PathBuf};

use stash_shared::{
    log::{trace, warn},
    walkdir::{self, WalkDir},
};

use crate::{Error, Result};

/// Enumerates all regular files below a root directory.
///
/// Entries of every directory are visited in lexicographic order of their file names,
/// so two walks over an unchanged tree yield the same sequence.
///
/// Symbolic links are followed by default. A link that points to one of its own
/// ancestors would make the walk endless, so such a link is reported as
/// [`Error::CyclicPath`] in the log, counted as skipped and not descended into.
/// When links are not followed, they are neither files nor directories and are ignored.
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    root: PathBuf,
    follow_links: bool,
}

impl DirectoryWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_links: true,
        }
    }

    /// Sets whether symbolic links are followed.
    pub fn follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts the walk. Fails with [`Error::DirectoryNotFound`] when the root is missing or isn't a directory.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stash_content::DirectoryWalker;
    /// let root = std::env::temp_dir().join("stash_walker_doc");
    /// std::fs::create_dir_all(root.join("sub")).unwrap();
    /// std::fs::write(root.join("sub").join("a.txt"), "a").unwrap();
    /// let files = DirectoryWalker::new(&root).walk().unwrap().collect::<Vec<_>>();
    /// assert_eq!(files, vec![root.join("sub").join("a.txt")]);
    /// ```
    pub fn walk(&self) -> Result<Walk> {
        if !self.root.is_dir() {
            return Err(Error::DirectoryNotFound(self.root.clone()));
        }
        let inner = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter();
        Ok(Walk { inner, skipped: 0 })
    }
}

/// Iterator over the absolute paths of the files found by a [`DirectoryWalker`].
pub struct Walk {
    inner: walkdir::IntoIter,
    skipped: usize,
}

impl Walk {
    /// Number of entries that could not be visited so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for Walk {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(entry) => {
                    if entry.file_type().is_file() {
                        trace!("Found file '{}'", entry.path().display());
                        return Some(entry.into_path());
                    }
                }
                Err(err) => {
                    self.skipped += 1;
                    match (err.path(), err.loop_ancestor()) {
                        (Some(path), Some(_ancestor)) => {
                            warn!("Skipping subtree: {}", Error::CyclicPath(path.to_owned()));
                        }
                        (path, _) => {
                            let path = path.map(|path| path.display().to_string()).unwrap_or_default();
                            warn!("Skipping unreadable entry '{path}': {err}");
                        }
                    }
                }
            }
        }
    }
}
