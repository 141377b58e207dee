//! # Overview
//!
//! Crate for keeping all assets of a directory decoded in memory.
//!
//! An [`AssetStore`] scans its root directory recursively, decodes every file with
//! the [`Decoders`] registered for its extension and indexes the result by the
//! [`AssetKey`] of the file. The key is the path of the file relative to the root,
//! always separated by `/`, no matter on which platform the assets were scanned.
//!
//! ## Example:
//!
//! **Root Directory:**
//!
//! ```text
//! assets/
//! ├─ textures/
//! │  ├─ a.png
//! │  ├─ sub/
//! │  │  ├─ b.png
//! ├─ readme.txt
//! ```
//!
//! **Keys:**
//!
//! ```text
//! textures/a.png
//! textures/sub/b.png
//! readme.txt
//! ```
//!
//! Files that can't be decoded are skipped and logged, so a single broken file
//! doesn't keep the other assets from being available.
//!
//! # Components
//!
//! - [`DirectoryWalker`] enumerates the files below the root in a stable order.
//! - [`PathResolver`] turns the path of a file into its [`AssetKey`].
//! - [`Decoders`] maps file extensions to the functions that decode the files.
//! - [`AssetStore`] owns the index and handles load, reload, discard and lookups.
//! - [`global`] provides the one [`AssetStore`] of the process.

mod asset;
mod asset_store;
mod common;
mod config;
mod directory_walker;
mod path_resolver;

pub mod decoder;
pub mod global;

pub use asset::Asset;
pub use asset_store::{AssetStore, LoadReport, StoreState};
pub use common::{AssetKey, Error, Result};
pub use config::*;
pub use decoder::{DecodeFn, Decoders};
pub use directory_walker::{DirectoryWalker, Walk};
pub use path_resolver::PathResolver;
