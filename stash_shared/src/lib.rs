//! Dependencies shared by all stash crates.
//!
//! The crates of the workspace import these through `stash_shared` so that they
//! always agree on the versions in use.

pub use derive_where;
pub use indoc;
pub use log;
pub use once_cell;
pub use parking_lot;
pub use pathdiff;
pub use rayon;
pub use walkdir;
