//! The process wide [`AssetStore`].
//!
//! The store is set up in two steps:
//!
//! 1. [`configure`] provides the [`Config`] and the [`Decoders`]. Nothing is read yet.
//! 2. The first call to [`instance`] (or [`get`], [`reload`]) constructs the store and
//!    runs the initial load. Concurrent first calls block until that load is done and
//!    the load runs exactly once.
//!
//! When the initial load fails, the caller that triggered it receives the error and
//! all later calls to [`instance`] and [`get`] fail with [`Error::Unavailable`] until
//! [`reload`] succeeds.
//!
//! # Example
//!
//! ```rust
//! use stash_content::{decoder, global, Config, Decoders};
//! let root = std::env::temp_dir().join("stash_global_doc");
//! std::fs::create_dir_all(&root).unwrap();
//! std::fs::write(root.join("hello.txt"), "Hello World!").unwrap();
//!
//! let decoders = Decoders::new().register::<String>("txt", Box::new(decoder::read_string));
//! global::configure(Config::new(&root), decoders).unwrap();
//! let asset = global::get::<String>("hello.txt").unwrap();
//! assert_eq!(asset.value(), "Hello World!");
//! ```

use stash_shared::{
    log::{error, info},
    once_cell::sync::OnceCell,
    parking_lot::{const_mutex, Mutex},
};

use crate::{Asset, AssetKey, AssetStore, Config, Decoders, Error, LoadReport, Result, StoreState};

#[derive(Clone)]
struct Setup {
    config: Config,
    decoders: Decoders,
}

/// The setup and whether a store is being constructed from it.
struct SetupState {
    setup: Option<Setup>,
    initializing: bool,
}

static SETUP: Mutex<SetupState> = const_mutex(SetupState {
    setup: None,
    initializing: false,
});
static INSTANCE: OnceCell<AssetStore> = OnceCell::new();

/// Sets the configuration that is used when the store is constructed.
///
/// Can be called repeatedly until the construction of the store starts. Afterwards it
/// fails with [`Error::AlreadyConfigured`], also while the initial load is running.
pub fn configure(config: Config, decoders: Decoders) -> Result<()> {
    let mut state = SETUP.lock();
    if state.initializing || INSTANCE.get().is_some() {
        return Err(Error::AlreadyConfigured);
    }
    info!("Configured the global AssetStore for '{}'", config.root.display());
    state.setup = Some(Setup { config, decoders });
    Ok(())
}

/// Returns the process wide [`AssetStore`] and loads it on first access.
///
/// Fails with [`Error::NotConfigured`] when [`configure`] hasn't been called.
pub fn instance() -> Result<&'static AssetStore> {
    let (asset_store, initial_load) = initialize()?;
    if let Some(Err(err)) = initial_load {
        return Err(err);
    }
    if asset_store.state() == StoreState::Failed {
        return Err(Error::Unavailable(asset_store.root().to_owned()));
    }
    Ok(asset_store)
}

/// Returns `true` when the store has been constructed.
pub fn is_initialized() -> bool {
    INSTANCE.get().is_some()
}

/// Returns the asset with the given key from the process wide store.
pub fn get<T>(asset_key: impl Into<AssetKey>) -> Result<Asset<T>>
where
    T: 'static + Send + Sync,
{
    instance()?.get(asset_key)
}

/// Reloads the process wide store.
///
/// This is the way to recover from a failed initial load. When the store hasn't been
/// constructed yet, the initial load is run instead.
pub fn reload() -> Result<LoadReport> {
    let (asset_store, initial_load) = initialize()?;
    match initial_load {
        Some(result) => result,
        None => asset_store.reload(),
    }
}

/// Discards all assets of the process wide store. Does nothing when it hasn't been constructed.
pub fn discard() {
    if let Some(asset_store) = INSTANCE.get() {
        asset_store.discard();
    }
}

/// Constructs the store unless it exists. Returns the result of the initial load when this call ran it.
fn initialize() -> Result<(&'static AssetStore, Option<Result<LoadReport>>)> {
    let mut initial_load = None;
    let asset_store = INSTANCE.get_or_try_init(|| {
        let setup = {
            let mut state = SETUP.lock();
            let Some(setup) = state.setup.clone() else {
                return Err(Error::NotConfigured);
            };
            state.initializing = true;
            setup
        };
        info!("Constructing the global AssetStore");
        let asset_store = match AssetStore::new(setup.config, setup.decoders) {
            Ok(asset_store) => asset_store,
            Err(err) => {
                // Nothing was constructed, so the setup may still be replaced.
                SETUP.lock().initializing = false;
                return Err(err);
            }
        };
        let result = asset_store.load();
        if let Err(err) = &result {
            error!("Initial load of the global AssetStore failed: {err}");
        }
        initial_load = Some(result);
        Ok(asset_store)
    })?;
    Ok((asset_store, initial_load))
}
