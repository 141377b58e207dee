use std::{
    collections::BTreeMap,
    mem,
    path::{Path, PathBuf},
    sync::Arc,
};

use stash_shared::{
    log::{error, info, trace, warn},
    parking_lot::{Mutex, RwLock},
    rayon::{
        iter::{IntoParallelIterator, ParallelIterator},
        ThreadPool, ThreadPoolBuilder,
    },
};

use crate::{
    asset::{Asset, RawAsset},
    AssetKey, Config, Decoders, DirectoryWalker, Error, PathResolver, Result,
};

type AssetIndex = BTreeMap<AssetKey, Arc<RawAsset>>;

/// Lifecycle state of an [`AssetStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Nothing has been loaded or the assets have been discarded.
    Empty,
    /// A load or reload is running. Lookups are served from the previous index.
    Loading,
    /// The index contains the assets of the last successful load.
    Loaded,
    /// The first load failed and nothing can be looked up.
    Failed,
}

/// Summary of a load or reload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Number of assets in the new index.
    pub loaded: usize,
    /// Number of files and directory entries that were skipped because of an error.
    pub skipped: usize,
    /// Number of assets that replaced an earlier file with the same key.
    pub overwritten: usize,
}

/// Decodes every file below the asset root and makes the results available by their [`AssetKey`].
///
/// Loading never modifies the index that lookups see. A new index is built from
/// scratch and published with a single swap when it is complete, so readers see
/// either all old or all new assets.
///
/// Files that fail to decode are logged and skipped. When two files resolve to the
/// same key, the file that comes later in the walk replaces the earlier one.
pub struct AssetStore {
    config: Config,
    resolver: PathResolver,
    decoders: Decoders,
    thread_pool: ThreadPool,
    index: RwLock<Arc<AssetIndex>>,
    state: RwLock<StoreState>,
    /// Serializes load, reload and discard.
    load_lock: Mutex<()>,
}

impl AssetStore {
    /// Creates an empty [`AssetStore`]. Nothing is read until [`AssetStore::load`] is called.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stash_content::{decoder, AssetStore, Config, Decoders};
    /// let root = std::env::temp_dir().join("stash_store_doc");
    /// std::fs::create_dir_all(root.join("text")).unwrap();
    /// std::fs::write(root.join("text").join("hello.txt"), "Hello World!").unwrap();
    ///
    /// let decoders = Decoders::new().register::<String>("txt", Box::new(decoder::read_string));
    /// let asset_store = AssetStore::new(Config::new(&root), decoders).unwrap();
    /// asset_store.load().unwrap();
    /// let asset = asset_store.get::<String>("text/hello.txt").unwrap();
    /// assert_eq!(asset.value(), "Hello World!");
    /// ```
    pub fn new(config: Config, decoders: Decoders) -> Result<Self> {
        let root = config.absolute_root()?;
        let resolver = PathResolver::new(&root).case_sensitive(config.case_sensitive);

        info!("Create thread pool with {} threads for AssetStore", config.decode_threads);
        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(config.decode_threads)
            .thread_name(|index| format!("AssetStore decode thread {index}"))
            .build()
            .map_err(|_| Error::FailedToStartThreadPool)?;

        info!("Creating AssetStore for '{}'", resolver.root().display());
        Ok(Self {
            config,
            resolver,
            decoders,
            thread_pool,
            index: RwLock::new(Arc::new(AssetIndex::new())),
            state: RwLock::new(StoreState::Empty),
            load_lock: Mutex::new(()),
        })
    }

    /// Loads all assets below the root.
    ///
    /// Fails with [`Error::DirectoryNotFound`] when the root doesn't exist. In that case
    /// a store that was loaded before keeps its assets and every other store ends up in
    /// [`StoreState::Failed`].
    pub fn load(&self) -> Result<LoadReport> {
        self.rebuild("Loading")
    }

    /// Replaces all assets with freshly decoded ones.
    ///
    /// The previous assets stay visible until the new ones are complete and remain in
    /// place when the reload fails.
    pub fn reload(&self) -> Result<LoadReport> {
        self.rebuild("Reloading")
    }

    /// Removes all assets. Lookups fail until the next load.
    pub fn discard(&self) {
        let _guard = self.load_lock.lock();
        let previous = mem::replace(&mut *self.index.write(), Arc::new(AssetIndex::new()));
        *self.state.write() = StoreState::Empty;
        info!("Discarded {} assets of '{}'", previous.len(), self.root().display());
    }

    /// Returns the asset with the given key.
    ///
    /// The key is normalized like the keys of the files, so `textures\a.png` and
    /// `./textures/a.png` both address `textures/a.png`. Fails with
    /// [`Error::AssetNotFound`] when there is no such asset and with
    /// [`Error::TypeMismatch`] when the asset wasn't decoded into a `T`.
    pub fn get<T>(&self, asset_key: impl Into<AssetKey>) -> Result<Asset<T>>
    where
        T: 'static + Send + Sync,
    {
        let asset_key = self.resolver.normalize_key(asset_key.into());
        let raw_asset = self.index.read().get(&asset_key).cloned();
        match raw_asset {
            Some(raw_asset) => raw_asset.downcast(),
            None => Err(Error::AssetNotFound(asset_key)),
        }
    }

    /// Returns `true` when an asset with the given key is loaded.
    pub fn contains(&self, asset_key: impl Into<AssetKey>) -> bool {
        let asset_key = self.resolver.normalize_key(asset_key.into());
        self.index.read().contains_key(&asset_key)
    }

    /// Returns the keys of all loaded assets in lexicographic order.
    pub fn keys(&self) -> Vec<AssetKey> {
        self.snapshot().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    pub fn state(&self) -> StoreState {
        *self.state.read()
    }

    /// Absolute root directory that is scanned.
    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn snapshot(&self) -> Arc<AssetIndex> {
        self.index.read().clone()
    }

    fn rebuild(&self, activity: &str) -> Result<LoadReport> {
        let _guard = self.load_lock.lock();
        let previous_state = mem::replace(&mut *self.state.write(), StoreState::Loading);
        info!("{activity} assets from '{}'", self.root().display());

        match self.build_index() {
            Ok((index, report)) => {
                let previous = mem::replace(&mut *self.index.write(), Arc::new(index));
                *self.state.write() = StoreState::Loaded;
                info! {
                    "Loaded {} assets from '{}' ({} skipped, {} overwritten, {} replaced)",
                    report.loaded,
                    self.root().display(),
                    report.skipped,
                    report.overwritten,
                    previous.len()
                }
                Ok(report)
            }
            Err(err) => {
                let state = match previous_state {
                    StoreState::Loaded => StoreState::Loaded,
                    _ => StoreState::Failed,
                };
                *self.state.write() = state;
                error!("Failed to load assets from '{}': {err}", self.root().display());
                Err(err)
            }
        }
    }

    fn build_index(&self) -> Result<(AssetIndex, LoadReport)> {
        let walker = DirectoryWalker::new(self.root()).follow_links(self.config.follow_links);
        let mut walk = walker.walk()?;
        let paths = walk.by_ref().collect::<Vec<PathBuf>>();
        let mut report = LoadReport {
            skipped: walk.skipped(),
            ..LoadReport::default()
        };
        trace!("Found {} files to decode", paths.len());

        // The results keep the walk order so that the tie-break for equal keys doesn't depend on the threads.
        let resolver = &self.resolver;
        let decoders = &self.decoders;
        let decoded = self.thread_pool.install(|| {
            paths
                .into_par_iter()
                .map(|path| {
                    let result = resolver
                        .resolve(&path)
                        .and_then(|asset_key| decoders.decode(&path).map(|decoded| (asset_key, decoded)));
                    (path, result)
                })
                .collect::<Vec<_>>()
        });

        let mut index = AssetIndex::new();
        for (path, result) in decoded {
            match result {
                Ok((asset_key, decoded)) => {
                    trace!("Decoded '{}' as {asset_key}", path.display());
                    let raw_asset = Arc::new(RawAsset::new(asset_key.clone(), decoded));
                    if let Some(replaced) = index.insert(asset_key, raw_asset) {
                        warn! {
                            "'{}' replaces the earlier file with the key {} which was decoded as {}",
                            path.display(),
                            replaced.asset_key(),
                            replaced.type_name()
                        }
                        report.overwritten += 1;
                    }
                }
                Err(err) => {
                    warn!("Skipping '{}': {err}", path.display());
                    report.skipped += 1;
                }
            }
        }
        report.loaded = index.len();
        Ok((index, report))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
        thread,
    };

    use stash_test::{create_asset_tree, setup_logger, write_file};
    use tempdir::TempDir;

    use super::*;
    use crate::decoder;

    /// Decoder that pretends to decode images and fails for everything that isn't one.
    fn decode_texture(path: &Path) -> Result<String> {
        let content = decoder::read_string(path)?;
        match content.strip_prefix("PNG:") {
            Some(pixels) => Ok(pixels.to_owned()),
            None => Err(Error::decode(path, "missing PNG header")),
        }
    }

    fn texture_decoders() -> Decoders {
        Decoders::new().fallback::<String>(Box::new(decode_texture))
    }

    fn create_store(root: &Path) -> AssetStore {
        setup_logger();
        AssetStore::new(Config::new(root).with_decode_threads(2), texture_decoders()).unwrap()
    }

    #[test]
    fn new_store_is_empty() {
        let root = TempDir::new("stash_store").unwrap();
        let asset_store = create_store(root.path());
        assert_eq!(asset_store.state(), StoreState::Empty);
        assert!(asset_store.is_empty());
        assert!(matches!(asset_store.get::<String>("a.png"), Err(Error::AssetNotFound(_))));
    }

    #[test]
    fn load_skips_undecodable_files() {
        let root = TempDir::new("stash_store").unwrap();
        create_asset_tree(
            root.path(),
            &[
                ("textures/a.png", "PNG:a"),
                ("textures/sub/b.png", "PNG:b"),
                ("readme.txt", "not a texture"),
            ],
        );
        let asset_store = create_store(root.path());

        let report = asset_store.load().unwrap();
        assert_eq!(report, LoadReport { loaded: 2, skipped: 1, overwritten: 0 });
        assert_eq!(asset_store.state(), StoreState::Loaded);
        assert_eq!(asset_store.len(), 2);
        assert_eq!(asset_store.get::<String>("textures/a.png").unwrap().value(), "a");
        assert_eq!(asset_store.get::<String>("textures/sub/b.png").unwrap().value(), "b");
        assert!(matches!(asset_store.get::<String>("readme.txt"), Err(Error::AssetNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn load_skips_file_names_that_are_not_utf8() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        setup_logger();
        let root = TempDir::new("stash_store").unwrap();
        write_file(root.path(), "ok.txt", "ok");
        fs::write(root.path().join(OsStr::from_bytes(b"bad\xff.txt")), "bad").unwrap();
        let decoders = Decoders::new().register::<String>("txt", Box::new(decoder::read_string));
        let asset_store = AssetStore::new(Config::new(root.path()), decoders).unwrap();

        let report = asset_store.load().unwrap();
        assert_eq!(report, LoadReport { loaded: 1, skipped: 1, overwritten: 0 });
        assert_eq!(asset_store.state(), StoreState::Loaded);
        assert_eq!(asset_store.keys(), vec![AssetKey::new("ok.txt")]);
        assert_eq!(asset_store.get::<String>("ok.txt").unwrap().value(), "ok");
    }

    #[test]
    fn unknown_keys_are_not_found() {
        let root = TempDir::new("stash_store").unwrap();
        create_asset_tree(root.path(), &[("a.png", "PNG:a")]);
        let asset_store = create_store(root.path());
        asset_store.load().unwrap();
        for key in ["b.png", "a", "", "../a.png", "A.png"] {
            assert!(matches!(asset_store.get::<String>(key), Err(Error::AssetNotFound(_))), "key: {key}");
        }
    }

    #[test]
    fn lookup_keys_are_normalized() {
        let root = TempDir::new("stash_store").unwrap();
        create_asset_tree(root.path(), &[("textures/a.png", "PNG:a")]);
        let asset_store = create_store(root.path());
        asset_store.load().unwrap();
        assert!(asset_store.get::<String>("textures\\a.png").is_ok());
        assert!(asset_store.get::<String>("./textures//a.png").is_ok());
        assert!(asset_store.contains(Path::new("textures/a.png")));
        assert_eq!(asset_store.keys(), vec![AssetKey::new("textures/a.png")]);
    }

    #[test]
    fn type_mismatch() {
        let root = TempDir::new("stash_store").unwrap();
        create_asset_tree(root.path(), &[("a.png", "PNG:a")]);
        let asset_store = create_store(root.path());
        asset_store.load().unwrap();
        assert!(matches!(asset_store.get::<Vec<u8>>("a.png"), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn typed_decoders_per_extension() {
        let root = TempDir::new("stash_store").unwrap();
        create_asset_tree(root.path(), &[("a.txt", "text"), ("b.bin", "bytes"), ("c.unknown", "?")]);
        let decoders = Decoders::new()
            .register::<String>("txt", Box::new(decoder::read_string))
            .register::<Vec<u8>>("bin", Box::new(decoder::read_bytes));
        let asset_store = AssetStore::new(Config::new(root.path()), decoders).unwrap();

        let report = asset_store.load().unwrap();
        assert_eq!(report, LoadReport { loaded: 2, skipped: 1, overwritten: 0 });
        assert_eq!(asset_store.get::<String>("a.txt").unwrap().value(), "text");
        assert_eq!(asset_store.get::<Vec<u8>>("b.bin").unwrap().value(), b"bytes");
    }

    #[test]
    fn reload_is_idempotent() {
        let root = TempDir::new("stash_store").unwrap();
        create_asset_tree(root.path(), &[("a.png", "PNG:a"), ("sub/b.png", "PNG:b"), ("sub/deeper/c.png", "PNG:c")]);
        let asset_store = create_store(root.path());
        asset_store.load().unwrap();

        let first_report = asset_store.reload().unwrap();
        let first_keys = asset_store.keys();
        let first_values = first_keys
            .iter()
            .map(|key| asset_store.get::<String>(key).unwrap().value().clone())
            .collect::<Vec<_>>();

        let second_report = asset_store.reload().unwrap();
        let second_keys = asset_store.keys();
        let second_values = second_keys
            .iter()
            .map(|key| asset_store.get::<String>(key).unwrap().value().clone())
            .collect::<Vec<_>>();

        assert_eq!(first_report, second_report);
        assert_eq!(first_keys, second_keys);
        assert_eq!(first_values, second_values);
        assert_eq!(first_values, vec!["a", "b", "c"]);
    }

    #[test]
    fn reload_picks_up_changes() {
        let root = TempDir::new("stash_store").unwrap();
        create_asset_tree(root.path(), &[("a.png", "PNG:a"), ("b.png", "PNG:b")]);
        let asset_store = create_store(root.path());
        asset_store.load().unwrap();
        let old_handle = asset_store.get::<String>("a.png").unwrap();

        write_file(root.path(), "a.png", "PNG:a2");
        fs::remove_file(root.path().join("b.png")).unwrap();
        write_file(root.path(), "c.png", "PNG:c");
        asset_store.reload().unwrap();

        assert_eq!(asset_store.get::<String>("a.png").unwrap().value(), "a2");
        assert!(matches!(asset_store.get::<String>("b.png"), Err(Error::AssetNotFound(_))));
        assert_eq!(asset_store.get::<String>("c.png").unwrap().value(), "c");

        // Handles from before the reload still refer to the old value.
        assert_eq!(old_handle.value(), "a");
    }

    #[test]
    fn discard() {
        let root = TempDir::new("stash_store").unwrap();
        create_asset_tree(root.path(), &[("a.png", "PNG:a"), ("sub/b.png", "PNG:b")]);
        let asset_store = create_store(root.path());
        asset_store.load().unwrap();
        let keys = asset_store.keys();
        assert_eq!(keys.len(), 2);

        asset_store.discard();
        assert_eq!(asset_store.state(), StoreState::Empty);
        for key in &keys {
            assert!(matches!(asset_store.get::<String>(key), Err(Error::AssetNotFound(_))));
        }

        asset_store.load().unwrap();
        assert_eq!(asset_store.keys(), keys);
    }

    #[test]
    fn missing_root_on_first_load() {
        let root = TempDir::new("stash_store").unwrap();
        let asset_store = create_store(&root.path().join("missing"));
        assert!(matches!(asset_store.load(), Err(Error::DirectoryNotFound(_))));
        assert_eq!(asset_store.state(), StoreState::Failed);
        assert!(asset_store.is_empty());

        // A successful reload makes the store usable again.
        create_asset_tree(&root.path().join("missing"), &[("a.png", "PNG:a")]);
        asset_store.reload().unwrap();
        assert_eq!(asset_store.state(), StoreState::Loaded);
        assert!(asset_store.get::<String>("a.png").is_ok());
    }

    #[test]
    fn missing_root_on_reload_keeps_assets() {
        let parent = TempDir::new("stash_store").unwrap();
        let root = parent.path().join("assets");
        create_asset_tree(&root, &[("a.png", "PNG:a")]);
        let asset_store = create_store(&root);
        asset_store.load().unwrap();

        fs::remove_dir_all(&root).unwrap();
        assert!(matches!(asset_store.reload(), Err(Error::DirectoryNotFound(_))));
        assert_eq!(asset_store.state(), StoreState::Loaded);
        assert_eq!(asset_store.get::<String>("a.png").unwrap().value(), "a");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn case_insensitive_collision_last_write_wins() {
        let root = TempDir::new("stash_store").unwrap();
        create_asset_tree(root.path(), &[("A/x.png", "PNG:upper"), ("a/x.png", "PNG:lower")]);
        let config = Config::new(root.path()).with_case_sensitive(false);
        let asset_store = AssetStore::new(config, texture_decoders()).unwrap();

        let report = asset_store.load().unwrap();
        assert_eq!(report, LoadReport { loaded: 1, skipped: 0, overwritten: 1 });
        // "A" is visited before "a", so the lower case directory wins.
        assert_eq!(asset_store.get::<String>("a/x.png").unwrap().value(), "lower");
        assert_eq!(asset_store.get::<String>("A/X.PNG").unwrap().value(), "lower");
        assert_eq!(asset_store.keys(), vec![AssetKey::new("a/x.png")]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn case_sensitive_keys_do_not_collide() {
        let root = TempDir::new("stash_store").unwrap();
        create_asset_tree(root.path(), &[("A/x.png", "PNG:upper"), ("a/x.png", "PNG:lower")]);
        let asset_store = create_store(root.path());
        asset_store.load().unwrap();
        assert_eq!(asset_store.get::<String>("A/x.png").unwrap().value(), "upper");
        assert_eq!(asset_store.get::<String>("a/x.png").unwrap().value(), "lower");
    }

    #[test]
    fn every_decoded_file_can_be_looked_up() {
        let root = TempDir::new("stash_store").unwrap();
        let files = (0..50)
            .map(|index| (format!("dir{}/file{index}.png", index % 7), format!("PNG:{index}")))
            .collect::<Vec<_>>();
        for (relative_path, content) in &files {
            write_file(root.path(), relative_path, content);
        }
        let asset_store = create_store(root.path());
        assert_eq!(asset_store.load().unwrap().loaded, files.len());
        for (relative_path, content) in &files {
            let asset = asset_store.get::<String>(relative_path.as_str()).unwrap();
            assert_eq!(format!("PNG:{}", asset.value()), *content);
        }
    }

    #[test]
    fn readers_never_see_a_partial_index_during_reload() {
        let root = TempDir::new("stash_store").unwrap();
        let keys = (0..20).map(|index| format!("file{index}.png")).collect::<Vec<_>>();
        for key in &keys {
            write_file(root.path(), key, "PNG:x");
        }
        let asset_store = create_store(root.path());
        asset_store.load().unwrap();

        let done = AtomicBool::new(false);
        let lookups = AtomicUsize::new(0);
        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| loop {
                    for key in &keys {
                        assert!(asset_store.get::<String>(key.as_str()).is_ok(), "{key} missing during reload");
                        lookups.fetch_add(1, Ordering::Relaxed);
                    }
                    assert_eq!(asset_store.len(), keys.len());
                    if done.load(Ordering::SeqCst) {
                        break;
                    }
                });
            }
            for _ in 0..10 {
                asset_store.reload().unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });
        assert!(lookups.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn discard_during_lookups_does_not_crash() {
        let root = TempDir::new("stash_store").unwrap();
        create_asset_tree(root.path(), &[("a.png", "PNG:a")]);
        let asset_store = create_store(root.path());
        asset_store.load().unwrap();

        thread::scope(|scope| {
            let reader = scope.spawn(|| {
                for _ in 0..1000 {
                    match asset_store.get::<String>("a.png") {
                        Ok(asset) => assert_eq!(asset.value(), "a"),
                        Err(err) => assert!(matches!(err, Error::AssetNotFound(_))),
                    }
                }
            });
            for _ in 0..10 {
                asset_store.discard();
                asset_store.load().unwrap();
            }
            reader.join().unwrap();
        });
    }
}
