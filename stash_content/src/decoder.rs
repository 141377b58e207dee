use std::{
    any::{type_name, Any},
    collections::BTreeMap,
    fs,
    path::Path,
    sync::Arc,
};

use crate::{common::extract_extension_from_path, Error, Result};

/// Decodes the file at the given absolute path into an asset of type `T`.
pub type DecodeFn<T> = dyn Fn(&Path) -> Result<T> + Send + Sync;

type ErasedDecodeFn = dyn Fn(&Path) -> Result<Decoded> + Send + Sync;

/// Type erased result of a decoder.
pub(crate) struct Decoded {
    pub(crate) value: Arc<dyn Any + Send + Sync>,
    pub(crate) type_name: &'static str,
}

/// Maps file extensions to the functions that decode them.
///
/// Extensions are compared in lower case. Files with an extension that has no
/// decoder are handed to the fallback decoder if there is one.
#[derive(Clone, Default)]
pub struct Decoders {
    by_extension: BTreeMap<String, Arc<ErasedDecodeFn>>,
    fallback: Option<Arc<ErasedDecodeFn>>,
}

impl Decoders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a decoder for the given file extension.
    ///
    /// # Panics
    ///
    /// If a decoder for the extension is already registered.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stash_content::{decoder, Decoders};
    /// let decoders = Decoders::new().register::<String>("txt", Box::new(decoder::read_string));
    /// assert!(decoders.is_registered("TXT"));
    /// ```
    pub fn register<T>(mut self, extension: impl Into<String>, decoder: Box<DecodeFn<T>>) -> Self
    where
        T: 'static + Send + Sync,
    {
        let extension = extension.into().to_lowercase();
        if self.by_extension.contains_key(&extension) {
            panic!("decoder for extension '{extension}' already registered");
        }
        self.by_extension.insert(extension, erase(decoder));
        self
    }

    /// Sets the decoder for all files whose extension has no registered decoder.
    pub fn fallback<T>(mut self, decoder: Box<DecodeFn<T>>) -> Self
    where
        T: 'static + Send + Sync,
    {
        self.fallback = Some(erase(decoder));
        self
    }

    /// Returns `true` when a decoder is registered for the extension.
    pub fn is_registered(&self, extension: &str) -> bool {
        self.by_extension.contains_key(&extension.to_lowercase())
    }

    /// Returns the registered extensions in lexicographic order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.by_extension.keys().map(String::as_str)
    }

    pub(crate) fn decode(&self, path: &Path) -> Result<Decoded> {
        let extension = extract_extension_from_path(path).unwrap_or_default();
        let decoder = self
            .by_extension
            .get(&extension)
            .or(self.fallback.as_ref())
            .ok_or(Error::ExtensionNotRegistered(extension))?;
        decoder(path)
    }
}

fn erase<T>(decoder: Box<DecodeFn<T>>) -> Arc<ErasedDecodeFn>
where
    T: 'static + Send + Sync,
{
    Arc::new(move |path| {
        let value = decoder(path)?;
        Ok(Decoded {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        })
    })
}

/// Decoder that keeps the content of the file as it is.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    Ok(fs::read(path)?)
}

/// Decoder for UTF-8 text files.
pub fn read_string(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    String::from_utf8(bytes).map_err(|err| Error::decode(path, err))
}
