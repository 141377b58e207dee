use std::{
    any::{type_name, Any},
    fmt,
    sync::Arc,
};

use stash_shared::derive_where::derive_where;

use crate::{decoder::Decoded, AssetKey, Error, Result};

/// Decoded asset as it is stored in the index.
pub(crate) struct RawAsset {
    asset_key: AssetKey,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl RawAsset {
    pub(crate) fn new(asset_key: AssetKey, decoded: Decoded) -> Self {
        Self {
            asset_key,
            type_name: decoded.type_name,
            value: decoded.value,
        }
    }

    pub(crate) fn asset_key(&self) -> &AssetKey {
        &self.asset_key
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns a typed handle when the asset was decoded into a `T`.
    pub(crate) fn downcast<T>(&self) -> Result<Asset<T>>
    where
        T: 'static + Send + Sync,
    {
        match self.value.clone().downcast::<T>() {
            Ok(value) => Ok(Asset {
                asset_key: self.asset_key.clone(),
                value,
            }),
            Err(_) => Err(Error::TypeMismatch {
                key: self.asset_key.clone(),
                expected: type_name::<T>(),
                found: self.type_name,
            }),
        }
    }
}

/// Handle to an asset in the store.
///
/// The value is shared with the store and can't be modified. A handle keeps the
/// value alive after the asset was discarded or replaced by a reload.
#[derive_where(Clone)]
#[derive_where(crate = stash_shared::derive_where)]
pub struct Asset<T> {
    asset_key: AssetKey,
    value: Arc<T>,
}

impl<T> Asset<T> {
    /// Returns the `AssetKey` of the asset.
    pub fn asset_key(&self) -> &AssetKey {
        &self.asset_key
    }

    /// Returns the decoded value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns the shared decoded value.
    pub fn arc(&self) -> Arc<T> {
        self.value.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for Asset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("asset_key", &self.asset_key)
            .field("value", &self.value)
            .finish()
    }
}
