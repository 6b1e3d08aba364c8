pub mod import;
pub mod photos;
pub mod store;

use anyhow::{bail, Result};
use spherekeep_core::config::StoreConfig;
use spherekeep_core::error::Error;
use spherekeep_core::Store;

/// Open a cache that `init` (or an import) already created.
pub(crate) fn open_store(config: &StoreConfig) -> Result<Store> {
    match Store::open_existing(config) {
        Err(Error::CatalogNotCreated(path)) => bail!(
            "no photo cache at {}. Run `spherekeep init` or `spherekeep import` first.",
            path.display()
        ),
        other => Ok(other?),
    }
}
