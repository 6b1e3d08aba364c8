use std::path::PathBuf;

/// Where the store keeps its data. Built once at startup and handed to [`crate::Store::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

impl StoreConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }
}

impl Default for StoreConfig {
    /// `$HOME/.spherekeep/data/streetview_photos.db`
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self::new(
            PathBuf::from(home)
                .join(".spherekeep")
                .join("data")
                .join("streetview_photos.db"),
        )
    }
}
