use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("photo record has no photoId.id")]
    MissingPhotoId,

    #[error("catalog has not been created yet: {}", .0.display())]
    CatalogNotCreated(PathBuf),

    #[error("coordinates out of range: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("heading must be in [0, 360): got {0}")]
    InvalidHeading(f64),

    #[error("not a number: {0:?}")]
    InvalidNumber(String),

    #[error("expected a JSON array of photos in {}", .0.display())]
    InvalidImportFormat(PathBuf),

    #[error("none of the {skipped} entries in {} is a valid photo; refusing to sync", .path.display())]
    UnusableSnapshot { path: PathBuf, skipped: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
