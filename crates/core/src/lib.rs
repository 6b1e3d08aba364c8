pub mod catalog;
pub mod config;
pub mod display;
pub mod domain;
pub mod error;
pub mod geo;
pub mod import;
pub mod record;

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;
use tracing::{error, info, warn};

use catalog::Catalog;
use config::StoreConfig;
use domain::*;
use error::{Error, Result};
use geo::BoundingBox;
use import::{ImportProgress, ImportSummary};
use record::PhotoRecord;

/// Outcome of syncing the catalog against a full listing snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub import: ImportSummary,
    pub removed: usize,
}

/// The photo cache as seen by request handlers.
///
/// Built once at startup from a [`StoreConfig`] and shared (behind an `Arc`)
/// by every worker. Writes report success as `bool` and reads degrade to empty
/// results on storage faults, so one bad record never takes down a listing;
/// every swallowed error is logged. Use [`Store::catalog`] for the
/// `Result`-returning API.
pub struct Store {
    catalog: Catalog,
}

impl Store {
    /// Open the store, creating and initializing the catalog if needed.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let catalog = Catalog::open(&config.database_path)?;
        Ok(Self { catalog })
    }

    /// Open an already-created catalog. Fails with [`Error::CatalogNotCreated`]
    /// so callers can tell "not set up yet" apart from "empty".
    pub fn open_existing(config: &StoreConfig) -> Result<Self> {
        let catalog = Catalog::new(&config.database_path);
        if !catalog.exists() {
            return Err(Error::CatalogNotCreated(config.database_path.clone()));
        }
        Ok(Self { catalog })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Write one photo record. Returns `false` if it was rejected or rolled back.
    pub fn upsert(&self, record: &PhotoRecord) -> bool {
        match self.catalog.upsert(record) {
            Ok(_) => true,
            Err(Error::MissingPhotoId) => {
                warn!("invalid photo data: missing photoId");
                false
            }
            Err(e) => {
                error!(photo_id = %record.photo_id, error = %e, "failed to upsert photo");
                false
            }
        }
    }

    /// Parse and write one upstream payload.
    pub fn upsert_value(&self, payload: &Value) -> bool {
        match PhotoRecord::from_value(payload) {
            Ok(record) => self.upsert(&record),
            Err(e) => {
                warn!(error = %e, "invalid photo data");
                false
            }
        }
    }

    /// One photo with its places and connections, or `None` if absent.
    pub fn photo(&self, photo_id: &str) -> Option<Photo> {
        logged("retrieve photo", self.catalog.get(photo_id)).flatten()
    }

    /// Every photo, newest upload first.
    pub fn photos(&self) -> Vec<Photo> {
        logged("retrieve all photos", self.catalog.list_all()).unwrap_or_default()
    }

    /// Photos inside `bbox`, minus the photo whose ID is `exclude`.
    pub fn find_nearby(&self, bbox: &BoundingBox, exclude: Option<&str>) -> Vec<Photo> {
        logged("find nearby photos", self.catalog.find_nearby(bbox, exclude)).unwrap_or_default()
    }

    /// Photos within `radius_m` of a point, nearest first.
    ///
    /// Pre-filters with an equirectangular bounding box, then keeps hits whose
    /// haversine distance is within the radius.
    pub fn nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
        exclude: Option<&str>,
    ) -> Result<Vec<NearbyPhoto>> {
        let (latitude, longitude) = geo::validate_coordinates(latitude, longitude)?;
        let bbox = BoundingBox::around(latitude, longitude, radius_m);

        let mut hits: Vec<NearbyPhoto> = self
            .find_nearby(&bbox, exclude)
            .into_iter()
            .filter_map(|photo| {
                let distance_m = geo::distance_m(latitude, longitude, photo.latitude?, photo.longitude?);
                (distance_m <= radius_m).then_some(NearbyPhoto { photo, distance_m })
            })
            .collect();
        hits.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        Ok(hits)
    }

    /// Outbound edges of every listed photo, in one batched lookup.
    pub fn connections_for<S: AsRef<str>>(&self, photo_ids: &[S]) -> Vec<PhotoConnection> {
        logged("fetch connections", self.catalog.connections_for_sources(photo_ids)).unwrap_or_default()
    }

    /// Remove photos absent from `authoritative`. Returns how many were removed;
    /// 0 if the run failed and was rolled back.
    pub fn reconcile(&self, authoritative: &HashSet<String>) -> usize {
        logged("clean deleted photos", self.catalog.reconcile(authoritative)).unwrap_or(0)
    }

    pub fn stats(&self) -> Option<CatalogStats> {
        logged("get catalog stats", self.catalog.stats())
    }

    pub fn next(&self, photo_id: &str) -> Option<String> {
        logged("find next photo", self.catalog.next(photo_id)).flatten()
    }

    pub fn previous(&self, photo_id: &str) -> Option<String> {
        logged("find previous photo", self.catalog.previous(photo_id)).flatten()
    }

    pub fn map_points(&self) -> Vec<MapPoint> {
        logged("load map points", self.catalog.map_points()).unwrap_or_default()
    }

    /// Import a listing snapshot (a JSON array of upstream payloads).
    /// Malformed entries are skipped; an unreadable file or a non-array document is an error.
    pub fn import_json(
        &self,
        path: &Path,
        progress_cb: Option<&mut dyn FnMut(ImportProgress)>,
    ) -> Result<ImportSummary> {
        let payloads = import::read_snapshot(path)?;
        info!(path = %path.display(), count = payloads.len(), "importing snapshot");
        Ok(import::import_payloads(&self.catalog, &payloads, progress_cb))
    }

    /// Import a full listing snapshot, then drop every cached photo it does not contain.
    ///
    /// A non-empty snapshot in which no entry carries a usable photo ID fails
    /// with [`Error::UnusableSnapshot`] and removes nothing.
    pub fn sync_snapshot(
        &self,
        path: &Path,
        progress_cb: Option<&mut dyn FnMut(ImportProgress)>,
    ) -> Result<SyncSummary> {
        let import = self.import_json(path, progress_cb)?;
        if import.total > 0 && import.photo_ids.is_empty() {
            return Err(Error::UnusableSnapshot {
                path: path.to_path_buf(),
                skipped: import.skipped,
            });
        }
        if import.skipped > 0 {
            warn!(
                path = %path.display(),
                skipped = import.skipped,
                total = import.total,
                "snapshot has malformed entries; reconciling against the valid ones"
            );
        }
        let removed = self.catalog.reconcile(&import.photo_ids)?;
        Ok(SyncSummary { import, removed })
    }
}

fn logged<T>(operation: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            error!(operation, error = %e, "catalog operation failed");
            None
        }
    }
}
