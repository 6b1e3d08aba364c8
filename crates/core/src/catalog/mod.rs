pub mod schema;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::display::{format_last_updated, NOT_AVAILABLE};
use crate::domain::*;
use crate::error::{Error, Result};
use crate::geo::BoundingBox;
use crate::record::PhotoRecord;

const PHOTO_COLUMNS: &str = "photo_id, latitude, longitude, heading, altitude, pitch, roll,
     capture_time, upload_time, view_count, maps_publish_status, share_link, thumbnail_url, updated_at";

/// Listing order shared by bulk reads and prev/next navigation.
const LISTING_ORDER: &str = "upload_time DESC, photo_id ASC";

/// Maximum bound parameters per IN-list query.
const IN_LIST_CHUNK: usize = 500;

/// SQLite-backed cache of photosphere metadata, places, and connections.
///
/// Holds no open connection: every operation opens its own, runs in a single
/// transaction, and closes it on return. A `Catalog` can be shared across
/// threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
}

impl Catalog {
    /// Point at a catalog file without touching the filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create (if needed) and initialize the catalog at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let catalog = Self::new(path);
        catalog.initialize()?;
        Ok(catalog)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the catalog file has been created. An existing but empty
    /// catalog still returns `true`.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create the parent directory, tables, and indexes if absent. Safe to call on every start.
    pub fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                info!(dir = %parent.display(), "created catalog directory");
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::initialize(&conn)?;
        info!(path = %self.path.display(), "catalog initialized");
        Ok(())
    }

    fn connect(&self) -> Result<Connection> {
        if !self.exists() {
            return Err(Error::CatalogNotCreated(self.path.clone()));
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    fn transact<T>(
        &self,
        behavior: TransactionBehavior,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(behavior)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run `f` against one consistent snapshot.
    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.transact(TransactionBehavior::Deferred, f)
    }

    /// Run `f` in a write transaction; any error rolls back every statement in it.
    fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.transact(TransactionBehavior::Immediate, f)
    }

    // ── Upsert ───────────────────────────────────────────────────────

    /// Write one photo and, when supplied, replace its places and outbound
    /// connections. All of it commits together or not at all.
    ///
    /// Connections to photos not yet in the catalog are skipped, not errors.
    pub fn upsert(&self, record: &PhotoRecord) -> Result<UpsertOutcome> {
        if record.photo_id.is_empty() {
            return Err(Error::MissingPhotoId);
        }
        let photo_id = record.photo_id.as_str();
        let updated_at = chrono::Local::now()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();

        let outcome = self.write(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO photos ({PHOTO_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                     ON CONFLICT(photo_id) DO UPDATE SET
                        latitude = excluded.latitude,
                        longitude = excluded.longitude,
                        heading = excluded.heading,
                        altitude = excluded.altitude,
                        pitch = excluded.pitch,
                        roll = excluded.roll,
                        capture_time = excluded.capture_time,
                        upload_time = excluded.upload_time,
                        view_count = excluded.view_count,
                        maps_publish_status = excluded.maps_publish_status,
                        share_link = excluded.share_link,
                        thumbnail_url = excluded.thumbnail_url,
                        updated_at = excluded.updated_at"
                ),
                params![
                    photo_id,
                    record.latitude,
                    record.longitude,
                    record.heading,
                    record.altitude,
                    record.pitch,
                    record.roll,
                    record.capture_time,
                    record.upload_time,
                    record.view_count,
                    record.maps_publish_status,
                    record.share_link,
                    record.thumbnail_url,
                    updated_at,
                ],
            )?;

            let mut outcome = UpsertOutcome::default();

            if !record.places.is_empty() {
                conn.execute("DELETE FROM places WHERE photo_id = ?1", params![photo_id])?;
                let mut insert = conn.prepare(
                    "INSERT OR IGNORE INTO places (photo_id, place_id, name, language_code)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for place in &record.places {
                    let inserted = insert.execute(params![
                        photo_id,
                        place.place_id,
                        place.name,
                        place.language_code
                    ])?;
                    if inserted == 0 {
                        warn!(photo_id, place_id = %place.place_id, "duplicate place ignored");
                    }
                    outcome.places_written += inserted;
                }
            }

            if !record.connections.is_empty() {
                conn.execute(
                    "DELETE FROM connections WHERE source_photo_id = ?1",
                    params![photo_id],
                )?;
                let mut target_exists = conn.prepare("SELECT 1 FROM photos WHERE photo_id = ?1")?;
                let mut insert = conn.prepare(
                    "INSERT OR IGNORE INTO connections (source_photo_id, target_photo_id) VALUES (?1, ?2)",
                )?;
                for target in &record.connections {
                    if target_exists.exists(params![target])? {
                        outcome.connections_added += insert.execute(params![photo_id, target])?;
                    } else {
                        warn!(photo_id, target = %target, "skipping connection: target photo not in catalog");
                        outcome.connections_skipped += 1;
                    }
                }
            }

            Ok(outcome)
        })?;

        debug!(
            photo_id,
            places = outcome.places_written,
            connections_added = outcome.connections_added,
            connections_skipped = outcome.connections_skipped,
            "photo upserted"
        );
        Ok(outcome)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Fetch one photo with its places and outbound connections.
    pub fn get(&self, photo_id: &str) -> Result<Option<Photo>> {
        self.read(|conn| {
            let photo = conn
                .query_row(
                    &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE photo_id = ?1"),
                    params![photo_id],
                    photo_from_row,
                )
                .optional()?;

            let Some(mut photo) = photo else {
                debug!(photo_id, "photo not in catalog");
                return Ok(None);
            };
            photo.places = load_places(conn, photo_id)?;
            photo.connections = load_targets(conn, photo_id)?;
            Ok(Some(photo))
        })
    }

    /// Every photo, in listing order. Three bulk queries joined in memory.
    pub fn list_all(&self) -> Result<Vec<Photo>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PHOTO_COLUMNS} FROM photos ORDER BY {LISTING_ORDER}"
            ))?;
            let mut photos = stmt
                .query_map([], photo_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let index: HashMap<String, usize> = photos
                .iter()
                .enumerate()
                .map(|(i, p)| (p.photo_id.clone(), i))
                .collect();

            let mut stmt = conn.prepare(
                "SELECT photo_id, place_id, name, language_code FROM places ORDER BY id",
            )?;
            let places = stmt.query_map([], |row| {
                Ok((row.get::<_, Option<String>>(0)?, place_from_row(row, 1)?))
            })?;
            for row in places {
                let (photo_id, place) = row?;
                if let Some(&i) = photo_id.as_ref().and_then(|id| index.get(id)) {
                    photos[i].places.push(place);
                }
            }

            let mut stmt = conn.prepare(
                "SELECT source_photo_id, target_photo_id FROM connections ORDER BY id",
            )?;
            let edges = stmt.query_map([], connection_from_row)?;
            for edge in edges {
                let edge = edge?;
                if let Some(&i) = index.get(&edge.source) {
                    photos[i].connections.push(edge.target);
                }
            }

            debug!(count = photos.len(), "loaded all photos");
            Ok(photos)
        })
    }

    /// Photos whose coordinates fall inside `bbox`, minus `exclude` by exact ID.
    pub fn find_nearby(&self, bbox: &BoundingBox, exclude: Option<&str>) -> Result<Vec<Photo>> {
        let mut photos = self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PHOTO_COLUMNS} FROM photos
                 WHERE latitude IS NOT NULL AND longitude IS NOT NULL
                   AND latitude BETWEEN ?1 AND ?2
                   AND longitude BETWEEN ?3 AND ?4
                 ORDER BY photo_id"
            ))?;
            let mut photos = stmt
                .query_map(
                    params![bbox.min_lat, bbox.max_lat, bbox.min_lng, bbox.max_lng],
                    photo_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            for photo in &mut photos {
                photo.places = load_places(conn, &photo.photo_id)?;
                photo.connections = load_targets(conn, &photo.photo_id)?;
            }
            Ok(photos)
        })?;

        let found = photos.len();
        if let Some(exclude) = exclude {
            photos.retain(|p| p.photo_id != exclude);
        }
        debug!(?bbox, found, returned = photos.len(), ?exclude, "nearby search");
        Ok(photos)
    }

    /// Outbound edges of every photo in `photo_ids`, batched into IN-list queries.
    pub fn connections_for_sources<S: AsRef<str>>(&self, photo_ids: &[S]) -> Result<Vec<PhotoConnection>> {
        if photo_ids.is_empty() {
            return Ok(Vec::new());
        }

        self.read(|conn| {
            let mut edges = Vec::new();
            for chunk in photo_ids.chunks(IN_LIST_CHUNK) {
                let placeholders: Vec<String> = (0..chunk.len()).map(|i| format!("?{}", i + 1)).collect();
                let sql = format!(
                    "SELECT source_photo_id, target_photo_id FROM connections
                     WHERE source_photo_id IN ({}) ORDER BY id",
                    placeholders.join(", ")
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(
                        rusqlite::params_from_iter(chunk.iter().map(|s| s.as_ref())),
                        connection_from_row,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                edges.extend(rows);
            }
            debug!(sources = photo_ids.len(), edges = edges.len(), "loaded connections");
            Ok(edges)
        })
    }

    /// Every photo ID in the catalog.
    pub fn photo_ids(&self) -> Result<HashSet<String>> {
        self.read(|conn| {
            let mut stmt = conn.prepare("SELECT photo_id FROM photos")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<HashSet<String>, _>>()?;
            Ok(ids)
        })
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Delete every photo not in `authoritative`, along with its places and
    /// every connection it takes part in. One transaction for the whole run.
    /// Returns the number of photos removed.
    pub fn reconcile(&self, authoritative: &HashSet<String>) -> Result<usize> {
        let mut stale: Vec<String> = self
            .photo_ids()?
            .into_iter()
            .filter(|id| !authoritative.contains(id))
            .collect();

        if stale.is_empty() {
            info!("no deleted photos to clean up");
            return Ok(0);
        }
        stale.sort();
        info!(count = stale.len(), ids = ?stale, "removing photos no longer present upstream");

        let removed = self.write(|conn| {
            let mut delete_places = conn.prepare("DELETE FROM places WHERE photo_id = ?1")?;
            let mut delete_edges = conn.prepare(
                "DELETE FROM connections WHERE source_photo_id = ?1 OR target_photo_id = ?1",
            )?;
            let mut delete_photo = conn.prepare("DELETE FROM photos WHERE photo_id = ?1")?;

            let mut removed = 0;
            for id in &stale {
                delete_places.execute(params![id])?;
                delete_edges.execute(params![id])?;
                removed += delete_photo.execute(params![id])?;
            }
            Ok(removed)
        })?;

        info!(removed, "removed deleted photos from catalog");
        Ok(removed)
    }

    // ── Statistics ───────────────────────────────────────────────────

    pub fn stats(&self) -> Result<CatalogStats> {
        self.read(|conn| {
            let count = |sql: &str| -> Result<usize> {
                let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(n as usize)
            };

            let photo_count = count("SELECT COUNT(*) FROM photos")?;
            let published_count = conn.query_row(
                "SELECT COUNT(*) FROM photos WHERE maps_publish_status = ?1",
                params![PUBLISHED],
                |row| row.get::<_, i64>(0),
            )? as usize;
            let place_count = count("SELECT COUNT(*) FROM places")?;
            let connection_count = count("SELECT COUNT(*) FROM connections")?;
            let total_views: Option<i64> = conn.query_row(
                "SELECT SUM(view_count) FROM photos WHERE view_count IS NOT NULL",
                [],
                |row| row.get(0),
            )?;
            let last_updated: Option<String> =
                conn.query_row("SELECT MAX(updated_at) FROM photos", [], |row| row.get(0))?;

            Ok(CatalogStats {
                photo_count,
                published_count,
                place_count,
                connection_count,
                total_views: total_views.unwrap_or(0),
                last_updated: last_updated
                    .as_deref()
                    .map(format_last_updated)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            })
        })
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// The photo after `photo_id` in listing order (older upload, or same
    /// upload time with a greater ID). Photos without an upload time are skipped.
    pub fn next(&self, photo_id: &str) -> Result<Option<String>> {
        self.adjacent(
            photo_id,
            "SELECT photo_id FROM photos
             WHERE (upload_time < ?1 OR (upload_time = ?1 AND photo_id > ?2))
               AND upload_time IS NOT NULL
             ORDER BY upload_time DESC, photo_id ASC
             LIMIT 1",
        )
    }

    /// The photo before `photo_id` in listing order.
    pub fn previous(&self, photo_id: &str) -> Result<Option<String>> {
        self.adjacent(
            photo_id,
            "SELECT photo_id FROM photos
             WHERE (upload_time > ?1 OR (upload_time = ?1 AND photo_id < ?2))
               AND upload_time IS NOT NULL
             ORDER BY upload_time ASC, photo_id DESC
             LIMIT 1",
        )
    }

    fn adjacent(&self, photo_id: &str, sql: &str) -> Result<Option<String>> {
        self.read(|conn| {
            let upload_time: Option<Option<String>> = conn
                .query_row(
                    "SELECT upload_time FROM photos WHERE photo_id = ?1",
                    params![photo_id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(Some(upload_time)) = upload_time else {
                debug!(photo_id, "no position in listing order");
                return Ok(None);
            };

            let adjacent = conn
                .query_row(sql, params![upload_time, photo_id], |row| row.get(0))
                .optional()?;
            Ok(adjacent)
        })
    }

    // ── Map view ─────────────────────────────────────────────────────

    /// Every geolocated photo with its place names, newest upload first.
    pub fn map_points(&self) -> Result<Vec<MapPoint>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.photo_id, p.latitude, p.longitude, GROUP_CONCAT(DISTINCT pl.name),
                        p.maps_publish_status, p.view_count, p.capture_time, p.share_link, p.thumbnail_url
                 FROM photos p
                 LEFT JOIN places pl ON pl.photo_id = p.photo_id
                 WHERE p.latitude IS NOT NULL AND p.longitude IS NOT NULL
                 GROUP BY p.photo_id
                 ORDER BY p.upload_time DESC, p.photo_id ASC",
            )?;
            let points = stmt
                .query_map([], |row| {
                    Ok(MapPoint {
                        photo_id: row.get(0)?,
                        latitude: row.get(1)?,
                        longitude: row.get(2)?,
                        place_names: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| "Unknown Location".to_string()),
                        maps_publish_status: row
                            .get::<_, Option<String>>(4)?
                            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                        view_count: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                        capture_time: row.get(6)?,
                        share_link: row.get(7)?,
                        thumbnail_url: row.get(8)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            info!(count = points.len(), "loaded geolocated photos for map view");
            Ok(points)
        })
    }
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        photo_id: row.get(0)?,
        latitude: row.get(1)?,
        longitude: row.get(2)?,
        heading: row.get(3)?,
        altitude: row.get(4)?,
        pitch: row.get(5)?,
        roll: row.get(6)?,
        capture_time: row.get(7)?,
        upload_time: row.get(8)?,
        view_count: row.get(9)?,
        maps_publish_status: row.get(10)?,
        share_link: row.get(11)?,
        thumbnail_url: row.get(12)?,
        updated_at: row.get::<_, Option<String>>(13)?.unwrap_or_default(),
        places: Vec::new(),
        connections: Vec::new(),
    })
}

fn place_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Place> {
    Ok(Place {
        place_id: row.get::<_, Option<String>>(offset)?.unwrap_or_default(),
        name: row.get(offset + 1)?,
        language_code: row.get(offset + 2)?,
    })
}

fn connection_from_row(row: &Row<'_>) -> rusqlite::Result<PhotoConnection> {
    Ok(PhotoConnection {
        source: row.get(0)?,
        target: row.get(1)?,
    })
}

fn load_places(conn: &Connection, photo_id: &str) -> Result<Vec<Place>> {
    let mut stmt = conn.prepare_cached(
        "SELECT place_id, name, language_code FROM places WHERE photo_id = ?1 ORDER BY id",
    )?;
    let places = stmt
        .query_map(params![photo_id], |row| place_from_row(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(places)
}

fn load_targets(conn: &Connection, photo_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT target_photo_id FROM connections WHERE source_photo_id = ?1 ORDER BY id",
    )?;
    let targets = stmt
        .query_map(params![photo_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(targets)
}
