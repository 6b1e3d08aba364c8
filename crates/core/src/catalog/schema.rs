use rusqlite::Connection;

use crate::error::Result;

/// Indexes created by [`initialize`], in creation order.
pub const INDEXES: [&str; 6] = [
    "idx_photos_lat_lng",
    "idx_photos_upload_time",
    "idx_photos_maps_publish_status",
    "idx_places_photo_id",
    "idx_connections_source",
    "idx_connections_target",
];

/// Create tables and indexes if absent. Never drops or alters existing objects.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS photos (
            photo_id            TEXT PRIMARY KEY,
            latitude            REAL,
            longitude           REAL,
            heading             REAL,
            altitude            REAL,
            pitch               REAL,
            roll                REAL,
            capture_time        TEXT,
            upload_time         TEXT,
            view_count          INTEGER,
            maps_publish_status TEXT,
            share_link          TEXT,
            thumbnail_url       TEXT,
            updated_at          TEXT
        );

        CREATE TABLE IF NOT EXISTS places (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            photo_id      TEXT REFERENCES photos(photo_id),
            place_id      TEXT,
            name          TEXT,
            language_code TEXT,
            UNIQUE (photo_id, place_id)
        );

        CREATE TABLE IF NOT EXISTS connections (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            source_photo_id TEXT REFERENCES photos(photo_id),
            target_photo_id TEXT REFERENCES photos(photo_id),
            UNIQUE (source_photo_id, target_photo_id)
        );

        CREATE INDEX IF NOT EXISTS idx_photos_lat_lng ON photos(latitude, longitude);
        CREATE INDEX IF NOT EXISTS idx_photos_upload_time ON photos(upload_time);
        CREATE INDEX IF NOT EXISTS idx_photos_maps_publish_status ON photos(maps_publish_status);
        CREATE INDEX IF NOT EXISTS idx_places_photo_id ON places(photo_id);
        CREATE INDEX IF NOT EXISTS idx_connections_source ON connections(source_photo_id);
        CREATE INDEX IF NOT EXISTS idx_connections_target ON connections(target_photo_id);
        ",
    )?;
    Ok(())
}
