use serde::{Deserialize, Serialize};

/// A photosphere as stored in the local catalog, with its child rows reassembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub photo_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub heading: Option<f64>,
    pub altitude: Option<f64>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub capture_time: Option<String>,
    pub upload_time: Option<String>,
    pub view_count: Option<i64>,
    pub maps_publish_status: Option<String>,
    pub share_link: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Local write timestamp, stamped by the catalog on every upsert.
    pub updated_at: String,
    pub places: Vec<Place>,
    /// Target photo IDs of outbound connections.
    pub connections: Vec<String>,
}

impl Photo {
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn is_published(&self) -> bool {
        self.maps_publish_status.as_deref() == Some(PUBLISHED)
    }
}

/// Upstream status value for photos visible on the public map.
pub const PUBLISHED: &str = "PUBLISHED";

/// A named real-world location attached to a photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub place_id: String,
    pub name: Option<String>,
    pub language_code: Option<String>,
}

/// A directed navigable link between two photos.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhotoConnection {
    pub source: String,
    pub target: String,
}

/// Aggregate counters for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStats {
    pub photo_count: usize,
    pub published_count: usize,
    pub place_count: usize,
    pub connection_count: usize,
    pub total_views: i64,
    /// `YYYY-MM-DD HH:MM`, or `"N/A"` when the catalog is empty.
    pub last_updated: String,
}

/// A geolocated photo, flattened for map rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub photo_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub place_names: String,
    pub maps_publish_status: String,
    pub view_count: i64,
    pub capture_time: Option<String>,
    pub share_link: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// A nearby-search hit with its great-circle distance from the search center.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyPhoto {
    pub photo: Photo,
    pub distance_m: f64,
}

/// Per-photo result of a catalog upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub places_written: usize,
    pub connections_added: usize,
    /// Connections dropped because the target photo is not in the catalog yet.
    pub connections_skipped: usize,
}
