//! Boundary between the loosely-typed upstream photo payload and the typed
//! record the catalog writes.
//!
//! The upstream API (and the edit form that mimics it) sends numbers as JSON
//! numbers, numeric strings, `"NaN"`, or garbage. Conversion never fails on a
//! bad numeric field: the field degrades to `None` and a warning is logged.
//! Only a missing photo ID rejects the whole record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::{Photo, Place};
use crate::error::{Error, Result};

/// Upstream photo payload, as returned by the publishing API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPhoto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<ApiPhotoId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<ApiPose>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub capture_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub maps_publish_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub share_link: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub places: Option<Vec<ApiPlace>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<ApiConnection>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiPhotoId {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPose {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat_lng_pair: Option<ApiLatLng>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiLatLng {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPlace {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiConnection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ApiPhotoId>,
}

/// Accepts strings as-is, stringifies numbers and booleans, maps anything else to `None`.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// A validated photo write, ready for [`crate::catalog::Catalog::upsert`].
///
/// An empty `places` or `connections` list leaves the stored child rows untouched;
/// only a non-empty list replaces them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoRecord {
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
    pub places: Vec<Place>,
    /// Target photo IDs.
    pub connections: Vec<String>,
}

impl PhotoRecord {
    pub fn new(photo_id: impl Into<String>) -> Self {
        Self {
            photo_id: photo_id.into(),
            ..Default::default()
        }
    }

    /// Parse a raw JSON payload. Fails only when the payload is not an object
    /// or carries no photo ID.
    pub fn from_value(value: &Value) -> Result<Self> {
        let api = ApiPhoto::deserialize(value)?;
        Self::from_api(api)
    }

    pub fn from_api(api: ApiPhoto) -> Result<Self> {
        let photo_id = api
            .photo_id
            .and_then(|p| p.id)
            .filter(|id| !id.is_empty())
            .ok_or(Error::MissingPhotoId)?;

        let mut record = PhotoRecord::new(photo_id);

        if let Some(pose) = api.pose {
            if let Some(pair) = pose.lat_lng_pair {
                record.latitude = numeric_field(&record.photo_id, "latitude", pair.latitude.as_ref());
                record.longitude = numeric_field(&record.photo_id, "longitude", pair.longitude.as_ref());
            }
            record.heading = numeric_field(&record.photo_id, "heading", pose.heading.as_ref());
            record.altitude = numeric_field(&record.photo_id, "altitude", pose.altitude.as_ref());
            record.pitch = numeric_field(&record.photo_id, "pitch", pose.pitch.as_ref());
            record.roll = numeric_field(&record.photo_id, "roll", pose.roll.as_ref());
        }

        record.capture_time = api.capture_time;
        record.upload_time = api.upload_time;
        record.view_count = api
            .view_count
            .as_ref()
            .and_then(|v| coerce_view_count(&record.photo_id, v));
        record.maps_publish_status = api.maps_publish_status;
        record.share_link = api.share_link;
        record.thumbnail_url = api.thumbnail_url;

        for place in api.places.unwrap_or_default() {
            match place.place_id.filter(|id| !id.is_empty()) {
                Some(place_id) => record.places.push(Place {
                    place_id,
                    name: place.name,
                    language_code: place.language_code,
                }),
                None => warn!(photo_id = %record.photo_id, "dropping place without placeId"),
            }
        }

        for connection in api.connections.unwrap_or_default() {
            match connection.target.and_then(|t| t.id).filter(|id| !id.is_empty()) {
                Some(target) => record.connections.push(target),
                None => warn!(photo_id = %record.photo_id, "dropping connection without target id"),
            }
        }

        Ok(record)
    }
}

fn numeric_field(photo_id: &str, field: &str, value: Option<&Value>) -> Option<f64> {
    let value = value?;
    let parsed = coerce_f64(value);
    if parsed.is_none() && !value.is_null() && !is_nan_literal(value) {
        warn!(photo_id, field, value = %value, "unparseable numeric field stored as NULL");
    }
    parsed
}

fn is_nan_literal(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().eq_ignore_ascii_case("nan"))
}

/// Coerce a JSON number or numeric string to a finite `f64`.
/// `"NaN"` in any case, non-numeric strings, and non-scalar values yield `None`.
///
/// Infinities (`"inf"`, `"-Infinity"`, `"1e999"`) also yield `None`, although
/// Rust's float parser accepts them: no pose field or coordinate has a
/// meaningful infinite value, and `serde_json` cannot write one back out.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("nan") {
                return None;
            }
            s.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// View counts arrive as numbers or as strings with thousands separators.
/// A string that still fails to parse after stripping commas counts as 0.
fn coerce_view_count(photo_id: &str, value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => match s.replace(',', "").trim().parse::<i64>() {
            Ok(count) => Some(count),
            Err(_) => {
                warn!(photo_id, value = %s, "unparseable viewCount stored as 0");
                Some(0)
            }
        },
        _ => None,
    }
}

impl Photo {
    /// Render back into the upstream payload shape.
    pub fn to_api(&self) -> ApiPhoto {
        let lat_lng_pair = if self.has_coordinates() {
            Some(ApiLatLng {
                latitude: self.latitude.map(Value::from),
                longitude: self.longitude.map(Value::from),
            })
        } else {
            None
        };

        ApiPhoto {
            photo_id: Some(ApiPhotoId {
                id: Some(self.photo_id.clone()),
            }),
            pose: Some(ApiPose {
                lat_lng_pair,
                heading: self.heading.map(Value::from),
                altitude: self.altitude.map(Value::from),
                pitch: self.pitch.map(Value::from),
                roll: self.roll.map(Value::from),
            }),
            capture_time: self.capture_time.clone(),
            upload_time: self.upload_time.clone(),
            view_count: self.view_count.map(Value::from),
            maps_publish_status: self.maps_publish_status.clone(),
            share_link: self.share_link.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            places: (!self.places.is_empty()).then(|| {
                self.places
                    .iter()
                    .map(|p| ApiPlace {
                        place_id: Some(p.place_id.clone()),
                        name: p.name.clone(),
                        language_code: p.language_code.clone(),
                    })
                    .collect()
            }),
            connections: (!self.connections.is_empty()).then(|| {
                self.connections
                    .iter()
                    .map(|target| ApiConnection {
                        target: Some(ApiPhotoId {
                            id: Some(target.clone()),
                        }),
                    })
                    .collect()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_payload() {
        let value = json!({
            "photoId": {"id": "p1"},
            "pose": {
                "latLngPair": {"latitude": 51.5074, "longitude": -0.1278},
                "heading": 180.0,
                "altitude": 10.0,
                "pitch": 0.0,
                "roll": 0.0
            },
            "captureTime": "2024-01-15T10:30:00Z",
            "uploadTime": "2024-01-15T11:00:00Z",
            "viewCount": "42",
            "mapsPublishStatus": "PUBLISHED",
            "shareLink": "https://example.com/share/p1",
            "thumbnailUrl": "https://example.com/thumb/p1.jpg",
            "places": [{"placeId": "pl-1", "name": "London", "languageCode": "en"}],
            "connections": [{"target": {"id": "p2"}}],
            "downloadUrl": "ignored"
        });

        let record = PhotoRecord::from_value(&value).unwrap();
        assert_eq!(record.photo_id, "p1");
        assert_eq!(record.latitude, Some(51.5074));
        assert_eq!(record.longitude, Some(-0.1278));
        assert_eq!(record.heading, Some(180.0));
        assert_eq!(record.view_count, Some(42));
        assert_eq!(record.maps_publish_status.as_deref(), Some("PUBLISHED"));
        assert_eq!(record.places.len(), 1);
        assert_eq!(record.places[0].name.as_deref(), Some("London"));
        assert_eq!(record.connections, vec!["p2".to_string()]);
    }

    #[test]
    fn test_missing_photo_id() {
        let err = PhotoRecord::from_value(&json!({"captureTime": "2024-01-15T10:30:00Z"})).unwrap_err();
        assert!(matches!(err, Error::MissingPhotoId));

        let err = PhotoRecord::from_value(&json!({"photoId": {}})).unwrap_err();
        assert!(matches!(err, Error::MissingPhotoId));

        let err = PhotoRecord::from_value(&json!({"photoId": {"id": ""}})).unwrap_err();
        assert!(matches!(err, Error::MissingPhotoId));
    }

    #[test]
    fn test_null_payload_rejected() {
        assert!(PhotoRecord::from_value(&Value::Null).is_err());
    }

    #[test]
    fn test_nan_and_garbage_pose_fields_become_none() {
        let value = json!({
            "photoId": {"id": "p1"},
            "pose": {"heading": "NaN", "altitude": "nan", "pitch": "level", "roll": "2.5"}
        });
        let record = PhotoRecord::from_value(&value).unwrap();
        assert_eq!(record.heading, None);
        assert_eq!(record.altitude, None);
        assert_eq!(record.pitch, None);
        assert_eq!(record.roll, Some(2.5));
    }

    #[test]
    fn test_string_coordinates_are_converted() {
        let value = json!({
            "photoId": {"id": "p1"},
            "pose": {"latLngPair": {"latitude": "48.8566", "longitude": "2.3522"}}
        });
        let record = PhotoRecord::from_value(&value).unwrap();
        assert_eq!(record.latitude, Some(48.8566));
        assert_eq!(record.longitude, Some(2.3522));
    }

    #[test]
    fn test_view_count_with_thousands_separators() {
        let record = PhotoRecord::from_value(&json!({"photoId": {"id": "p1"}, "viewCount": "1,234"})).unwrap();
        assert_eq!(record.view_count, Some(1234));

        let record = PhotoRecord::from_value(&json!({"photoId": {"id": "p1"}, "viewCount": "lots"})).unwrap();
        assert_eq!(record.view_count, Some(0));

        let record = PhotoRecord::from_value(&json!({"photoId": {"id": "p1"}, "viewCount": 7})).unwrap();
        assert_eq!(record.view_count, Some(7));

        let record = PhotoRecord::from_value(&json!({"photoId": {"id": "p1"}})).unwrap();
        assert_eq!(record.view_count, None);
    }

    #[test]
    fn test_places_without_id_and_connections_without_target_are_dropped() {
        let value = json!({
            "photoId": {"id": "p1"},
            "places": [{"name": "Nowhere"}, {"placeId": "pl-2", "name": "Somewhere"}],
            "connections": [{"target": {}}, {}, {"target": {"id": "p3"}}]
        });
        let record = PhotoRecord::from_value(&value).unwrap();
        assert_eq!(record.places.len(), 1);
        assert_eq!(record.places[0].place_id, "pl-2");
        assert_eq!(record.connections, vec!["p3".to_string()]);
    }

    #[test]
    fn test_null_child_lists_are_empty() {
        let value = json!({"photoId": {"id": "p1"}, "places": null, "connections": null});
        let record = PhotoRecord::from_value(&value).unwrap();
        assert!(record.places.is_empty());
        assert!(record.connections.is_empty());
    }

    #[test]
    fn test_non_string_scalars_are_stringified() {
        let value = json!({"photoId": {"id": 12345}, "mapsPublishStatus": true});
        let record = PhotoRecord::from_value(&value).unwrap();
        assert_eq!(record.photo_id, "12345");
        assert_eq!(record.maps_publish_status.as_deref(), Some("true"));
    }

    #[test]
    fn test_coerce_f64() {
        assert_eq!(coerce_f64(&json!(1.5)), Some(1.5));
        assert_eq!(coerce_f64(&json!(" 90 ")), Some(90.0));
        assert_eq!(coerce_f64(&json!("NAN")), None);
        assert_eq!(coerce_f64(&json!("inf")), None);
        assert_eq!(coerce_f64(&json!(null)), None);
        assert_eq!(coerce_f64(&json!(true)), None);
        assert_eq!(coerce_f64(&json!([1.0])), None);
    }

    #[test]
    fn test_infinite_pose_values_stored_as_null() {
        let value = json!({
            "photoId": {"id": "p1"},
            "pose": {
                "latLngPair": {"latitude": "inf", "longitude": 0.0},
                "heading": "-Infinity",
                "altitude": "1e999",
                "pitch": "2.5"
            }
        });
        let record = PhotoRecord::from_value(&value).unwrap();
        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, Some(0.0));
        assert_eq!(record.heading, None);
        assert_eq!(record.altitude, None);
        assert_eq!(record.pitch, Some(2.5));
    }

    #[test]
    fn test_to_api_shape() {
        let photo = Photo {
            photo_id: "p1".to_string(),
            latitude: Some(1.0),
            longitude: Some(2.0),
            heading: Some(90.0),
            altitude: None,
            pitch: None,
            roll: None,
            capture_time: Some("2024-01-15T10:30:00Z".to_string()),
            upload_time: None,
            view_count: Some(5),
            maps_publish_status: None,
            share_link: None,
            thumbnail_url: None,
            updated_at: "2024-01-15T12:00:00".to_string(),
            places: vec![],
            connections: vec!["p2".to_string()],
        };

        let value = serde_json::to_value(photo.to_api()).unwrap();
        assert_eq!(value["photoId"]["id"], "p1");
        assert_eq!(value["pose"]["latLngPair"]["latitude"], 1.0);
        assert_eq!(value["pose"]["heading"], 90.0);
        assert_eq!(value["viewCount"], 5);
        assert_eq!(value["connections"][0]["target"]["id"], "p2");
        assert!(value.get("places").is_none());
        assert!(value["pose"].get("altitude").is_none());
    }
}
