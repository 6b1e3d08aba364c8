use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::record::PhotoRecord;

/// Callback events for a bulk import.
pub enum ImportProgress {
    /// Starting import of `total` payloads.
    Start { total: usize },
    /// A photo was written to the catalog.
    Imported { photo_id: String },
    /// A payload was skipped (malformed, or the write failed).
    Skipped { index: usize, reason: String },
    /// Import finished.
    Complete { imported: usize, skipped: usize },
}

/// Result of a bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub total: usize,
    pub imported: usize,
    pub skipped: usize,
    /// IDs of every well-formed payload, whether or not its write succeeded.
    pub photo_ids: HashSet<String>,
}

/// Read a listing snapshot: a JSON array of upstream photo payloads.
pub fn read_snapshot(path: &Path) -> Result<Vec<Value>> {
    let contents = fs::read_to_string(path)?;
    match serde_json::from_str(&contents)? {
        Value::Array(items) => Ok(items),
        _ => Err(Error::InvalidImportFormat(path.to_path_buf())),
    }
}

/// Convert payloads to records in parallel (no DB access), then write them in order.
///
/// Records whose connections pointed at photos later in the batch are written
/// a second time once every photo of the batch exists, so the snapshot's edges
/// do not depend on payload order. When a photo ID repeats, only its last
/// payload is re-applied, so the last occurrence always wins.
pub fn import_payloads(
    catalog: &Catalog,
    payloads: &[Value],
    mut progress_cb: Option<&mut dyn FnMut(ImportProgress)>,
) -> ImportSummary {
    let mut summary = ImportSummary {
        total: payloads.len(),
        ..Default::default()
    };

    if let Some(ref mut cb) = progress_cb {
        cb(ImportProgress::Start {
            total: summary.total,
        });
    }

    let parsed: Vec<Result<PhotoRecord>> = payloads
        .par_iter()
        .map(PhotoRecord::from_value)
        .collect();

    let mut retry: Vec<(usize, &PhotoRecord)> = Vec::new();
    let mut last_seen: HashMap<&str, usize> = HashMap::new();

    for (index, result) in parsed.iter().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(index, error = %e, "skipping malformed photo payload");
                summary.skipped += 1;
                if let Some(ref mut cb) = progress_cb {
                    cb(ImportProgress::Skipped {
                        index,
                        reason: e.to_string(),
                    });
                }
                continue;
            }
        };
        summary.photo_ids.insert(record.photo_id.clone());
        last_seen.insert(record.photo_id.as_str(), index);

        match catalog.upsert(record) {
            Ok(outcome) => {
                summary.imported += 1;
                if outcome.connections_skipped > 0 {
                    retry.push((index, record));
                }
                if let Some(ref mut cb) = progress_cb {
                    cb(ImportProgress::Imported {
                        photo_id: record.photo_id.clone(),
                    });
                }
            }
            Err(e) => {
                warn!(index, photo_id = %record.photo_id, error = %e, "failed to write photo");
                summary.skipped += 1;
                if let Some(ref mut cb) = progress_cb {
                    cb(ImportProgress::Skipped {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    for (index, record) in retry {
        if last_seen.get(record.photo_id.as_str()) != Some(&index) {
            debug!(index, photo_id = %record.photo_id, "superseded by a later payload, not re-applied");
            continue;
        }
        if let Err(e) = catalog.upsert(record) {
            warn!(photo_id = %record.photo_id, error = %e, "failed to re-apply connections");
        }
    }

    info!(
        imported = summary.imported,
        total = summary.total,
        skipped = summary.skipped,
        "imported photos"
    );

    if let Some(ref mut cb) = progress_cb {
        cb(ImportProgress::Complete {
            imported: summary.imported,
            skipped: summary.skipped,
        });
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_catalog() -> (Catalog, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(&tmp.path().join("photos.db")).unwrap();
        (catalog, tmp)
    }

    #[test]
    fn test_read_snapshot_rejects_non_array() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("snapshot.json");
        fs::write(&path, r#"{"photos": []}"#).unwrap();
        assert!(matches!(
            read_snapshot(&path).unwrap_err(),
            Error::InvalidImportFormat(_)
        ));
    }

    #[test]
    fn test_import_counts_and_skips() {
        let (catalog, _tmp) = make_catalog();
        let payloads = vec![
            json!({"photoId": {"id": "p1"}, "uploadTime": "2024-01-01T00:00:00Z"}),
            json!({"captureTime": "2024-01-01T00:00:00Z"}),
            json!(null),
            json!({"photoId": {"id": "p2"}, "viewCount": "1,000"}),
        ];

        let summary = import_payloads(&catalog, &payloads, None);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(
            summary.photo_ids,
            ["p1".to_string(), "p2".to_string()].into()
        );
        assert_eq!(catalog.get("p2").unwrap().unwrap().view_count, Some(1000));
    }

    #[test]
    fn test_import_forward_references_connected() {
        let (catalog, _tmp) = make_catalog();
        let payloads = vec![
            json!({"photoId": {"id": "first"}, "connections": [{"target": {"id": "second"}}]}),
            json!({"photoId": {"id": "second"}, "connections": [{"target": {"id": "first"}}]}),
        ];

        import_payloads(&catalog, &payloads, None);
        assert_eq!(
            catalog.get("first").unwrap().unwrap().connections,
            vec!["second".to_string()]
        );
        assert_eq!(
            catalog.get("second").unwrap().unwrap().connections,
            vec!["first".to_string()]
        );
    }

    #[test]
    fn test_import_repeated_id_last_payload_wins() {
        let (catalog, _tmp) = make_catalog();
        let payloads = vec![
            json!({"photoId": {"id": "p1"}, "viewCount": 1, "connections": [{"target": {"id": "ghost"}}]}),
            json!({"photoId": {"id": "p1"}, "viewCount": 2}),
        ];

        let summary = import_payloads(&catalog, &payloads, None);
        assert_eq!(summary.imported, 2);
        let photo = catalog.get("p1").unwrap().unwrap();
        assert_eq!(photo.view_count, Some(2));
        assert!(photo.connections.is_empty());
    }

    #[test]
    fn test_import_repeated_id_retries_last_payload() {
        let (catalog, _tmp) = make_catalog();
        let payloads = vec![
            json!({"photoId": {"id": "p1"}, "viewCount": 1}),
            json!({"photoId": {"id": "p1"}, "viewCount": 2, "connections": [{"target": {"id": "p2"}}]}),
            json!({"photoId": {"id": "p2"}}),
        ];

        import_payloads(&catalog, &payloads, None);
        let photo = catalog.get("p1").unwrap().unwrap();
        assert_eq!(photo.view_count, Some(2));
        assert_eq!(photo.connections, vec!["p2".to_string()]);
    }

    #[test]
    fn test_import_reports_progress() {
        let (catalog, _tmp) = make_catalog();
        let payloads = vec![json!({"photoId": {"id": "p1"}}), json!({})];

        let mut events = Vec::new();
        import_payloads(
            &catalog,
            &payloads,
            Some(&mut |event| {
                events.push(match event {
                    ImportProgress::Start { total } => format!("start:{total}"),
                    ImportProgress::Imported { photo_id } => format!("imported:{photo_id}"),
                    ImportProgress::Skipped { index, .. } => format!("skipped:{index}"),
                    ImportProgress::Complete { imported, skipped } => {
                        format!("complete:{imported}/{skipped}")
                    }
                })
            }),
        );
        assert_eq!(
            events,
            vec!["start:2", "imported:p1", "skipped:1", "complete:1/1"]
        );
    }
}
