//! History reconciliation across two generations of stored records.
//!
//! Early deployments wrote one row per defect to the `defects` collection
//! (`imageUrl`, `defectType`, `severity`, `timestamp`). Later deployments
//! write one row per analysed image to the `history` collection, with the
//! whole detection payload stringified into its `results` field. Both
//! collections stay live, so the history feed has to merge them.
//!
//! Reconciliation maps each generation onto a common [`HistoryEntry`],
//! drops records that duplicate one another (same image reference within
//! the same minute), and sorts newest-first. A record that fails to parse
//! is logged and skipped; it never takes the rest of the feed down.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::detection::{CanonicalDetection, DetectResponse, normalize};

/// Status recorded for analyses written before the field existed.
const DEFAULT_STATUS: &str = "completed";

#[derive(Debug, Error)]
pub enum MalformedHistoryRecord {
    #[error("bad timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
    #[error("results payload does not parse: {0}")]
    Results(#[from] serde_json::Error),
}

// ── Wire rows ──

/// Legacy row from the `defects` collection, one per defect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectRecord {
    pub id: String,
    pub user_id: String,
    pub image_url: String,
    pub defect_type: String,
    #[serde(default)]
    pub severity: Option<String>,
    /// RFC 3339 timestamp string.
    pub timestamp: String,
}

/// Modern row from the `history` collection, one per analysed image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecordRaw {
    pub id: String,
    pub user_id: String,
    /// Image reference (storage view URL or file id).
    pub images: String,
    /// Detection payload. Written stringified; the oldest rows hold it as a
    /// structured object instead, so both shapes must parse.
    pub results: serde_json::Value,
    /// RFC 3339 timestamp string.
    pub created_at: String,
    /// Optional explicit timestamp; preferred over `created_at` when set.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

// ── Reconciled entries ──

/// A legacy defect record, parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct DefectEntry {
    pub id: String,
    pub image_ref: String,
    pub defect_type: String,
    pub severity: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A modern analysis record, parsed and normalised.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisEntry {
    pub id: String,
    pub image_ref: String,
    pub detections: Vec<CanonicalDetection>,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// One entry in the reconciled history feed.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    Defect(DefectEntry),
    Analysis(AnalysisEntry),
}

impl DefectEntry {
    pub fn from_record(row: &DefectRecord) -> Result<Self, MalformedHistoryRecord> {
        Ok(Self {
            id: row.id.clone(),
            image_ref: row.image_url.clone(),
            defect_type: row.defect_type.clone(),
            severity: row.severity.clone(),
            timestamp: parse_timestamp(&row.timestamp)?,
        })
    }
}

impl AnalysisEntry {
    pub fn from_record(row: &AnalysisRecordRaw) -> Result<Self, MalformedHistoryRecord> {
        let ts = row.timestamp.as_deref().unwrap_or(&row.created_at);
        let response: DetectResponse = match &row.results {
            // The store holds results stringified; parse the inner document.
            serde_json::Value::String(s) => serde_json::from_str(s)?,
            other => serde_json::from_value(other.clone())?,
        };
        Ok(Self {
            id: row.id.clone(),
            image_ref: row.images.clone(),
            detections: normalize(&response.detections),
            status: row
                .status
                .clone()
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            timestamp: parse_timestamp(ts)?,
        })
    }
}

impl HistoryEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HistoryEntry::Defect(e) => e.timestamp,
            HistoryEntry::Analysis(e) => e.timestamp,
        }
    }

    pub fn image_ref(&self) -> &str {
        match self {
            HistoryEntry::Defect(e) => &e.image_ref,
            HistoryEntry::Analysis(e) => &e.image_ref,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HistoryEntry::Defect(_) => "defect",
            HistoryEntry::Analysis(_) => "analysis",
        }
    }
}

/// Merge both record streams into one deduplicated, newest-first feed.
///
/// Records that fail to parse are logged and skipped. Two records count as
/// duplicates when they reference the same image within the same minute;
/// the first one encountered wins (defect rows are visited before analysis
/// rows). Running the function twice over the same input yields identical
/// output.
pub fn reconcile(defects: &[DefectRecord], analyses: &[AnalysisRecordRaw]) -> Vec<HistoryEntry> {
    let mut entries: Vec<HistoryEntry> = Vec::with_capacity(defects.len() + analyses.len());

    for row in defects {
        match DefectEntry::from_record(row) {
            Ok(entry) => entries.push(HistoryEntry::Defect(entry)),
            Err(err) => warn!(id = %row.id, error = %err, "skipping malformed defect record"),
        }
    }
    for row in analyses {
        match AnalysisEntry::from_record(row) {
            Ok(entry) => entries.push(HistoryEntry::Analysis(entry)),
            Err(err) => warn!(id = %row.id, error = %err, "skipping malformed analysis record"),
        }
    }

    let mut seen = std::collections::HashSet::new();
    entries.retain(|e| seen.insert((minute_key(e.timestamp()), e.image_ref().to_string())));

    // Stable sort: entries sharing a timestamp keep their relative order.
    entries.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    entries
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, MalformedHistoryRecord> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| MalformedHistoryRecord::Timestamp {
            value: value.to_string(),
            source,
        })
}

/// Truncate a timestamp to the minute for duplicate detection.
fn minute_key(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defect_row(id: &str, image: &str, ts: &str) -> DefectRecord {
        DefectRecord {
            id: id.into(),
            user_id: "u1".into(),
            image_url: image.into(),
            defect_type: "Single Cell".into(),
            severity: Some("Medium".into()),
            timestamp: ts.into(),
        }
    }

    fn analysis_row(id: &str, image: &str, results: serde_json::Value, ts: &str) -> AnalysisRecordRaw {
        AnalysisRecordRaw {
            id: id.into(),
            user_id: "u1".into(),
            images: image.into(),
            results,
            created_at: ts.into(),
            timestamp: None,
            status: Some("completed".into()),
        }
    }

    fn detections_payload() -> serde_json::Value {
        serde_json::json!({
            "detections": [
                { "class": "single-cell", "confidence": 0.9, "bbox": [100, 100, 150, 160] }
            ],
            "total_detections": 1
        })
    }

    #[test]
    fn maps_defect_row() {
        let entry = DefectEntry::from_record(&defect_row(
            "d1",
            "https://backend/files/abc/view",
            "2024-03-01T10:15:42Z",
        ))
        .unwrap();
        assert_eq!(entry.defect_type, "Single Cell");
        assert_eq!(entry.severity.as_deref(), Some("Medium"));
        assert_eq!(entry.timestamp.to_rfc3339(), "2024-03-01T10:15:42+00:00");
    }

    #[test]
    fn analysis_parses_stringified_results() {
        let row = analysis_row(
            "a1",
            "file-1",
            serde_json::Value::String(detections_payload().to_string()),
            "2024-03-01T10:20:00Z",
        );
        let entry = AnalysisEntry::from_record(&row).unwrap();
        assert_eq!(entry.detections.len(), 1);
        assert_eq!(entry.detections[0].display_class, "Single Cell");
    }

    #[test]
    fn analysis_parses_structured_results() {
        let row = analysis_row("a1", "file-1", detections_payload(), "2024-03-01T10:20:00Z");
        let entry = AnalysisEntry::from_record(&row).unwrap();
        assert_eq!(entry.detections.len(), 1);
    }

    #[test]
    fn analysis_prefers_explicit_timestamp_over_created_at() {
        let mut row = analysis_row("a1", "file-1", detections_payload(), "2024-03-01T10:20:00Z");
        row.timestamp = Some("2024-03-02T08:00:00Z".into());
        let entry = AnalysisEntry::from_record(&row).unwrap();
        assert_eq!(entry.timestamp.to_rfc3339(), "2024-03-02T08:00:00+00:00");
    }

    #[test]
    fn missing_status_defaults_to_completed() {
        let mut row = analysis_row("a1", "file-1", detections_payload(), "2024-03-01T10:20:00Z");
        row.status = None;
        let entry = AnalysisEntry::from_record(&row).unwrap();
        assert_eq!(entry.status, "completed");
    }

    #[test]
    fn malformed_results_are_skipped_not_fatal() {
        let good = analysis_row("a1", "file-1", detections_payload(), "2024-03-01T10:20:00Z");
        let bad = analysis_row(
            "a2",
            "file-2",
            serde_json::Value::String("{not json".into()),
            "2024-03-01T10:25:00Z",
        );
        let feed = reconcile(&[], &[good, bad]);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].image_ref(), "file-1");
    }

    #[test]
    fn malformed_timestamp_is_skipped_not_fatal() {
        let good = defect_row("d1", "img-a", "2024-03-01T10:15:42Z");
        let bad = defect_row("d2", "img-b", "yesterday at noon");
        let feed = reconcile(&[good, bad], &[]);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].image_ref(), "img-a");
    }

    #[test]
    fn same_image_same_minute_collapses_to_first_seen() {
        // 10:15:42 and 10:15:58 share the 10:15 minute bucket.
        let defect = defect_row("d1", "img-a", "2024-03-01T10:15:42Z");
        let analysis = analysis_row("a1", "img-a", detections_payload(), "2024-03-01T10:15:58Z");
        let feed = reconcile(&[defect], &[analysis]);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].kind(), "defect", "defect stream is visited first");
    }

    #[test]
    fn same_minute_different_images_both_survive() {
        let a = defect_row("d1", "img-a", "2024-03-01T10:15:42Z");
        let b = defect_row("d2", "img-b", "2024-03-01T10:15:58Z");
        let feed = reconcile(&[a, b], &[]);
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn same_image_different_minutes_both_survive() {
        let a = defect_row("d1", "img-a", "2024-03-01T10:15:59Z");
        let b = defect_row("d2", "img-a", "2024-03-01T10:16:00Z");
        let feed = reconcile(&[a, b], &[]);
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn feed_is_sorted_newest_first() {
        let feed = reconcile(
            &[
                defect_row("d1", "img-a", "2024-03-01T09:00:00Z"),
                defect_row("d2", "img-b", "2024-03-03T09:00:00Z"),
            ],
            &[analysis_row(
                "a1",
                "img-c",
                detections_payload(),
                "2024-03-02T09:00:00Z",
            )],
        );
        let stamps: Vec<String> = feed.iter().map(|e| e.timestamp().to_rfc3339()).collect();
        assert_eq!(
            stamps,
            vec![
                "2024-03-03T09:00:00+00:00",
                "2024-03-02T09:00:00+00:00",
                "2024-03-01T09:00:00+00:00",
            ]
        );
    }

    #[test]
    fn sort_uses_full_timestamp_not_minute_bucket() {
        // Same minute, different images: order by the untruncated seconds.
        let feed = reconcile(
            &[
                defect_row("d1", "img-a", "2024-03-01T10:15:42Z"),
                defect_row("d2", "img-b", "2024-03-01T10:15:58Z"),
            ],
            &[],
        );
        assert_eq!(feed[0].image_ref(), "img-b");
        assert_eq!(feed[1].image_ref(), "img-a");
    }

    #[test]
    fn reconcile_is_deterministic() {
        let defects = vec![
            defect_row("d1", "img-a", "2024-03-01T10:15:42Z"),
            defect_row("d2", "img-b", "2024-03-01T11:00:00Z"),
        ];
        let analyses = vec![analysis_row(
            "a1",
            "img-a",
            detections_payload(),
            "2024-03-01T10:15:58Z",
        )];
        let first = reconcile(&defects, &analyses);
        let second = reconcile(&defects, &analyses);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_inputs_yield_empty_feed() {
        assert!(reconcile(&[], &[]).is_empty());
    }

    #[test]
    fn wire_rows_parse_from_camel_case_json() {
        let json = r#"{
            "id": "rec1",
            "userId": "u1",
            "imageUrl": "https://backend/files/abc/view",
            "defectType": "Short Circuit",
            "severity": "Critical",
            "timestamp": "2024-03-01T10:15:42Z"
        }"#;
        let row: DefectRecord = serde_json::from_str(json).unwrap();
        assert_eq!(row.defect_type, "Short Circuit");

        let json = r#"{
            "id": "rec2",
            "userId": "u1",
            "images": "file-9",
            "results": "{\"detections\":[]}",
            "createdAt": "2024-03-01T10:20:00Z",
            "status": "completed"
        }"#;
        let row: AnalysisRecordRaw = serde_json::from_str(json).unwrap();
        assert_eq!(row.images, "file-9");
        let entry = AnalysisEntry::from_record(&row).unwrap();
        assert!(entry.detections.is_empty());
    }
}
