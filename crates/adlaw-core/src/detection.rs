//! Wire types for the inference service and the canonical detection record.
//!
//! The service returns one JSON object per analysed image carrying a list of
//! raw detections in model-frame pixel coordinates. Normalisation maps each
//! raw detection onto a [`CanonicalDetection`]: display class resolved through
//! the taxonomy, enrichment fields taken from the wire record when present or
//! from the local per-class reference data when the class is known.
//!
//! Detection order is always preserved; confidence is never re-scaled.

use serde::{Deserialize, Serialize};

use crate::taxonomy::{self, DefectClass};

/// Response body of the detection endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectResponse {
    pub detections: Vec<RawDetection>,
    /// Server-side inference time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_detections: Option<u32>,
}

/// One raw detection as emitted by the inference service.
///
/// `bbox` is `[x1, y1, x2, y2]` in model-frame pixels. The enrichment fields
/// are optional; newer service builds attach them, older ones do not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
    pub class: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_loss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress_factors: Option<Vec<String>>,
    /// Accepts either a single string or a list of strings on the wire.
    #[serde(
        default,
        deserialize_with = "string_or_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub recommendations: Option<Vec<String>>,
}

/// A normalised detection ready for display and persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalDetection {
    /// Raw model class identifier, kept verbatim for round-tripping.
    pub class: String,
    /// Resolved display name, e.g. "Bypass Diode Failure".
    pub display_class: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in model-frame pixels, unchanged from the wire.
    pub bbox: [f32; 4],
    pub priority: Option<String>,
    pub power_loss: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub stress_factors: Option<Vec<String>>,
    pub recommendations: Option<Vec<String>>,
}

impl CanonicalDetection {
    /// Normalise one raw detection.
    ///
    /// Enrichment fields come from the wire record when present. When absent
    /// and the class is known, they fall back to the per-class reference
    /// data; for unknown classes they stay absent rather than being filled
    /// with placeholders.
    pub fn from_raw(raw: &RawDetection) -> Self {
        let info = DefectClass::from_raw(&raw.class).map(|c| c.info());
        Self {
            class: raw.class.clone(),
            display_class: taxonomy::display_class(&raw.class),
            confidence: raw.confidence,
            bbox: raw.bbox,
            priority: raw
                .priority
                .clone()
                .or_else(|| info.map(|i| i.priority.to_string())),
            power_loss: raw
                .power_loss
                .clone()
                .or_else(|| info.map(|i| i.power_loss.to_string())),
            category: raw
                .category
                .clone()
                .or_else(|| info.map(|i| i.category.to_string())),
            description: raw
                .description
                .clone()
                .or_else(|| info.map(|i| i.description.to_string())),
            stress_factors: raw.stress_factors.clone().or_else(|| {
                info.map(|i| i.stress_factors.iter().map(|s| s.to_string()).collect())
            }),
            recommendations: raw.recommendations.clone().or_else(|| {
                info.map(|i| i.recommendations.iter().map(|s| s.to_string()).collect())
            }),
        }
    }
}

/// Normalise a batch of raw detections, preserving order.
pub fn normalize(raw: &[RawDetection]) -> Vec<CanonicalDetection> {
    raw.iter().map(CanonicalDetection::from_raw).collect()
}

/// Index of the primary detection: highest confidence, first-seen on ties.
///
/// Returns `None` for an empty list.
pub fn primary_index(detections: &[CanonicalDetection]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, det) in detections.iter().enumerate() {
        match best {
            // Replace only on strictly greater confidence, so the earliest
            // of equal-confidence detections wins.
            Some(b) if detections[b].confidence >= det.confidence => {}
            _ => best = Some(i),
        }
    }
    best
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(|v| match v {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(list) => list,
    }))
}
