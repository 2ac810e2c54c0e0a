#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Domain types for the quiet-map noise reporting system.
//!
//! Defines the persisted [`NoiseReport`] document shape, the
//! [`SeverityColor`] classification with its two distinct threshold sets
//! (point-level 50/80 dB, zone-level 55/70 dB on the mean), and the
//! `GeoJSON` feature shapes served to the map frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Latitude/longitude precision for stored reports (4 decimals, ~11 m).
pub const REPORT_COORD_DECIMALS: i32 = 4;

/// Severity color bucket for a noise level.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SeverityColor {
    /// Quiet enough to ignore.
    Green,
    /// Noticeable noise.
    Yellow,
    /// Loud.
    Red,
}

impl SeverityColor {
    /// Classifies a single point reading.
    ///
    /// Point-level thresholds: green below 50 dB, yellow below 80 dB,
    /// red at 80 dB and above.
    #[must_use]
    pub fn for_reading(decibel: f64) -> Self {
        if decibel < 50.0 {
            Self::Green
        } else if decibel < 80.0 {
            Self::Yellow
        } else {
            Self::Red
        }
    }

    /// Classifies a zone by its mean decibel level.
    ///
    /// Zone-level thresholds are tighter than the point-level ones:
    /// green below 55 dB, yellow below 70 dB, red at 70 dB and above.
    #[must_use]
    pub fn for_zone_mean(mean_db: f64) -> Self {
        if mean_db < 55.0 {
            Self::Green
        } else if mean_db < 70.0 {
            Self::Yellow
        } else {
            Self::Red
        }
    }
}

const fn default_active() -> bool {
    true
}

/// A single crowd-submitted noise observation.
///
/// This is the exact JSON document persisted in the active and archive
/// namespaces. `color`, `timestamp`, and `active` are optional/defaulted on
/// read so that documents written by older deployments still parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseReport {
    /// Unique report ID (UUIDv4 string), assigned at creation.
    pub id: String,
    /// Latitude in decimal degrees, quantized to 4 decimals.
    pub lat: f64,
    /// Longitude in decimal degrees, quantized to 4 decimals.
    pub lon: f64,
    /// Measured sound level in dB.
    pub decibel: f64,
    /// Optional free-text annotation, trimmed; `None` if empty.
    #[serde(default)]
    pub reason: Option<String>,
    /// Severity color derived from `decibel` at creation time.
    #[serde(default)]
    pub color: Option<SeverityColor>,
    /// Creation time, reset on refresh and on deactivation (ISO 8601).
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Whether the report is still considered live. Absent means `true`
    /// (documents written before the lifecycle flag existed).
    #[serde(default = "default_active")]
    pub active: bool,
}

impl NoiseReport {
    /// The color to display for this report, re-deriving from the decibel
    /// level if the stored color is missing.
    #[must_use]
    pub fn display_color(&self) -> SeverityColor {
        self.color
            .unwrap_or_else(|| SeverityColor::for_reading(self.decibel))
    }

    /// Millisecond sort key for newest-first ordering. A missing timestamp
    /// sorts as epoch 0, i.e. last.
    #[must_use]
    pub fn sort_millis(&self) -> i64 {
        self.timestamp.map_or(0, |t| t.timestamp_millis())
    }
}

/// Quantizes a coordinate to the fixed report precision.
#[must_use]
pub fn quantize_coord(value: f64) -> f64 {
    let factor = 10f64.powi(REPORT_COORD_DECIMALS);
    (value * factor).round() / factor
}

/// `GeoJSON` Point geometry, coordinates ordered `[lon, lat]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointGeometry {
    /// Always `"Point"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`.
    pub coordinates: [f64; 2],
}

impl PointGeometry {
    /// Builds a Point geometry from a longitude/latitude pair.
    #[must_use]
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [lon, lat],
        }
    }
}

/// Properties of an active report feature as served to the frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProperties {
    /// Measured sound level in dB.
    pub decibel: f64,
    /// Display color (stored or re-derived).
    pub color: SeverityColor,
    /// Report timestamp; `null` for legacy documents.
    pub timestamp: Option<DateTime<Utc>>,
    /// Report ID.
    pub id: String,
    /// Optional annotation.
    pub reason: Option<String>,
    /// Always `true` in the active listing.
    pub active: bool,
}

/// A single active report as a `GeoJSON` feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFeature {
    /// Always `"Feature"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Point geometry at the report location.
    pub geometry: PointGeometry,
    /// Report properties.
    pub properties: ReportProperties,
}

impl ReportFeature {
    /// Normalizes a stored report into the uniform listing shape.
    #[must_use]
    pub fn from_report(report: &NoiseReport) -> Self {
        Self {
            kind: "Feature".to_string(),
            geometry: PointGeometry::new(report.lon, report.lat),
            properties: ReportProperties {
                decibel: report.decibel,
                color: report.display_color(),
                timestamp: report.timestamp,
                id: report.id.clone(),
                reason: report.reason.clone(),
                active: true,
            },
        }
    }
}

/// The active report listing returned by the query service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFeatureCollection {
    /// Always `"FeatureCollection"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Active reports, newest first.
    pub features: Vec<ReportFeature>,
}

impl ReportFeatureCollection {
    /// Wraps a list of features in a `FeatureCollection`.
    #[must_use]
    pub fn new(features: Vec<ReportFeature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }
}

/// Properties of a published aggregation zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneProperties {
    /// Number of archived reports that fell into the cell.
    pub count: u64,
    /// Mean decibel level, rounded to the nearest integer for display.
    #[serde(rename = "meanDb")]
    pub mean_db: i64,
    /// Zone color from the 55/70 thresholds on the unrounded mean.
    pub color: SeverityColor,
    /// Relative density in `[0.1, 0.9]`, normalized within one run.
    pub opacity: f64,
}

/// One aggregation zone as a `GeoJSON` feature centered on the cell
/// centroid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneFeature {
    /// Always `"Feature"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Point geometry at the cell centroid.
    pub geometry: PointGeometry,
    /// Zone statistics.
    pub properties: ZoneProperties,
}

impl ZoneFeature {
    /// Builds a zone feature from a centroid and its statistics.
    #[must_use]
    pub fn new(lon: f64, lat: f64, properties: ZoneProperties) -> Self {
        Self {
            kind: "Feature".to_string(),
            geometry: PointGeometry::new(lon, lat),
            properties,
        }
    }
}

/// The zones summary document, rewritten wholesale by each aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesDocument {
    /// Always `"FeatureCollection"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// One feature per non-empty grid cell.
    pub features: Vec<ZoneFeature>,
}

impl ZonesDocument {
    /// Wraps zone features in a `FeatureCollection`.
    #[must_use]
    pub fn new(features: Vec<ZoneFeature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
        }
    }
}
