//! Geographic points and download records for street-level image acquisition.

use std::collections::HashSet;
use std::fmt;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A WGS84 longitude/latitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude in degrees, `[-180, 180]`.
    pub lng: f64,
    /// Latitude in degrees, `[-90, 90]`.
    pub lat: f64,
}

impl GeoPoint {
    /// Creates a point, rejecting out-of-range coordinates.
    ///
    /// # Errors
    ///
    /// Returns a message if either coordinate is outside its valid range or not finite.
    pub fn new(lng: f64, lat: f64) -> Result<Self, String> {
        if !(-180.0..=180.0).contains(&lng) {
            return Err(format!("longitude {lng} is not in -180..=180"));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(format!("latitude {lat} is not in -90..=90"));
        }
        Ok(Self { lng, lat })
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lng, self.lat)
    }
}

impl FromStr for GeoPoint {
    type Err = String;

    /// Parses `lng,lat` or `lng lat`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = if s.contains(',') {
            s.split(',').map(str::trim).collect()
        } else {
            s.split_whitespace().collect()
        };
        let [lng, lat] = parts.as_slice() else {
            return Err(format!("expected 'lng,lat', got '{s}'"));
        };
        let lng: f64 = lng
            .parse()
            .map_err(|_| format!("'{lng}' is not a valid longitude"))?;
        let lat: f64 = lat
            .parse()
            .map_err(|_| format!("'{lat}' is not a valid latitude"))?;
        Self::new(lng, lat)
    }
}

/// Parses one point per line. Blank lines and `#` comments are ignored;
/// malformed lines are skipped with a warning.
#[must_use]
pub fn parse_locations(text: &str) -> Vec<GeoPoint> {
    text.lines()
        .enumerate()
        .filter_map(|(n, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            match line.parse() {
                Ok(point) => Some(point),
                Err(e) => {
                    warn!("Skipping line {}: {e}", n + 1);
                    None
                }
            }
        })
        .collect()
}

/// A point of interest returned by a place search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Display name.
    pub name: String,
    /// Street address, empty when the provider has none.
    #[serde(default)]
    pub address: String,
    /// Where the place is.
    pub location: GeoPoint,
    /// Region the search ran in.
    pub region: String,
    /// Provider identifier, empty when the provider has none.
    #[serde(default)]
    pub uid: String,
}

/// One place search: free text within a region, optionally narrowed by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceQuery {
    /// Search text.
    pub text: String,
    /// City or province name.
    pub region: String,
    /// Place type the provider may map to a category filter.
    pub poi_type: Option<String>,
}

/// Drops places whose name and address repeat an earlier one.
#[must_use]
pub fn dedup_places(places: Vec<Place>) -> Vec<Place> {
    let mut seen = HashSet::new();
    places
        .into_iter()
        .filter(|p| seen.insert((p.name.clone(), p.address.clone())))
        .collect()
}

/// Renders places as a coordinate list readable by [`parse_locations`].
///
/// Each point is preceded by a `#` comment naming the place.
#[must_use]
pub fn format_locations(places: &[Place]) -> String {
    let mut out = String::new();
    for place in places {
        let label = if place.address.is_empty() {
            place.name.clone()
        } else {
            format!("{} ({})", place.name, place.address)
        };
        // keep the comment on one line whatever the provider sent
        let label = label.replace(['\n', '\r'], " ");
        let _ = writeln!(out, "# {label}\n{}", place.location);
    }
    out
}

/// An image saved by an acquisition adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedImage {
    /// Where the image was written.
    pub path: PathBuf,
    /// Size of the written file.
    pub bytes: u64,
}

/// Outcome of fetching one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// The image was saved.
    Saved(FetchedImage),
    /// The request failed.
    Failed {
        /// Human-readable reason.
        reason: String,
    },
}

/// One entry per requested location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Requested location.
    pub location: GeoPoint,
    /// When the request finished (RFC 3339, UTC).
    pub fetched_at: String,
    /// Saved file or failure reason.
    #[serde(flatten)]
    pub outcome: DownloadOutcome,
}

impl DownloadRecord {
    /// Returns the saved path, if the download succeeded.
    #[must_use]
    pub fn saved_path(&self) -> Option<&PathBuf> {
        match &self.outcome {
            DownloadOutcome::Saved(img) => Some(&img.path),
            DownloadOutcome::Failed { .. } => None,
        }
    }
}
