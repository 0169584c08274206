//! Place search over the Baidu Maps place API.

use std::time::Duration;

use anyhow::{Context, Result};
use greenview_core::domain::{GeoPoint, Place, PlaceQuery};
use greenview_core::PlaceSearch;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

const PLACE_SEARCH_URL: &str = "https://api.map.baidu.com/place/v2/search";

/// Hardcoded defaults for place searches.
pub mod defaults {
    /// Results per page; the API caps it at 20.
    pub const PAGE_SIZE: usize = 20;
    /// Request timeout in seconds.
    pub const TIMEOUT_SECS: u64 = 10;
    /// Coordinate system the API reports locations in.
    pub const COORDTYPE: &str = "bd09ll";
}

/// Place types with a known category tag, as `(type, tag)`.
///
/// English aliases map to the same tags as the Chinese names.
const POI_TAGS: [(&str, &str); 20] = [
    ("学校", "教育培训"),
    ("医院", "医疗保健"),
    ("政府单位", "政府机构"),
    ("公园", "旅游景点"),
    ("商场", "购物"),
    ("银行", "金融保险"),
    ("酒店", "酒店"),
    ("餐厅", "美食"),
    ("加油站", "汽车服务"),
    ("地铁站", "交通设施"),
    ("school", "教育培训"),
    ("hospital", "医疗保健"),
    ("government", "政府机构"),
    ("park", "旅游景点"),
    ("mall", "购物"),
    ("bank", "金融保险"),
    ("hotel", "酒店"),
    ("restaurant", "美食"),
    ("gas_station", "汽车服务"),
    ("subway_station", "交通设施"),
];

/// Category tag for a place type, if it has one.
#[must_use]
pub fn poi_tag(poi_type: &str) -> Option<&'static str> {
    let poi_type = poi_type.trim();
    POI_TAGS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(poi_type))
        .map(|(_, tag)| *tag)
}

/// Place types with a category tag.
#[must_use]
pub fn known_poi_types() -> Vec<&'static str> {
    POI_TAGS.iter().map(|(name, _)| *name).collect()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    results: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
struct RawPlace {
    #[serde(default)]
    name: String,
    #[serde(default)]
    address: String,
    location: Option<RawLocation>,
    #[serde(default)]
    uid: String,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    lat: f64,
    lng: f64,
}

/// Parses one page of a place search response.
///
/// Results without a usable location (such as city-level aggregates) are skipped.
///
/// # Errors
///
/// Returns an error if the body is not a search response or reports a
/// non-zero status.
pub fn parse_search_response(body: &str, region: &str) -> Result<Vec<Place>> {
    let response: SearchResponse =
        serde_json::from_str(body).context("Unexpected place search response")?;
    if response.status != 0 {
        anyhow::bail!(
            "Place search failed with status {}: {}",
            response.status,
            response.message
        );
    }

    Ok(response
        .results
        .into_iter()
        .filter_map(|raw| {
            let loc = raw.location?;
            match GeoPoint::new(loc.lng, loc.lat) {
                Ok(location) => Some(Place {
                    name: raw.name,
                    address: raw.address,
                    location,
                    region: region.to_string(),
                    uid: raw.uid,
                }),
                Err(e) => {
                    debug!("Skipping '{}': {e}", raw.name);
                    None
                }
            }
        })
        .collect())
}

/// Paged place search against the Baidu Maps place API.
pub struct BaiduPlaceSearch {
    client: Client,
    ak: String,
    endpoint: String,
}

impl BaiduPlaceSearch {
    /// Creates a search client against the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(ak: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(ak, PLACE_SEARCH_URL)
    }

    /// Creates a search client against a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_endpoint(ak: impl Into<String>, endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            ak: ak.into(),
            endpoint: endpoint.into(),
        })
    }
}

impl PlaceSearch for BaiduPlaceSearch {
    fn page_size(&self) -> usize {
        defaults::PAGE_SIZE
    }

    fn search_page(&self, query: &PlaceQuery, page: u32) -> Result<Vec<Place>> {
        let mut params = vec![
            ("query", query.text.clone()),
            ("region", query.region.clone()),
            ("output", "json".to_string()),
            ("ak", self.ak.clone()),
            ("page_size", defaults::PAGE_SIZE.to_string()),
            ("page_num", page.to_string()),
            ("scope", "2".to_string()),
        ];
        if let Some(tag) = query.poi_type.as_deref().and_then(poi_tag) {
            params.push(("tag", tag.to_string()));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .with_context(|| format!("Place search for '{}' failed", query.text))?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP {} searching '{}'", response.status(), query.text);
        }
        let body = response
            .text()
            .with_context(|| format!("Failed to read results for '{}'", query.text))?;

        parse_search_response(&body, &query.region)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_poi_tag_lookup() {
        assert_eq!(poi_tag("学校"), Some("教育培训"));
        assert_eq!(poi_tag("School"), Some("教育培训"));
        assert_eq!(poi_tag(" park "), Some("旅游景点"));
        assert_eq!(poi_tag("bakery"), None);
        assert_eq!(known_poi_types().len(), 20);
    }

    #[test]
    fn test_parse_search_response() {
        let body = r#"{
            "status": 0,
            "message": "ok",
            "results": [
                {"name": "景山公园", "address": "景山西街44号",
                 "location": {"lat": 39.931, "lng": 116.403}, "uid": "abc"},
                {"name": "北京市", "num": 120},
                {"name": "broken", "location": {"lat": 95.0, "lng": 116.0}}
            ]
        }"#;
        let places = parse_search_response(body, "北京市").unwrap();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].name, "景山公园");
        assert_eq!(places[0].region, "北京市");
        assert_eq!(places[0].uid, "abc");
        assert!((places[0].location.lng - 116.403).abs() < 1e-9);
    }

    #[test]
    fn test_parse_error_status() {
        let err = parse_search_response(r#"{"status": 240, "message": "APP 服务被禁用"}"#, "x")
            .unwrap_err();
        assert!(err.to_string().contains("status 240"));
        assert!(parse_search_response("<html>", "x").is_err());
    }

    #[test]
    fn test_empty_results_page() {
        let places = parse_search_response(r#"{"status": 0, "results": []}"#, "x").unwrap();
        assert!(places.is_empty());
    }

    #[test]
    fn test_unreachable_endpoint_is_error() {
        let search =
            BaiduPlaceSearch::with_endpoint("key", "http://127.0.0.1:9/place/v2/search").unwrap();
        let query = PlaceQuery {
            text: "公园".into(),
            region: "北京市".into(),
            poi_type: Some("公园".into()),
        };
        assert!(search.search_page(&query, 0).is_err());
        assert_eq!(search.page_size(), 20);
    }
}
