//! Batch collection of sample locations from a place search service.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::domain::{dedup_places, Place, PlaceQuery};
use crate::ports::PlaceSearch;

/// Hardcoded defaults for place collection.
pub mod defaults {
    use std::time::Duration;

    /// Pages requested per query at most.
    pub const MAX_PAGES: u32 = 10;
    /// Pause between consecutive requests.
    pub const REQUEST_DELAY: Duration = Duration::from_millis(100);
}

/// What to collect: every place type in every region, plus each type
/// combined with each extra keyword.
#[derive(Debug, Clone)]
pub struct CollectRequest {
    /// City or province names.
    pub regions: Vec<String>,
    /// Place types, also used as search text.
    pub poi_types: Vec<String>,
    /// Extra keywords appended to each type.
    pub keywords: Vec<String>,
    /// Pages requested per query at most.
    pub max_pages: u32,
    /// Pause between consecutive requests.
    pub delay: Duration,
}

impl CollectRequest {
    /// A request with default paging and throttling.
    #[must_use]
    pub const fn new(regions: Vec<String>, poi_types: Vec<String>) -> Self {
        Self {
            regions,
            poi_types,
            keywords: Vec::new(),
            max_pages: defaults::MAX_PAGES,
            delay: defaults::REQUEST_DELAY,
        }
    }

    /// Queries in request order.
    #[must_use]
    pub fn queries(&self) -> Vec<PlaceQuery> {
        let mut queries = Vec::new();
        for region in &self.regions {
            for poi_type in &self.poi_types {
                let texts = std::iter::once(poi_type.clone())
                    .chain(self.keywords.iter().map(|k| format!("{poi_type} {k}")));
                queries.extend(texts.map(|text| PlaceQuery {
                    text,
                    region: region.clone(),
                    poi_type: Some(poi_type.clone()),
                }));
            }
        }
        queries
    }
}

/// Runs every query of `request`, following pages until a short page or
/// `max_pages`, and returns the places with name/address duplicates removed.
///
/// # Errors
///
/// Returns the first search error; nothing collected so far is returned.
pub fn collect_places(search: &dyn PlaceSearch, request: &CollectRequest) -> Result<Vec<Place>> {
    let page_size = search.page_size();
    let mut places = Vec::new();
    let mut first_request = true;

    for query in request.queries() {
        let before = places.len();
        for page in 0..request.max_pages {
            if !first_request && !request.delay.is_zero() {
                thread::sleep(request.delay);
            }
            first_request = false;

            let results = search.search_page(&query, page)?;
            debug!("'{}' in {} page {page}: {} results", query.text, query.region, results.len());
            let last = results.len() < page_size;
            places.extend(results);
            if last {
                break;
            }
        }
        info!(
            "Found {} places for '{}' in {}",
            places.len() - before,
            query.text,
            query.region
        );
    }

    let unique = dedup_places(places);
    info!("Collected {} unique places", unique.len());
    Ok(unique)
}
