//! Point-of-interest search port.

use crate::domain::{Place, PlaceQuery};

/// Port for a paged place search service.
pub trait PlaceSearch: Send + Sync {
    /// Results in a full page. A shorter page is the last one.
    fn page_size(&self) -> usize;

    /// Fetches page `page` (zero-based) of results for `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    fn search_page(&self, query: &PlaceQuery, page: u32) -> anyhow::Result<Vec<Place>>;
}
