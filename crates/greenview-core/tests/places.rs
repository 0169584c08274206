//! Place collection tests against a scripted search service.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use greenview_core::domain::{format_locations, parse_locations};
use greenview_core::places::{collect_places, CollectRequest};
use greenview_test_support::MockPlaceSearch;

fn request(regions: &[&str], poi_types: &[&str]) -> CollectRequest {
    let mut request = CollectRequest::new(
        regions.iter().map(ToString::to_string).collect(),
        poi_types.iter().map(ToString::to_string).collect(),
    );
    request.delay = Duration::ZERO;
    request
}

#[test]
fn test_pages_until_short_page() {
    let search = MockPlaceSearch::new(20, 45);
    let places = collect_places(&search, &request(&["Beijing"], &["school"])).unwrap();

    assert_eq!(places.len(), 45);
    let pages: Vec<u32> = search.requests().iter().map(|(_, page)| *page).collect();
    assert_eq!(pages, vec![0, 1, 2]);
}

#[test]
fn test_exact_multiple_needs_one_empty_page() {
    let search = MockPlaceSearch::new(20, 40);
    let places = collect_places(&search, &request(&["Beijing"], &["school"])).unwrap();
    assert_eq!(places.len(), 40);
    assert_eq!(search.requests().len(), 3);
}

#[test]
fn test_max_pages_caps_requests() {
    let search = MockPlaceSearch::new(10, 1_000);
    let mut req = request(&["Beijing"], &["hospital"]);
    req.max_pages = 3;
    let places = collect_places(&search, &req).unwrap();
    assert_eq!(places.len(), 30);
    assert_eq!(search.requests().len(), 3);
}

#[test]
fn test_keywords_and_regions_expand_queries() {
    let search = MockPlaceSearch::new(20, 2);
    let mut req = request(&["Beijing", "Shanghai"], &["park", "school"]);
    req.keywords = vec!["east".into()];
    let places = collect_places(&search, &req).unwrap();

    assert_eq!(search.requests().len(), 8);
    assert_eq!(places.len(), 16);
    let (first, _) = &search.requests()[1];
    assert_eq!(first.text, "park east");
    assert_eq!(first.region, "Beijing");
    assert_eq!(first.poi_type.as_deref(), Some("park"));
}

#[test]
fn test_repeated_region_is_deduplicated() {
    let search = MockPlaceSearch::new(20, 5);
    let places = collect_places(&search, &request(&["Beijing", "Beijing"], &["park"])).unwrap();
    assert_eq!(search.requests().len(), 2);
    assert_eq!(places.len(), 5);
}

#[test]
fn test_search_error_propagates() {
    let search = MockPlaceSearch::new(20, 5).failing_for("school");
    let err = collect_places(&search, &request(&["Beijing"], &["park", "school"])).unwrap_err();
    assert!(err.to_string().contains("school"));
}

#[test]
fn test_collected_places_feed_the_coordinate_list() {
    let search = MockPlaceSearch::new(20, 7);
    let places = collect_places(&search, &request(&["Beijing"], &["park"])).unwrap();
    let points = parse_locations(&format_locations(&places));
    assert_eq!(points.len(), 7);
    assert_eq!(points[3], places[3].location);
}
