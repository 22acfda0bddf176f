use std::sync::Arc;

use shared::protocol::Entity;

use crate::search::SearchState;

/// Active search results win over the baseline unless they are empty.
///
/// Returns a clone of one of the inputs' `Arc`, so callers can compare with
/// `Arc::ptr_eq` to skip recomputing anything downstream.
pub fn compute_display_set(baseline: &Arc<[Entity]>, search: &SearchState) -> Arc<[Entity]> {
    if search.results.is_empty() {
        Arc::clone(baseline)
    } else {
        Arc::clone(&search.results)
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::{EntityId, LatLng};

    use super::*;
    use crate::search::SearchQuery;

    fn entity(id: i64) -> Entity {
        Entity::located(EntityId(id), LatLng { lat: 10.0, lng: id as f64 })
    }

    #[test]
    fn empty_search_is_identity_on_baseline() {
        let baseline: Arc<[Entity]> = vec![entity(1), entity(2)].into();
        let display = compute_display_set(&baseline, &SearchState::default());
        assert!(Arc::ptr_eq(&display, &baseline));
    }

    #[test]
    fn search_results_override_baseline_in_order() {
        let baseline: Arc<[Entity]> = vec![entity(1), entity(2), entity(3)].into();
        let search = SearchState::new(
            SearchQuery::Text {
                query: "x".into(),
            },
            vec![entity(3), entity(1)],
        );
        let display = compute_display_set(&baseline, &search);
        let ids: Vec<i64> = display.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![3, 1]);
        assert!(Arc::ptr_eq(&display, &search.results));
    }

    #[test]
    fn active_search_with_no_hits_falls_back_to_baseline() {
        let baseline: Arc<[Entity]> = vec![entity(1)].into();
        let search = SearchState::new(
            SearchQuery::Proximity {
                center: LatLng { lat: 0.0, lng: 0.0 },
                radius_km: 1.0,
            },
            Vec::new(),
        );
        assert!(Arc::ptr_eq(&compute_display_set(&baseline, &search), &baseline));
    }

    #[test]
    fn same_inputs_yield_same_allocation() {
        let baseline: Arc<[Entity]> = vec![entity(1)].into();
        let search = SearchState::new(
            SearchQuery::Text { query: "a".into() },
            vec![entity(9)],
        );
        let first = compute_display_set(&baseline, &search);
        let second = compute_display_set(&baseline, &search);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
