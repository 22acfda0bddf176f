//! Search state, query validation and the last-issued-wins request token.

use std::sync::Arc;

use serde::Serialize;
use shared::{domain::LatLng, protocol::Entity};

use crate::error::ValidationError;

pub const MAX_RADIUS_KM: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    None,
    Text,
    Proximity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchQuery {
    Text { query: String },
    Proximity { center: LatLng, radius_km: f64 },
}

impl SearchQuery {
    pub fn mode(&self) -> SearchMode {
        match self {
            SearchQuery::Text { .. } => SearchMode::Text,
            SearchQuery::Proximity { .. } => SearchMode::Proximity,
        }
    }
}

/// Monotonic token identifying one issued search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone)]
pub struct SearchState {
    pub query: Option<SearchQuery>,
    /// Service order: relevance for text, ascending distance for proximity.
    pub results: Arc<[Entity]>,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            query: None,
            results: Arc::from(Vec::new()),
        }
    }
}

impl SearchState {
    pub fn new(query: SearchQuery, results: Vec<Entity>) -> Self {
        Self {
            query: Some(query),
            results: results.into(),
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.query
            .as_ref()
            .map(SearchQuery::mode)
            .unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        self.query.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Applied {
        request_id: RequestId,
        results: Vec<Entity>,
    },
    /// A later request was issued before this one resolved.
    Discarded { request_id: RequestId },
}

impl SearchOutcome {
    pub fn request_id(&self) -> RequestId {
        match self {
            SearchOutcome::Applied { request_id, .. } | SearchOutcome::Discarded { request_id } => {
                *request_id
            }
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, SearchOutcome::Applied { .. })
    }

    pub fn results(&self) -> Option<&[Entity]> {
        match self {
            SearchOutcome::Applied { results, .. } => Some(results),
            SearchOutcome::Discarded { .. } => None,
        }
    }
}

/// Issues request tokens; only the most recently issued one may apply.
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: u64,
}

impl RequestTracker {
    pub fn issue(&mut self) -> RequestId {
        self.latest += 1;
        RequestId(self.latest)
    }

    pub fn latest(&self) -> RequestId {
        RequestId(self.latest)
    }

    pub fn is_current(&self, id: RequestId) -> bool {
        id.0 == self.latest
    }
}

pub fn validate_text_query(query: &str) -> Result<String, ValidationError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyQuery);
    }
    Ok(trimmed.to_string())
}

pub fn validate_proximity(center: Option<LatLng>, radius_km: f64) -> Result<LatLng, ValidationError> {
    let center = center.ok_or(ValidationError::MissingCenter)?;
    center.validate()?;
    if !radius_km.is_finite() || radius_km <= 0.0 || radius_km > MAX_RADIUS_KM {
        return Err(ValidationError::Radius(radius_km));
    }
    Ok(center)
}
