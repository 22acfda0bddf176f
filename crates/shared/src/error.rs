use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

/// Error body returned by the directory service for rejected requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl ApiErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            detail: None,
        }
    }

    /// Human-readable text, preferring `message` over `detail`.
    pub fn text(&self) -> Option<String> {
        if let Some(message) = self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            return Some(message.to_string());
        }
        match self.detail.as_ref()? {
            serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_message_then_detail() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"message":"bad lat","detail":"ignored"}"#).expect("parse");
        assert_eq!(body.text().as_deref(), Some("bad lat"));

        let body: ApiErrorBody = serde_json::from_str(r#"{"detail":"Entity not found"}"#).expect("parse");
        assert_eq!(body.text().as_deref(), Some("Entity not found"));

        let body: ApiErrorBody =
            serde_json::from_str(r#"{"detail":[{"loc":["query","lat"]}]}"#).expect("parse");
        assert!(body.text().expect("structured detail").contains("lat"));

        assert_eq!(ApiErrorBody::default().text(), None);
    }
}
