use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{EntityId, LatLng},
    error::ApiErrorBody,
    protocol::{Entity, EntityPayload},
};
use tracing::{debug, warn};

use crate::{config::ClientSettings, error::DirectoryError};

pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Remote directory of entities. Implementations surface timeouts as
/// [`DirectoryError::Network`].
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    async fn list(&self, offset: u32, limit: u32) -> DirectoryResult<Vec<Entity>>;
    async fn get(&self, id: EntityId) -> DirectoryResult<Entity>;
    async fn create(&self, payload: &EntityPayload) -> DirectoryResult<Entity>;
    async fn update(&self, id: EntityId, payload: &EntityPayload) -> DirectoryResult<Entity>;
    async fn delete(&self, id: EntityId) -> DirectoryResult<()>;
    async fn search_by_text(&self, query: &str, limit: u32) -> DirectoryResult<Vec<Entity>>;
    /// Results come back sorted ascending by distance; callers keep that order.
    async fn search_nearby(
        &self,
        center: LatLng,
        radius_km: f64,
        limit: u32,
    ) -> DirectoryResult<Vec<Entity>>;
}

pub struct MissingEntityDirectory;

#[async_trait]
impl EntityDirectory for MissingEntityDirectory {
    async fn list(&self, _offset: u32, _limit: u32) -> DirectoryResult<Vec<Entity>> {
        Err(unavailable())
    }

    async fn get(&self, _id: EntityId) -> DirectoryResult<Entity> {
        Err(unavailable())
    }

    async fn create(&self, _payload: &EntityPayload) -> DirectoryResult<Entity> {
        Err(unavailable())
    }

    async fn update(&self, _id: EntityId, _payload: &EntityPayload) -> DirectoryResult<Entity> {
        Err(unavailable())
    }

    async fn delete(&self, _id: EntityId) -> DirectoryResult<()> {
        Err(unavailable())
    }

    async fn search_by_text(&self, _query: &str, _limit: u32) -> DirectoryResult<Vec<Entity>> {
        Err(unavailable())
    }

    async fn search_nearby(
        &self,
        _center: LatLng,
        _radius_km: f64,
        _limit: u32,
    ) -> DirectoryResult<Vec<Entity>> {
        Err(unavailable())
    }
}

fn unavailable() -> DirectoryError {
    DirectoryError::Network("entity directory is unavailable".to_string())
}

pub struct HttpEntityDirectory {
    http: Client,
    collection_url: String,
}

impl HttpEntityDirectory {
    pub fn new(settings: &ClientSettings) -> DirectoryResult<Self> {
        Self::with_timeout(
            &settings.api_url,
            &settings.collection,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn with_timeout(
        base_url: &str,
        collection: &str,
        timeout: Duration,
    ) -> DirectoryResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DirectoryError::Network(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            collection_url: format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                collection.trim_matches('/')
            ),
        })
    }

    pub fn collection_url(&self) -> &str {
        &self.collection_url
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> DirectoryResult<T> {
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn check_status(response: Response) -> DirectoryResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&raw)
            .ok()
            .and_then(|body| body.text())
            .or_else(|| {
                let trimmed = raw.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
        warn!(status = status.as_u16(), %url, %message, "directory: request rejected");
        Err(DirectoryError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> DirectoryResult<Response> {
        request.send().await.map_err(|err| {
            warn!(error = %err, "directory: request failed");
            DirectoryError::from(err)
        })
    }
}

#[async_trait]
impl EntityDirectory for HttpEntityDirectory {
    async fn list(&self, offset: u32, limit: u32) -> DirectoryResult<Vec<Entity>> {
        debug!(offset, limit, "directory: list");
        let response = self
            .send(
                self.http
                    .get(&self.collection_url)
                    .query(&[("offset", offset), ("limit", limit)]),
            )
            .await?;
        Self::read_json(response).await
    }

    async fn get(&self, id: EntityId) -> DirectoryResult<Entity> {
        debug!(id = id.0, "directory: get");
        let response = self
            .send(self.http.get(format!("{}/{}", self.collection_url, id.0)))
            .await?;
        Self::read_json(response).await
    }

    async fn create(&self, payload: &EntityPayload) -> DirectoryResult<Entity> {
        debug!(lat = payload.latitude, lng = payload.longitude, "directory: create");
        let response = self
            .send(self.http.post(&self.collection_url).json(payload))
            .await?;
        Self::read_json(response).await
    }

    async fn update(&self, id: EntityId, payload: &EntityPayload) -> DirectoryResult<Entity> {
        debug!(id = id.0, "directory: update");
        let response = self
            .send(
                self.http
                    .put(format!("{}/{}", self.collection_url, id.0))
                    .json(payload),
            )
            .await?;
        Self::read_json(response).await
    }

    async fn delete(&self, id: EntityId) -> DirectoryResult<()> {
        debug!(id = id.0, "directory: delete");
        let response = self
            .send(self.http.delete(format!("{}/{}", self.collection_url, id.0)))
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn search_by_text(&self, query: &str, limit: u32) -> DirectoryResult<Vec<Entity>> {
        debug!(query, limit, "directory: text search");
        let limit = limit.to_string();
        let response = self
            .send(
                self.http
                    .get(format!("{}/search/text", self.collection_url))
                    .query(&[("q", query), ("limit", limit.as_str())]),
            )
            .await?;
        Self::read_json(response).await
    }

    async fn search_nearby(
        &self,
        center: LatLng,
        radius_km: f64,
        limit: u32,
    ) -> DirectoryResult<Vec<Entity>> {
        debug!(lat = center.lat, lng = center.lng, radius_km, limit, "directory: nearby search");
        let response = self
            .send(
                self.http
                    .get(format!("{}/search/nearby", self.collection_url))
                    .query(&[
                        ("lat", center.lat.to_string()),
                        ("lng", center.lng.to_string()),
                        ("radiusKm", radius_km.to_string()),
                        ("limit", limit.to_string()),
                    ]),
            )
            .await?;
        Self::read_json(response).await
    }
}

#[cfg(test)]
#[path = "tests/directory_tests.rs"]
mod tests;
