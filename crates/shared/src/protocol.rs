use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Denomination, EntityId, LatLng},
    error::CoordinateError,
};

pub const DEFAULT_RELIGION: &str = "christian";
pub const DEFAULT_AMENITY: &str = "place_of_worship";
pub const DEFAULT_BUILDING: &str = "church";

/// A place of worship as returned by the directory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osm_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denomination: Option<Denomination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub religion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity {
    /// A minimal located entity; every descriptive field is empty.
    pub fn located(id: EntityId, location: LatLng) -> Self {
        Self {
            id,
            osm_id: None,
            name: None,
            denomination: None,
            religion: None,
            amenity: None,
            building: None,
            address: None,
            phone: None,
            website: None,
            description: None,
            latitude: Some(location.lat),
            longitude: Some(location.lng),
            distance_meters: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// `None` when either coordinate is missing or out of range.
    pub fn location(&self) -> Option<LatLng> {
        let location = LatLng {
            lat: self.latitude?,
            lng: self.longitude?,
        };
        location.is_valid().then_some(location)
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Unnamed place of worship")
    }

    pub fn to_payload(&self) -> Option<EntityPayload> {
        let location = self.location()?;
        Some(EntityPayload {
            name: self.name.clone(),
            denomination: self.denomination.clone(),
            religion: self.religion.clone(),
            amenity: self.amenity.clone(),
            building: self.building.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            website: self.website.clone(),
            description: self.description.clone(),
            latitude: location.lat,
            longitude: location.lng,
        })
    }
}

/// Validated output of the entity edit form; body of create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denomination: Option<Denomination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub religion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl EntityPayload {
    /// Form defaults for a new entry at `location`.
    pub fn at(location: LatLng) -> Self {
        Self {
            name: None,
            denomination: None,
            religion: Some(DEFAULT_RELIGION.to_string()),
            amenity: Some(DEFAULT_AMENITY.to_string()),
            building: Some(DEFAULT_BUILDING.to_string()),
            address: None,
            phone: None,
            website: None,
            description: None,
            latitude: location.lat,
            longitude: location.lng,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn location(&self) -> LatLng {
        LatLng {
            lat: self.latitude,
            lng: self.longitude,
        }
    }

    pub fn validate(&self) -> Result<(), CoordinateError> {
        self.location().validate()
    }
}
