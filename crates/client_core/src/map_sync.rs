//! Reconciles the display set, the selection and a requested center into a
//! rendering instruction for the map surface.

use serde::Serialize;
use shared::{
    domain::{EntityId, LatLng},
    protocol::Entity,
};

use crate::config::MapSettings;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub entity: Entity,
    pub location: LatLng,
    pub is_popup_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPlan {
    pub markers: Vec<Marker>,
    pub viewport: Viewport,
    /// Set only on the first plan after the viewport target changed; the
    /// surface must not move the map otherwise.
    pub reposition: bool,
    /// Provisional marker for a location captured in add mode.
    pub draft_location: Option<LatLng>,
}

impl RenderPlan {
    pub fn open_marker(&self) -> Option<&Marker> {
        self.markers.iter().find(|marker| marker.is_popup_open)
    }

    /// Popup state for a rendering object that only knows its coordinates.
    pub fn is_popup_open_at(&self, location: LatLng) -> bool {
        self.open_marker()
            .is_some_and(|marker| marker.location.approx_eq(&location))
    }

    /// Marker drawn at `location`, within the round-trip tolerance.
    pub fn marker_at(&self, location: LatLng) -> Option<&Marker> {
        self.markers
            .iter()
            .find(|marker| marker.location.approx_eq(&location))
    }
}

pub fn viewport_for(requested_center: Option<LatLng>, settings: &MapSettings) -> Viewport {
    match requested_center {
        Some(center) => Viewport {
            center,
            zoom: settings.focused_zoom,
        },
        None => Viewport {
            center: settings.default_center,
            zoom: settings.overview_zoom,
        },
    }
}

/// Pure: one marker per located entity, at most one open popup.
///
/// A selection that is not part of `display` opens nothing and never pulls
/// the entity back into view.
pub fn plan_render(
    display: &[Entity],
    selected: Option<EntityId>,
    requested_center: Option<LatLng>,
    settings: &MapSettings,
) -> RenderPlan {
    let mut popup_assigned = false;
    let markers = display
        .iter()
        .filter_map(|entity| {
            let location = entity.location()?;
            let is_popup_open = !popup_assigned && selected == Some(entity.id);
            popup_assigned |= is_popup_open;
            Some(Marker {
                entity: entity.clone(),
                location,
                is_popup_open,
            })
        })
        .collect();

    RenderPlan {
        markers,
        viewport: viewport_for(requested_center, settings),
        reposition: false,
        draft_location: None,
    }
}
