//! Browse / add-new / edit interaction modes.

use serde::Serialize;
use shared::{
    domain::{EntityId, LatLng},
    protocol::Entity,
};

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryMode {
    #[default]
    Browse,
    /// Waiting for a map click.
    AddArmed,
    /// Location captured; the edit form is open.
    AddPending { location: LatLng },
    Editing { entity: Entity },
}

/// What a form submission turns into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryTarget {
    Create,
    Update(EntityId),
}

impl EntryMode {
    pub fn name(&self) -> &'static str {
        match self {
            EntryMode::Browse => "browse",
            EntryMode::AddArmed => "add_armed",
            EntryMode::AddPending { .. } => "add_pending",
            EntryMode::Editing { .. } => "editing",
        }
    }

    pub fn add_mode(&self) -> bool {
        matches!(self, EntryMode::AddArmed)
    }

    pub fn pending_location(&self) -> Option<LatLng> {
        match self {
            EntryMode::AddPending { location } => Some(*location),
            _ => None,
        }
    }

    pub fn editing_id(&self) -> Option<EntityId> {
        match self {
            EntryMode::Editing { entity } => Some(entity.id),
            _ => None,
        }
    }

    /// The add-mode switch. Returns whether the state changed.
    pub fn set_add_mode(&mut self, enabled: bool) -> bool {
        match self {
            EntryMode::Browse if enabled => {
                *self = EntryMode::AddArmed;
                true
            }
            EntryMode::AddArmed if !enabled => {
                *self = EntryMode::Browse;
                true
            }
            _ => false,
        }
    }

    /// Captures the click while armed and disarms; a no-op in every other state.
    pub fn map_clicked(&mut self, location: LatLng) -> Result<Option<LatLng>, ValidationError> {
        if !matches!(self, EntryMode::AddArmed) {
            return Ok(None);
        }
        location.validate()?;
        *self = EntryMode::AddPending { location };
        Ok(Some(location))
    }

    pub fn begin_edit(&mut self, entity: Entity) -> Result<(), ValidationError> {
        if !matches!(self, EntryMode::Browse) {
            return Err(ValidationError::InvalidTransition {
                operation: "edit",
                state: self.name(),
            });
        }
        *self = EntryMode::Editing { entity };
        Ok(())
    }

    pub fn submit_target(&self) -> Result<EntryTarget, ValidationError> {
        match self {
            EntryMode::AddPending { .. } => Ok(EntryTarget::Create),
            EntryMode::Editing { entity } => Ok(EntryTarget::Update(entity.id)),
            other => Err(ValidationError::InvalidTransition {
                operation: "submit",
                state: other.name(),
            }),
        }
    }

    /// Cancels any add or edit in progress. Returns whether the state changed.
    pub fn cancel(&mut self) -> bool {
        if matches!(self, EntryMode::Browse) {
            return false;
        }
        *self = EntryMode::Browse;
        true
    }

    /// A submit or delete went through.
    pub fn complete(&mut self) {
        *self = EntryMode::Browse;
    }
}
