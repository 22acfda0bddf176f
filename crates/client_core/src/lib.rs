use std::sync::Arc;

use serde::Serialize;
use shared::{
    domain::{EntityId, LatLng},
    protocol::{Entity, EntityPayload},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod config;
pub mod directory;
pub mod display;
pub mod entry_mode;
pub mod error;
pub mod map_sync;
pub mod search;

pub use config::{ClientSettings, MapSettings};
pub use directory::{EntityDirectory, HttpEntityDirectory, MissingEntityDirectory};
pub use display::compute_display_set;
pub use entry_mode::{EntryMode, EntryTarget};
pub use error::{DirectoryError, LocatorError, LocatorResult, ValidationError};
pub use map_sync::{plan_render, Marker, RenderPlan, Viewport};
pub use search::{RequestId, SearchMode, SearchOutcome, SearchQuery, SearchState};

use search::RequestTracker;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// User-visible notification (toast).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    fn new(level: NoticeLevel, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// What the edit form should be opened with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryForm {
    New { location: LatLng },
    Edit { entity: Entity },
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SearchApplied {
        request_id: RequestId,
        mode: SearchMode,
        count: usize,
    },
    SearchDiscarded {
        request_id: RequestId,
    },
    SearchCleared,
    BaselineRefreshed {
        count: usize,
    },
    SelectionChanged(Option<EntityId>),
    EntryModeChanged(EntryMode),
    EntryFormRequested(EntryForm),
    Notice(Notice),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub selected_entity_id: Option<EntityId>,
    pub requested_center: Option<LatLng>,
    pub add_mode: bool,
    pub pending_new_location: Option<LatLng>,
    pub entry: EntryMode,
    /// A create, update or delete is waiting on the directory.
    pub saving: bool,
}

/// Immutable copy of the coordinator state handed to collaborators.
#[derive(Debug, Clone)]
pub struct LocatorSnapshot {
    pub baseline: Arc<[Entity]>,
    pub search: SearchState,
    pub display: Arc<[Entity]>,
    pub view: ViewState,
}

struct LocatorState {
    baseline: Arc<[Entity]>,
    search: SearchState,
    search_requests: RequestTracker,
    baseline_requests: RequestTracker,
    entry_requests: RequestTracker,
    entry_in_flight: Option<RequestId>,
    selected: Option<EntityId>,
    requested_center: Option<LatLng>,
    reposition_pending: bool,
    entry: EntryMode,
}

impl LocatorState {
    fn new() -> Self {
        Self {
            baseline: Arc::from(Vec::new()),
            search: SearchState::default(),
            search_requests: RequestTracker::default(),
            baseline_requests: RequestTracker::default(),
            entry_requests: RequestTracker::default(),
            entry_in_flight: None,
            selected: None,
            requested_center: None,
            reposition_pending: true,
            entry: EntryMode::Browse,
        }
    }

    fn display(&self) -> Arc<[Entity]> {
        compute_display_set(&self.baseline, &self.search)
    }

    fn request_center(&mut self, center: Option<LatLng>) {
        self.requested_center = center;
        self.reposition_pending = true;
    }

    /// Resets the search and supersedes any search still in flight.
    fn clear_search(&mut self) {
        self.search_requests.issue();
        self.search = SearchState::default();
        self.request_center(None);
    }

    fn patch_search_results(&mut self, apply: impl FnOnce(&mut Vec<Entity>)) {
        if self.search.results.is_empty() {
            return;
        }
        let mut results = self.search.results.to_vec();
        apply(&mut results);
        self.search.results = results.into();
    }

    /// One directory write per form; a second submit or delete is rejected
    /// until the first one settles or the form is cancelled.
    fn begin_entry_request(&mut self, operation: &'static str) -> Result<RequestId, ValidationError> {
        if self.entry_in_flight.is_some() {
            return Err(ValidationError::InvalidTransition {
                operation,
                state: "saving",
            });
        }
        let request_id = self.entry_requests.issue();
        self.entry_in_flight = Some(request_id);
        Ok(request_id)
    }

    /// False when the form was cancelled (and possibly reopened) meanwhile.
    fn finish_entry_request(&mut self, request_id: RequestId) -> bool {
        if self.entry_in_flight != Some(request_id) {
            return false;
        }
        self.entry_in_flight = None;
        true
    }

    fn view(&self) -> ViewState {
        ViewState {
            selected_entity_id: self.selected,
            requested_center: self.requested_center,
            add_mode: self.entry.add_mode(),
            pending_new_location: self.entry.pending_location(),
            entry: self.entry.clone(),
            saving: self.entry_in_flight.is_some(),
        }
    }
}

/// Owns search, baseline and view state; the single writer for all of it.
pub struct LocatorClient {
    directory: Arc<dyn EntityDirectory>,
    settings: ClientSettings,
    inner: Mutex<LocatorState>,
    events: broadcast::Sender<ClientEvent>,
}

impl LocatorClient {
    pub fn new(settings: ClientSettings) -> Arc<Self> {
        Self::new_with_directory(Arc::new(MissingEntityDirectory), settings)
    }

    pub fn connect(settings: ClientSettings) -> LocatorResult<Arc<Self>> {
        let directory = HttpEntityDirectory::new(&settings)?;
        Ok(Self::new_with_directory(Arc::new(directory), settings))
    }

    pub fn new_with_directory(
        directory: Arc<dyn EntityDirectory>,
        settings: ClientSettings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            directory,
            settings,
            inner: Mutex::new(LocatorState::new()),
            events,
        })
    }

    /// Builds the client and loads the baseline; a failed load leaves it empty.
    pub async fn initialize(
        directory: Arc<dyn EntityDirectory>,
        settings: ClientSettings,
    ) -> Arc<Self> {
        let client = Self::new_with_directory(directory, settings);
        if let Err(err) = client.refresh_baseline().await {
            warn!(error = %err, "locator: initial baseline load failed");
        }
        client
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn directory(&self) -> Arc<dyn EntityDirectory> {
        Arc::clone(&self.directory)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn notify(&self, level: NoticeLevel, title: impl Into<String>, description: impl Into<String>) {
        self.emit(ClientEvent::Notice(Notice::new(level, title, description)));
    }

    pub async fn snapshot(&self) -> LocatorSnapshot {
        let guard = self.inner.lock().await;
        LocatorSnapshot {
            baseline: Arc::clone(&guard.baseline),
            search: guard.search.clone(),
            display: guard.display(),
            view: guard.view(),
        }
    }

    pub async fn display_set(&self) -> Arc<[Entity]> {
        self.inner.lock().await.display()
    }

    pub async fn view_state(&self) -> ViewState {
        self.inner.lock().await.view()
    }

    /// Computes the map instruction. The viewport is marked for repositioning
    /// only once per center change, so later plans leave manual pans alone.
    pub async fn render_plan(&self) -> RenderPlan {
        let mut guard = self.inner.lock().await;
        let display = guard.display();
        let mut plan = plan_render(
            &display,
            guard.selected,
            guard.requested_center,
            &self.settings.map,
        );
        plan.reposition = std::mem::take(&mut guard.reposition_pending);
        plan.draft_location = guard.entry.pending_location();
        plan
    }

    pub async fn refresh_baseline(&self) -> LocatorResult<()> {
        let request_id = self.inner.lock().await.baseline_requests.issue();
        let result = self
            .directory
            .list(0, self.settings.baseline_limit)
            .await;

        let mut guard = self.inner.lock().await;
        if !guard.baseline_requests.is_current(request_id) {
            debug!(request_id = request_id.0, "baseline: stale refresh discarded");
            return Ok(());
        }
        match result {
            Ok(entities) => {
                let count = entities.len();
                guard.baseline = entities.into();
                drop(guard);
                info!(count, "baseline: refreshed");
                self.emit(ClientEvent::BaselineRefreshed { count });
                Ok(())
            }
            Err(err) => {
                let kept = guard.baseline.len();
                drop(guard);
                warn!(error = %err, kept, "baseline: refresh failed; keeping previous snapshot");
                if kept == 0 {
                    self.notify(
                        NoticeLevel::Error,
                        "Error loading entities",
                        "Unable to load entity data from the server",
                    );
                } else {
                    self.notify(
                        NoticeLevel::Warning,
                        "Error loading entities",
                        format!("Showing {kept} previously loaded entities"),
                    );
                }
                Err(err.into())
            }
        }
    }

    pub async fn run_text_search(&self, query: &str) -> LocatorResult<SearchOutcome> {
        let query = search::validate_text_query(query)?;
        self.run_search(SearchQuery::Text { query }).await
    }

    /// On success the viewport is asked to focus on `center`.
    pub async fn run_proximity_search(
        &self,
        center: Option<LatLng>,
        radius_km: f64,
    ) -> LocatorResult<SearchOutcome> {
        let center = search::validate_proximity(center, radius_km)?;
        self.run_search(SearchQuery::Proximity { center, radius_km })
            .await
    }

    async fn run_search(&self, query: SearchQuery) -> LocatorResult<SearchOutcome> {
        let request_id = self.inner.lock().await.search_requests.issue();
        let limit = self.settings.search_limit;
        let result = match &query {
            SearchQuery::Text { query } => self.directory.search_by_text(query, limit).await,
            SearchQuery::Proximity { center, radius_km } => {
                self.directory
                    .search_nearby(*center, *radius_km, limit)
                    .await
            }
        };

        let mut guard = self.inner.lock().await;
        if !guard.search_requests.is_current(request_id) {
            drop(guard);
            debug!(
                request_id = request_id.0,
                mode = ?query.mode(),
                "search: superseded response discarded"
            );
            self.emit(ClientEvent::SearchDiscarded { request_id });
            return Ok(SearchOutcome::Discarded { request_id });
        }

        let results = match result {
            Ok(results) => results,
            Err(err) => {
                drop(guard);
                warn!(
                    request_id = request_id.0,
                    mode = ?query.mode(),
                    error = %err,
                    "search: request failed; keeping previous results"
                );
                let title = match query.mode() {
                    SearchMode::Proximity => "Proximity search failed",
                    _ => "Search failed",
                };
                let err = LocatorError::from(err);
                self.notify(NoticeLevel::Error, title, err.user_message());
                return Err(err);
            }
        };

        let mode = query.mode();
        let count = results.len();
        let description = match &query {
            SearchQuery::Text { .. } => format!("Found {count} entities"),
            SearchQuery::Proximity {
                center, radius_km, ..
            } => {
                guard.request_center(Some(*center));
                format!("Found {count} entities within {radius_km}km")
            }
        };
        guard.search = SearchState::new(query, results.clone());
        drop(guard);

        info!(request_id = request_id.0, ?mode, count, "search: results applied");
        self.emit(ClientEvent::SearchApplied {
            request_id,
            mode,
            count,
        });
        self.notify(NoticeLevel::Success, "Search completed", description);
        Ok(SearchOutcome::Applied {
            request_id,
            results,
        })
    }

    pub async fn clear_search(&self) {
        self.inner.lock().await.clear_search();
        debug!("search: cleared");
        self.emit(ClientEvent::SearchCleared);
    }

    pub async fn on_marker_clicked(&self, id: EntityId) {
        self.select(Some(id)).await;
    }

    /// Selection is a back-reference; ids outside the display set are kept
    /// but open no popup.
    pub async fn select(&self, id: Option<EntityId>) {
        let changed = {
            let mut guard = self.inner.lock().await;
            std::mem::replace(&mut guard.selected, id) != id
        };
        if changed {
            self.emit(ClientEvent::SelectionChanged(id));
        }
    }

    /// Focuses the viewport on a displayed entity. Returns false when the
    /// entity is not displayed or has no location.
    pub async fn center_on_entity(&self, id: EntityId) -> bool {
        let mut guard = self.inner.lock().await;
        let location = guard
            .display()
            .iter()
            .find(|entity| entity.id == id)
            .and_then(Entity::location);
        match location {
            Some(location) => {
                guard.request_center(Some(location));
                true
            }
            None => false,
        }
    }

    pub async fn set_add_mode(&self, enabled: bool) {
        let changed = {
            let mut guard = self.inner.lock().await;
            guard
                .entry
                .set_add_mode(enabled)
                .then(|| guard.entry.clone())
        };
        if let Some(entry) = changed {
            debug!(state = entry.name(), "entry: add mode toggled");
            self.emit(ClientEvent::EntryModeChanged(entry));
        }
    }

    /// Captures the location while armed; `Ok(None)` in every other mode.
    pub async fn on_map_clicked(&self, location: LatLng) -> LocatorResult<Option<LatLng>> {
        let captured = self.inner.lock().await.entry.map_clicked(location)?;
        if let Some(location) = captured {
            info!(lat = location.lat, lng = location.lng, "entry: new location captured");
            self.emit(ClientEvent::EntryModeChanged(EntryMode::AddPending {
                location,
            }));
            self.emit(ClientEvent::EntryFormRequested(EntryForm::New { location }));
        }
        Ok(captured)
    }

    pub async fn begin_edit(&self, id: EntityId) -> LocatorResult<Entity> {
        {
            let guard = self.inner.lock().await;
            if !matches!(guard.entry, EntryMode::Browse) {
                return Err(ValidationError::InvalidTransition {
                    operation: "edit",
                    state: guard.entry.name(),
                }
                .into());
            }
        }

        let entity = self.directory.get(id).await.map_err(|err| {
            warn!(id = id.0, error = %err, "entry: failed to load entity for editing");
            LocatorError::from(err)
        })?;

        let mode = {
            let mut guard = self.inner.lock().await;
            guard.entry.begin_edit(entity.clone())?;
            guard.entry.clone()
        };
        self.emit(ClientEvent::EntryModeChanged(mode));
        self.emit(ClientEvent::EntryFormRequested(EntryForm::Edit {
            entity: entity.clone(),
        }));
        Ok(entity)
    }

    /// Submits the edit form. Failures keep the current add/edit state so the
    /// user can retry without re-entering data.
    pub async fn submit_entry(&self, payload: EntityPayload) -> LocatorResult<Entity> {
        payload.validate()?;
        let (target, request_id) = {
            let mut guard = self.inner.lock().await;
            let target = guard.entry.submit_target()?;
            (target, guard.begin_entry_request("submit")?)
        };

        let result = match target {
            EntryTarget::Create => self.directory.create(&payload).await,
            EntryTarget::Update(id) => self.directory.update(id, &payload).await,
        };
        let saved = match result {
            Ok(saved) => saved,
            Err(err) => {
                self.inner.lock().await.finish_entry_request(request_id);
                warn!(?target, error = %err, "entry: save failed; form kept open");
                let err = LocatorError::from(err);
                self.notify(NoticeLevel::Error, "Error", err.user_message());
                return Err(err);
            }
        };

        let mut guard = self.inner.lock().await;
        if !guard.finish_entry_request(request_id) {
            drop(guard);
            info!(id = saved.id.0, ?target, "entry: save completed after the form was closed");
            self.notify(
                NoticeLevel::Info,
                "Entity saved",
                "A change submitted before the form was closed has been saved.",
            );
            if let Err(err) = self.refresh_baseline().await {
                warn!(error = %err, "entry: baseline refresh after save failed");
            }
            return Ok(saved);
        }

        guard.entry.complete();
        let search_cleared = match target {
            EntryTarget::Create => {
                let was_active = guard.search.is_active();
                guard.clear_search();
                guard.selected = Some(saved.id);
                guard.request_center(saved.location());
                was_active
            }
            EntryTarget::Update(id) => {
                guard.patch_search_results(|results| {
                    for entity in results.iter_mut().filter(|entity| entity.id == id) {
                        let distance_meters = entity.distance_meters;
                        *entity = Entity {
                            distance_meters,
                            ..saved.clone()
                        };
                    }
                });
                false
            }
        };
        let entry = guard.entry.clone();
        drop(guard);

        info!(id = saved.id.0, ?target, "entry: saved");
        self.emit(ClientEvent::EntryModeChanged(entry));
        if search_cleared {
            self.emit(ClientEvent::SearchCleared);
        }
        if target == EntryTarget::Create {
            self.emit(ClientEvent::SelectionChanged(Some(saved.id)));
        }
        let (title, description) = match target {
            EntryTarget::Create => ("Entity added", "New entity has been successfully added."),
            EntryTarget::Update(_) => (
                "Entity updated",
                "Entity information has been successfully updated.",
            ),
        };
        self.notify(NoticeLevel::Success, title, description);

        if let Err(err) = self.refresh_baseline().await {
            warn!(error = %err, "entry: baseline refresh after save failed");
        }
        Ok(saved)
    }

    pub async fn delete_editing(&self) -> LocatorResult<()> {
        let (id, request_id) = {
            let mut guard = self.inner.lock().await;
            let id = guard
                .entry
                .editing_id()
                .ok_or(ValidationError::InvalidTransition {
                    operation: "delete",
                    state: guard.entry.name(),
                })?;
            (id, guard.begin_entry_request("delete")?)
        };

        if let Err(err) = self.directory.delete(id).await {
            self.inner.lock().await.finish_entry_request(request_id);
            warn!(id = id.0, error = %err, "entry: delete failed; form kept open");
            let err = LocatorError::from(err);
            self.notify(
                NoticeLevel::Error,
                "Error",
                "An error occurred while deleting the entity.",
            );
            return Err(err);
        }

        let (entry, selection_cleared) = {
            let mut guard = self.inner.lock().await;
            if guard.finish_entry_request(request_id) {
                guard.entry.complete();
            }
            guard.patch_search_results(|results| results.retain(|entity| entity.id != id));
            let selection_cleared = guard.selected == Some(id);
            if selection_cleared {
                guard.selected = None;
            }
            (guard.entry.clone(), selection_cleared)
        };

        info!(id = id.0, "entry: deleted");
        self.emit(ClientEvent::EntryModeChanged(entry));
        if selection_cleared {
            self.emit(ClientEvent::SelectionChanged(None));
        }
        self.notify(
            NoticeLevel::Success,
            "Entity deleted",
            "Entity has been successfully deleted.",
        );

        if let Err(err) = self.refresh_baseline().await {
            warn!(error = %err, "entry: baseline refresh after delete failed");
        }
        Ok(())
    }

    pub async fn cancel_entry(&self) {
        let changed = {
            let mut guard = self.inner.lock().await;
            guard.entry_in_flight = None;
            guard.entry.cancel()
        };
        if changed {
            debug!("entry: cancelled");
            self.emit(ClientEvent::EntryModeChanged(EntryMode::Browse));
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
