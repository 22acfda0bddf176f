use super::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use tokio::{net::TcpListener, sync::Mutex};

type Params = Query<HashMap<String, String>>;
type Rejection = (StatusCode, Json<Value>);

#[derive(Clone, Default)]
struct ServerState {
    seen: Arc<Mutex<Vec<String>>>,
    entities: Arc<Mutex<Vec<Entity>>>,
}

impl ServerState {
    async fn record(&self, line: String) {
        self.seen.lock().await.push(line);
    }
}

fn named(id: i64, name: &str, lat: f64, lng: f64) -> Entity {
    let mut entity = Entity::located(EntityId(id), LatLng { lat, lng });
    entity.name = Some(name.to_string());
    entity
}

fn from_payload(id: i64, payload: &EntityPayload) -> Entity {
    let mut entity = Entity::located(EntityId(id), payload.location());
    entity.name = payload.name.clone();
    entity.denomination = payload.denomination.clone();
    entity.religion = payload.religion.clone();
    entity.amenity = payload.amenity.clone();
    entity.building = payload.building.clone();
    entity
}

fn not_found() -> Rejection {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "Entity not found" })),
    )
}

fn param(params: &HashMap<String, String>, key: &str) -> String {
    params.get(key).cloned().unwrap_or_default()
}

async fn list_entities(State(state): State<ServerState>, Query(params): Params) -> Json<Vec<Entity>> {
    state
        .record(format!(
            "list offset={} limit={}",
            param(&params, "offset"),
            param(&params, "limit")
        ))
        .await;
    Json(state.entities.lock().await.clone())
}

async fn create_entity(
    State(state): State<ServerState>,
    Json(payload): Json<EntityPayload>,
) -> (StatusCode, Json<Entity>) {
    state.record("create".to_string()).await;
    let mut entities = state.entities.lock().await;
    let created = from_payload(100 + entities.len() as i64, &payload);
    entities.push(created.clone());
    (StatusCode::CREATED, Json(created))
}

async fn get_entity(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<Entity>, Rejection> {
    state.record(format!("get {id}")).await;
    state
        .entities
        .lock()
        .await
        .iter()
        .find(|entity| entity.id.0 == id)
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}

async fn update_entity(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<EntityPayload>,
) -> Result<Json<Entity>, Rejection> {
    state.record(format!("update {id}")).await;
    let mut entities = state.entities.lock().await;
    let slot = entities
        .iter_mut()
        .find(|entity| entity.id.0 == id)
        .ok_or_else(not_found)?;
    *slot = from_payload(id, &payload);
    Ok(Json(slot.clone()))
}

async fn delete_entity(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, Rejection> {
    state.record(format!("delete {id}")).await;
    let mut entities = state.entities.lock().await;
    let before = entities.len();
    entities.retain(|entity| entity.id.0 != id);
    if entities.len() == before {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn search_text(State(state): State<ServerState>, Query(params): Params) -> Json<Vec<Entity>> {
    let query = param(&params, "q");
    state
        .record(format!("text q={query} limit={}", param(&params, "limit")))
        .await;
    let needle = query.to_lowercase();
    let matches = state
        .entities
        .lock()
        .await
        .iter()
        .filter(|entity| entity.display_name().to_lowercase().contains(&needle))
        .cloned()
        .collect();
    Json(matches)
}

async fn search_nearby(State(state): State<ServerState>, Query(params): Params) -> Json<Vec<Entity>> {
    state
        .record(format!(
            "nearby lat={} lng={} radiusKm={} limit={}",
            param(&params, "lat"),
            param(&params, "lng"),
            param(&params, "radiusKm"),
            param(&params, "limit")
        ))
        .await;
    let mut near = named(2, "Near", 10.0, 10.001);
    near.distance_meters = Some(109.5);
    let mut far = named(1, "Far", 10.0, 10.02);
    far.distance_meters = Some(2190.0);
    Json(vec![near, far])
}

async fn spawn_directory_server(seed: Vec<Entity>) -> (String, ServerState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = ServerState::default();
    *state.entities.lock().await = seed;
    let app = Router::new()
        .route("/entities", get(list_entities).post(create_entity))
        .route("/entities/search/text", get(search_text))
        .route("/entities/search/nearby", get(search_nearby))
        .route(
            "/entities/:id",
            get(get_entity).put(update_entity).delete(delete_entity),
        )
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

async fn spawn_fixed_response_server(status: StatusCode, body: &'static str) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().fallback(move || async move { (status, body) });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn directory_for(base_url: &str) -> HttpEntityDirectory {
    HttpEntityDirectory::with_timeout(base_url, "entities", Duration::from_secs(5))
        .expect("http client")
}

#[test]
fn collection_url_joins_without_duplicate_slashes() {
    let directory =
        HttpEntityDirectory::with_timeout("http://host:8000/", "/entities/", Duration::from_secs(1))
            .expect("http client");
    assert_eq!(directory.collection_url(), "http://host:8000/entities");
}

#[tokio::test]
async fn list_sends_offset_and_limit() {
    let (url, state) = spawn_directory_server(vec![named(1, "St. Joseph", 21.0, 105.8)]).await;
    let directory = directory_for(&url);

    let entities = directory.list(0, 1000).await.expect("list");
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].display_name(), "St. Joseph");
    assert_eq!(
        state.seen.lock().await.clone(),
        vec!["list offset=0 limit=1000".to_string()]
    );
}

#[tokio::test]
async fn text_and_nearby_searches_use_expected_parameters() {
    let (url, state) = spawn_directory_server(vec![
        named(1, "Cathedral of St. Mary", 10.0, 106.0),
        named(2, "Grace Chapel", 11.0, 106.0),
    ])
    .await;
    let directory = directory_for(&url);

    let (text, nearby) = futures::future::join(
        directory.search_by_text("st. mary", 50),
        directory.search_nearby(LatLng { lat: 10.0, lng: 10.0 }, 2.5, 50),
    )
    .await;
    let text = text.expect("text search");
    assert_eq!(text.len(), 1);
    assert_eq!(text[0].id, EntityId(1));

    let nearby = nearby.expect("nearby search");
    let ids: Vec<_> = nearby.iter().map(|entity| entity.id.0).collect();
    assert_eq!(ids, vec![2, 1]);
    assert_eq!(nearby[0].distance_meters, Some(109.5));

    let seen = state.seen.lock().await.clone();
    assert!(seen.contains(&"text q=st. mary limit=50".to_string()));
    assert!(seen.contains(&"nearby lat=10 lng=10 radiusKm=2.5 limit=50".to_string()));
}

#[tokio::test]
async fn create_update_delete_against_service() {
    let (url, state) = spawn_directory_server(Vec::new()).await;
    let directory = directory_for(&url);

    let payload = EntityPayload::at(LatLng { lat: 16.0, lng: 108.2 }).with_name("Han River Church");
    let created = directory.create(&payload).await.expect("create");
    assert_eq!(created.id, EntityId(100));
    assert_eq!(created.religion.as_deref(), Some("christian"));

    let renamed = payload.clone().with_name("Han River Parish");
    let updated = directory.update(created.id, &renamed).await.expect("update");
    assert_eq!(updated.name.as_deref(), Some("Han River Parish"));

    let fetched = directory.get(created.id).await.expect("get");
    assert_eq!(fetched, updated);

    directory.delete(created.id).await.expect("delete");
    assert!(state.entities.lock().await.is_empty());
    assert_eq!(
        state.seen.lock().await.clone(),
        vec![
            "create".to_string(),
            "update 100".to_string(),
            "get 100".to_string(),
            "delete 100".to_string(),
        ]
    );
}

#[tokio::test]
async fn missing_entity_surfaces_detail_message() {
    let (url, _state) = spawn_directory_server(Vec::new()).await;
    let directory = directory_for(&url);

    let err = directory.get(EntityId(42)).await.expect_err("missing");
    assert!(err.is_not_found());
    assert_eq!(
        err,
        DirectoryError::Server {
            status: 404,
            message: "Entity not found".to_string(),
        }
    );
}

#[tokio::test]
async fn error_message_prefers_message_then_detail_then_body() {
    let cases = [
        (
            StatusCode::BAD_REQUEST,
            r#"{"message":"name too long","detail":"ignored"}"#,
            "name too long",
        ),
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail":"latitude must be between -90 and 90"}"#,
            "latitude must be between -90 and 90",
        ),
        (StatusCode::BAD_GATEWAY, "upstream offline", "upstream offline"),
        (StatusCode::INTERNAL_SERVER_ERROR, "", "Internal Server Error"),
    ];

    for (status, body, expected) in cases {
        let url = spawn_fixed_response_server(status, body).await;
        let err = directory_for(&url)
            .list(0, 10)
            .await
            .expect_err("rejected");
        assert_eq!(
            err,
            DirectoryError::Server {
                status: status.as_u16(),
                message: expected.to_string(),
            }
        );
    }
}

#[tokio::test]
async fn undecodable_success_body_is_a_server_error() {
    let url = spawn_fixed_response_server(StatusCode::OK, "<html>maintenance</html>").await;
    let err = directory_for(&url)
        .search_by_text("chapel", 10)
        .await
        .expect_err("not json");
    match err {
        DirectoryError::Server { status, message } => {
            assert_eq!(status, 200);
            assert!(message.starts_with("invalid response body"), "{message}");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let err = directory_for(&format!("http://{addr}"))
        .search_by_text("chapel", 10)
        .await
        .expect_err("refused");
    assert!(matches!(err, DirectoryError::Network(_)));
}

#[tokio::test]
async fn slow_service_times_out_as_network_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().fallback(|| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Json(Vec::<Entity>::new())
    });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let directory = HttpEntityDirectory::with_timeout(
        &format!("http://{addr}"),
        "entities",
        Duration::from_millis(100),
    )
    .expect("http client");
    let err = directory.list(0, 10).await.expect_err("timeout");
    assert!(matches!(err, DirectoryError::Network(_)));
}

#[tokio::test]
async fn missing_directory_reports_unavailable() {
    let err = MissingEntityDirectory
        .list(0, 10)
        .await
        .expect_err("unavailable");
    assert!(matches!(err, DirectoryError::Network(_)));
}
