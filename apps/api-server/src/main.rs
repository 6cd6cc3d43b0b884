//! api-server: local HTTP front for the KonBase mock backend.
//!
//! Serves one shared `MockClient` over PostgREST-shaped routes so the web
//! app (or curl) can run against demo data without the hosted service:
//! - `/rest/v1/:table` select/insert/upsert/update/delete
//! - `/auth/v1/*` password sign-in, sign-up, logout and session
//! - `/functions/v1/:name` edge-function stubs
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # no simulated latency, JSON logs
//! MOCK_LATENCY=off LOG_FORMAT=json cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use domain::adapters::memory_store::InMemoryStore;
use domain::{RecordStore, Table};
use http_common::{
    code_for_status, json_err, json_error_with_message, parse_query_param, parse_rest_query,
    RestQuery,
};
use mock_client::{ClientConfig, ClientError, MockClient, QueryBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";

#[derive(Clone)]
struct AppState {
    client: MockClient,
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.log_summary();

    let state = AppState {
        client: build_client(&cfg),
    };
    let mut app = router(state);

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin.clone()]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PATCH,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::ACCEPT,
                axum::http::HeaderName::from_static("apikey"),
                axum::http::HeaderName::from_static("prefer"),
            ])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "bind failed");
            std::process::exit(1);
        }
    };
    info!(%addr, "api-server listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Seeded or empty store, with or without simulated latency.
fn build_client(cfg: &config::Config) -> MockClient {
    let store = if cfg.seed_fixtures {
        InMemoryStore::seeded()
    } else {
        InMemoryStore::new()
    };
    let latency = if cfg.mock_latency {
        ClientConfig::default()
    } else {
        ClientConfig::instant()
    };
    MockClient::new(Arc::new(store), latency)
}

fn router(state: AppState) -> Router {
    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    Router::new()
        .route("/health", get(health))
        .route(
            "/rest/v1/:table",
            get(select_rows)
                .post(insert_rows)
                .patch(update_rows)
                .delete(delete_rows),
        )
        .route("/auth/v1/token", post(sign_in))
        .route("/auth/v1/signup", post(sign_up))
        .route("/auth/v1/logout", post(sign_out))
        .route("/auth/v1/session", get(get_session))
        .route("/functions/v1/:name", post(invoke_function))
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .with_state(state)
}

// ============================================================================
// Error mapping
// ============================================================================

fn error_response(e: ClientError) -> Response {
    let status = e
        .status
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(status = status.as_u16(), err = %e.message, "request failed");
    } else {
        warn!(status = status.as_u16(), err = %e.message, "request rejected");
    }
    (
        status,
        Json(json_error_with_message(code_for_status(status.as_u16()), &e.message)),
    )
        .into_response()
}

fn bad_request(message: &str) -> Response {
    warn!(err = message, "bad request");
    (
        StatusCode::BAD_REQUEST,
        Json(json_error_with_message("bad_request", message)),
    )
        .into_response()
}

fn parse_body(body: &Bytes) -> Result<Value, Response> {
    if body.is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_slice(body).map_err(|e| bad_request(&format!("Invalid JSON body: {}", e)))
}

// ============================================================================
// Table routes
// ============================================================================

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.client.store();
    let rows: usize = Table::ALL
        .iter()
        .filter_map(|t| store.all(*t).ok())
        .map(|rows| rows.len())
        .sum();
    Json(json!({"status": "ok", "tables": Table::ALL.len(), "rows": rows}))
}

// Filter operands are typed by the column they compare against, so
// `serial_number=eq.123` stays text while `quantity=eq.5` is an integer.
fn apply_filters(mut builder: QueryBuilder, table: &str, q: &RestQuery) -> QueryBuilder {
    let schema = Table::parse(table).ok().map(Table::schema);
    let operand = |column: &str, raw: &str| match schema {
        Some(s) => s.operand(column, raw),
        None => Value::String(raw.to_string()),
    };
    if let Some(cols) = &q.select {
        builder = builder.select(cols);
    }
    for (column, raw) in &q.eq {
        builder = builder.eq(column, operand(column, raw));
    }
    if let Some(expr) = &q.or {
        builder = builder.or(expr);
    }
    if let Some((column, values)) = &q.in_filter {
        let values = values.iter().map(|raw| operand(column, raw)).collect();
        builder = builder.in_(column, values);
    }
    if let Some((column, ascending)) = &q.order {
        builder = builder.order(column, *ascending);
    }
    if let Some(n) = q.limit {
        builder = builder.limit(n);
    }
    builder
}

fn wants_object(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(OBJECT_MEDIA_TYPE))
}

fn prefers_merge(headers: &HeaderMap) -> bool {
    headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("resolution=merge-duplicates"))
}

async fn run_query(builder: QueryBuilder, single: bool, created: bool) -> Response {
    let builder = if single { builder.single() } else { builder };
    match builder.execute().await {
        Ok(res) => {
            if single && res.data.is_none() {
                return (StatusCode::NOT_FOUND, Json(json_err("not_found"))).into_response();
            }
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            let mut resp = (status, Json(res.data)).into_response();
            if let Some(count) = res.count {
                if let Ok(v) = HeaderValue::from_str(&format!("*/{}", count)) {
                    resp.headers_mut().insert(header::CONTENT_RANGE, v);
                }
            }
            resp
        }
        Err(e) => error_response(e),
    }
}

async fn select_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let q = match parse_rest_query(query.as_deref()) {
        Ok(q) => q,
        Err(e) => return bad_request(&e.to_string()),
    };
    let builder = apply_filters(state.client.from(&table), &table, &q);
    run_query(builder, wants_object(&headers), false).await
}

async fn insert_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let q = match parse_rest_query(query.as_deref()) {
        Ok(q) => q,
        Err(e) => return bad_request(&e.to_string()),
    };
    let data = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let builder = state.client.from(&table);
    let builder = if prefers_merge(&headers) {
        builder.upsert(data, q.on_conflict.as_deref())
    } else {
        builder.insert(data)
    };
    let builder = match &q.select {
        Some(cols) => builder.select(cols),
        None => builder,
    };
    run_query(builder, wants_object(&headers), true).await
}

async fn update_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let q = match parse_rest_query(query.as_deref()) {
        Ok(q) => q,
        Err(e) => return bad_request(&e.to_string()),
    };
    let patch = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let builder = apply_filters(state.client.from(&table), &table, &q).update(patch);
    run_query(builder, wants_object(&headers), false).await
}

async fn delete_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let q = match parse_rest_query(query.as_deref()) {
        Ok(q) => q,
        Err(e) => return bad_request(&e.to_string()),
    };
    let builder = apply_filters(state.client.from(&table), &table, &q).delete();
    match builder.execute().await {
        Ok(res) => Json(res.data).into_response(),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Auth routes
// ============================================================================

#[derive(Deserialize)]
struct PasswordReq {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct SignUpReq {
    email: String,
    password: String,
    #[serde(default)]
    data: Option<SignUpData>,
}

#[derive(Deserialize, Default)]
struct SignUpData {
    name: Option<String>,
}

async fn sign_in(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let grant = parse_query_param(query.as_deref(), "grant_type");
    if grant.as_deref().is_some_and(|g| g != "password") {
        return bad_request("Only grant_type=password is supported");
    }
    let req: PasswordReq = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return bad_request(&format!("Invalid JSON body: {}", e)),
    };
    match state
        .client
        .auth()
        .sign_in_with_password(&req.email, &req.password)
        .await
    {
        Ok(session) => Json(session).into_response(),
        Err(e) => error_response(e.into()),
    }
}

async fn sign_up(State(state): State<AppState>, body: Bytes) -> Response {
    let req: SignUpReq = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return bad_request(&format!("Invalid JSON body: {}", e)),
    };
    let name = req.data.unwrap_or_default().name;
    match state
        .client
        .auth()
        .sign_up(&req.email, &req.password, name.as_deref())
        .await
    {
        Ok(session) => (StatusCode::CREATED, Json(session)).into_response(),
        Err(e) => error_response(e.into()),
    }
}

async fn sign_out(State(state): State<AppState>) -> Response {
    match state.client.auth().sign_out().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e.into()),
    }
}

async fn get_session(State(state): State<AppState>) -> Response {
    match state.client.auth().get_session().await {
        Ok(session) => Json(json!({ "session": session })).into_response(),
        Err(e) => error_response(e.into()),
    }
}

// ============================================================================
// Functions
// ============================================================================

async fn invoke_function(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let payload = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match state.client.functions().invoke(&name, payload).await {
        Ok(v) => Json(v).into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn app() -> (Arc<InMemoryStore>, Router) {
        let store = Arc::new(InMemoryStore::seeded());
        let client = MockClient::new(store.clone(), ClientConfig::instant());
        (store, router(AppState { client }))
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (_store, router) = app();
        let resp = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], json!("ok"));
    }

    #[tokio::test]
    async fn select_with_filters_and_single() {
        let (_store, router) = app();
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/rest/v1/items?select=id,name&location_id=eq.loc-2&order=id.desc&limit=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(header::CONTENT_RANGE).unwrap(), "*/2");
        let rows = body_json(resp).await;
        assert_eq!(rows, json!([
            {"id": "item-6", "name": "Microphone"},
            {"id": "item-5", "name": "HDMI Cable (10m)"},
        ]));

        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/rest/v1/items?id=eq.item-1")
                    .header("accept", OBJECT_MEDIA_TYPE)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["name"], json!("Laptop"));
    }

    #[tokio::test]
    async fn filter_operands_follow_column_types() {
        let (store, router) = app();
        let tagged = domain::Record::new()
            .with("name", "Spare Laptop")
            .with("serial_number", "123")
            .with("location_id", "loc-1");
        let tagged = store.insert(Table::Items, tagged).unwrap();

        let get = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = router
            .clone()
            .oneshot(get("/rest/v1/items?select=id&serial_number=eq.123"))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await, json!([{"id": tagged.id().unwrap()}]));

        let resp = router
            .clone()
            .oneshot(get("/rest/v1/items?select=id&quantity=eq.5"))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await, json!([{"id": "item-3"}]));

        let resp = router
            .oneshot(get("/rest/v1/items?select=id&quantity=in.(3,4)&order=id.asc"))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await, json!([{"id": "item-4"}, {"id": "item-6"}]));
    }

    #[tokio::test]
    async fn unknown_table_is_404() {
        let (_store, router) = app();
        let resp = router
            .oneshot(Request::builder().uri("/rest/v1/widgets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(resp).await,
            json!({"error": {"code": "not_found", "message": "Mock table 'widgets' not found"}})
        );
    }

    #[tokio::test]
    async fn insert_update_delete_flow() {
        let (store, router) = app();
        let resp = router
            .clone()
            .oneshot(json_req("POST", "/rest/v1/categories", json!({"name": "Tents"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = body_json(resp).await;
        let id = created[0]["id"].as_str().unwrap().to_string();

        let resp = router
            .clone()
            .oneshot(json_req(
                "PATCH",
                &format!("/rest/v1/categories?id=eq.{}", id),
                json!({"description": "Camping"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let row = store.get(Table::Categories, &id).unwrap().unwrap();
        assert_eq!(row.str("description"), Some("Camping"));

        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/rest/v1/categories?id=eq.{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(store.get(Table::Categories, &id).unwrap().is_none());

        // delete without a filter is rejected
        let resp = router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/rest/v1/categories")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn guard_maps_to_conflict() {
        let (_store, router) = app();
        let resp = router
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/rest/v1/conventions?id=eq.conv-active")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(resp).await["error"]["message"],
            json!("Cannot delete an active convention.")
        );
    }

    #[tokio::test]
    async fn upsert_via_prefer_header() {
        let (store, router) = app();
        let req = Request::builder()
            .method("POST")
            .uri("/rest/v1/categories?on_conflict=id")
            .header("content-type", "application/json")
            .header("prefer", "resolution=merge-duplicates")
            .body(Body::from(json!({"id": "cat-2", "name": "Seating"}).to_string()))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let row = store.get(Table::Categories, "cat-2").unwrap().unwrap();
        assert_eq!(row.str("name"), Some("Seating"));
    }

    #[tokio::test]
    async fn auth_round_trip() {
        let (_store, router) = app();
        let resp = router
            .clone()
            .oneshot(json_req(
                "POST",
                "/auth/v1/token?grant_type=password",
                json!({"email": "admin@konbase.cfd", "password": "wrong"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = router
            .clone()
            .oneshot(json_req(
                "POST",
                "/auth/v1/token?grant_type=password",
                json!({"email": "admin@konbase.cfd", "password": mock_auth::DEMO_PASSWORD}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await["access_token"],
            json!("mock-access-token-user-admin")
        );

        let resp = router
            .clone()
            .oneshot(Request::builder().uri("/auth/v1/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["session"]["user"]["id"], json!("user-admin"));

        let resp = router
            .clone()
            .oneshot(json_req("POST", "/auth/v1/logout", json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = router
            .oneshot(Request::builder().uri("/auth/v1/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["session"], Value::Null);
    }

    #[tokio::test]
    async fn sign_up_and_duplicate() {
        let (_store, router) = app();
        let body = json!({"email": "new@konbase.cfd", "password": "pw", "data": {"name": "New"}});
        let resp = router
            .clone()
            .oneshot(json_req("POST", "/auth/v1/signup", body.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = router
            .oneshot(json_req("POST", "/auth/v1/signup", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(resp).await["error"]["message"],
            json!("User already registered")
        );
    }

    #[tokio::test]
    async fn functions_route() {
        let (_store, router) = app();
        let resp = router
            .clone()
            .oneshot(json_req("POST", "/functions/v1/verify-totp", json!({"token": "000000"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["verified"], json!(true));

        let resp = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/functions/v1/disable-2fa")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
