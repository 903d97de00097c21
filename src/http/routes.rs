//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::app::AppState;
use crate::game::chat::sanitize;
use crate::game::session::{SessionClosed, SessionStatus};
use crate::game::tuning::{Tuning, TuningError, TuningPatch};
use crate::game::view::FrameView;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router. The websocket endpoint is mounted on the host only.
pub fn build_router(state: AppState) -> Router {
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origins
        .iter()
        .filter_map(|s| s.parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/tuning", get(get_tuning_handler).put(put_tuning_handler))
        .route("/frame", get(frame_handler))
        .route("/chat", post(chat_handler));

    if state.config.role.is_authority() {
        router = router.route("/ws", get(ws_handler));
    }

    router
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    #[serde(flatten)]
    session: SessionStatus,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        session: state.session.status(),
    })
}

// ============================================================================
// Live tuning endpoints
// ============================================================================

async fn get_tuning_handler(State(state): State<AppState>) -> Json<Tuning> {
    Json(state.session.tuning().get())
}

async fn put_tuning_handler(
    State(state): State<AppState>,
    Json(patch): Json<TuningPatch>,
) -> Result<Json<Tuning>, AppError> {
    let tuning = state.session.tuning().apply(&patch)?;
    info!(?patch, "Tuning updated");
    Ok(Json(tuning))
}

// ============================================================================
// Debug view and chat endpoints
// ============================================================================

async fn frame_handler(State(state): State<AppState>) -> Result<Json<FrameView>, AppError> {
    state.session.frame().map(Json).ok_or(AppError::NotReady)
}

#[derive(Deserialize)]
struct ChatRequest {
    text: String,
}

#[derive(Serialize)]
struct ChatResponse {
    queued: bool,
    text: String,
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    let text = sanitize(&req.text).ok_or(AppError::EmptyChat)?;
    state.session.say(text.clone())?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ChatResponse { queued: true, text }),
    ))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Rejected tuning: {0}")]
    BadTuning(#[from] TuningError),

    #[error("Chat message is empty")]
    EmptyChat,

    #[error("A guest is already connected")]
    PeerAlreadyConnected,

    #[error("No frame has been simulated yet")]
    NotReady,

    #[error("Session is not running")]
    SessionClosed(#[from] SessionClosed),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadTuning(_) | AppError::EmptyChat => StatusCode::BAD_REQUEST,
            AppError::PeerAlreadyConnected => StatusCode::CONFLICT,
            AppError::NotReady | AppError::SessionClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::input::InputScript;
    use crate::game::level::MapLevels;
    use crate::game::session::PeerSession;
    use crate::game::sim::{SimConfig, Simulation};
    use crate::game::sync::Role;
    use crate::game::tuning::TuningHandle;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn build_test_app(role: Role) -> (Router, PeerSession) {
        let levels = Arc::new(MapLevels::builtin().unwrap());
        let sim = Simulation::new(
            SimConfig {
                role,
                ..SimConfig::default()
            },
            levels,
        );
        let (session, handle) = PeerSession::new(sim, InputScript::default(), TuningHandle::default());

        let mut env = vec![("PEER_ROLE", role.to_string())];
        if !role.is_authority() {
            env.push(("HOST_URL", "ws://127.0.0.1:8080/ws".to_string()));
        }
        let config = Config::from_lookup(|key| {
            env.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap();

        (build_router(AppState::new(config, handle)), session)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_session_status() {
        let (app, _session) = build_test_app(Role::Authority);

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["role"], "authority");
        assert_eq!(json["tick"], 0);
        assert_eq!(json["peer_connected"], false);
    }

    #[tokio::test]
    async fn frame_is_unavailable_until_the_first_tick() {
        let (app, mut session) = build_test_app(Role::Authority);

        let request = Request::builder().uri("/frame").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert!(json["error"].is_string());

        session.step();

        let request = Request::builder().uri("/frame").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["tick"], 1);
        assert_eq!(json["players"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn tuning_patch_is_validated() {
        let (app, mut session) = build_test_app(Role::Authority);

        let response = app
            .clone()
            .oneshot(json_request(Method::PUT, "/tuning", r#"{"walk_speed": 3.0}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["walk_speed"], 3.0);

        session.step();
        assert_eq!(session.sim().tuning().walk_speed, 3.0);

        let response = app
            .clone()
            .oneshot(json_request(Method::PUT, "/tuning", r#"{"max_fall": 64.0}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let request = Request::builder().uri("/tuning").body(Body::empty()).unwrap();
        let json = body_json(app.oneshot(request).await.unwrap()).await;
        assert_eq!(json["walk_speed"], 3.0);
        assert_ne!(json["max_fall"], 64.0);
    }

    #[tokio::test]
    async fn chat_is_sanitized_and_queued() {
        let (app, mut session) = build_test_app(Role::Mirror);

        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/chat", r#"{"text": "   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(json_request(Method::POST, "/chat", r#"{"text": "  hi there "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        assert_eq!(json["text"], "hi there");

        session.step();
        let lines = session.sim().chat().lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].player_id, 1);
    }

    #[tokio::test]
    async fn guest_does_not_serve_the_websocket_endpoint() {
        let (app, _session) = build_test_app(Role::Mirror);

        let request = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn app_errors_map_to_status_codes() {
        let cases = [
            (AppError::EmptyChat, StatusCode::BAD_REQUEST),
            (AppError::PeerAlreadyConnected, StatusCode::CONFLICT),
            (AppError::NotReady, StatusCode::SERVICE_UNAVAILABLE),
            (AppError::SessionClosed(SessionClosed), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
