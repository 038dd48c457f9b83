use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use dmccontrol::{Command, ControllerError, PlayCommand, PlayerDispatcher, StateView};
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error};

use crate::appinfo::AppInfo;

/// Delay between answering `/exit` and actually going down, so the response
/// still reaches the caller.
const EXIT_DELAY: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<PlayerDispatcher>,
    pub appinfo: Arc<AppInfo>,
    pub shutdown: mpsc::Sender<()>,
}

pub fn build_router(state: AppState, cors_allow: bool) -> Router {
    let router = Router::new()
        .route("/", get(index))
        .route("/play", post(play))
        .route("/pause", post(pause))
        .route("/stop", post(stop))
        .route("/state", get(current_state))
        .route("/info", get(info))
        .route("/exit", get(exit).post(exit))
        .fallback(not_found)
        .with_state(state);

    if cors_allow {
        router.layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
    } else {
        router
    }
}

async fn index() -> &'static str {
    crate::APP_NAME
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": "Not found"}))).into_response()
}

async fn info(State(state): State<AppState>) -> Response {
    Json(state.appinfo.snapshot()).into_response()
}

async fn exit(State(state): State<AppState>) -> Response {
    tokio::spawn(async move {
        tokio::time::sleep(EXIT_DELAY).await;
        debug!("shutting down");
        let _ = state.shutdown.send(()).await;
    });
    (StatusCode::OK, "shutdown hereafter").into_response()
}

async fn play(State(state): State<AppState>, Json(command): Json<PlayCommand>) -> Response {
    debug!(?command, "in play");

    let dispatcher = Arc::clone(&state.dispatcher);
    let result = tokio::task::spawn_blocking(move || dispatcher.play(command)).await;

    match result {
        Ok(Ok(view)) => {
            if view.last_played_url.is_none() {
                return (StatusCode::NOT_FOUND, "Kein passenden Titel gefunden").into_response();
            }
            (StatusCode::OK, Json(view)).into_response()
        }
        Ok(Err(e)) => controller_error_response(e),
        Err(e) => {
            error!(error = %e, "play task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "Fehler").into_response()
        }
    }
}

async fn pause(State(state): State<AppState>, command: Option<Json<Command>>) -> Response {
    run_command(state, command, PlayerDispatcher::pause).await
}

async fn stop(State(state): State<AppState>, command: Option<Json<Command>>) -> Response {
    run_command(state, command, PlayerDispatcher::stop).await
}

async fn current_state(State(state): State<AppState>, command: Option<Json<Command>>) -> Response {
    let command = command.map(|Json(c)| c);
    let dispatcher = Arc::clone(&state.dispatcher);

    let result =
        tokio::task::spawn_blocking(move || dispatcher.state(command.as_ref())).await;

    match result {
        Ok(states) => (StatusCode::OK, Json(states)).into_response(),
        Err(e) => {
            error!(error = %e, "state task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "Fehler").into_response()
        }
    }
}

async fn run_command<F>(state: AppState, command: Option<Json<Command>>, operation: F) -> Response
where
    F: FnOnce(&PlayerDispatcher, &Command) -> Result<StateView, ControllerError>
        + Send
        + 'static,
{
    let command = command.map(|Json(c)| c).unwrap_or_default();
    let dispatcher = Arc::clone(&state.dispatcher);

    let result = tokio::task::spawn_blocking(move || operation(&dispatcher, &command)).await;

    match result {
        Ok(Ok(view)) => (StatusCode::OK, Json(view)).into_response(),
        Ok(Err(e)) => controller_error_response(e),
        Err(e) => {
            error!(error = %e, "command task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "Fehler").into_response()
        }
    }
}

/// Maps the error taxonomy to HTTP: invalid request 400, unhandleable
/// request 500 with its explanation, everything else a generic 500.
fn controller_error_response(error: ControllerError) -> Response {
    error!(error = %error, "request failed");
    match error {
        ControllerError::RequestInvalid => (StatusCode::BAD_REQUEST, "Fehleingabe").into_response(),
        ControllerError::CannotBeHandled(message) => {
            (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Fehler").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use dmccontrol::{
        MediaLibrary, PlayerManager, Scheduler, SearchQuery, SearchResponse,
    };
    use tower::util::ServiceExt;

    struct EmptyLibrary;

    impl MediaLibrary for EmptyLibrary {
        fn search(&self, _query: &SearchQuery) -> Result<SearchResponse, ControllerError> {
            Ok(SearchResponse::new(0, 0, Vec::new()))
        }
    }

    fn test_router() -> Router {
        let manager = PlayerManager::new(&[]);
        let dispatcher = Arc::new(PlayerDispatcher::with_online_check(
            manager,
            Arc::new(EmptyLibrary),
            Scheduler::new(),
            |_| false,
        ));
        let appinfo = Arc::new(AppInfo::new(crate::APP_NAME, "0.0.0-test"));
        let (shutdown, _rx) = mpsc::channel(1);

        build_router(
            AppState {
                dispatcher,
                appinfo,
                shutdown,
            },
            false,
        )
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_returns_app_name() {
        let response = test_router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, crate::APP_NAME);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let response = test_router()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn test_info_reports_name_and_version() {
        let response = test_router()
            .oneshot(Request::get("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["name"], crate::APP_NAME);
        assert_eq!(body["version"], "0.0.0-test");
    }

    #[tokio::test]
    async fn test_play_without_content_is_invalid() {
        let response = test_router()
            .oneshot(
                Request::post("/play")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Fehleingabe");
    }

    #[tokio::test]
    async fn test_play_without_renderer_cannot_be_handled() {
        let response = test_router()
            .oneshot(
                Request::post("/play")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"url": "http://radio/stream"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.contains("No renderer available"));
    }

    #[tokio::test]
    async fn test_state_is_empty_list_initially() {
        let response = test_router()
            .oneshot(Request::get("/state").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "[]");
    }

    #[tokio::test]
    async fn test_exit_answers_before_shutdown() {
        let response = test_router()
            .oneshot(Request::post("/exit").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "shutdown hereafter");
    }
}
