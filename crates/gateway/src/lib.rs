//! HTTP and WebSocket gateway for DeskClaw.
//!
//! REST surface for session management plus a WebSocket endpoint that
//! drives the turn loop. The gateway owns persistence: it forwards UI
//! events to the client verbatim and consumes `db_save` events by
//! appending to the store, so the orchestrator never touches the
//! database.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use deskclaw_agent::{reconstruct, TurnRunner};
use deskclaw_core::event::AgentEvent;
use deskclaw_core::message::{Session, SessionId, StoredMessage, StoredRole};
use deskclaw_provider::AnthropicProvider;
use deskclaw_store::SessionStore;
use deskclaw_tools::VersionRegistry;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Shared application state for the gateway.
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub runner: Arc<TurnRunner>,
}

type SharedState = Arc<AppState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/session", post(create_session_handler))
        .route("/api/session/{id}/history", get(history_handler))
        .route("/ws/{session_id}", get(ws_handler))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: deskclaw_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let api_key = config.api_key.clone().unwrap_or_default();

    let provider = Arc::new(AnthropicProvider::new(api_key)?);
    let registry = VersionRegistry::builtin(config.display.width, config.display.height);
    // Resolving the group here fails fast on a bad tool version instead of
    // erroring on the first WebSocket message.
    let tools = registry.group(&config.tool_version)?;

    let runner = Arc::new(
        TurnRunner::new(provider, tools, &config.model)
            .with_max_tokens(config.max_tokens)
            .with_max_iterations(config.max_iterations),
    );
    let store = Arc::new(SessionStore::new(&config.store.database_path).await?);

    let state = Arc::new(AppState { store, runner });
    let app = build_router(state);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    info!(addr = %addr, "gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    info!("shutdown signal received");
}

// --- REST handlers ---

/// `POST /api/session` — create a fresh session.
async fn create_session_handler(
    State(state): State<SharedState>,
) -> Result<Json<Session>, StatusCode> {
    match state.store.create_session().await {
        Ok(session) => Ok(Json(session)),
        Err(e) => {
            error!(error = %e, "session creation failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// `GET /api/session/{id}/history` — the session's transcript in order.
async fn history_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StoredMessage>>, StatusCode> {
    let session_id = SessionId::from(&id);

    match state.store.get_session(&session_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(error = %e, "session lookup failed");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    match state.store.history(&session_id).await {
        Ok(messages) => Ok(Json(messages)),
        Err(e) => {
            error!(error = %e, "history fetch failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// --- WebSocket ---

/// `GET /ws/{session_id}` — drive the agent over a WebSocket.
///
/// Each text frame is one user utterance; the server answers with a finite
/// stream of event frames ending in `done` or `error`, then waits for the
/// next utterance.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, SessionId::from(&session_id)))
}

async fn handle_ws_connection(mut socket: WebSocket, state: SharedState, session_id: SessionId) {
    info!(session_id = %session_id, "WebSocket connection established");

    // An unknown id is a new conversation, not an error.
    if let Err(e) = state.store.ensure_session(&session_id).await {
        error!(session_id = %session_id, error = %e, "failed to ensure session");
        let _ = send_error(&mut socket, &format!("session unavailable: {e}")).await;
        return;
    }

    while let Some(msg) = socket.recv().await {
        let text = match msg {
            Ok(WsMessage::Text(text)) => text.to_string(),
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue, // ignore binary, ping, pong
            Err(_) => break,
        };

        // History is snapshotted before the new utterance is persisted;
        // the turn loop appends the utterance itself, so reading after the
        // write would send it to the model twice.
        let prior = match state.store.history(&session_id).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "history fetch failed");
                if send_error(&mut socket, &format!("history unavailable: {e}"))
                    .await
                    .is_err()
                {
                    return;
                }
                continue;
            }
        };

        if let Err(e) = state
            .store
            .append_message(&session_id, StoredRole::User, &text)
            .await
        {
            error!(session_id = %session_id, error = %e, "failed to persist user message");
            if send_error(&mut socket, &format!("persistence failed: {e}"))
                .await
                .is_err()
            {
                return;
            }
            continue;
        }

        let turns = reconstruct(&prior);
        let mut rx = state.runner.run_turn(session_id.clone(), text, turns);

        while let Some(event) = rx.recv().await {
            if let AgentEvent::DbSave { role, content } = &event {
                if let Err(e) = state.store.append_message(&session_id, *role, content).await {
                    error!(session_id = %session_id, error = %e, "failed to persist turn");
                    if send_error(&mut socket, &format!("persistence failed: {e}"))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "failed to serialize event");
                    continue;
                }
            };
            if socket.send(WsMessage::Text(json.into())).await.is_err() {
                // Client disconnected; dropping rx halts the turn loop at
                // its next emit.
                info!(session_id = %session_id, "client disconnected mid-turn");
                return;
            }
        }
    }

    info!(session_id = %session_id, "WebSocket connection closed");
}

async fn send_error(socket: &mut WebSocket, message: &str) -> Result<(), axum::Error> {
    let event = AgentEvent::Error {
        content: message.to_string(),
    };
    let json = serde_json::to_string(&event).unwrap_or_default();
    socket.send(WsMessage::Text(json.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use deskclaw_core::error::ProviderError;
    use deskclaw_core::provider::{ModelProvider, ModelRequest, ModelResponse};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// The REST routes never reach the provider.
    struct UnreachableProvider;

    #[async_trait]
    impl ModelProvider for UnreachableProvider {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn send(&self, _request: ModelRequest) -> Result<ModelResponse, ProviderError> {
            Err(ProviderError::Unclassified("not wired in tests".into()))
        }
    }

    async fn test_state() -> SharedState {
        let store = Arc::new(SessionStore::new("sqlite::memory:").await.unwrap());
        let tools = VersionRegistry::builtin(1024, 768)
            .group("computer_use_20250124")
            .unwrap();
        let runner = Arc::new(TurnRunner::new(
            Arc::new(UnreachableProvider),
            tools,
            "test-model",
        ));
        Arc::new(AppState { store, runner })
    }

    #[tokio::test]
    async fn create_session_returns_active_session() {
        let state = test_state().await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let session: Session = serde_json::from_slice(&body).unwrap();
        assert!(!session.id.0.is_empty());
        assert!(session.is_active);
    }

    #[tokio::test]
    async fn history_of_unknown_session_is_404() {
        let state = test_state().await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/session/no-such-session/history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn history_returns_messages_in_order() {
        let state = test_state().await;
        let session = state.store.create_session().await.unwrap();
        state
            .store
            .append_message(&session.id, StoredRole::User, "hello")
            .await
            .unwrap();
        state
            .store
            .append_message(
                &session.id,
                StoredRole::Assistant,
                r#"[{"type":"text","text":"hi"}]"#,
            )
            .await
            .unwrap();

        let app = build_router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/session/{}/history", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let messages: Vec<StoredMessage> = serde_json::from_slice(&body).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, StoredRole::User);
        assert_eq!(messages[1].role, StoredRole::Assistant);
    }

    #[tokio::test]
    async fn empty_history_for_existing_session_is_ok() {
        let state = test_state().await;
        let session = state.store.create_session().await.unwrap();

        let app = build_router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/session/{}/history", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let messages: Vec<StoredMessage> = serde_json::from_slice(&body).unwrap();
        assert!(messages.is_empty());
    }
}
