//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::llm::{self, ProviderRef};
use crate::subtasks::{build_prompt, SubtaskExtractor, SubtaskList};

use super::error::ApiError;
use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Upstream provider; `None` when no API key is configured
    pub provider: Option<ProviderRef>,
    /// Normalizes raw model output into subtasks
    pub extractor: SubtaskExtractor,
}

impl AppState {
    /// Build state from `config`, constructing the configured provider.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let provider = llm::build_provider(&config)?;
        Ok(Self::with_provider(config, provider))
    }

    /// Build state around an explicit provider.
    pub fn with_provider(config: Config, provider: Option<ProviderRef>) -> Self {
        let extractor = SubtaskExtractor::new(config.extraction);
        Self {
            config,
            provider,
            extractor,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/ai/suggest-subtasks", post(suggest_subtasks))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(config)?);

    match &state.provider {
        Some(provider) => tracing::info!(
            "Using {} provider with model {}",
            provider.name(),
            state.config.model
        ),
        None => tracing::warn!(
            "{} is not set; every request will receive fallback subtasks",
            state.config.provider.api_key_env()
        ),
    }

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

async fn index() -> &'static str {
    "Subtask suggestion server is running"
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: state.config.provider.id().to_string(),
        model: state.config.model.clone(),
        ai_enabled: state.provider.is_some(),
    })
}

/// Suggest subtasks for a task.
///
/// Always answers 200 once the task name is valid: upstream failures and
/// unusable model output are answered with the fallback list.
async fn suggest_subtasks(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SuggestSubtasksRequest>, JsonRejection>,
) -> Result<Json<SuggestSubtasksResponse>, ApiError> {
    let task_name = payload
        .ok()
        .and_then(|Json(request)| request.task_name)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(ApiError::MissingTaskName)?;

    let span = tracing::info_span!("suggest_subtasks", request_id = %Uuid::new_v4());
    let response = suggest(&state, &task_name).instrument(span).await;
    Ok(Json(response))
}

async fn suggest(state: &AppState, task_name: &str) -> SuggestSubtasksResponse {
    tracing::info!("Incoming task: {}", task_name);

    let Some(provider) = state.provider.as_ref() else {
        tracing::warn!("No API key configured, using fallback subtasks");
        return SuggestSubtasksResponse::from_list(SubtaskList::fallback(task_name));
    };

    let prompt = build_prompt(task_name);
    match provider.complete(&prompt).await {
        Ok(raw) => {
            let list = state.extractor.normalize(&raw, task_name);
            if list.is_fallback() {
                tracing::warn!(
                    "No usable subtasks in {} response, using fallback ({} chars of output)",
                    provider.name(),
                    raw.len()
                );
            } else {
                tracing::debug!(
                    "Extracted {} subtasks ({:?})",
                    list.len(),
                    list.source()
                );
            }
            SuggestSubtasksResponse::from_list(list)
        }
        Err(e) => {
            tracing::warn!("{} error, using fallback subtasks: {}", provider.name(), e);
            SuggestSubtasksResponse::upstream_failure(
                SubtaskList::fallback(task_name),
                format!("{} request failed: {}", provider.name(), e.kind),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, ProviderKind, TextGenerationProvider};
    use crate::subtasks::{fallback_subtasks, Prompt};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Provider returning a canned reply and recording prompts.
    struct StubProvider {
        reply: Result<String, u16>,
        prompts: Mutex<Vec<Prompt>>,
    }

    impl StubProvider {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerationProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(LlmError::from_status(*status, "upstream down", None)),
            }
        }
    }

    fn app(provider: Option<ProviderRef>) -> Router {
        let config = Config::for_provider(ProviderKind::Groq, None);
        router(Arc::new(AppState::with_provider(config, provider)))
    }

    async fn post_json(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/ai/suggest-subtasks")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_task_name_is_rejected() {
        for body in [r#"{}"#, r#"{"taskName": "   "}"#, r#"{"taskName": null}"#, "not json"] {
            let (status, json) = post_json(app(None), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
            assert_eq!(json["error"], "taskName is required");
        }
    }

    #[tokio::test]
    async fn test_no_provider_returns_fallback() {
        let (status, json) = post_json(app(None), r#"{"taskName": "Bake bread"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["fallback"], true);
        assert!(json.get("error").is_none());
        let subtasks: Vec<String> = serde_json::from_value(json["subtasks"].clone()).unwrap();
        assert_eq!(subtasks, fallback_subtasks("Bake bread"));
    }

    #[tokio::test]
    async fn test_provider_reply_is_normalized() {
        let stub = StubProvider::replying(
            "```json\n{\"subtasks\": [\"Mix dough\", \"Let it rise\", \"Bake\"]}\n```",
        );
        let (status, json) = post_json(
            app(Some(stub.clone() as ProviderRef)),
            r#"{"taskName": " Bake bread "}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            serde_json::json!({"subtasks": ["Mix dough", "Let it rise", "Bake"]})
        );

        let prompts = stub.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].user.contains("Task: \"Bake bread\""));
    }

    #[tokio::test]
    async fn test_unusable_reply_marks_fallback() {
        let stub = StubProvider::replying("I cannot help with that.");
        let (status, json) =
            post_json(app(Some(stub as ProviderRef)), r#"{"taskName": "Bake bread"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["fallback"], true);
        assert!(json.get("error").is_none());
        assert_eq!(json["subtasks"][0], "Understand the task: Bake bread");
    }

    #[tokio::test]
    async fn test_upstream_error_returns_fallback_with_error() {
        let stub = StubProvider::failing(503);
        let (status, json) =
            post_json(app(Some(stub as ProviderRef)), r#"{"taskName": "Bake bread"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["fallback"], true);
        assert_eq!(json["error"], "stub request failed: Server error");
        assert_eq!(json["subtasks"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = app(None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.provider, "groq");
        assert!(!health.ai_enabled);
    }

    #[tokio::test]
    async fn test_index() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app(None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
