//! HTTP front-end: `POST /gerar-peticao`.
//!
//! The request body is the case context as a flat JSON object; the response
//! is a [`PetitionResponse`] or `{"erro": message}`. CORS is wide open
//! because the form that calls this endpoint is served from another origin.

use crate::context::Context;
use crate::error::PetitionError;
use crate::generate::{PetitionGenerator, PetitionRequest};
use crate::output::ErrorResponse;
use crate::pipeline::source::ParagraphSource;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared state for all requests.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<PetitionGenerator>,
    pub source: ParagraphSource,
    pub header_image: Option<PathBuf>,
}

impl AppState {
    pub fn new(generator: Arc<PetitionGenerator>) -> Self {
        Self {
            generator,
            source: ParagraphSource::Builtin,
            header_image: None,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/gerar-peticao", post(generate_petition).options(preflight))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), PetitionError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| PetitionError::Internal(format!("bind {addr}: {e}")))?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, router(state))
        .await
        .map_err(|e| PetitionError::Internal(format!("server: {e}")))
}

async fn generate_petition(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };
    let Some(object) = body.as_object() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "O corpo da requisição deve ser um objeto JSON".to_string(),
        );
    };
    let context = Context::from_json_object(object);

    let mut request = PetitionRequest::new(context).source(state.source.clone());
    request.header_image = state.header_image.clone();

    match state.generator.generate(request).await {
        Ok(generated) => (StatusCode::OK, Json(generated.response)).into_response(),
        Err(e @ PetitionError::TemplateNotFound { .. }) => {
            warn!("{}", e);
            error_response(StatusCode::OK, e.to_string())
        }
        Err(e) => {
            error!("Petition generation failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn preflight() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

fn error_response(status: StatusCode, erro: String) -> Response {
    (status, Json(ErrorResponse { erro })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriterConfig;
    use crate::error::CompletionError;
    use crate::output::PetitionResponse;
    use crate::pipeline::llm::{CompletionProvider, CompletionRequest};
    use crate::publish::LocalDirPublisher;
    use crate::rewrite::Rewriter;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    struct Polite;

    #[async_trait]
    impl CompletionProvider for Polite {
        async fn complete(&self, _r: &CompletionRequest) -> Result<String, CompletionError> {
            Ok("Parágrafo reescrito.".to_string())
        }
    }

    fn state(dir: &std::path::Path, source: ParagraphSource) -> AppState {
        let rewriter = Rewriter::new(Arc::new(Polite), RewriterConfig::default());
        let generator = PetitionGenerator::new(
            rewriter,
            Arc::new(LocalDirPublisher::new(dir.join("published"))),
        );
        let mut state = AppState::new(Arc::new(generator));
        state.source = source;
        state
    }

    async fn post(app: Router, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post("/gerar-peticao")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn generates_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(dir.path(), ParagraphSource::Builtin));

        let (status, json) = post(app, r#"{"reclamante": "Ana Souza", "empresa": "ACME"}"#).await;
        assert_eq!(status, StatusCode::OK);

        let response: PetitionResponse = serde_json::from_value(json).unwrap();
        assert!(response.arquivo.starts_with("peticao_Ana_Souza_"));
        assert!(response.url_download.starts_with("file://"));
        assert!(response.custo_estimado_usd > 0.0);
        assert!(dir.path().join("published").join(&response.arquivo).exists());
    }

    #[tokio::test]
    async fn missing_template_is_structured_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = ParagraphSource::Template(dir.path().join("nao_existe.docx"));
        let app = router(state(dir.path(), source));

        let (status, json) = post(app, r#"{"reclamante": "Ana"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["erro"].as_str().unwrap().contains("nao_existe.docx"));
    }

    #[tokio::test]
    async fn non_object_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(dir.path(), ParagraphSource::Builtin));

        let (status, json) = post(app, "[1, 2]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["erro"].is_string());
    }

    #[tokio::test]
    async fn malformed_json_is_structured_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(dir.path(), ParagraphSource::Builtin));

        let (status, json) = post(app, "{nao json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!json["erro"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_content_type_is_structured_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(dir.path(), ParagraphSource::Builtin));

        let response = app
            .oneshot(
                Request::post("/gerar-peticao")
                    .body(Body::from(r#"{"reclamante": "Ana"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json["erro"].is_string());
    }

    #[tokio::test]
    async fn health_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(state(dir.path(), ParagraphSource::Builtin));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
