//! HTTP API server for integration with other systems.
//!
//! Exposes the analysis pipeline as a JSON endpoint. Requests reference files
//! already on the server's filesystem.

use super::analyze::resolve_duration;
use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::error::SpeakeasyError;
use crate::orchestrator::{PipelineOrchestrator, SessionInput, SessionResult};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

/// Shared application state.
struct AppState {
    orchestrator: PipelineOrchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    for warning in preflight::check(&settings)? {
        Output::warning(&warning);
    }

    let state = Arc::new(AppState {
        orchestrator: PipelineOrchestrator::new(settings)?,
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Speakeasy API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Analyze", "POST /analyze");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AnalyzeRequest {
    video_path: PathBuf,
    audio_path: PathBuf,
    /// Transcript text; takes precedence over `transcript_path`.
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    transcript_path: Option<PathBuf>,
    /// Probed from the audio when omitted.
    #[serde(default)]
    duration_seconds: Option<f64>,
    #[serde(default = "default_purpose")]
    purpose: String,
}

fn default_purpose() -> String {
    "general speech".to_string()
}

#[derive(Serialize)]
struct AnalyzeResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<SessionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl AnalyzeResponse {
    fn failure(status: StatusCode, error: &SpeakeasyError) -> axum::response::Response {
        (
            status,
            Json(Self {
                success: false,
                result: None,
                error: Some(error.to_string()),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let transcript_text = match (req.transcript, &req.transcript_path) {
        (Some(text), _) => text,
        (None, Some(path)) => match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                let err = SpeakeasyError::MissingInput(format!(
                    "cannot read transcript {}: {}",
                    path.display(),
                    e
                ));
                return AnalyzeResponse::failure(StatusCode::BAD_REQUEST, &err);
            }
        },
        (None, None) => {
            let err = SpeakeasyError::MissingInput(
                "either transcript or transcript_path is required".to_string(),
            );
            return AnalyzeResponse::failure(StatusCode::BAD_REQUEST, &err);
        }
    };

    let duration_seconds = match resolve_duration(req.duration_seconds, &req.audio_path).await {
        Ok(seconds) => seconds,
        Err(e) => return AnalyzeResponse::failure(StatusCode::BAD_REQUEST, &e),
    };

    let input = SessionInput {
        video_path: req.video_path,
        audio_path: req.audio_path,
        transcript_text,
        duration_seconds,
        purpose: req.purpose,
    };

    match state.orchestrator.run(input).await {
        Ok(result) => Json(AnalyzeResponse {
            success: true,
            result: Some(result),
            error: None,
        })
        .into_response(),
        Err(e) => {
            warn!("Analysis request failed: {}", e);
            let status = match e {
                SpeakeasyError::MissingInput(_) | SpeakeasyError::InvalidInput(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            AnalyzeResponse::failure(status, &e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req: AnalyzeRequest = serde_json::from_str(
            r#"{"video_path": "/tmp/a.mp4", "audio_path": "/tmp/a.wav", "transcript": "Hi"}"#,
        )
        .unwrap();
        assert_eq!(req.purpose, "general speech");
        assert!(req.duration_seconds.is_none());
        assert!(req.transcript_path.is_none());
    }

    #[test]
    fn test_failure_response_shape() {
        let body = serde_json::to_value(AnalyzeResponse {
            success: false,
            result: None,
            error: Some("Missing input: video".to_string()),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "success": false, "error": "Missing input: video" })
        );
    }
}
