use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::card::{RenderRequest, RenderResult};
use crate::render::{RenderError, Renderer};
use crate::storage::ObjectStore;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    reason: &'static str,
}

/// Preview/commit endpoint for the admin editing tool. The tool iterates on
/// a recipe with `skipUpload: true`, then commits with `skipUpload: false`.
pub async fn run_server(renderer: Renderer<Box<dyn ObjectStore>>, addr: String) -> Result<()> {
    let state = Arc::new(renderer);
    let app = Router::new()
        .route("/health", get(health))
        .route("/render", post(render_card))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address: {addr}"))?;
    tracing::info!(%addr, "render service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn render_card(
    State(renderer): State<Arc<Renderer<Box<dyn ObjectStore>>>>,
    Json(request): Json<RenderRequest>,
) -> Result<Json<RenderResult>, (StatusCode, Json<ErrorResponse>)> {
    match renderer.render(&request).await {
        Ok(result) => Ok(Json(result)),
        Err(err) => {
            let status = match &err {
                RenderError::Fetch(_) | RenderError::Decode(_) => StatusCode::BAD_REQUEST,
                RenderError::SafetyBlocked => StatusCode::UNPROCESSABLE_ENTITY,
                RenderError::Encode(_) | RenderError::Upload(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            let reason = err.reason();
            Err((
                status,
                Json(ErrorResponse {
                    error: err.to_string(),
                    reason,
                }),
            ))
        }
    }
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}
