use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        StatusCode,
    },
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tower_http::trace::TraceLayer;

use crate::extract;
use crate::fetch::Fetcher;
use crate::models::{ExtractRequest, ExtractResponse};

#[derive(Clone)]
pub struct AppState {
    fetcher: Fetcher,
}

impl AppState {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

/// Every path answers POST (extract) and OPTIONS (CORS preflight).
pub fn app(state: AppState) -> Router {
    let endpoint = post(extract_endpoint).options(preflight);
    Router::new()
        .route("/", endpoint.clone())
        .route("/*path", endpoint)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
            (ACCESS_CONTROL_ALLOW_HEADERS, "X-Requested-With, Content-type"),
        ],
    )
}

async fn extract_endpoint(State(state): State<AppState>, body: Bytes) -> Response {
    // Parsed by hand so clients need not send a JSON content type.
    let req: ExtractRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e))
        }
    };

    match extract::extract_article(&state.fetcher, req.url.as_deref()).await {
        Ok(result) => {
            let response = ExtractResponse {
                title: result.title,
                content: result.content,
                text: result.text,
            };
            (
                StatusCode::OK,
                [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
                Json(response),
            )
                .into_response()
        }
        Err(e) => {
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            tracing::warn!(url = ?req.url, error = %e, "extraction failed");
            error_response(status, e.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")], message).into_response()
}
