use axum::{
    Router,
    extract::{Path, Request, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    middleware::{Next, from_fn},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    config::ServiceConfig,
    error::{Result, ServiceError, log_failure},
    gateway::{GeminiGateway, LanguageModelGateway},
    images::{GoogleImageSearch, IMAGE_RESULT_COUNT, ImageLookup, placeholder_urls, search_images},
    models::{
        ClassificationResponse, DataEnvelope, FreeTextResponse, InteractiveResponse,
        STANDARD_DISCLAIMER,
    },
    normalizer::{
        classification_failure, free_text_failure, normalize_classification, normalize_free_text,
    },
    session::process_turn,
};

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

/// Payload and status from a route that always answers with the same schema.
type Reply<T> = (StatusCode, Json<T>);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub gateway: Arc<dyn LanguageModelGateway>,
    pub images: Arc<dyn ImageLookup>,
}

impl AppState {
    pub fn from_config(config: ServiceConfig) -> Self {
        let http = http_client(&config);
        let gateway = Arc::new(GeminiGateway::from_config(&config));
        let images = Arc::new(GoogleImageSearch::from_config(http, &config));

        Self {
            config: Arc::new(config),
            gateway,
            images,
        }
    }
}

/// Outbound HTTP client, bounded by the same deadline as gateway calls.
fn http_client(config: &ServiceConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(config.gateway_timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to an HTTP client without a timeout");
            reqwest::Client::new()
        })
}

pub fn create_app(config: ServiceConfig) -> Router {
    build_router(AppState::from_config(config))
}

pub fn build_router(app_state: AppState) -> Router {
    let static_files = ServeDir::new(&app_state.config.static_dir);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/gemini/", get(free_text_without_input))
        .route("/gemini/{data}", get(free_text))
        .route("/gemini_generic/", get(classification_without_input))
        .route("/gemini_generic/{data}", get(classification))
        .route("/gemini-interactive", post(interactive))
        .route("/gemini/image/", get(image_search_without_term))
        .route("/gemini/image/{search_term}", get(image_search))
        .nest_service("/static", static_files)
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let header = HeaderValue::from_str(&correlation_id).ok();

    if let Some(value) = &header {
        request
            .headers_mut()
            .insert("x-correlation-id", value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header {
        response.headers_mut().insert("x-correlation-id", value);
    }
    response
}

async fn index(State(state): State<AppState>) -> Response {
    let page = state.config.template_dir.join("index.html");
    match tokio::fs::read_to_string(&page).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(path = %page.display(), error = %e, "Error rendering template");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error loading page.").into_response()
        }
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn free_text(
    State(state): State<AppState>,
    Path(data): Path<String>,
) -> Reply<DataEnvelope<FreeTextResponse>> {
    answer_free_text(&state, &data).await
}

async fn free_text_without_input(
    State(state): State<AppState>,
) -> Reply<DataEnvelope<FreeTextResponse>> {
    answer_free_text(&state, "").await
}

async fn answer_free_text(state: &AppState, data: &str) -> Reply<DataEnvelope<FreeTextResponse>> {
    if data.trim().is_empty() {
        let payload = FreeTextResponse {
            response: "No input data provided.".to_string(),
            disclaimer: STANDARD_DISCLAIMER.to_string(),
        };
        return (StatusCode::BAD_REQUEST, Json(DataEnvelope::new(payload)));
    }

    info!(prompt_length = data.len(), "Free-text request");
    match run_free_text(state.gateway.as_ref(), data).await {
        Ok(payload) => (StatusCode::OK, Json(DataEnvelope::new(payload))),
        Err(e) => {
            log_failure("/gemini", &e);
            (e.status_code(), Json(DataEnvelope::new(free_text_failure(&e))))
        }
    }
}

async fn run_free_text(gateway: &dyn LanguageModelGateway, prompt: &str) -> Result<FreeTextResponse> {
    let raw = gateway.single_turn(prompt).await?;
    normalize_free_text(raw)
}

async fn classification(
    State(state): State<AppState>,
    Path(data): Path<String>,
) -> Reply<DataEnvelope<Value>> {
    answer_classification(&state, &data).await
}

async fn classification_without_input(
    State(state): State<AppState>,
) -> Reply<DataEnvelope<Value>> {
    answer_classification(&state, "").await
}

async fn answer_classification(state: &AppState, data: &str) -> Reply<DataEnvelope<Value>> {
    if data.trim().is_empty() {
        let payload = json!({
            "is_medical_related_prompt": "No",
            "Disclaimer": STANDARD_DISCLAIMER,
            "error": "No input data"
        });
        return (StatusCode::BAD_REQUEST, Json(DataEnvelope::new(payload)));
    }

    info!(prompt_length = data.len(), "Classification request");
    let (status, payload) = match run_classification(state.gateway.as_ref(), data).await {
        Ok(payload) => (StatusCode::OK, payload),
        Err(e) => {
            log_failure("/gemini_generic", &e);
            (e.status_code(), classification_failure(&e))
        }
    };
    (status, Json(DataEnvelope::new(json!(payload))))
}

async fn run_classification(
    gateway: &dyn LanguageModelGateway,
    prompt: &str,
) -> Result<ClassificationResponse> {
    let raw = gateway.classify(prompt).await?;
    normalize_classification(raw)
}

async fn interactive(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> ApiResult<DataEnvelope<InteractiveResponse>> {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            let err = ServiceError::invalid(format!(
                "JSON body with 'message' field is required. ({})",
                rejection.body_text()
            ));
            return Err(interactive_error(err));
        }
    };

    match process_turn(state.gateway.as_ref(), body).await {
        Ok(response) => Ok(Json(DataEnvelope::new(response))),
        Err(e) => Err(interactive_error(e)),
    }
}

fn interactive_error(err: ServiceError) -> ApiError {
    log_failure("/gemini-interactive", &err);
    match &err {
        ServiceError::InvalidRequestShape(_) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("Invalid request. {}", err.detail()) })),
        ),
        _ => (
            err.status_code(),
            Json(json!({ "data": InteractiveResponse::fallback(&err) })),
        ),
    }
}

async fn image_search(
    State(state): State<AppState>,
    Path(search_term): Path<String>,
) -> Reply<Vec<String>> {
    answer_image_search(&state, &search_term).await
}

async fn image_search_without_term(State(state): State<AppState>) -> Reply<Vec<String>> {
    answer_image_search(&state, "").await
}

async fn answer_image_search(state: &AppState, term: &str) -> Reply<Vec<String>> {
    match search_images(state.images.as_ref(), term).await {
        Ok(urls) => (StatusCode::OK, Json(urls)),
        Err(ServiceError::InvalidRequestShape(_)) => (StatusCode::BAD_REQUEST, Json(Vec::new())),
        Err(e) => {
            log_failure("/gemini/image", &e);
            (
                e.status_code(),
                Json(placeholder_urls(term, IMAGE_RESULT_COUNT)),
            )
        }
    }
}
