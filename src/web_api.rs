use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    routing::post,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AuthenticatedUser};
use crate::catalog::{self, Catalog, PAGE_SIZE, PageInfo, PromptTemplate};
use crate::config::{AppConfig, KeyMode};
use crate::gemini::{self, GeminiError, Part};
use crate::image_input::prepare_attachment;
use crate::keystore::{KeyStore, KeyStoreError, SaveOutcome};

const GENERATE_BODY_LIMIT: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub keystore: Arc<KeyStore>,
    pub config: Arc<AppConfig>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("prompt not found")]
    PromptNotFound,

    /// Authenticated caller has not configured a generation credential.
    #[error("no API key configured")]
    NeedsApiKey,

    /// The generation API rejected the caller's stored credential.
    #[error("the stored API key was rejected by the generation API")]
    InvalidApiKey,

    #[error("internal server error")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            Self::PromptNotFound => (StatusCode::NOT_FOUND, json!({ "error": self.to_string() })),
            Self::NeedsApiKey => (
                StatusCode::FORBIDDEN,
                json!({ "error": self.to_string(), "needsApiKey": true }),
            ),
            Self::InvalidApiKey => (
                StatusCode::FORBIDDEN,
                json!({ "error": self.to_string(), "invalidApiKey": true }),
            ),
            Self::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal Server Error", "details": details }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl From<KeyStoreError> for ApiError {
    fn from(err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::EmptySecret => Self::BadRequest(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/key",
            post(save_key).get(get_masked_key).delete(delete_key),
        )
        .route(
            "/api/generate-image",
            post(generate_image).layer(DefaultBodyLimit::max(GENERATE_BODY_LIMIT)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.config.auth_secret.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/api/prompts", get(list_prompts))
        .route("/api/prompts/{id}", get(get_prompt))
        .route("/api/categories", get(list_categories))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    query: String,
    category: Option<String>,
    page: Option<usize>,
}

#[derive(Debug, Serialize)]
struct PromptPage {
    items: Vec<PromptTemplate>,
    #[serde(flatten)]
    page: PageInfo,
}

async fn list_prompts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<PromptPage> {
    let category = params.category.as_deref().unwrap_or(catalog::ALL_CATEGORIES);
    let page = params.page.unwrap_or(1).max(1);

    let filtered = catalog::filter_prompts(state.catalog.templates(), &params.query, category);
    let info = PageInfo::new(filtered.len(), page, PAGE_SIZE);
    let items = catalog::paginate(&filtered, page, PAGE_SIZE)
        .iter()
        .map(|template| (*template).clone())
        .collect();
    Json(PromptPage { items, page: info })
}

async fn get_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PromptTemplate>, ApiError> {
    state
        .catalog
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(ApiError::PromptNotFound)
}

async fn list_categories(State(state): State<AppState>) -> Json<Vec<String>> {
    let mut categories = vec![catalog::ALL_CATEGORIES.to_string()];
    categories.extend(catalog::all_categories(state.catalog.templates()));
    Json(categories)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveKeyRequest {
    api_key: String,
}

#[derive(Debug, Serialize)]
struct KeyOpResponse {
    success: bool,
    message: String,
}

async fn save_key(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<SaveKeyRequest>,
) -> Result<Response, ApiError> {
    match state.keystore.save(&user.user_id, &request.api_key).await {
        Ok(outcome) => {
            let message = match outcome {
                SaveOutcome::Created => "API key saved successfully",
                SaveOutcome::Updated => "API key updated successfully",
            };
            Ok(Json(KeyOpResponse {
                success: true,
                message: message.to_string(),
            })
            .into_response())
        }
        Err(KeyStoreError::EmptySecret) => Ok((
            StatusCode::BAD_REQUEST,
            Json(KeyOpResponse {
                success: false,
                message: KeyStoreError::EmptySecret.to_string(),
            }),
        )
            .into_response()),
        Err(other) => Err(other.into()),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MaskedKeyResponse {
    has_key: bool,
    masked_key: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

async fn get_masked_key(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Option<MaskedKeyResponse>>, ApiError> {
    let masked = state.keystore.masked(&user.user_id).await?;
    Ok(Json(masked.map(|credential| MaskedKeyResponse {
        has_key: true,
        masked_key: credential.masked_key,
        created_at: credential.created_at,
        updated_at: credential.updated_at,
    })))
}

async fn delete_key(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<KeyOpResponse>, ApiError> {
    let deleted = state.keystore.delete(&user.user_id).await?;
    let (success, message) = if deleted {
        (true, "API key deleted successfully")
    } else {
        (false, "No API key found")
    };
    Ok(Json(KeyOpResponse {
        success,
        message: message.to_string(),
    }))
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    result: Vec<Part>,
}

async fn generate_image(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    mut multipart: Multipart,
) -> Result<Json<GenerateResponse>, ApiError> {
    let mut prompt = None;
    let mut aspect_ratio = None;
    let mut attachments = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("invalid form data: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "prompt" => {
                prompt = Some(field.text().await.map_err(|err| {
                    ApiError::BadRequest(format!("could not read prompt field: {err}"))
                })?);
            }
            "aspectRatio" => {
                aspect_ratio = Some(field.text().await.map_err(|err| {
                    ApiError::BadRequest(format!("could not read aspectRatio field: {err}"))
                })?);
            }
            "images" => {
                let content_type = field.content_type().map(|value| value.to_string());
                let bytes = field.bytes().await.map_err(|err| {
                    ApiError::BadRequest(format!("could not read image attachment: {err}"))
                })?;
                let attachment = prepare_attachment(&bytes, content_type.as_deref())
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                attachments.push(attachment);
            }
            _ => {}
        }
    }

    let prompt = prompt
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("prompt is required".to_string()))?;
    let aspect_ratio = gemini::resolve_aspect_ratio(aspect_ratio.as_deref())
        .ok_or_else(|| ApiError::BadRequest("unsupported aspect ratio".to_string()))?;

    let (api_key, caller_owned) = match state.config.key_mode {
        KeyMode::Shared => {
            let key = state
                .config
                .shared_api_key
                .clone()
                .ok_or_else(|| ApiError::Internal("shared API key not configured".to_string()))?;
            (key, false)
        }
        KeyMode::UserScoped => match state.keystore.raw(&user.user_id).await? {
            Some(key) => (key, true),
            None => return Err(ApiError::NeedsApiKey),
        },
    };

    tracing::info!(
        user = %user.user_id,
        images = attachments.len(),
        aspect_ratio,
        "dispatching generation request"
    );

    let parts = gemini::generate_content(&prompt, &attachments, aspect_ratio, &api_key)
        .await
        .map_err(|err| match err {
            GeminiError::InvalidApiKey if caller_owned => ApiError::InvalidApiKey,
            GeminiError::InvalidApiKey => {
                ApiError::Internal("server generation key was rejected".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        })?;

    Ok(Json(GenerateResponse { result: parts }))
}
