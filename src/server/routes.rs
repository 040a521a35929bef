//! Endpoint handlers: newsletter subscription and journal→Kit sync.
use axum::extract::{Query, State};
use axum::http::header::{AUTHORIZATION, REFERER};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::kit::model::Subscriber;
use crate::model::{Post, SubscribeRequest};
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::sync::{run_sync, SyncOptions, SyncReport};
use crate::{feed, posts};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/subscribe", post(subscribe))
        .route("/sync", get(sync))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Body accepted by `POST /subscribe`. Email is validated by hand so a
/// missing field maps to 400 rather than a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct SubscribeBody {
    pub email_address: Option<String>,
    pub referrer: Option<String>,
    pub form_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub success: bool,
    pub message: String,
    pub subscriber: Subscriber,
}

async fn subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubscribeBody>,
) -> Result<Json<SubscribeResponse>, ApiError> {
    let email_address = body
        .email_address
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email address is required".to_string()))?
        .to_string();

    // Request-supplied form id wins over the configured default.
    let form_id = body
        .form_id
        .filter(|id| *id > 0)
        .or(state.config.kit_form_id)
        .ok_or_else(|| {
            ApiError::Internal(anyhow::anyhow!("Form ID is not configured"))
        })?;

    let http_referrer = headers
        .get(REFERER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let request = SubscribeRequest {
        email_address: email_address.clone(),
        referrer: body.referrer.clone(),
        http_referrer: Some(http_referrer.clone()).filter(|r| !r.is_empty()),
        ..Default::default()
    };

    // Upsert the subscriber first, then attach it to the form so Kit can
    // compute attribution from the referrer on its side.
    state
        .kit
        .create_subscriber(&request)
        .await
        .map_err(ApiError::from_subscribe)?;

    let referrer = body
        .referrer
        .filter(|r| !r.is_empty())
        .unwrap_or(http_referrer);
    let subscriber = state
        .kit
        .add_subscriber_to_form(form_id, &email_address, &referrer)
        .await
        .map_err(ApiError::from_subscribe)?;

    info!(email = %email_address, form_id, "subscribed");
    Ok(Json(SubscribeResponse {
        success: true,
        message: "Successfully subscribed!".to_string(),
        subscriber,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    pub slug: Option<String>,
    pub force: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: SyncReport,
}

async fn sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SyncQuery>,
) -> Result<Json<SyncResponse>, ApiError> {
    require_sync_auth(&headers, &state.config)?;

    let posts = load_posts(&state).await?;
    let options = SyncOptions {
        slug: query.slug.filter(|s| !s.is_empty()),
        force: query.force.as_deref() == Some("true"),
    };
    let report = run_sync(
        state.kit.as_ref(),
        &posts,
        &options,
        &state.config.site_base_url,
    )
    .await?;

    Ok(Json(SyncResponse {
        success: true,
        report,
    }))
}

/// Shared-secret bearer check for the sync route. Fail closed: when no
/// secret is configured every request is rejected.
pub fn require_sync_auth(headers: &HeaderMap, config: &Config) -> Result<(), ApiError> {
    let Some(secret) = config.sync_secret.as_deref() else {
        tracing::debug!("sync secret not configured, rejecting request");
        return Err(ApiError::Unauthorized);
    };
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    match header {
        Some(header) if header == format!("Bearer {secret}") => Ok(()),
        _ => {
            tracing::debug!("missing or mismatched sync authorization header");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Full local post set: the posts directory when configured, otherwise
/// the public feed.
async fn load_posts(state: &AppState) -> Result<Vec<Post>, ApiError> {
    if let Some(dir) = &state.config.posts_dir {
        return posts::load_posts(dir).map_err(|e| ApiError::Internal(e.into()));
    }
    if let Some(feed_url) = &state.config.feed_url {
        return feed::load_posts_from_feed(&state.http, feed_url)
            .await
            .map_err(|e| ApiError::Internal(e.into()));
    }
    // Config validation guarantees one source; this is unreachable in a
    // validated process.
    Err(ApiError::Internal(anyhow::anyhow!(
        "no post source configured"
    )))
}
