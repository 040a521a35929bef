//! HTTP client for the Kit (ConvertKit) v4 API.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::kit::model::{
    Broadcast, BroadcastResponse, BroadcastsListResponse, Subscriber, SubscriberResponse,
};
use crate::model::SubscribeRequest;

pub mod model;

const KIT_API_BASE: &str = "https://api.kit.com/";
const KIT_API_VERSION: &str = "v4";

/// Kit email template used for journal broadcasts.
pub const EMAIL_TEMPLATE_ID: i64 = 4_311_751;

/// Maximum page size allowed by the Kit broadcasts list endpoint.
pub const BROADCASTS_PER_PAGE: u32 = 1000;

#[derive(Debug, Error)]
pub enum KitError {
    #[error("failed to reach Kit: {0}")]
    Http(#[from] reqwest::Error),
    // Mirrors the original wire-facing message format.
    #[error("Kit API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("invalid Kit response: {0}")]
    InvalidResponse(String),
}

/// Draft payload for a new broadcast, derived from a transformed post.
#[derive(Debug, Clone)]
pub struct BroadcastDraft {
    pub subject: String,
    pub content: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
    pub thumbnail_url: Option<String>,
}

/// Seam between the sync engine / HTTP layer and the remote platform.
/// Tests substitute an in-process fake.
#[async_trait]
pub trait KitService: Send + Sync {
    async fn list_broadcasts(&self) -> Result<Vec<Broadcast>, KitError>;

    async fn create_broadcast(&self, draft: &BroadcastDraft) -> Result<Broadcast, KitError>;

    async fn create_subscriber(&self, request: &SubscribeRequest) -> Result<Subscriber, KitError>;

    async fn add_subscriber_to_form(
        &self,
        form_id: i64,
        email_address: &str,
        referrer: &str,
    ) -> Result<Subscriber, KitError>;
}

#[derive(Clone)]
pub struct KitClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for KitClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KitClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl KitClient {
    pub fn new(api_key: String) -> Self {
        let base_url = Url::parse(KIT_API_BASE).expect("valid default Kit URL");
        Self::with_base_url(api_key, base_url)
    }

    pub fn with_base_url(api_key: String, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("kit-sync/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            api_key,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, KitError> {
        let url = self
            .base_url
            .join(&format!("{KIT_API_VERSION}/{path}"))
            .map_err(|e| KitError::InvalidResponse(format!("invalid Kit URL: {e}")))?;
        debug!(method = %method, url = %url, "kit api request");

        let mut request = self
            .http
            .request(method, url)
            .header("Accept", "application/json")
            .header("X-Kit-Api-Key", &self.api_key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = extract_error_message(status, &text);
            warn!(status = %status, message = %message, "kit api error");
            return Err(KitError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| KitError::InvalidResponse(format!("invalid Kit response JSON: {e}")))
    }

    pub async fn list_broadcasts(&self) -> Result<Vec<Broadcast>, KitError> {
        let path = format!("broadcasts?per_page={BROADCASTS_PER_PAGE}");
        let response: BroadcastsListResponse = self.execute(Method::GET, &path, None).await?;
        Ok(response.broadcasts)
    }

    pub async fn create_broadcast(&self, draft: &BroadcastDraft) -> Result<Broadcast, KitError> {
        let body = build_broadcast_request(draft);
        let response: BroadcastResponse = self
            .execute(Method::POST, "broadcasts", Some(&body))
            .await?;
        Ok(response.broadcast)
    }

    pub async fn create_subscriber(
        &self,
        request: &SubscribeRequest,
    ) -> Result<Subscriber, KitError> {
        let body = build_subscriber_request(request);
        let response: SubscriberResponse = self
            .execute(Method::POST, "subscribers", Some(&body))
            .await?;
        Ok(response.subscriber)
    }

    pub async fn add_subscriber_to_form(
        &self,
        form_id: i64,
        email_address: &str,
        referrer: &str,
    ) -> Result<Subscriber, KitError> {
        let body = json!({
            "email_address": email_address,
            "referrer": referrer,
        });
        let path = format!("forms/{form_id}/subscribers");
        let response: SubscriberResponse = self.execute(Method::POST, &path, Some(&body)).await?;
        Ok(response.subscriber)
    }
}

#[async_trait]
impl KitService for KitClient {
    async fn list_broadcasts(&self) -> Result<Vec<Broadcast>, KitError> {
        KitClient::list_broadcasts(self).await
    }

    async fn create_broadcast(&self, draft: &BroadcastDraft) -> Result<Broadcast, KitError> {
        KitClient::create_broadcast(self, draft).await
    }

    async fn create_subscriber(&self, request: &SubscribeRequest) -> Result<Subscriber, KitError> {
        KitClient::create_subscriber(self, request).await
    }

    async fn add_subscriber_to_form(
        &self,
        form_id: i64,
        email_address: &str,
        referrer: &str,
    ) -> Result<Subscriber, KitError> {
        KitClient::add_subscriber_to_form(self, form_id, email_address, referrer).await
    }
}

/// Kit error payloads carry `{ "errors": ["…"] }`; fall back to the
/// HTTP status text when the body is not structured.
fn extract_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("errors")
                .and_then(|errors| errors.get(0))
                .and_then(|first| first.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

pub fn build_broadcast_request(draft: &BroadcastDraft) -> Value {
    json!({
        "email_template_id": EMAIL_TEMPLATE_ID,
        "email_address": null,
        "content": draft.content,
        "description": draft.summary,
        "public": true,
        "published_at": draft.published_at.to_rfc3339(),
        "send_at": null,
        "thumbnail_alt": draft.subject,
        "thumbnail_url": draft.thumbnail_url,
        "preview_text": draft.summary,
        "subject": draft.subject,
        "subscriber_filter": null,
    })
}

pub fn build_subscriber_request(request: &SubscribeRequest) -> Value {
    json!({
        "email_address": request.email_address,
        "state": "active",
        "fields": Value::Object(subscriber_fields(request)),
    })
}

/// Map present attribution fields to Kit custom-field names. When
/// `utm_content` is absent the journal entry title stands in for it.
pub fn subscriber_fields(request: &SubscribeRequest) -> Map<String, Value> {
    let mut fields = Map::new();
    let mut put = |name: &str, value: &Option<String>| {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            fields.insert(name.to_string(), Value::String(value.to_string()));
        }
    };
    put("Referrer", &request.referrer);
    put("HTTP Referrer", &request.http_referrer);
    put("UTM Source", &request.utm_source);
    put("UTM Medium", &request.utm_medium);
    put("UTM Campaign", &request.utm_campaign);
    if request.utm_content.is_some() {
        put("UTM Content", &request.utm_content);
    } else {
        put("UTM Content", &request.entry_title);
    }
    put("UTM Term", &request.utm_term);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> BroadcastDraft {
        BroadcastDraft {
            subject: "Hello World".into(),
            content: "<article>hi</article>".into(),
            summary: "First post".into(),
            published_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            thumbnail_url: Some("https://example.com/a.png".into()),
        }
    }

    #[test]
    fn broadcast_request_carries_template_and_subject() {
        let body = build_broadcast_request(&draft());
        assert_eq!(body["email_template_id"], EMAIL_TEMPLATE_ID);
        assert_eq!(body["subject"], "Hello World");
        assert_eq!(body["content"], "<article>hi</article>");
        assert_eq!(body["public"], true);
        assert_eq!(body["published_at"], "2024-05-01T00:00:00+00:00");
        assert_eq!(body["thumbnail_url"], "https://example.com/a.png");
        assert_eq!(body["thumbnail_alt"], "Hello World");
        assert!(body["email_address"].is_null());
        assert!(body["send_at"].is_null());
        assert!(body["subscriber_filter"].is_null());
    }

    #[test]
    fn bare_email_yields_empty_fields_and_active_state() {
        let body = build_subscriber_request(&SubscribeRequest::new("a@b.com"));
        assert_eq!(body["email_address"], "a@b.com");
        assert_eq!(body["state"], "active");
        assert_eq!(body["fields"], serde_json::json!({}));
    }

    #[test]
    fn attribution_fields_map_to_readable_names() {
        let request = SubscribeRequest {
            email_address: "a@b.com".into(),
            referrer: Some("/journal/hello".into()),
            http_referrer: Some("https://news.example/".into()),
            utm_source: Some("newsletter".into()),
            utm_campaign: Some("launch".into()),
            ..Default::default()
        };
        let fields = subscriber_fields(&request);
        assert_eq!(fields["Referrer"], "/journal/hello");
        assert_eq!(fields["HTTP Referrer"], "https://news.example/");
        assert_eq!(fields["UTM Source"], "newsletter");
        assert_eq!(fields["UTM Campaign"], "launch");
        assert!(!fields.contains_key("UTM Medium"));
    }

    #[test]
    fn entry_title_substitutes_for_missing_utm_content() {
        let mut request = SubscribeRequest::new("a@b.com");
        request.entry_title = Some("Hello World".into());
        let fields = subscriber_fields(&request);
        assert_eq!(fields["UTM Content"], "Hello World");

        request.utm_content = Some("explicit".into());
        let fields = subscriber_fields(&request);
        assert_eq!(fields["UTM Content"], "explicit");
    }

    #[test]
    fn error_message_prefers_structured_payload() {
        let status = StatusCode::UNPROCESSABLE_ENTITY;
        assert_eq!(
            extract_error_message(status, r#"{"errors":["Email address is invalid"]}"#),
            "Email address is invalid"
        );
        assert_eq!(
            extract_error_message(status, "<html>oops</html>"),
            "Unprocessable Entity"
        );
    }
}
