use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// A journal post as loaded from disk or reconstructed from the feed.
/// Immutable once loaded; `slug` is the local identity, `title` is the
/// correlation key against remote broadcasts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub summary: String,
    pub image: Option<String>,
    pub slug: String,
    pub content: String,
    pub url: Option<String>,
}

impl Post {
    /// Absolute URL of the post, falling back to `{base}/journal/{slug}`.
    pub fn resolved_url(&self, base_url: &str) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("{}/journal/{}", base_url.trim_end_matches('/'), self.slug),
        }
    }
}

/// Derived projection joining a local post to its remote broadcast.
/// Recomputed on every sync run; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub slug: String,
    pub kit_id: i64,
    pub synced_at: String,
}

/// Outcome of a single per-post sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created { kit_id: i64 },
    AlreadySynced,
    Failed { error: String },
}

/// Per-post sync report entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub slug: String,
    pub title: String,
    pub outcome: SyncOutcome,
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, SyncOutcome::Failed { .. })
    }
}

// Wire shape kept compatible with the original API: a flat object with a
// `success` discriminant and `kitId`/`message`/`error` depending on outcome.
impl Serialize for SyncResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("SyncResult", 4)?;
        st.serialize_field("slug", &self.slug)?;
        st.serialize_field("title", &self.title)?;
        match &self.outcome {
            SyncOutcome::Created { kit_id } => {
                st.serialize_field("kitId", kit_id)?;
                st.serialize_field("success", &true)?;
            }
            SyncOutcome::AlreadySynced => {
                st.serialize_field("message", "Post already synced")?;
                st.serialize_field("success", &true)?;
            }
            SyncOutcome::Failed { error } => {
                st.serialize_field("error", error)?;
                st.serialize_field("success", &false)?;
            }
        }
        st.end()
    }
}

/// Transient subscribe action with attribution metadata. Never stored
/// locally; translated into two Kit calls and discarded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscribeRequest {
    pub email_address: String,
    pub referrer: Option<String>,
    pub http_referrer: Option<String>,
    pub entry_title: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_content: Option<String>,
    pub utm_term: Option<String>,
}

impl SubscribeRequest {
    pub fn new(email_address: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            ..Default::default()
        }
    }
}
