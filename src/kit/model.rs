use serde::Deserialize;

/// A Kit broadcast as returned by the v4 API. Owned by the remote
/// platform; deserialization is tolerant of fields we do not use.
#[derive(Debug, Clone, Deserialize)]
pub struct Broadcast {
    pub id: i64,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastResponse {
    pub broadcast: Broadcast,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastsListResponse {
    pub broadcasts: Vec<Broadcast>,
}

/// A Kit subscriber record.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct Subscriber {
    pub id: i64,
    pub email_address: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriberResponse {
    pub subscriber: Subscriber,
}
