use serde::{Deserialize, Serialize};

/// Report reason with engine-wide significance: an ordinary user report.
pub const DEFAULT_REASON: &str = "DEFAULT";

/// Report reason that vouches for contested content, outweighing ordinary
/// reports in the visibility score.
pub const COUNTER_REASON: &str = "COUNTER_DEFAULT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub userid: i64,
    pub external_id: String,
    pub username: String,
    pub moderator: bool,
    pub banned: bool,
}

/// A content submission before it is persisted. Pre-upload validators may
/// rewrite `data` in place (e.g. to strip image metadata).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentUpload {
    pub title: String,
    pub meta: String,
    pub data: Vec<u8>,
    /// When present, replaces the content's whole tag set on upload/update.
    pub tags: Option<Vec<String>>,
}

/// The meta field as requested by the caller: verbatim, or parsed to JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Meta {
    Raw(String),
    Parsed(serde_json::Value),
}

impl Meta {
    /// Parse failures degrade to an empty object rather than raising.
    pub fn parsed(raw: &str) -> Meta {
        Meta::Parsed(
            serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
        )
    }
}

/// Lite projection: no payload, meta only on request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSummary {
    pub contentid: i64,
    pub userid: i64,
    pub username: String,
    pub title: String,
    pub version: i64,
    pub likes: i64,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Full projection, including the binary payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDetail {
    pub contentid: i64,
    pub userid: i64,
    pub username: String,
    pub title: String,
    pub version: i64,
    pub likes: i64,
    pub tags: Vec<String>,
    pub meta: Meta,
    pub data: Vec<u8>,
}

/// Per-project user aggregates for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub userid: i64,
    pub username: String,
    pub submission_count: i64,
    pub likes_given: i64,
    pub likes_received: i64,
    pub moderator: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanEntry {
    pub userid: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub name: String,
    pub content_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryStats {
    pub content: i64,
    pub liked_content: i64,
    pub users: i64,
    pub banned_users: i64,
    pub likes: i64,
    pub reports: i64,
    pub top_tags: Vec<String>,
}

/// Split the cache's comma-joined tag column back into a proper list.
pub(crate) fn split_tags(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        Vec::new()
    } else {
        joined.split(',').map(str::to_string).collect()
    }
}
