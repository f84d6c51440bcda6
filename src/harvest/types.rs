// src/harvest/types.rs
use anyhow::Result;

/// One message as delivered by the event source. Ids are opaque; the source
/// hands pages out newest first.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct RawEvent {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub attachment_url: Option<String>,
    pub in_reply_to_id: Option<String>,
}

/// A recognized spawn announcement. `id` is the originating event id.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct SpawnRecord {
    pub id: String,
    pub image_url: String,
}

/// Paginated, newest-first history of a channel.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Up to `limit` events strictly older than `before` (or the newest page
    /// when `before` is `None`), newest first. An empty page means nothing older exists.
    async fn fetch_page(&self, before: Option<&str>, limit: usize) -> Result<Vec<RawEvent>>;
    fn name(&self) -> &'static str;
}
