// src/harvest/providers/discord.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::harvest::types::{EventSource, RawEvent};

pub const DISCORD_API: &str = "https://discord.com/api/v10";

#[derive(Debug, Deserialize)]
struct Message {
    id: String,
    author: Author,
    #[serde(default)]
    content: String,
    #[serde(default)]
    attachments: Vec<Attachment>,
    message_reference: Option<MessageReference>,
}

#[derive(Debug, Deserialize)]
struct Author {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    url: String,
}

#[derive(Debug, Deserialize)]
struct MessageReference {
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RateLimited {
    retry_after: f64,
}

impl From<Message> for RawEvent {
    fn from(m: Message) -> Self {
        RawEvent {
            id: m.id,
            author_id: m.author.id,
            text: m.content,
            attachment_url: m.attachments.into_iter().next().map(|a| a.url),
            in_reply_to_id: m.message_reference.and_then(|r| r.message_id),
        }
    }
}

/// Channel history over the Discord REST API (`GET /channels/{id}/messages`).
#[derive(Clone)]
pub struct DiscordChannelSource {
    base_url: String,
    channel_id: String,
    token: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordChannelSource {
    pub fn new(token: String, channel_id: String) -> Self {
        Self {
            base_url: DISCORD_API.to_string(),
            channel_id,
            token,
            client: Client::new(),
            timeout: Duration::from_secs(15),
            max_retries: 5,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    fn page_url(&self) -> String {
        format!("{}/channels/{}/messages", self.base_url, self.channel_id)
    }
}

#[async_trait]
impl EventSource for DiscordChannelSource {
    async fn fetch_page(&self, before: Option<&str>, limit: usize) -> Result<Vec<RawEvent>> {
        let mut query: Vec<(&str, String)> = vec![("limit", limit.to_string())];
        if let Some(b) = before {
            query.push(("before", b.to_string()));
        }

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .get(self.page_url())
                .header("Authorization", format!("Bot {}", self.token))
                .query(&query)
                .timeout(self.timeout)
                .send()
                .await;

            let backoff = Duration::from_millis(500u64 << (attempt - 1).min(6));
            match res {
                Ok(rsp) if rsp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= self.max_retries {
                        return Err(anyhow!("Discord rate limit persisted after {attempt} attempts"));
                    }
                    let wait = rsp
                        .json::<RateLimited>()
                        .await
                        .map(|r| Duration::from_secs_f64(r.retry_after.clamp(0.0, 60.0)))
                        .unwrap_or(backoff);
                    tracing::debug!(target: "harvest", ?wait, "rate limited by Discord");
                    tokio::time::sleep(wait).await;
                }
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        let transient = rsp.status().is_server_error();
                        if transient && attempt < self.max_retries {
                            tokio::time::sleep(backoff).await;
                            continue;
                        }
                        return Err(anyhow!("Discord history HTTP error: {e}"));
                    }
                    let messages: Vec<Message> =
                        rsp.json().await.context("decoding Discord message page")?;
                    return Ok(messages.into_iter().map(RawEvent::from).collect());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tracing::warn!(target: "harvest", error = %e, attempt, "history request failed, retrying");
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    return Err(anyhow!("Discord history request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_json_maps_to_raw_event() {
        let json = r#"[
            {"id":"3","author":{"id":"bot","username":"BallsDex"},"content":"A wild countryball appeared!",
             "attachments":[{"id":"a","url":"https://cdn.discordapp.com/x.png"}]},
            {"id":"2","author":{"id":"bot"},"content":"<@1> You caught **France!**",
             "attachments":[],"message_reference":{"message_id":"1","channel_id":"9"}}
        ]"#;
        let msgs: Vec<Message> = serde_json::from_str(json).unwrap();
        let evs: Vec<RawEvent> = msgs.into_iter().map(RawEvent::from).collect();
        assert_eq!(
            evs[0].attachment_url.as_deref(),
            Some("https://cdn.discordapp.com/x.png")
        );
        assert_eq!(evs[0].in_reply_to_id, None);
        assert_eq!(evs[1].in_reply_to_id.as_deref(), Some("1"));
        assert_eq!(evs[1].author_id, "bot");
    }

    #[test]
    fn base_url_is_trimmed() {
        let s = DiscordChannelSource::new("t".into(), "42".into()).with_base_url("http://x/");
        assert_eq!(s.page_url(), "http://x/channels/42/messages");
    }
}
