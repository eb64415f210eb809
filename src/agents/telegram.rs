//! Telegram intelligence agent
//!
//! Reads recent posts of monitored channels and reports the ones that are
//! relevant to the query. Channel access goes through [`ChannelFeed`];
//! [`BotApiChannelFeed`] talks to the Telegram Bot API.

use super::{tokens, Agent, AgentRequest, FetchError};
use crate::types::{AgentId, AgentResponse, AppError, ErrorKind, Finding, Result, Severity};
use crate::utils::toml_config::{ChannelKind, TelegramChannelConfig};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const CRITICAL_KEYWORDS: [&str; 6] = [
    "critical",
    "rce",
    "zero-day",
    "0day",
    "actively exploited",
    "breach",
];
const HIGH_KEYWORDS: [&str; 4] = ["vulnerability", "exploit", "apt", "ransomware"];
const MEDIUM_KEYWORDS: [&str; 3] = ["phishing", "malware", "suspicious"];
const SUMMARY_CHARS: usize = 200;

/// One post read from a channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPost {
    pub id: i64,
    pub text: String,
    /// Unix timestamp
    pub date: i64,
}

/// Access to channel posts
#[async_trait]
pub trait ChannelFeed: Send + Sync {
    /// Most recent posts of a channel, oldest first, at most `limit`
    async fn recent_posts(
        &self,
        channel: &TelegramChannelConfig,
        limit: usize,
    ) -> std::result::Result<Vec<ChannelPost>, FetchError>;
}

// ============= Bot API =============

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    #[serde(default)]
    channel_post: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    date: i64,
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    #[serde(default)]
    username: Option<String>,
}

/// Reads channel posts from the Bot API `getUpdates` endpoint
///
/// The bot must be a member of every monitored channel.
pub struct BotApiChannelFeed {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl BotApiChannelFeed {
    pub fn new(api_base: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl ChannelFeed for BotApiChannelFeed {
    async fn recent_posts(
        &self,
        channel: &TelegramChannelConfig,
        limit: usize,
    ) -> std::result::Result<Vec<ChannelPost>, FetchError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| FetchError::Unavailable("Telegram bot token is not configured".into()))?;

        let url = format!("{}/bot{}/getUpdates", self.api_base, token);
        let response = self
            .client
            .get(&url)
            .query(&[("allowed_updates", r#"["channel_post"]"#)])
            .send()
            .await
            .map_err(|e| FetchError::from(e.without_url()))?;

        let status = response.status();
        let body: BotApiResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.without_url().to_string()))?;
        if !body.ok {
            return Err(FetchError::Unavailable(format!(
                "Bot API error (HTTP {}): {}",
                status.as_u16(),
                body.description.unwrap_or_else(|| "unknown".to_string())
            )));
        }

        let handle = channel.handle.trim_start_matches('@');
        let mut posts: Vec<ChannelPost> = body
            .result
            .into_iter()
            .filter_map(|update| update.channel_post)
            .filter(|msg| {
                msg.chat
                    .username
                    .as_deref()
                    .map(|name| name.eq_ignore_ascii_case(handle))
                    .unwrap_or(false)
            })
            .filter_map(|msg| {
                let text = msg.text.or(msg.caption)?;
                Some(ChannelPost {
                    id: msg.message_id,
                    text,
                    date: msg.date,
                })
            })
            .collect();

        let skip = posts.len().saturating_sub(limit);
        posts.drain(..skip);
        Ok(posts)
    }
}

/// Fixed posts per channel handle, for offline runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticChannelFeed {
    posts: Vec<(String, ChannelPost)>,
}

impl StaticChannelFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_post(mut self, handle: &str, id: i64, text: &str) -> Self {
        self.posts.push((
            handle.to_string(),
            ChannelPost {
                id,
                text: text.to_string(),
                date: 0,
            },
        ));
        self
    }
}

#[async_trait]
impl ChannelFeed for StaticChannelFeed {
    async fn recent_posts(
        &self,
        channel: &TelegramChannelConfig,
        limit: usize,
    ) -> std::result::Result<Vec<ChannelPost>, FetchError> {
        let mut posts: Vec<ChannelPost> = self
            .posts
            .iter()
            .filter(|(handle, _)| handle == &channel.handle)
            .map(|(_, post)| post.clone())
            .collect();
        let skip = posts.len().saturating_sub(limit);
        posts.drain(..skip);
        Ok(posts)
    }
}

// ============= Analysis =============

/// Severity of a post from its wording
pub fn classify_severity(text: &str) -> Severity {
    let text = text.to_lowercase();
    let any = |keywords: &[&str]| keywords.iter().any(|kw| text.contains(kw));
    if any(&CRITICAL_KEYWORDS) {
        Severity::Critical
    } else if any(&HIGH_KEYWORDS) {
        Severity::High
    } else if any(&MEDIUM_KEYWORDS) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Telegram intelligence agent
pub struct TelegramAgent {
    feed: Arc<dyn ChannelFeed>,
    channels: Vec<TelegramChannelConfig>,
    message_limit: usize,
}

impl TelegramAgent {
    pub fn new(
        feed: Arc<dyn ChannelFeed>,
        channels: Vec<TelegramChannelConfig>,
        message_limit: usize,
    ) -> Self {
        Self {
            feed,
            channels,
            message_limit: message_limit.max(1),
        }
    }

    fn analyze(
        &self,
        query: &str,
        results: &[(&TelegramChannelConfig, Vec<ChannelPost>)],
    ) -> Result<Vec<Finding>> {
        // Words shorter than three characters match almost every post
        let query_words: Vec<String> = tokens(query).into_iter().filter(|w| w.len() >= 3).collect();
        let mut findings = Vec::new();

        for (channel, posts) in results {
            let always_relevant = matches!(channel.kind, ChannelKind::Breach | ChannelKind::ThreatIntel);
            for post in posts {
                let text = post.text.to_lowercase();
                let matches_query = query_words.iter().any(|w| text.contains(w.as_str()));
                if !matches_query && !always_relevant {
                    continue;
                }

                let summary: String = post.text.chars().take(SUMMARY_CHARS).collect();
                let confidence = if matches_query { 0.75 } else { 0.5 };
                findings.push(
                    Finding::new(
                        format!("Telegram: {} #{}", channel.name, post.id),
                        summary,
                        self.id(),
                        classify_severity(&post.text),
                        confidence,
                    )?
                    .with_metadata("channel", channel.handle.clone())
                    .with_metadata("message_id", post.id.to_string()),
                );
            }
        }

        Ok(findings)
    }
}

#[async_trait]
impl Agent for TelegramAgent {
    fn id(&self) -> AgentId {
        AgentId::new("telegram")
    }

    fn description(&self) -> String {
        "Monitors Telegram groups and channels for leaked data and threat actor activity"
            .to_string()
    }

    async fn invoke(&self, request: &AgentRequest) -> AgentResponse {
        let preview: String = request.query.chars().take(100).collect();
        info!("Telegram agent processing: {}", preview);

        if self.channels.is_empty() {
            return AgentResponse::success(self.id(), Vec::new(), "No Telegram channels configured.");
        }

        let reads = join_all(self.channels.iter().map(|channel| async move {
            debug!("Checking channel: {}", channel.name);
            (channel, self.feed.recent_posts(channel, self.message_limit).await)
        }));
        let outcomes = tokio::select! {
            biased;
            _ = request.cancel.cancelled() => {
                return AgentResponse::failure(self.id(), ErrorKind::Cancelled, "channel read cancelled");
            }
            outcomes = reads => outcomes,
        };

        let mut results = Vec::new();
        let mut context = String::from("Telegram channels monitored:\n");
        let mut last_error: Option<FetchError> = None;
        for (channel, outcome) in outcomes {
            match outcome {
                Ok(posts) => {
                    context.push_str(&format!(
                        "- {} ({}): {} messages\n",
                        channel.name,
                        channel.handle,
                        posts.len()
                    ));
                    results.push((channel, posts));
                }
                Err(e) => {
                    warn!("Error fetching {}: {}", channel.name, e);
                    last_error = Some(e);
                }
            }
        }

        if results.is_empty() {
            if let Some(e) = last_error {
                return AgentResponse::failure(self.id(), e.kind(), e.to_string());
            }
        }

        match self.analyze(&request.query, &results) {
            Ok(findings) => {
                if findings.is_empty() {
                    context.push_str("No posts matching the query were found.\n");
                }
                AgentResponse::success(self.id(), findings, context)
            }
            Err(e) => AgentResponse::failure(self.id(), ErrorKind::ParseError, e.to_string()),
        }
    }
}
