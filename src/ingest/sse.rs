// src/ingest/sse.rs
//! Reconnecting reader for the real-time alert SSE feed.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use thiserror::Error;

use crate::ingest::types::{AlertEvent, AlertSource};

/// Substring of `name` that marks a heartbeat line instead of an alert.
pub const KEEP_ALIVE_TOKEN: &str = "KEEP_ALIVE";

/// Browser user agent; the feed sits behind Cloudflare.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:60.0) Gecko/20100101 Firefox/81.0";

#[derive(Debug, Error)]
pub enum FeedError {
    /// The open stream broke or ended; reopening the same URL is expected to work.
    #[error("feed stream interrupted: {0}")]
    Transient(String),
    /// The feed cannot be reached, or refused the request outright (4xx).
    #[error("feed unavailable: {0}")]
    Fatal(String),
}

/// What a single feed line turned out to be.
#[derive(Debug)]
pub enum FeedLine {
    Blank,
    KeepAlive,
    Malformed(serde_json::Error),
    Alert(AlertEvent),
}

/// Strip `data:` framing and classify one line of the stream.
pub fn parse_line(line: &str) -> FeedLine {
    let trimmed = line.trim();
    let payload = trimmed.strip_prefix("data:").unwrap_or(trimmed).trim();
    if payload.is_empty() {
        return FeedLine::Blank;
    }
    match serde_json::from_str::<AlertEvent>(payload) {
        Err(e) => FeedLine::Malformed(e),
        Ok(ev) if ev.name.contains(KEEP_ALIVE_TOKEN) => FeedLine::KeepAlive,
        Ok(ev) => FeedLine::Alert(ev),
    }
}

/// Build the request headers: the caller's identification header plus the browser UA.
pub fn feed_headers(custom_key: &str, custom_value: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let name = HeaderName::from_bytes(custom_key.as_bytes())
        .with_context(|| format!("invalid custom header name {custom_key:?}"))?;
    let value = HeaderValue::from_str(custom_value).context("invalid custom header value")?;
    headers.insert(name, value);
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    Ok(headers)
}

/// Long-lived feed connection yielding alerts one at a time.
///
/// Broken or finished streams are reopened transparently; alerts in flight
/// at that moment may be lost. Only a [`FeedError::Fatal`] ends the sequence.
pub struct EventSource {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    response: Option<reqwest::Response>,
    partial: Vec<u8>,
    lines: VecDeque<String>,
    retry_delay: Duration,
}

/// Statuses that mean "try again shortly" rather than "go away".
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

impl EventSource {
    pub fn new(url: impl Into<String>, headers: HeaderMap) -> Result<Self> {
        // No read timeout: a stale stream only shows up as a transport error.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("building feed http client")?;
        Ok(Self {
            client,
            url: url.into(),
            headers,
            response: None,
            partial: Vec::new(),
            lines: VecDeque::new(),
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Pause before reopening after a 5xx/429 answer.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Next alert from the feed. Keep-alives and unparsable lines are skipped.
    pub async fn next_event(&mut self) -> Result<AlertEvent, FeedError> {
        loop {
            let line = match self.next_line().await {
                Ok(line) => line,
                Err(FeedError::Transient(reason)) => {
                    tracing::warn!(target: "feed", %reason, "stream interrupted, reconnecting");
                    counter!("feed_reconnects_total").increment(1);
                    continue;
                }
                Err(fatal) => return Err(fatal),
            };

            match parse_line(&line) {
                FeedLine::Blank => {}
                FeedLine::KeepAlive => {
                    tracing::debug!(target: "feed", "received keep-alive");
                    counter!("feed_keepalives_total").increment(1);
                }
                FeedLine::Malformed(e) => {
                    tracing::warn!(target: "feed", error = %e, line = %line, "error decoding JSON");
                    counter!("feed_malformed_total").increment(1);
                }
                FeedLine::Alert(ev) => return Ok(ev),
            }
        }
    }

    async fn connect(&self) -> Result<reqwest::Response, FeedError> {
        tracing::info!(target: "feed", url = %self.url, "opening SSE connection");
        counter!("feed_connections_total").increment(1);
        let resp = self
            .client
            .get(&self.url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| FeedError::Fatal(format!("connect: {e}")))?;

        let status = resp.status();
        if is_retryable_status(status) {
            tracing::warn!(target: "feed", %status, "feed answered with a retryable status");
            tokio::time::sleep(self.retry_delay).await;
            return Err(FeedError::Transient(format!("status: {status}")));
        }
        resp.error_for_status()
            .map_err(|e| FeedError::Fatal(format!("status: {e}")))
    }

    async fn next_line(&mut self) -> Result<String, FeedError> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                tracing::debug!(target: "feed", %line, "got event line");
                return Ok(line);
            }

            if self.response.is_none() {
                self.response = Some(self.connect().await?);
            }
            let Some(resp) = self.response.as_mut() else {
                continue;
            };

            let next = resp.chunk().await;
            match next {
                Ok(Some(bytes)) => self.push_bytes(&bytes),
                Ok(None) => {
                    // Clean end: an unterminated last line is still a line.
                    if !self.partial.is_empty() {
                        self.push_bytes(b"\n");
                    }
                    self.reset();
                    return Err(FeedError::Transient("stream closed by server".into()));
                }
                Err(e) => {
                    self.reset();
                    return Err(FeedError::Transient(e.to_string()));
                }
            }
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.partial.extend_from_slice(bytes);
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.partial.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw);
            self.lines
                .push_back(text.trim_end_matches(['\n', '\r']).to_string());
        }
    }

    // A half-received line belongs to the dead connection.
    fn reset(&mut self) {
        self.response = None;
        self.partial.clear();
    }
}

#[async_trait]
impl AlertSource for EventSource {
    async fn next_event(&mut self) -> Result<AlertEvent> {
        Ok(EventSource::next_event(self).await?)
    }

    fn name(&self) -> &'static str {
        "rocketalert-sse"
    }
}
