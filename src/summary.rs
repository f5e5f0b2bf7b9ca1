//! summary.rs — daily alert total from the aggregate API, posted once a day.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use metrics::counter;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use thiserror::Error;

use crate::publish::Poster;
use crate::scheduler::JobAction;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("aggregate API reported an error: {0}")]
    Upstream(String),
    #[error("aggregate API returned success without a total")]
    MissingTotal,
}

#[derive(Debug, Deserialize)]
struct TotalResponse {
    success: bool,
    #[serde(default)]
    payload: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

/// Where daily totals come from.
#[async_trait::async_trait]
pub trait AlertTotals: Send + Sync {
    async fn daily_total(&self, day: NaiveDate) -> Result<u64>;
}

/// Client for `{base}/api/v1/alerts/total`.
#[derive(Clone)]
pub struct AggregateClient {
    base_url: String,
    headers: HeaderMap,
    client: reqwest::Client,
    timeout: Duration,
}

impl AggregateClient {
    pub fn new(base_url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(15),
        }
    }

    /// Upper bound for the whole request; the scheduler waits on it inline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl AlertTotals for AggregateClient {
    async fn daily_total(&self, day: NaiveDate) -> Result<u64> {
        let day = day.format("%Y-%m-%d").to_string();
        tracing::info!(target: "summary", %day, "fetching daily total");
        let body: TotalResponse = self
            .client
            .get(format!("{}/api/v1/alerts/total", self.base_url))
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .query(&[("from", day.as_str()), ("to", day.as_str())])
            .send()
            .await
            .context("aggregate total request")?
            .json()
            .await
            .context("aggregate total body")?;

        if !body.success {
            return Err(SummaryError::Upstream(body.error.unwrap_or_default()).into());
        }
        let total = body.payload.ok_or(SummaryError::MissingTotal)?;
        tracing::info!(target: "summary", %day, total, "daily total fetched");
        Ok(total)
    }
}

pub fn render_summary(day: NaiveDate, total: u64) -> String {
    format!(
        "📢 Daily Summary, {}: 📢\n\nTotal number of rocket alerts today: {total}\n\nLearn more at https://rocketalert.live",
        day.format("%Y-%m-%d")
    )
}

/// Fetch `day`'s total and post one summary. Any failure skips the post.
///
/// Returns whether a summary went out.
pub async fn post_daily_summary(
    day: NaiveDate,
    totals: &dyn AlertTotals,
    poster: &dyn Poster,
) -> bool {
    let total = match totals.daily_total(day).await {
        Ok(t) => t,
        Err(e) => {
            counter!("summary_failures_total").increment(1);
            tracing::error!(target: "summary", error = ?e, %day, "daily total unavailable, skipping summary");
            return false;
        }
    };

    match poster.post(&render_summary(day, total)).await {
        Ok(()) => {
            counter!("summary_posts_total").increment(1);
            tracing::info!(target: "summary", poster = poster.name(), total, "daily total posted");
            true
        }
        Err(e) => {
            counter!("summary_failures_total").increment(1);
            tracing::error!(target: "summary", error = ?e, "daily summary post failed");
            false
        }
    }
}

/// Scheduled action posting the summary for the day it fires on.
pub struct DailySummaryJob {
    totals: Arc<dyn AlertTotals>,
    poster: Arc<dyn Poster>,
}

impl DailySummaryJob {
    pub fn new(totals: Arc<dyn AlertTotals>, poster: Arc<dyn Poster>) -> Self {
        Self { totals, poster }
    }
}

#[async_trait::async_trait]
impl JobAction for DailySummaryJob {
    async fn run(&self, today: NaiveDate) {
        tracing::info!(target: "summary", poster = self.poster.name(), "attempting to post daily total");
        post_daily_summary(today, self.totals.as_ref(), self.poster.as_ref()).await;
    }
}
