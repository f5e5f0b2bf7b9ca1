// src/publish/mod.rs
pub mod mastodon;

use std::time::Duration;

use anyhow::Result;
use metrics::{counter, gauge};
use tokio::task::JoinHandle;

use crate::buffer::AlertBuffer;
use crate::chunker::chunk;

pub const MESSAGE_HEADER: &str = "🚨🚀🚨 Rocket alerts in Israel 🚨🚀🚨\n\n";
pub const MESSAGE_FOOTER: &str = "\nLearn more at https://rocketalert.live";

/// Something that can publish a single status post.
#[async_trait::async_trait]
pub trait Poster: Send + Sync {
    async fn post(&self, text: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Frame buffered segments into one message.
pub fn compose_message(segments: &[String]) -> String {
    format!("{MESSAGE_HEADER}{}{MESSAGE_FOOTER}", segments.join("\n"))
}

/// Outcome of one publish cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub drained: usize,
    pub posted: usize,
    pub failed: usize,
}

/// Drain the buffer and publish it in order, `max_chars` per post.
///
/// Failed parts are logged and skipped; the remaining parts still go out.
pub async fn publish_cycle(
    buffer: &AlertBuffer,
    poster: &dyn Poster,
    max_chars: usize,
) -> Result<CycleReport> {
    if buffer.is_empty() {
        return Ok(CycleReport::default());
    }
    let segments = buffer.drain_all();
    if segments.is_empty() {
        return Ok(CycleReport::default());
    }

    let message = compose_message(&segments);
    let parts = chunk(&message, max_chars)?;
    let total = parts.len();
    let mut report = CycleReport {
        drained: segments.len(),
        ..CycleReport::default()
    };

    for (i, part) in parts.iter().enumerate() {
        match poster.post(part).await {
            Ok(()) => {
                report.posted += 1;
                counter!("publish_posts_total").increment(1);
                tracing::info!(
                    target: "publish",
                    poster = poster.name(),
                    "part {}/{} posted successfully",
                    i + 1,
                    total
                );
            }
            Err(e) => {
                report.failed += 1;
                counter!("publish_failures_total").increment(1);
                tracing::error!(
                    target: "publish",
                    poster = poster.name(),
                    error = ?e,
                    "part {}/{} failed to post",
                    i + 1,
                    total
                );
            }
        }
    }

    gauge!("publish_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);
    Ok(report)
}

/// Poll the buffer every `interval` and publish whatever accumulated.
pub fn spawn_publish_worker<P>(
    buffer: AlertBuffer,
    poster: P,
    interval: Duration,
    max_chars: usize,
) -> JoinHandle<()>
where
    P: Poster + 'static,
{
    tokio::spawn(async move {
        crate::telemetry::ensure_metrics_described();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match publish_cycle(&buffer, &poster, max_chars).await {
                Ok(r) if r.drained > 0 => {
                    tracing::debug!(
                        target: "publish",
                        drained = r.drained,
                        posted = r.posted,
                        failed = r.failed,
                        "publish cycle done"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!(target: "publish", error = ?e, "publish cycle failed"),
            }
        }
    })
}
