//! Rocket alert relay — binary entrypoint.
//! Streams the real-time alert feed into a shared buffer, posts it to Mastodon
//! every tick, and posts a daily total at a fixed local time.

use std::sync::Arc;

use anyhow::{Context, Result};
use rocket_alert_relay::config::RelayConfig;
use rocket_alert_relay::ingest::{self, sse};
use rocket_alert_relay::publish::{self, mastodon::MastodonPoster};
use rocket_alert_relay::scheduler::Scheduler;
use rocket_alert_relay::summary::{AggregateClient, DailySummaryJob};
use rocket_alert_relay::{AlertBuffer, EventSource};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` picks the filter (default `info`); `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();
    tracing::info!("program started");

    if let Err(e) = run().await {
        tracing::error!(error = ?e, "relay stopped");
        std::process::exit(1);
    }
}

/// Resolves once `signal` reports an interrupt. A failed handler never resolves.
async fn interrupted<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C; relying on process signals");
        std::future::pending::<()>().await;
    }
}

async fn run() -> Result<()> {
    let cfg = RelayConfig::from_env().context("loading configuration")?;
    let headers = sse::feed_headers(&cfg.custom_header_key, &cfg.custom_header_value)?;

    let poster = MastodonPoster::login(&cfg.mastodon)
        .await
        .context("logging in to mastodon")?;
    let buffer = AlertBuffer::new();

    let source = EventSource::new(cfg.feed_url(), headers.clone())?;
    let mut ingest_task = ingest::spawn_ingest_worker(source, buffer.clone(), cfg.post_max_chars);

    publish::spawn_publish_worker(
        buffer,
        poster.clone(),
        cfg.publish_interval,
        cfg.post_max_chars,
    );

    let mut scheduler = Scheduler::new();
    scheduler.every_day_at(
        "daily-summary",
        cfg.summary_at,
        DailySummaryJob::new(
            Arc::new(AggregateClient::new(&cfg.feed_base_url, headers)),
            Arc::new(poster),
        ),
        chrono::Local::now().naive_local(),
    );

    // The feed is the only source of alerts: once ingest ends the process must go too.
    tokio::select! {
        res = &mut ingest_task => {
            match res {
                Ok(Ok(())) => tracing::error!("alert feed ended"),
                Ok(Err(e)) => tracing::error!(error = ?e, "alert feed failed, bailing"),
                Err(e) => tracing::error!(error = %e, "ingest task panicked, bailing"),
            }
            std::process::exit(1);
        }
        _ = interrupted(tokio::signal::ctrl_c()) => {
            tracing::info!("program terminated");
            std::process::exit(0);
        }
        _ = scheduler.run_forever(cfg.scheduler_tick) => {}
    }

    Ok(())
}
