use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration, so series carry descriptions once a recorder is installed.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_connections_total", "Feed connections opened.");
        describe_counter!(
            "feed_reconnects_total",
            "Feed reconnects after a broken or finished stream."
        );
        describe_counter!("feed_keepalives_total", "Keep-alive lines discarded.");
        describe_counter!("feed_malformed_total", "Feed lines that were not valid JSON.");
        describe_counter!("alerts_ingested_total", "Alert events rendered into the buffer.");
        describe_counter!(
            "alert_segments_buffered_total",
            "Text segments appended to the alert buffer."
        );
        describe_counter!("publish_posts_total", "Posts published successfully.");
        describe_counter!("publish_failures_total", "Posts that failed to publish.");
        describe_counter!("summary_posts_total", "Daily summaries posted.");
        describe_counter!(
            "summary_failures_total",
            "Daily summaries skipped after an aggregate or posting error."
        );
        describe_gauge!(
            "publish_last_cycle_ts",
            "Unix ts of the last publish cycle that drained alerts."
        );
    });
}
