// src/ingest/mod.rs
pub mod sse;
pub mod types;

use anyhow::{Context, Result};
use metrics::counter;
use tokio::task::JoinHandle;

use crate::buffer::AlertBuffer;
use crate::chunker::chunk;
use crate::ingest::types::{AlertEvent, AlertSource};

/// Render one alert into the multi-line record that ends up in a post.
pub fn render_alert(ev: &AlertEvent) -> String {
    format!(
        "Town/city: {}/{}\nDistrict Name: {}\nLocal time in Israel: {}\n\n",
        ev.english_name, ev.name, ev.area_name_en, ev.time_stamp
    )
}

/// Render, chunk and buffer a single alert. Returns the number of segments added.
pub fn ingest_event(ev: &AlertEvent, buffer: &AlertBuffer, max_len: usize) -> Result<usize> {
    let text = render_alert(ev);
    let segments = chunk(&text, max_len).context("chunking alert text")?;
    let n = segments.len();
    buffer.append(segments);
    Ok(n)
}

/// Pull alerts from `source` into `buffer` until the source fails for good.
///
/// A bad event is logged and skipped. The returned error is always the source's.
pub async fn run_ingest<S>(source: &mut S, buffer: &AlertBuffer, max_len: usize) -> Result<()>
where
    S: AlertSource + ?Sized,
{
    crate::telemetry::ensure_metrics_described();
    loop {
        let ev = source
            .next_event()
            .await
            .with_context(|| format!("alert source {} failed", source.name()))?;

        match ingest_event(&ev, buffer, max_len) {
            Ok(n) => {
                counter!("alerts_ingested_total").increment(1);
                counter!("alert_segments_buffered_total").increment(n as u64);
                tracing::info!(
                    target: "ingest",
                    city = %ev.english_name,
                    area = %ev.area_name_en,
                    segments = n,
                    "alert buffered"
                );
            }
            Err(e) => {
                tracing::error!(target: "ingest", error = ?e, event = ?ev, "skipping alert");
            }
        }
    }
}

/// Run the ingest pipeline as its own task. The handle resolves only when the source died.
pub fn spawn_ingest_worker<S>(mut source: S, buffer: AlertBuffer, max_len: usize) -> JoinHandle<Result<()>>
where
    S: AlertSource + 'static,
{
    tokio::spawn(async move { run_ingest(&mut source, &buffer, max_len).await })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn haifa() -> AlertEvent {
        AlertEvent {
            name: "חיפה".into(),
            english_name: "Haifa".into(),
            area_name_en: "North".into(),
            time_stamp: "2024-01-01T00:00:00".into(),
        }
    }

    #[test]
    fn render_matches_template() {
        assert_eq!(
            render_alert(&haifa()),
            "Town/city: Haifa/חיפה\nDistrict Name: North\nLocal time in Israel: 2024-01-01T00:00:00\n\n"
        );
    }

    #[test]
    fn ingest_event_appends_chunks() {
        let buf = AlertBuffer::new();
        let n = ingest_event(&haifa(), &buf, 20).unwrap();
        let expected = render_alert(&haifa()).chars().count().div_ceil(20);
        assert_eq!(n, expected);
        assert_eq!(buf.drain_all().concat(), render_alert(&haifa()));
    }

    #[test]
    fn ingest_event_rejects_zero_width_without_buffering() {
        let buf = AlertBuffer::new();
        assert!(ingest_event(&haifa(), &buf, 0).is_err());
        assert!(buf.is_empty());
    }
}
