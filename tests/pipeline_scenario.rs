// tests/pipeline_scenario.rs
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rocket_alert_relay::ingest::{self, sse::feed_headers};
use rocket_alert_relay::publish::{publish_cycle, MESSAGE_FOOTER, MESSAGE_HEADER};
use rocket_alert_relay::{AlertBuffer, AlertEvent, AlertSource, EventSource, Poster};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingPoster {
    posts: Mutex<Vec<String>>,
}

#[async_trait]
impl Poster for RecordingPoster {
    async fn post(&self, text: &str) -> Result<()> {
        self.posts.lock().unwrap().push(text.to_string());
        Ok(())
    }
    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Replays a fixed list, then fails like a dead feed.
struct ScriptedSource(Vec<AlertEvent>);

#[async_trait]
impl AlertSource for ScriptedSource {
    async fn next_event(&mut self) -> Result<AlertEvent> {
        if self.0.is_empty() {
            anyhow::bail!("feed gone");
        }
        Ok(self.0.remove(0))
    }
    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[tokio::test]
async fn haifa_alert_reaches_the_poster() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/alerts/real-time"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "data: {\"name\":\"Haifa\",\"englishName\":\"Haifa\",\"areaNameEn\":\"North\",\"timeStamp\":\"2024-01-01T00:00:00\"}\n",
        ))
        .mount(&server)
        .await;

    let buffer = AlertBuffer::new();
    let source = EventSource::new(
        format!("{}/api/v1/alerts/real-time", server.uri()),
        feed_headers("X-Relay-Client", "tests").unwrap(),
    )
    .unwrap();
    let task = ingest::spawn_ingest_worker(source, buffer.clone(), 500);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while buffer.is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "no alert buffered");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    task.abort();

    let poster = RecordingPoster::default();
    let report = publish_cycle(&buffer, &poster, 500).await.unwrap();
    assert!(report.posted >= 1);

    let posts = poster.posts.lock().unwrap();
    let all = posts.concat();
    assert!(all.contains("Town/city: Haifa/Haifa"));
    assert!(all.contains("District Name: North"));
    assert!(posts.iter().all(|p| p.chars().count() <= 500));
}

#[tokio::test]
async fn ingest_stops_only_when_the_source_dies() {
    let buffer = AlertBuffer::new();
    let mut source = ScriptedSource(vec![
        AlertEvent {
            name: "אשקלון".into(),
            english_name: "Ashkelon".into(),
            area_name_en: "Lakhish".into(),
            time_stamp: "2024-01-01T12:00:00".into(),
        },
        AlertEvent::default(),
    ]);

    let err = ingest::run_ingest(&mut source, &buffer, 500).await.unwrap_err();
    assert!(format!("{err:#}").contains("feed gone"));

    let segments = buffer.drain_all();
    assert_eq!(segments.len(), 2);
    assert!(segments[0].starts_with("Town/city: Ashkelon/אשקלון"));
}

#[tokio::test]
async fn buffered_segments_are_framed_and_drained() {
    let buffer = AlertBuffer::new();
    buffer.append(["A".to_string(), "B".into(), "C".into()]);
    let poster = RecordingPoster::default();

    publish_cycle(&buffer, &poster, 500).await.unwrap();

    assert!(buffer.is_empty());
    assert_eq!(
        *poster.posts.lock().unwrap(),
        vec![format!("{MESSAGE_HEADER}A\nB\nC{MESSAGE_FOOTER}")]
    );
}
