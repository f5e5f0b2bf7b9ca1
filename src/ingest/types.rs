// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Deserializer};

/// One alert notification from the real-time feed.
///
/// Missing or null fields come through empty; numbers and other non-string values are
/// kept in their JSON text form.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AlertEvent {
    /// Localized (Hebrew) town/city name; also carries the keep-alive sentinel.
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "englishName", deserialize_with = "lenient_string")]
    pub english_name: String,
    #[serde(rename = "areaNameEn", deserialize_with = "lenient_string")]
    pub area_name_en: String,
    #[serde(rename = "timeStamp", deserialize_with = "lenient_string")]
    pub time_stamp: String,
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Anything the ingest worker can pull alerts from, one at a time.
///
/// `next_event` only returns `Err` when the source is gone for good.
#[async_trait::async_trait]
pub trait AlertSource: Send {
    async fn next_event(&mut self) -> Result<AlertEvent>;
    fn name(&self) -> &'static str;
}
