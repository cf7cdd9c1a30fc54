use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use serde::Serialize;
use timelapse_common::frame::{capture_filename, Frame};
use tracing::{debug, warn};

use super::weather::{WeatherClient, WeatherReport};
use super::{FrameSink, SinkError, JPEG_QUALITY};

const API_ROUTE: &str = "/api/data";

/// Forwards each frame to a remote collector as a single JSON POST.
///
/// Fire and forget: one attempt, transport-default timeout, no retries.
pub struct UploadSink {
    client: reqwest::Client,
    url: String,
    weather: Option<WeatherClient>,
}

#[derive(Debug, Serialize)]
struct UploadPayload {
    /// Base64-encoded JPEG.
    image: String,
    filename: String,
    /// Capture time, Unix milliseconds.
    timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    weather: Option<WeatherReport>,
}

impl UploadSink {
    /// `host_port` is the collector's `host:port`.
    pub fn new(host_port: &str, weather: Option<WeatherClient>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("http://{host_port}{API_ROUTE}"),
            weather,
        }
    }

    /// Returns `Ok(true)` iff the collector answered exactly 200.
    pub async fn upload(&self, frame: &Frame) -> Result<bool, SinkError> {
        let status = self.post(frame).await?;
        Ok(status == reqwest::StatusCode::OK)
    }

    async fn post(&self, frame: &Frame) -> Result<reqwest::StatusCode, SinkError> {
        let now = Utc::now();
        let jpeg = frame.to_jpeg(JPEG_QUALITY)?;

        let weather = match &self.weather {
            Some(client) => match client.fetch().await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "weather lookup failed, uploading without enrichment");
                    None
                }
            },
            None => None,
        };

        let payload = UploadPayload {
            image: BASE64.encode(&jpeg),
            filename: capture_filename(now),
            timestamp: now.timestamp_millis(),
            weather,
        };

        debug!(url = self.url, filename = payload.filename, "posting image");
        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(SinkError::Http)?;
        Ok(resp.status())
    }
}

#[async_trait]
impl FrameSink for UploadSink {
    async fn consume(&self, frame: &Frame) -> Result<(), SinkError> {
        let status = self.post(frame).await?;
        if status == reqwest::StatusCode::OK {
            Ok(())
        } else {
            Err(SinkError::Rejected(status.as_u16()))
        }
    }

    fn describe(&self) -> String {
        format!("upload:{}", self.url)
    }
}
