use serde::{Deserialize, Serialize};
use timelapse_common::config::WeatherConfig;

/// Enrichment metadata attached to uploaded frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Degrees Celsius, two decimal places.
    pub temperature: f64,
    /// Wind speed as reported by the provider, two decimal places.
    pub wind: f64,
}

/// Client for the external weather lookup. Entirely optional: a failed fetch
/// is reported to the caller, never propagated into the capture loop.
pub struct WeatherClient {
    client: reqwest::Client,
    url: String,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Self {
        let url = format!(
            "{}?lat={}&lon={}&appid={}",
            config.url, config.lat, config.lon, config.api_key
        );
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub async fn fetch(&self) -> Result<WeatherReport, WeatherError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;
        let data: ApiResponse = resp.json().await?;
        // The provider reports temperature in Kelvin.
        Ok(WeatherReport {
            temperature: round2(data.main.temp - 273.0),
            wind: round2(data.wind.speed),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    main: ApiMain,
    wind: ApiWind,
}

#[derive(Debug, Deserialize)]
struct ApiMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct ApiWind {
    speed: f64,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_response_parses() {
        let json = r#"{
            "main": { "temp": 287.456, "pressure": 1012 },
            "wind": { "speed": 3.087, "deg": 240 }
        }"#;
        let data: ApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(round2(data.main.temp - 273.0), 14.46);
        assert_eq!(round2(data.wind.speed), 3.09);
    }
}
