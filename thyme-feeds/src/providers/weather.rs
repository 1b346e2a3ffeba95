//! Open-Meteo daily forecast feed.
//!
//! No API key required. The request asks for today's high, low and WMO
//! weather code in the configured unit and timezone.

use crate::config::WeatherConfig;
use crate::error::FetchError;
use crate::http;
use crate::provider::DataProvider;
use crate::types::{FeedKind, WeatherReport};
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

/// Open-Meteo forecast provider.
pub struct WeatherProvider {
    config: WeatherConfig,
    client: reqwest::Client,
}

impl WeatherProvider {
    /// Create a provider from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Config`] if the configuration is invalid.
    pub fn new(config: WeatherConfig, client: reqwest::Client) -> Result<Self, FetchError> {
        config.validate()?;
        Ok(Self { config, client })
    }

    /// Full request URL for the configured location.
    pub fn request_url(&self) -> Result<Url, FetchError> {
        let lat = self.config.latitude.to_string();
        let lon = self.config.longitude.to_string();
        Url::parse_with_params(
            &self.config.endpoint,
            &[
                ("latitude", lat.as_str()),
                ("longitude", lon.as_str()),
                ("daily", "temperature_2m_max,temperature_2m_min,weathercode"),
                ("current_weather", "true"),
                ("temperature_unit", self.config.temperature_unit.as_str()),
                ("timezone", self.config.timezone.as_str()),
            ],
        )
        .map_err(|e| FetchError::Config(format!("invalid weather endpoint: {e}")))
    }
}

#[async_trait]
impl DataProvider for WeatherProvider {
    type Output = WeatherReport;

    async fn fetch(&self) -> Result<WeatherReport, FetchError> {
        let url = self.request_url()?;
        let body = http::fetch_text("weather", self.client.get(url)).await?;
        parse_forecast(&body, &self.config.temperature_unit)
    }

    fn kind(&self) -> FeedKind {
        FeedKind::Weather
    }
}

#[derive(Deserialize)]
struct ForecastResponse {
    daily: DailyBlock,
}

#[derive(Deserialize)]
struct DailyBlock {
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    weathercode: Vec<Option<u16>>,
}

/// Parse an Open-Meteo forecast body into today's report.
///
/// Extracted as a separate function for testability with canned JSON.
pub fn parse_forecast(body: &str, unit: &str) -> Result<WeatherReport, FetchError> {
    let response: ForecastResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("weather response: {e}")))?;
    let daily = response.daily;

    let first = |name: &str, values: &[Option<f64>]| {
        values
            .first()
            .copied()
            .flatten()
            .ok_or_else(|| FetchError::Parse(format!("weather response has no {name} for today")))
    };

    let temp_max = first("temperature_2m_max", &daily.temperature_2m_max)?;
    let temp_min = first("temperature_2m_min", &daily.temperature_2m_min)?;
    let weather_code = daily
        .weathercode
        .first()
        .copied()
        .flatten()
        .ok_or_else(|| FetchError::Parse("weather response has no weathercode for today".into()))?;

    Ok(WeatherReport {
        temp_max,
        temp_min,
        weather_code,
        unit: unit.to_owned(),
    })
}
