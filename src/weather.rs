//! Weather forecast resolution
//!
//! Resolves rain probability and temperature for a race's coordinates and
//! target timestamp from an OpenWeatherMap-style forecast endpoint. Weather is
//! the one input allowed to degrade: a missing credential, an unmatched
//! timestamp, or any request failure resolves to the fixed fallback
//! observation with a warning instead of aborting the run. The outcome is
//! typed so callers can tell real weather from defaulted weather.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org/data/2.5/forecast";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";
/// Placeholder value some configs ship; treated as no credential
const PLACEHOLDER_KEY: &str = "YOURAPIKEY";

/// Rain probability and temperature for the race window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    /// Probability of precipitation in [0, 1]
    pub rain_probability: f64,
    /// Air temperature in degrees Celsius
    pub temperature: f64,
}

/// Observation used whenever the forecast cannot be resolved
pub const FALLBACK_OBSERVATION: WeatherObservation = WeatherObservation {
    rain_probability: 0.0,
    temperature: 20.0,
};

/// Why a resolution fell back to the default observation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FallbackReason {
    #[error("no weather API credential configured")]
    MissingCredential,
    #[error("no forecast bucket matches timestamp {0}")]
    ForecastNotFound(String),
    #[error("weather request failed: {0}")]
    RequestFailed(String),
}

/// Resolution result: real forecast data or the documented fallback
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherOutcome {
    Observed(WeatherObservation),
    Fallback { reason: FallbackReason },
}

impl WeatherOutcome {
    /// The observation to feed the feature builder, fallback or not
    pub fn observation(&self) -> WeatherObservation {
        match self {
            WeatherOutcome::Observed(obs) => *obs,
            WeatherOutcome::Fallback { .. } => FALLBACK_OBSERVATION,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, WeatherOutcome::Fallback { .. })
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastBucket>,
}

#[derive(Debug, Deserialize)]
struct ForecastBucket {
    #[serde(default)]
    dt_txt: String,
    #[serde(default)]
    pop: Option<f64>,
    #[serde(default)]
    main: Option<MainBlock>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    #[serde(default)]
    temp: Option<f64>,
}

/// Forecast client with a fixed request timeout
pub struct WeatherResolver {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl WeatherResolver {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Override the endpoint; used by tests against a local server
    pub fn with_base_url(api_key: Option<String>, base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Read the credential from the environment
    pub fn from_env() -> Self {
        Self::new(std::env::var(API_KEY_ENV).ok())
    }

    /// Resolve (rain probability, temperature) for the exact forecast timestamp
    ///
    /// Never fails: every error path resolves to a fallback outcome.
    pub async fn resolve(&self, latitude: f64, longitude: f64, forecast_time: &str) -> WeatherOutcome {
        let Some(api_key) = self.usable_key() else {
            return self.fall_back(FallbackReason::MissingCredential);
        };

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => return self.fall_back(FallbackReason::RequestFailed(e.to_string())),
        };
        if !response.status().is_success() {
            return self.fall_back(FallbackReason::RequestFailed(format!(
                "status {}",
                response.status()
            )));
        }

        let forecast: ForecastResponse = match response.json().await {
            Ok(f) => f,
            Err(e) => return self.fall_back(FallbackReason::RequestFailed(e.to_string())),
        };

        match select_forecast(&forecast, forecast_time) {
            Some(observation) => WeatherOutcome::Observed(observation),
            None => self.fall_back(FallbackReason::ForecastNotFound(forecast_time.to_string())),
        }
    }

    fn usable_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty() && *k != PLACEHOLDER_KEY)
    }

    fn fall_back(&self, reason: FallbackReason) -> WeatherOutcome {
        warn!("{}; using default weather values", reason);
        WeatherOutcome::Fallback { reason }
    }
}

/// Find the bucket whose timestamp string equals the requested time exactly
fn select_forecast(forecast: &ForecastResponse, forecast_time: &str) -> Option<WeatherObservation> {
    forecast
        .list
        .iter()
        .find(|bucket| bucket.dt_txt == forecast_time)
        .map(|bucket| WeatherObservation {
            rain_probability: bucket.pop.unwrap_or(0.0).clamp(0.0, 1.0),
            temperature: bucket
                .main
                .as_ref()
                .and_then(|m| m.temp)
                .unwrap_or(FALLBACK_OBSERVATION.temperature),
        })
}
