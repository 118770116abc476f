//! Race configuration documents
//!
//! One JSON file per race under the races directory, named `{race_id}.json`.
//! Carries the qualifying results, which historical session to train on,
//! optional weather coordinates, the feature list, and model hyperparameters.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::data::features::default_features;
use crate::error::PipelineError;
use crate::model::gbdt::GbdtParams;

/// Race identifier within a season: round number or event name
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RaceIdentifier {
    Round(u32),
    Name(String),
}

impl RaceIdentifier {
    /// Filename-safe form used by the session store
    pub fn slug(&self) -> String {
        match self {
            RaceIdentifier::Round(n) => n.to_string(),
            RaceIdentifier::Name(name) => name.to_lowercase().replace(' ', "_"),
        }
    }
}

impl fmt::Display for RaceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceIdentifier::Round(n) => write!(f, "round {}", n),
            RaceIdentifier::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Which historical session supplies the training targets
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingRace {
    pub year: i32,
    pub identifier: RaceIdentifier,
    /// Session kind: "R" for race, "Q" for qualifying
    #[serde(rename = "type", default = "default_session_kind")]
    pub kind: String,
}

fn default_session_kind() -> String {
    "R".to_string()
}

/// One driver's qualifying result; a missing time excludes the entry
#[derive(Debug, Clone, Deserialize)]
pub struct QualifyingEntry {
    pub driver: String,
    #[serde(default)]
    pub qualifying_time: Option<f64>,
}

/// Forecast lookup coordinates and target timestamp
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default = "default_forecast_time")]
    pub forecast_time: String,
}

fn default_forecast_time() -> String {
    "2025-01-01 12:00:00".to_string()
}

/// Model hyperparameter overrides from the race config
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelParams {
    #[serde(default)]
    pub random_state: Option<u64>,
    #[serde(default)]
    pub n_estimators: Option<usize>,
    #[serde(default)]
    pub learning_rate: Option<f64>,
    #[serde(default)]
    pub max_depth: Option<usize>,
}

impl ModelParams {
    /// Apply overrides on top of the trainer defaults
    pub fn resolve(&self) -> GbdtParams {
        let defaults = GbdtParams::default();
        GbdtParams {
            random_state: self.random_state.unwrap_or(defaults.random_state),
            n_estimators: self.n_estimators.unwrap_or(defaults.n_estimators),
            learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
            max_depth: self.max_depth.or(defaults.max_depth),
        }
    }
}

/// Full per-race configuration document
#[derive(Debug, Clone, Deserialize)]
pub struct RaceConfig {
    pub race_id: String,
    pub race_name: String,
    pub year: i32,
    pub training_race: TrainingRace,
    pub qualifying_data: Vec<QualifyingEntry>,
    #[serde(default)]
    pub weather: Option<WeatherConfig>,
    #[serde(default)]
    pub features: Option<Vec<String>>,
    #[serde(default)]
    pub model_params: Option<ModelParams>,
    /// Driver-code-keyed season points, merged as an extra feature
    #[serde(default)]
    pub season_points: Option<HashMap<String, f64>>,
    /// Driver-code-keyed average grid-to-finish position change
    #[serde(default)]
    pub average_position_change: Option<HashMap<String, f64>>,
}

impl RaceConfig {
    /// Load `{races_dir}/{race_id}.json`; a missing file is fatal
    pub fn load<P: AsRef<Path>>(races_dir: P, race_id: &str) -> Result<Self, PipelineError> {
        let path = races_dir.as_ref().join(format!("{}.json", race_id));
        if !path.exists() {
            return Err(PipelineError::ConfigNotFound(path));
        }
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|source| PipelineError::ConfigParse { path, source })
    }

    /// Declared feature columns, defaulting to the qualifying time alone
    pub fn feature_list(&self) -> Vec<String> {
        self.features.clone().unwrap_or_else(default_features)
    }

    /// Resolved model hyperparameters
    pub fn gbdt_params(&self) -> GbdtParams {
        self.model_params.clone().unwrap_or_default().resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "race_id": "australia",
        "race_name": "Australian GP",
        "year": 2025,
        "training_race": {"year": 2024, "identifier": "Australia", "type": "R"},
        "qualifying_data": [
            {"driver": "Max Verstappen", "qualifying_time": 90.0},
            {"driver": "Lando Norris"}
        ]
    }"#;

    #[test]
    fn test_parse_minimal_config() {
        let config: RaceConfig = serde_json::from_str(MINIMAL).unwrap();
        assert_eq!(config.race_id, "australia");
        assert_eq!(config.qualifying_data.len(), 2);
        assert!(config.qualifying_data[1].qualifying_time.is_none());
        assert_eq!(config.feature_list(), vec!["QualifyingTime (s)".to_string()]);
        assert!(config.weather.is_none());
    }

    #[test]
    fn test_race_identifier_forms() {
        let round: RaceIdentifier = serde_json::from_str("3").unwrap();
        assert_eq!(round.slug(), "3");

        let name: RaceIdentifier = serde_json::from_str("\"Emilia Romagna\"").unwrap();
        assert_eq!(name.slug(), "emilia_romagna");
    }

    #[test]
    fn test_model_params_resolve_overrides() {
        let params = ModelParams {
            n_estimators: Some(50),
            learning_rate: None,
            max_depth: Some(4),
            random_state: None,
        };
        let resolved = params.resolve();
        assert_eq!(resolved.n_estimators, 50);
        assert_eq!(resolved.random_state, 42);
        assert!((resolved.learning_rate - 0.1).abs() < 1e-12);
        assert_eq!(resolved.max_depth, Some(4));
    }

    #[test]
    fn test_load_missing_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = RaceConfig::load(dir.path(), "nowhere").unwrap_err();
        assert!(matches!(err, PipelineError::ConfigNotFound(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("australia.json")).unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = RaceConfig::load(dir.path(), "australia").unwrap();
        assert_eq!(config.race_name, "Australian GP");
        assert_eq!(config.training_race.kind, "R");
    }
}
