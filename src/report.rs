//! Prediction generation and report formatting
//!
//! Applies the trained model to the race's feature rows, reattaches driver
//! and team identity, sorts into predicted finishing order, and validates the
//! canonical JSON schema before anything is written. A malformed report never
//! reaches disk.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::data::features::{FeatureFrame, FeatureMatrix};
use crate::error::PipelineError;
use crate::model::trainer::TrainedModel;
use crate::reference::ReferenceData;

pub const MODEL_TYPE: &str = "GradientBoostingRegressor";

/// One driver's line in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub driver: String,
    /// Predicted race time in seconds
    pub predicted_time: f64,
    /// Qualifying time the prediction was based on, in seconds
    pub qualifying_time: f64,
    pub team: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub mae: f64,
    pub features_used: Vec<String>,
    pub model_type: String,
}

/// The externally persisted artifact; immutable once validated and written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionReport {
    pub race: String,
    pub year: i32,
    pub predictions: Vec<PredictionRecord>,
    pub model_metadata: ModelMetadata,
}

/// Run inference over the race's feature rows
///
/// The matrix is rebuilt with exactly the model's feature names in training
/// order. A feature the live frame lacks entirely is injected as 0.0 for every
/// row rather than failing; remaining per-row gaps are median-imputed the way
/// training was. This asymmetry (0.0 injection vs median imputation) is
/// intentional and matches the training/inference contract.
pub fn generate_predictions(model: &TrainedModel, frame: &FeatureFrame) -> Vec<f64> {
    let rows = frame
        .rows
        .iter()
        .map(|row| {
            model
                .feature_names
                .iter()
                .map(|name| {
                    if frame.has_column(name) {
                        row.value(name)
                    } else {
                        Some(0.0)
                    }
                })
                .collect()
        })
        .collect();

    let matrix = FeatureMatrix {
        names: model.feature_names.clone(),
        rows,
    };
    let x = matrix.impute_median();
    model.regressor.predict(&x)
}

/// Assemble the report: sort ascending by predicted time and resolve identity
pub fn format_report(
    frame: &FeatureFrame,
    predictions: &[f64],
    reference: &ReferenceData,
    race_name: &str,
    year: i32,
    mae: f64,
    features_used: Vec<String>,
) -> PredictionReport {
    let mut records: Vec<PredictionRecord> = frame
        .rows
        .iter()
        .zip(predictions)
        .map(|(row, &predicted)| {
            let driver = reference
                .driver_name(&row.code)
                .unwrap_or(&row.code)
                .to_string();
            let team = row
                .team
                .clone()
                .or_else(|| reference.team_for(&row.code).map(str::to_string))
                .unwrap_or_else(|| "Unknown".to_string());
            PredictionRecord {
                driver,
                predicted_time: predicted,
                qualifying_time: row.qualifying_time,
                team,
            }
        })
        .collect();

    records.sort_by(|a, b| a.predicted_time.total_cmp(&b.predicted_time));

    PredictionReport {
        race: race_name.to_string(),
        year,
        predictions: records,
        model_metadata: ModelMetadata {
            mae,
            features_used,
            model_type: MODEL_TYPE.to_string(),
        },
    }
}

const REQUIRED_KEYS: [&str; 4] = ["race", "year", "predictions", "model_metadata"];
const REQUIRED_PREDICTION_KEYS: [&str; 4] =
    ["driver", "predicted_time", "qualifying_time", "team"];

/// Validate the canonical report schema on the serialized document
///
/// Checks the required top-level keys, the per-entry keys, and the output
/// invariants: a non-empty prediction list sorted ascending by predicted time.
pub fn validate_report(value: &Value) -> Result<(), PipelineError> {
    let Some(object) = value.as_object() else {
        return Err(PipelineError::SchemaValidation(
            "report must be a JSON object".to_string(),
        ));
    };
    for key in REQUIRED_KEYS {
        if !object.contains_key(key) {
            return Err(PipelineError::SchemaValidation(format!(
                "missing required key: {}",
                key
            )));
        }
    }

    let Some(predictions) = object["predictions"].as_array() else {
        return Err(PipelineError::SchemaValidation(
            "'predictions' must be a list".to_string(),
        ));
    };
    if predictions.is_empty() {
        return Err(PipelineError::SchemaValidation(
            "'predictions' must not be empty".to_string(),
        ));
    }
    if !object["model_metadata"].is_object() {
        return Err(PipelineError::SchemaValidation(
            "'model_metadata' must be an object".to_string(),
        ));
    }

    let mut previous = f64::NEG_INFINITY;
    for (i, prediction) in predictions.iter().enumerate() {
        let Some(entry) = prediction.as_object() else {
            return Err(PipelineError::SchemaValidation(format!(
                "prediction {} must be an object",
                i
            )));
        };
        for key in REQUIRED_PREDICTION_KEYS {
            if !entry.contains_key(key) {
                return Err(PipelineError::SchemaValidation(format!(
                    "prediction {} missing required key: {}",
                    i, key
                )));
            }
        }
        let predicted = entry["predicted_time"].as_f64().ok_or_else(|| {
            PipelineError::SchemaValidation(format!(
                "prediction {} has non-numeric predicted_time",
                i
            ))
        })?;
        if predicted < previous {
            return Err(PipelineError::SchemaValidation(
                "'predictions' must be sorted ascending by predicted_time".to_string(),
            ));
        }
        previous = predicted;
    }

    Ok(())
}

/// Validate and persist the report as pretty JSON
pub fn save_report<P: AsRef<Path>>(
    report: &PredictionReport,
    path: P,
) -> Result<(), PipelineError> {
    let value = serde_json::to_value(report)?;
    validate_report(&value)?;

    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&value)?)?;
    Ok(())
}
