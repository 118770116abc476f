//! Batch prediction pipeline
//!
//! One race per invocation: load the historical session, build the feature
//! frame from qualifying data, resolve weather, train, predict, and format
//! the report. Training is restricted to drivers with a historical target;
//! prediction runs over the full qualifying set, so drivers missing from
//! history are still scored through injected and imputed features.

use std::path::Path;
use tracing::{info, warn};

use crate::config::RaceConfig;
use crate::data::features::FeatureFrame;
use crate::data::session::SessionLaps;
use crate::error::PipelineError;
use crate::model::trainer::train_model;
use crate::reference::ReferenceData;
use crate::report::{format_report, generate_predictions, PredictionReport};
use crate::weather::{WeatherResolver, FALLBACK_OBSERVATION};

/// Run the full prediction sequence for one race
pub async fn run(
    config: &RaceConfig,
    reference: &ReferenceData,
    resolver: &WeatherResolver,
    data_dir: &Path,
) -> Result<PredictionReport, PipelineError> {
    // Historical session: training targets and sector features. Fatal on failure.
    let training = &config.training_race;
    let session = SessionLaps::load(data_dir, training.year, &training.identifier, &training.kind)?;
    info!(
        laps = session.len(),
        year = training.year,
        "loaded training session for {}",
        training.identifier
    );
    let sector_averages = session.average_sector_times();
    let average_lap_times = session.average_lap_times();

    // Qualifying frame with identity, team, driver, and config-driven features
    let mut frame = FeatureFrame::from_qualifying(&config.qualifying_data);
    frame.normalize_identity(reference);
    frame.annotate_team(reference);
    frame.annotate_driver(reference);
    frame.annotate_custom(
        config.season_points.as_ref(),
        config.average_position_change.as_ref(),
    );
    info!(drivers = frame.rows.len(), "prepared qualifying data");

    // Weather: real forecast or the documented fallback, never fatal
    let observation = match &config.weather {
        Some(weather) => resolver
            .resolve(weather.latitude, weather.longitude, &weather.forecast_time)
            .await
            .observation(),
        None => {
            warn!("no weather configured for race; using default observation");
            FALLBACK_OBSERVATION
        }
    };
    info!(
        rain_probability = observation.rain_probability,
        temperature = observation.temperature,
        "resolved weather"
    );

    frame.annotate_weather(observation.rain_probability, observation.temperature);
    frame.adjust_for_weather(observation.rain_probability);
    frame.join_sectors(&sector_averages);

    // Train on the drivers with a historical target
    let (training_frame, targets) = frame.restrict_to_training(&average_lap_times)?;
    let feature_list = config.feature_list();
    let matrix = training_frame.to_matrix(&feature_list);
    let model = train_model(&matrix, &targets, &config.gbdt_params())?;
    info!(
        mae = model.mae,
        features = ?model.feature_names,
        trees = model.regressor.n_trees(),
        "model trained"
    );

    // Predict over every qualifying driver, history or not
    let predictions = generate_predictions(&model, &frame);
    let report = format_report(
        &frame,
        &predictions,
        reference,
        &config.race_name,
        config.year,
        model.mae,
        feature_list,
    );
    info!(entries = report.predictions.len(), "report assembled");

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::validate_report;
    use crate::weather::WeatherResolver;
    use std::io::Write;

    fn write_session_csv(dir: &Path) {
        let mut file = std::fs::File::create(dir.join("2024_australia_R.csv")).unwrap();
        writeln!(file, "Driver,LapTime,Sector1Time,Sector2Time,Sector3Time").unwrap();
        for (driver, base) in [("VER", 92.0), ("NOR", 93.0), ("PIA", 93.5), ("RUS", 94.0)] {
            for lap in 0..5 {
                let t = base + lap as f64 * 0.1;
                writeln!(
                    file,
                    "{},{:.3},{:.3},{:.3},{:.3}",
                    driver,
                    t,
                    t * 0.32,
                    t * 0.33,
                    t * 0.35
                )
                .unwrap();
            }
        }
    }

    fn config_fixture() -> RaceConfig {
        serde_json::from_str(
            r#"{
                "race_id": "australia",
                "race_name": "Australian GP",
                "year": 2025,
                "training_race": {"year": 2024, "identifier": "Australia", "type": "R"},
                "qualifying_data": [
                    {"driver": "Max Verstappen", "qualifying_time": 88.0},
                    {"driver": "Lando Norris", "qualifying_time": 88.5},
                    {"driver": "Oscar Piastri", "qualifying_time": 88.7},
                    {"driver": "George Russell", "qualifying_time": 89.0},
                    {"driver": "Isack Hadjar", "qualifying_time": 90.2},
                    {"driver": "Lewis Hamilton", "qualifying_time": null}
                ],
                "features": ["QualifyingTime (s)", "TeamPerformanceScore", "TotalSectorTime (s)"]
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_without_weather_credential() {
        let dir = tempfile::tempdir().unwrap();
        write_session_csv(dir.path());

        let config = config_fixture();
        let reference = ReferenceData::default();
        let resolver = WeatherResolver::new(None);

        let report = run(&config, &reference, &resolver, dir.path())
            .await
            .unwrap();

        // Hamilton had no qualifying time and is excluded; Hadjar has no
        // history but is still scored (scenario B)
        assert_eq!(report.predictions.len(), 5);
        assert!(report
            .predictions
            .iter()
            .any(|p| p.driver == "Isack Hadjar"));

        let value = serde_json::to_value(&report).unwrap();
        validate_report(&value).unwrap();
        assert_eq!(report.race, "Australian GP");
        assert!(report.model_metadata.mae.is_finite());
        assert_eq!(
            report.model_metadata.features_used,
            vec![
                "QualifyingTime (s)",
                "TeamPerformanceScore",
                "TotalSectorTime (s)"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_session_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_fixture();
        let err = run(
            &config,
            &ReferenceData::default(),
            &WeatherResolver::new(None),
            dir.path(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_no_overlap_aborts() {
        let dir = tempfile::tempdir().unwrap();
        write_session_csv(dir.path());

        let mut config = config_fixture();
        config.qualifying_data = vec![crate::config::QualifyingEntry {
            driver: "Mystery Rookie".to_string(),
            qualifying_time: Some(90.0),
        }];

        let err = run(
            &config,
            &ReferenceData::default(),
            &WeatherResolver::new(None),
            dir.path(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::NoTrainingOverlap));
    }
}
