//! Feature engineering
//!
//! Builds the per-driver feature frame from qualifying entries and the
//! historical/weather observations, then assembles the numeric matrix the
//! trainer and predictor consume. Each transform is a pure step over the
//! frame, applied in a fixed order; the declared feature list from the race
//! configuration drives which columns end up in the matrix.

use std::collections::HashMap;

use crate::config::QualifyingEntry;
use crate::data::session::DriverSectorAverages;
use crate::error::PipelineError;
use crate::reference::{ReferenceData, DEFAULT_WET_FACTOR};

// Column names shared with the race configuration feature lists
pub const COL_QUALIFYING: &str = "QualifyingTime (s)";
pub const COL_QUALIFYING_ADJUSTED: &str = "QualifyingTime";
pub const COL_TEAM_SCORE: &str = "TeamPerformanceScore";
pub const COL_WET_FACTOR: &str = "WetPerformanceFactor";
pub const COL_CLEAN_AIR: &str = "CleanAirRacePace (s)";
pub const COL_RAIN: &str = "RainProbability";
pub const COL_TEMPERATURE: &str = "Temperature";
pub const COL_SECTOR1: &str = "Sector1Time (s)";
pub const COL_SECTOR2: &str = "Sector2Time (s)";
pub const COL_SECTOR3: &str = "Sector3Time (s)";
pub const COL_TOTAL_SECTOR: &str = "TotalSectorTime (s)";
pub const COL_SEASON_POINTS: &str = "SeasonPoints";
pub const COL_POSITION_CHANGE: &str = "AveragePositionChange";

/// Rain probability at or above which qualifying times are adjusted
pub const RAIN_THRESHOLD: f64 = 0.75;

/// Feature set used when the race config declares none
pub fn default_features() -> Vec<String> {
    vec![COL_QUALIFYING.to_string()]
}

/// Weather-conditioned qualifying time adjustment
///
/// The comparison is non-strict: a rain probability of exactly the threshold
/// already adjusts.
pub fn adjust_qualifying_time(
    qualifying_time: f64,
    rain_probability: f64,
    wet_factor: f64,
) -> f64 {
    if rain_probability >= RAIN_THRESHOLD {
        qualifying_time * wet_factor
    } else {
        qualifying_time
    }
}

/// One driver's row in the feature frame
#[derive(Debug, Clone)]
pub struct DriverRow {
    /// Identity exactly as given in the qualifying data
    pub driver: String,
    /// Normalized 3-letter code (or the raw value when unmapped)
    pub code: String,
    pub team: Option<String>,
    /// Raw qualifying time in seconds
    pub qualifying_time: f64,
    values: HashMap<String, f64>,
}

impl DriverRow {
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }

    fn set(&mut self, column: &str, value: f64) {
        self.values.insert(column.to_string(), value);
    }
}

/// Per-driver feature rows plus the ordered registry of numeric columns
///
/// A column may be registered while individual rows lack a value; that cell
/// is missing and subject to imputation at matrix assembly.
#[derive(Debug, Clone, Default)]
pub struct FeatureFrame {
    columns: Vec<String>,
    pub rows: Vec<DriverRow>,
}

impl FeatureFrame {
    /// Build the frame from qualifying entries, excluding drivers without a time
    pub fn from_qualifying(entries: &[QualifyingEntry]) -> Self {
        let mut frame = FeatureFrame::default();
        frame.register(COL_QUALIFYING);
        for entry in entries {
            let Some(time) = entry.qualifying_time else {
                continue;
            };
            let mut row = DriverRow {
                driver: entry.driver.clone(),
                code: String::new(),
                team: None,
                qualifying_time: time,
                values: HashMap::new(),
            };
            row.set(COL_QUALIFYING, time);
            frame.rows.push(row);
        }
        frame
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    fn register(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }

    /// Step 1: normalize driver identity to 3-letter codes
    ///
    /// If every identity already matches the code pattern the rows are taken
    /// as codes; otherwise full names are mapped through the reference tables,
    /// falling back to the raw value when unmapped. Total: every row keeps a
    /// non-empty identity.
    pub fn normalize_identity(&mut self, reference: &ReferenceData) {
        let all_codes = !self.rows.is_empty()
            && self.rows.iter().all(|row| is_driver_code(&row.driver));
        for row in &mut self.rows {
            row.code = if all_codes {
                row.driver.clone()
            } else {
                reference
                    .driver_code(&row.driver)
                    .map(str::to_string)
                    .unwrap_or_else(|| row.driver.clone())
            };
        }
    }

    /// Step 2: attach team and team performance score
    pub fn annotate_team(&mut self, reference: &ReferenceData) {
        self.register(COL_TEAM_SCORE);
        for row in &mut self.rows {
            row.team = reference.team_for(&row.code).map(str::to_string);
            let score = row
                .team
                .as_deref()
                .map(|team| reference.team_score(team))
                .unwrap_or(0.0);
            row.set(COL_TEAM_SCORE, score);
        }
    }

    /// Step 3: attach wet performance factor and clean-air pace
    pub fn annotate_driver(&mut self, reference: &ReferenceData) {
        self.register(COL_WET_FACTOR);
        self.register(COL_CLEAN_AIR);
        for row in &mut self.rows {
            row.set(COL_WET_FACTOR, reference.wet_factor(&row.code));
            // Clean-air pace stays missing for drivers without a measured value
            if let Some(pace) = reference.clean_air_pace(&row.code) {
                row.set(COL_CLEAN_AIR, pace);
            }
        }
    }

    /// Step 4: merge driver-code-keyed overrides from the race config
    pub fn annotate_custom(
        &mut self,
        season_points: Option<&HashMap<String, f64>>,
        position_change: Option<&HashMap<String, f64>>,
    ) {
        if let Some(points) = season_points {
            self.register(COL_SEASON_POINTS);
            for row in &mut self.rows {
                row.set(
                    COL_SEASON_POINTS,
                    points.get(&row.code).copied().unwrap_or(0.0),
                );
            }
        }
        if let Some(changes) = position_change {
            self.register(COL_POSITION_CHANGE);
            for row in &mut self.rows {
                row.set(
                    COL_POSITION_CHANGE,
                    changes.get(&row.code).copied().unwrap_or(0.0),
                );
            }
        }
    }

    /// Step 5: broadcast the resolved weather onto every row
    pub fn annotate_weather(&mut self, rain_probability: f64, temperature: f64) {
        self.register(COL_RAIN);
        self.register(COL_TEMPERATURE);
        for row in &mut self.rows {
            row.set(COL_RAIN, rain_probability);
            row.set(COL_TEMPERATURE, temperature);
        }
    }

    /// Step 6: weather-conditioned time adjustment, per driver
    pub fn adjust_for_weather(&mut self, rain_probability: f64) {
        self.register(COL_QUALIFYING_ADJUSTED);
        for row in &mut self.rows {
            let factor = row.value(COL_WET_FACTOR).unwrap_or(DEFAULT_WET_FACTOR);
            let adjusted = adjust_qualifying_time(row.qualifying_time, rain_probability, factor);
            row.set(COL_QUALIFYING_ADJUSTED, adjusted);
        }
    }

    /// Step 7: left-join historical per-driver sector aggregates by code
    ///
    /// Drivers absent from history keep missing sector features, not zeros.
    pub fn join_sectors(&mut self, sectors: &[DriverSectorAverages]) {
        self.register(COL_SECTOR1);
        self.register(COL_SECTOR2);
        self.register(COL_SECTOR3);
        self.register(COL_TOTAL_SECTOR);
        let by_driver: HashMap<&str, &DriverSectorAverages> = sectors
            .iter()
            .map(|s| (s.driver.as_str(), s))
            .collect();
        for row in &mut self.rows {
            if let Some(avg) = by_driver.get(row.code.as_str()) {
                row.set(COL_SECTOR1, avg.sector1);
                row.set(COL_SECTOR2, avg.sector2);
                row.set(COL_SECTOR3, avg.sector3);
                row.set(COL_TOTAL_SECTOR, avg.total);
            }
        }
    }

    /// Step 8: drop rows without a training target
    ///
    /// Returns the restricted frame and the aligned target vector. A driver
    /// cannot contribute to training without a historical average lap time;
    /// zero survivors aborts the run.
    pub fn restrict_to_training(
        &self,
        average_lap_times: &HashMap<String, f64>,
    ) -> Result<(FeatureFrame, Vec<f64>), PipelineError> {
        let mut frame = FeatureFrame {
            columns: self.columns.clone(),
            rows: Vec::new(),
        };
        let mut targets = Vec::new();
        for row in &self.rows {
            if let Some(&target) = average_lap_times.get(&row.code) {
                frame.rows.push(row.clone());
                targets.push(target);
            }
        }
        if frame.rows.is_empty() {
            return Err(PipelineError::NoTrainingOverlap);
        }
        Ok((frame, targets))
    }

    /// Assemble the numeric matrix for the declared features
    ///
    /// Declared names absent from the frame are skipped, not zero-filled;
    /// missing cells within a kept column stay missing until imputation.
    pub fn to_matrix(&self, feature_list: &[String]) -> FeatureMatrix {
        let names: Vec<String> = feature_list
            .iter()
            .filter(|name| self.has_column(name))
            .cloned()
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| names.iter().map(|name| row.value(name)).collect())
            .collect();
        FeatureMatrix { names, rows }
    }
}

fn is_driver_code(value: &str) -> bool {
    value.len() == 3 && value.chars().all(|c| c.is_ascii_uppercase())
}

/// Numeric feature matrix with possibly-missing cells
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl FeatureMatrix {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.names.is_empty()
    }

    /// Median-impute missing cells per column
    ///
    /// Each gap takes the median of the column's present values, or 0 when the
    /// whole column is missing. Running imputation on an already-complete
    /// matrix returns it unchanged.
    pub fn impute_median(&self) -> Vec<Vec<f64>> {
        let n_cols = self.names.len();
        let mut fills = vec![0.0f64; n_cols];
        for col in 0..n_cols {
            let mut present: Vec<f64> = self
                .rows
                .iter()
                .filter_map(|row| row[col])
                .collect();
            fills[col] = median(&mut present).unwrap_or(0.0);
        }

        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(col, cell)| cell.unwrap_or(fills[col]))
                    .collect()
            })
            .collect()
    }
}

/// Median of a slice; even lengths average the two middle values
pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(driver: &str, time: Option<f64>) -> QualifyingEntry {
        QualifyingEntry {
            driver: driver.to_string(),
            qualifying_time: time,
        }
    }

    fn built_frame(drivers: &[(&str, f64)]) -> FeatureFrame {
        let entries: Vec<QualifyingEntry> = drivers
            .iter()
            .map(|(d, t)| entry(d, Some(*t)))
            .collect();
        let mut frame = FeatureFrame::from_qualifying(&entries);
        frame.normalize_identity(&ReferenceData::default());
        frame
    }

    #[test]
    fn test_entries_without_time_excluded() {
        let frame = FeatureFrame::from_qualifying(&[
            entry("Max Verstappen", Some(90.0)),
            entry("Lando Norris", None),
        ]);
        assert_eq!(frame.rows.len(), 1);
        assert_eq!(frame.rows[0].value(COL_QUALIFYING), Some(90.0));
    }

    #[test]
    fn test_identity_normalization_is_total() {
        // Mixed names, codes, and an unrecognized string
        let frame = built_frame(&[
            ("Max Verstappen", 90.0),
            ("NOR", 90.5),
            ("Mystery Rookie", 91.0),
        ]);
        let codes: Vec<&str> = frame.rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["VER", "NOR", "Mystery Rookie"]);
        assert!(frame.rows.iter().all(|r| !r.code.is_empty()));
    }

    #[test]
    fn test_all_codes_taken_verbatim() {
        let frame = built_frame(&[("VER", 90.0), ("NOR", 90.5)]);
        assert_eq!(frame.rows[0].code, "VER");
        assert_eq!(frame.rows[1].code, "NOR");
    }

    #[test]
    fn test_team_annotation_defaults() {
        let reference = ReferenceData::default();
        let mut frame = built_frame(&[("Max Verstappen", 90.0), ("Mystery Rookie", 91.0)]);
        frame.annotate_team(&reference);

        assert_eq!(frame.rows[0].team.as_deref(), Some("Red Bull"));
        assert!((frame.rows[0].value(COL_TEAM_SCORE).unwrap() - 0.470).abs() < 1e-9);
        // Unmapped driver: no team, score defaults to zero
        assert!(frame.rows[1].team.is_none());
        assert_eq!(frame.rows[1].value(COL_TEAM_SCORE), Some(0.0));
    }

    #[test]
    fn test_driver_annotation_missing_pace() {
        let reference = ReferenceData::default();
        let mut frame = built_frame(&[
            ("Max Verstappen", 90.0),
            ("Andrea Kimi Antonelli", 91.0),
        ]);
        frame.annotate_driver(&reference);

        assert!(frame.rows[0].value(COL_CLEAN_AIR).is_some());
        assert!(frame.rows[1].value(COL_CLEAN_AIR).is_none());
        assert!((frame.rows[1].value(COL_WET_FACTOR).unwrap() - 0.98).abs() < 1e-9);
    }

    #[test]
    fn test_adjustment_boundary_at_threshold() {
        // Exactly at the threshold must adjust
        assert!((adjust_qualifying_time(90.0, 0.75, 0.98) - 88.2).abs() < 1e-9);
        assert_eq!(adjust_qualifying_time(90.0, 0.7499, 0.98), 90.0);
        assert_eq!(adjust_qualifying_time(90.0, 0.0, 0.98), 90.0);
    }

    #[test]
    fn test_scenario_a_verstappen_in_rain() {
        let reference = ReferenceData::default();
        let mut frame = built_frame(&[("Max Verstappen", 90.0)]);
        frame.annotate_driver(&reference);
        frame.annotate_weather(0.9, 18.0);
        frame.adjust_for_weather(0.9);

        let adjusted = frame.rows[0].value(COL_QUALIFYING_ADJUSTED).unwrap();
        assert!((adjusted - 90.0 * 0.975196).abs() < 1e-6);
        assert!((adjusted - 87.77).abs() < 0.01);
        // The raw qualifying time stays available for reporting
        assert_eq!(frame.rows[0].value(COL_QUALIFYING), Some(90.0));
    }

    #[test]
    fn test_dry_weather_leaves_times_unchanged() {
        let reference = ReferenceData::default();
        let mut frame = built_frame(&[("Max Verstappen", 90.0)]);
        frame.annotate_driver(&reference);
        frame.annotate_weather(0.0, 20.0);
        frame.adjust_for_weather(0.0);
        assert_eq!(frame.rows[0].value(COL_QUALIFYING_ADJUSTED), Some(90.0));
    }

    #[test]
    fn test_sector_join_keeps_missing() {
        let mut frame = built_frame(&[("VER", 90.0), ("NOR", 90.5)]);
        frame.join_sectors(&[DriverSectorAverages {
            driver: "VER".to_string(),
            sector1: 30.0,
            sector2: 31.0,
            sector3: 32.0,
            total: 93.0,
        }]);

        assert_eq!(frame.rows[0].value(COL_TOTAL_SECTOR), Some(93.0));
        // Absent from history: missing, not zero
        assert!(frame.rows[1].value(COL_SECTOR1).is_none());
        assert!(frame.rows[1].value(COL_TOTAL_SECTOR).is_none());
    }

    #[test]
    fn test_training_restriction() {
        let frame = built_frame(&[("VER", 90.0), ("NOR", 90.5)]);
        let mut lap_times = HashMap::new();
        lap_times.insert("VER".to_string(), 93.0);

        let (restricted, targets) = frame.restrict_to_training(&lap_times).unwrap();
        assert_eq!(restricted.rows.len(), 1);
        assert_eq!(restricted.rows[0].code, "VER");
        assert_eq!(targets, vec![93.0]);
    }

    #[test]
    fn test_training_restriction_empty_is_fatal() {
        let frame = built_frame(&[("VER", 90.0)]);
        let err = frame.restrict_to_training(&HashMap::new()).unwrap_err();
        assert!(matches!(err, PipelineError::NoTrainingOverlap));
    }

    #[test]
    fn test_matrix_skips_undeclared_columns() {
        let mut frame = built_frame(&[("VER", 90.0)]);
        frame.annotate_weather(0.1, 20.0);
        let matrix = frame.to_matrix(&[
            COL_QUALIFYING.to_string(),
            "NotARealFeature".to_string(),
            COL_RAIN.to_string(),
        ]);
        assert_eq!(matrix.names, vec![COL_QUALIFYING, COL_RAIN]);
        assert_eq!(matrix.rows[0], vec![Some(90.0), Some(0.1)]);
    }

    #[test]
    fn test_imputation_median_and_idempotence() {
        let matrix = FeatureMatrix {
            names: vec!["a".to_string(), "b".to_string()],
            rows: vec![
                vec![Some(1.0), None],
                vec![Some(3.0), None],
                vec![None, None],
            ],
        };
        let imputed = matrix.impute_median();
        // Column a: median of {1, 3} = 2; column b fully missing -> 0
        assert_eq!(imputed[2][0], 2.0);
        assert_eq!(imputed[0][1], 0.0);

        // Re-imputing a complete matrix changes nothing
        let complete = FeatureMatrix {
            names: matrix.names.clone(),
            rows: imputed
                .iter()
                .map(|row| row.iter().map(|&v| Some(v)).collect())
                .collect(),
        };
        assert_eq!(complete.impute_median(), imputed);
    }

    #[test]
    fn test_median_even_count() {
        assert_eq!(median(&mut [1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(median(&mut [5.0]), Some(5.0));
        let mut empty: [f64; 0] = [];
        assert_eq!(median(&mut empty), None);
    }

    #[test]
    fn test_custom_features_zero_filled() {
        let mut frame = built_frame(&[("VER", 90.0), ("NOR", 90.5)]);
        let mut points = HashMap::new();
        points.insert("VER".to_string(), 125.0);
        frame.annotate_custom(Some(&points), None);

        assert_eq!(frame.rows[0].value(COL_SEASON_POINTS), Some(125.0));
        assert_eq!(frame.rows[1].value(COL_SEASON_POINTS), Some(0.0));
        assert!(!frame.has_column(COL_POSITION_CHANGE));
    }
}
