//! Historical session loading
//!
//! Reads a race session's lap and sector times from the local session store
//! (`{data_dir}/{year}_{slug}_{kind}.csv`), converts durations to seconds, and
//! derives the per-driver aggregates the feature builder and trainer consume.
//! Any failure to read or parse the file is fatal to the run; unlike weather
//! there is no synthetic fallback for training data.

use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::config::RaceIdentifier;
use crate::error::PipelineError;

const COL_DRIVER: &str = "Driver";
const COL_LAP: &str = "LapTime";
const COL_SECTOR1: &str = "Sector1Time";
const COL_SECTOR2: &str = "Sector2Time";
const COL_SECTOR3: &str = "Sector3Time";

/// One completed lap with all durations in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct LapRecord {
    pub driver: String,
    pub lap_time: f64,
    pub sector1: f64,
    pub sector2: f64,
    pub sector3: f64,
}

/// Per-driver mean sector times over a session
#[derive(Debug, Clone)]
pub struct DriverSectorAverages {
    pub driver: String,
    pub sector1: f64,
    pub sector2: f64,
    pub sector3: f64,
    /// Sum of the three sector means; only meaningful when all sectors exist,
    /// which the loader guarantees by dropping incomplete laps
    pub total: f64,
}

/// De-duplicated table of completed laps for one session
#[derive(Debug, Clone)]
pub struct SessionLaps {
    laps: Vec<LapRecord>,
}

impl SessionLaps {
    /// Load a session from the local store
    pub fn load<P: AsRef<Path>>(
        data_dir: P,
        year: i32,
        identifier: &RaceIdentifier,
        kind: &str,
    ) -> Result<Self, PipelineError> {
        let path = data_dir
            .as_ref()
            .join(format!("{}_{}_{}.csv", year, identifier.slug(), kind));
        if !path.exists() {
            return Err(PipelineError::SessionNotFound(path));
        }

        let df = CsvReadOptions::default()
            .try_into_reader_with_file_path(Some(path))?
            .finish()?;

        let drivers = driver_column(&df)?;
        let laps = seconds_column(&df, COL_LAP)?;
        let sector1 = seconds_column(&df, COL_SECTOR1)?;
        let sector2 = seconds_column(&df, COL_SECTOR2)?;
        let sector3 = seconds_column(&df, COL_SECTOR3)?;

        let mut records = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            if let (Some(driver), Some(lap), Some(s1), Some(s2), Some(s3)) =
                (&drivers[i], laps[i], sector1[i], sector2[i], sector3[i])
            {
                records.push(LapRecord {
                    driver: driver.clone(),
                    lap_time: lap,
                    sector1: s1,
                    sector2: s2,
                    sector3: s3,
                });
            }
        }

        Ok(Self::from_records(records))
    }

    /// Build a session table directly, dropping exact duplicate laps
    pub fn from_records(records: Vec<LapRecord>) -> Self {
        let mut seen: HashSet<(String, u64, u64, u64, u64)> = HashSet::new();
        let mut laps = Vec::with_capacity(records.len());
        for record in records {
            let key = (
                record.driver.clone(),
                record.lap_time.to_bits(),
                record.sector1.to_bits(),
                record.sector2.to_bits(),
                record.sector3.to_bits(),
            );
            if seen.insert(key) {
                laps.push(record);
            }
        }
        Self { laps }
    }

    pub fn len(&self) -> usize {
        self.laps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.laps.is_empty()
    }

    /// Mean sector times per driver, plus their sum as the total sector time
    pub fn average_sector_times(&self) -> Vec<DriverSectorAverages> {
        let mut sums: HashMap<String, (f64, f64, f64, usize)> = HashMap::new();
        for lap in &self.laps {
            let entry = sums.entry(lap.driver.clone()).or_insert((0.0, 0.0, 0.0, 0));
            entry.0 += lap.sector1;
            entry.1 += lap.sector2;
            entry.2 += lap.sector3;
            entry.3 += 1;
        }

        let mut averages: Vec<DriverSectorAverages> = sums
            .into_iter()
            .map(|(driver, (s1, s2, s3, n))| {
                let n = n as f64;
                let (s1, s2, s3) = (s1 / n, s2 / n, s3 / n);
                DriverSectorAverages {
                    driver,
                    sector1: s1,
                    sector2: s2,
                    sector3: s3,
                    total: s1 + s2 + s3,
                }
            })
            .collect();
        averages.sort_by(|a, b| a.driver.cmp(&b.driver));
        averages
    }

    /// Mean lap time per driver; the regression target for training
    pub fn average_lap_times(&self) -> HashMap<String, f64> {
        let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
        for lap in &self.laps {
            let entry = sums.entry(lap.driver.clone()).or_insert((0.0, 0));
            entry.0 += lap.lap_time;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(driver, (sum, n))| (driver, sum / n as f64))
            .collect()
    }
}

fn driver_column(df: &DataFrame) -> Result<Vec<Option<String>>, PipelineError> {
    let series = df
        .column(COL_DRIVER)
        .map_err(|_| PipelineError::MissingColumn(COL_DRIVER.to_string()))?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Read a duration column as seconds, whatever the stored representation
fn seconds_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, PipelineError> {
    let series = df
        .column(name)
        .map_err(|_| PipelineError::MissingColumn(name.to_string()))?;

    match series.dtype() {
        DataType::String => Ok(series
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_duration_secs))
            .collect()),
        _ => {
            let casted = series.cast(&DataType::Float64)?;
            Ok(casted.f64()?.into_iter().collect())
        }
    }
}

/// Parse a duration string into seconds
///
/// Accepts plain seconds ("93.458"), clock form ("1:33.458", "0:01:33.458"),
/// and pandas timedelta form ("0 days 00:01:33.458000"). Negative or malformed
/// values yield `None` so the row is dropped.
pub fn parse_duration_secs(raw: &str) -> Option<f64> {
    let mut text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let mut days = 0.0;
    if let Some((day_part, rest)) = text.split_once(" days ") {
        days = day_part.trim().parse::<f64>().ok()?;
        text = rest.trim();
    } else if let Some((day_part, rest)) = text.split_once(" day ") {
        days = day_part.trim().parse::<f64>().ok()?;
        text = rest.trim();
    }

    let parts: Vec<&str> = text.split(':').collect();
    let seconds = match parts.as_slice() {
        [secs] => secs.parse::<f64>().ok()?,
        [mins, secs] => {
            let m = mins.parse::<f64>().ok()?;
            let s = secs.parse::<f64>().ok()?;
            m * 60.0 + s
        }
        [hours, mins, secs] => {
            let h = hours.parse::<f64>().ok()?;
            let m = mins.parse::<f64>().ok()?;
            let s = secs.parse::<f64>().ok()?;
            h * 3600.0 + m * 60.0 + s
        }
        _ => return None,
    };

    let total = days * 86400.0 + seconds;
    if total.is_finite() && total >= 0.0 {
        Some(total)
    } else {
        None
    }
}
