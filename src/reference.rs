//! Static reference tables for drivers and teams
//!
//! Pure lookups over season data: driver name to 3-letter code, code to team,
//! per-driver wet-weather factor and clean-air pace, per-team performance
//! score. The tables are carried in an injectable [`ReferenceData`] value so
//! tests and future seasons can substitute their own fixtures; the `Default`
//! impl ships the built-in 2025 grid.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::PipelineError;

/// Wet performance factor applied to drivers without a measured value
pub const DEFAULT_WET_FACTOR: f64 = 0.98;

/// Driver full name -> 3-letter code
const DRIVER_CODES: &[(&str, &str)] = &[
    ("Lando Norris", "NOR"),
    ("Oscar Piastri", "PIA"),
    ("Max Verstappen", "VER"),
    ("George Russell", "RUS"),
    ("Yuki Tsunoda", "TSU"),
    ("Alexander Albon", "ALB"),
    ("Charles Leclerc", "LEC"),
    ("Lewis Hamilton", "HAM"),
    ("Pierre Gasly", "GAS"),
    ("Carlos Sainz", "SAI"),
    ("Carlos Sainz Jr.", "SAI"),
    ("Lance Stroll", "STR"),
    ("Fernando Alonso", "ALO"),
    ("Esteban Ocon", "OCO"),
    ("Nico Hülkenberg", "HUL"),
    ("Isack Hadjar", "HAD"),
    ("Andrea Kimi Antonelli", "ANT"),
    ("Oliver Bearman", "BEA"),
    ("Jack Doohan", "DOO"),
    ("Gabriel Bortoleto", "BOR"),
    ("Liam Lawson", "LAW"),
];

/// Driver code -> team name
const DRIVER_TEAMS: &[(&str, &str)] = &[
    ("VER", "Red Bull"),
    ("NOR", "McLaren"),
    ("PIA", "McLaren"),
    ("LEC", "Ferrari"),
    ("RUS", "Mercedes"),
    ("HAM", "Mercedes"),
    ("GAS", "Alpine"),
    ("ALO", "Aston Martin"),
    ("TSU", "Racing Bulls"),
    ("SAI", "Ferrari"),
    ("HUL", "Kick Sauber"),
    ("OCO", "Alpine"),
    ("STR", "Aston Martin"),
    ("ALB", "Williams"),
    ("BEA", "Ferrari"),
    ("DOO", "Alpine"),
    ("BOR", "Racing Bulls"),
    ("LAW", "Racing Bulls"),
    ("HAD", "Red Bull"),
    ("ANT", "Mercedes"),
];

/// Driver code -> wet performance factor (multiplier applied in rain)
const WET_FACTORS: &[(&str, f64)] = &[
    ("VER", 0.975196),
    ("HAM", 0.976464),
    ("LEC", 0.975862),
    ("NOR", 0.978179),
    ("ALO", 0.972655),
    ("RUS", 0.968678),
    ("SAI", 0.978754),
    ("TSU", 0.996338),
    ("OCO", 0.981810),
    ("GAS", 0.978832),
    ("STR", 0.979857),
    ("PIA", 0.978000),
    ("ALB", 0.980000),
];

/// Driver code -> clean-air race pace in seconds
const CLEAN_AIR_PACE: &[(&str, f64)] = &[
    ("VER", 93.191067),
    ("HAM", 94.020622),
    ("LEC", 93.418667),
    ("NOR", 93.428600),
    ("ALO", 94.784333),
    ("PIA", 93.232111),
    ("RUS", 93.833378),
    ("SAI", 94.497444),
    ("STR", 95.318250),
    ("HUL", 95.345455),
    ("OCO", 95.682128),
    ("GAS", 95.500000),
    ("TSU", 95.400000),
    ("ALB", 95.600000),
];

/// Team name -> normalized performance score (constructors points / max)
const TEAM_SCORES: &[(&str, f64)] = &[
    ("McLaren", 1.0),
    ("Mercedes", 0.527),
    ("Red Bull", 0.470),
    ("Ferrari", 0.409),
    ("Williams", 0.183),
    ("Haas", 0.072),
    ("Aston Martin", 0.050),
    ("Racing Bulls", 0.036),
    ("Alpine", 0.025),
    ("Kick Sauber", 0.022),
];

/// Season reference tables, loaded once and immutable for the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceData {
    pub name_to_code: HashMap<String, String>,
    pub code_to_name: HashMap<String, String>,
    pub code_to_team: HashMap<String, String>,
    pub wet_factors: HashMap<String, f64>,
    pub clean_air_pace: HashMap<String, f64>,
    pub team_scores: HashMap<String, f64>,
}

impl Default for ReferenceData {
    fn default() -> Self {
        let name_to_code: HashMap<String, String> = DRIVER_CODES
            .iter()
            .map(|(name, code)| (name.to_string(), code.to_string()))
            .collect();

        // Reverse mapping; the later of two aliases wins, matching insertion order
        let code_to_name: HashMap<String, String> = DRIVER_CODES
            .iter()
            .map(|(name, code)| (code.to_string(), name.to_string()))
            .collect();

        Self {
            name_to_code,
            code_to_name,
            code_to_team: DRIVER_TEAMS
                .iter()
                .map(|(c, t)| (c.to_string(), t.to_string()))
                .collect(),
            wet_factors: WET_FACTORS
                .iter()
                .map(|(c, f)| (c.to_string(), *f))
                .collect(),
            clean_air_pace: CLEAN_AIR_PACE
                .iter()
                .map(|(c, p)| (c.to_string(), *p))
                .collect(),
            team_scores: TEAM_SCORES
                .iter()
                .map(|(t, s)| (t.to_string(), *s))
                .collect(),
        }
    }
}

impl ReferenceData {
    /// Load season tables from a JSON file, replacing the built-in grid
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Full driver name -> 3-letter code
    pub fn driver_code(&self, name: &str) -> Option<&str> {
        self.name_to_code.get(name).map(String::as_str)
    }

    /// 3-letter code -> full driver name
    pub fn driver_name(&self, code: &str) -> Option<&str> {
        self.code_to_name.get(code).map(String::as_str)
    }

    /// 3-letter code -> team name
    pub fn team_for(&self, code: &str) -> Option<&str> {
        self.code_to_team.get(code).map(String::as_str)
    }

    /// Wet performance factor for a driver, 0.98 when unmeasured
    pub fn wet_factor(&self, code: &str) -> f64 {
        self.wet_factors.get(code).copied().unwrap_or(DEFAULT_WET_FACTOR)
    }

    /// Clean-air race pace in seconds; absent drivers stay missing
    pub fn clean_air_pace(&self, code: &str) -> Option<f64> {
        self.clean_air_pace.get(code).copied()
    }

    /// Normalized team performance score, 0.0 for unknown teams
    pub fn team_score(&self, team: &str) -> f64 {
        self.team_scores.get(team).copied().unwrap_or(0.0)
    }
}
