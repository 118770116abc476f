//! Gridpace - F1 race time prediction
//!
//! This library provides:
//! - Historical session loading (lap and sector times, per-driver averages)
//! - Feature engineering from qualifying, weather, and driver/team tables
//! - Weather-conditioned qualifying time adjustment
//! - Gradient-boosted regression training with held-out MAE
//! - Ranked prediction reports with a validated JSON schema
//!
//! # Example
//!
//! ```no_run
//! use gridpace::config::RaceConfig;
//! use gridpace::reference::ReferenceData;
//! use gridpace::weather::WeatherResolver;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RaceConfig::load("races", "australia")?;
//!     let reference = ReferenceData::default();
//!     let resolver = WeatherResolver::from_env();
//!
//!     let report = gridpace::pipeline::run(
//!         &config,
//!         &reference,
//!         &resolver,
//!         "data/sessions".as_ref(),
//!     )
//!     .await?;
//!     gridpace::report::save_report(&report, "predictions/australia.json")?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod reference;
pub mod report;
pub mod weather;

// Re-export commonly used types
pub use config::{QualifyingEntry, RaceConfig, RaceIdentifier};
pub use data::{FeatureFrame, FeatureMatrix, SessionLaps};
pub use error::PipelineError;
pub use model::{GbdtParams, TrainedModel};
pub use reference::ReferenceData;
pub use report::{PredictionRecord, PredictionReport};
pub use weather::{WeatherObservation, WeatherOutcome, WeatherResolver};
