//! Session data loading and feature engineering

pub mod features;
pub mod session;

pub use features::{FeatureFrame, FeatureMatrix};
pub use session::{DriverSectorAverages, LapRecord, SessionLaps};
