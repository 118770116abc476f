//! Model fitting

pub mod gbdt;
pub mod trainer;

pub use gbdt::{GbdtParams, GradientBoostedRegressor};
pub use trainer::{train_model, TrainedModel};
