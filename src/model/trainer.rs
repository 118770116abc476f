//! Model training
//!
//! Imputes the feature matrix, holds out a seeded test split, fits the
//! boosted regressor, and reports mean absolute error on the held-out rows.
//! The returned model carries the exact ordered feature-name list it was
//! trained on; prediction must present columns in this order.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::features::FeatureMatrix;
use crate::error::PipelineError;
use crate::model::gbdt::{GbdtParams, GradientBoostedRegressor};

/// Fraction of rows held out for error measurement
pub const TEST_SIZE: f64 = 0.2;

/// Fitted model plus the feature ordering that is part of its identity
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub regressor: GradientBoostedRegressor,
    pub feature_names: Vec<String>,
    /// Mean absolute error in seconds on the held-out split
    pub mae: f64,
}

/// Train on a feature matrix and aligned target vector
pub fn train_model(
    matrix: &FeatureMatrix,
    targets: &[f64],
    params: &GbdtParams,
) -> Result<TrainedModel, PipelineError> {
    let x = matrix.impute_median();
    let n = x.len();
    if n < 2 || targets.len() != n {
        return Err(PipelineError::InsufficientTrainingData(n));
    }

    // Reproducible shuffle split
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(params.random_state);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64 * TEST_SIZE).ceil() as usize).clamp(1, n - 1);
    let (test_idx, train_idx) = indices.split_at(n_test);

    let train_x: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
    let train_y: Vec<f64> = train_idx.iter().map(|&i| targets[i]).collect();
    let regressor = GradientBoostedRegressor::fit(&train_x, &train_y, params);

    let mae = test_idx
        .iter()
        .map(|&i| (regressor.predict_row(&x[i]) - targets[i]).abs())
        .sum::<f64>()
        / n_test as f64;

    Ok(TrainedModel {
        regressor,
        feature_names: matrix.names.clone(),
        mae,
    })
}
