//! Evaluation metrics.
//!
//! Classification metrics compare values for exact equality, so they expect class indices
//! (or any other exactly representable labels) rather than probabilities.

use std::fmt;

use ndarray::ArrayView1;

use crate::error::{Error, Result};

pub const MEAN_SQUARED_ERROR: &str = "mean_squared_error";
pub const MEAN_ABSOLUTE_ERROR: &str = "mean_absolute_error";
pub const R_SQUARED: &str = "r-squared";
pub const ACCURACY: &str = "accuracy";
pub const MACRO_PRECISION: &str = "macro_precision";
pub const MACRO_RECALL: &str = "macro_recall";

pub const REGRESSION_METRICS: &[&str] = &[MEAN_SQUARED_ERROR, MEAN_ABSOLUTE_ERROR, R_SQUARED];
pub const CLASSIFICATION_METRICS: &[&str] = &[ACCURACY, MACRO_PRECISION, MACRO_RECALL];

/// Compares ground truth with predictions and yields a single score.
pub trait Metric: fmt::Debug + Send + Sync {
    /// Factory identifier.
    fn name(&self) -> &'static str;

    fn evaluate(&self, ground_truth: ArrayView1<'_, f64>, prediction: ArrayView1<'_, f64>)
    -> Result<f64>;
}

/// Build a metric from its identifier.
pub fn get_metric(name: &str) -> Result<Box<dyn Metric>> {
    let metric: Box<dyn Metric> = match name {
        MEAN_SQUARED_ERROR => Box::new(MeanSquaredError),
        MEAN_ABSOLUTE_ERROR => Box::new(MeanAbsoluteError),
        R_SQUARED => Box::new(RSquared),
        ACCURACY => Box::new(Accuracy),
        MACRO_PRECISION => Box::new(MacroPrecision),
        MACRO_RECALL => Box::new(MacroRecall),
        other => return Err(Error::UnknownName(format!("metric {other}"))),
    };
    Ok(metric)
}

fn check_lengths(ground_truth: ArrayView1<'_, f64>, prediction: ArrayView1<'_, f64>) -> Result<()> {
    if ground_truth.is_empty() {
        return Err(Error::invalid_argument("cannot evaluate a metric on empty input"));
    }
    if ground_truth.len() != prediction.len() {
        return Err(Error::invalid_argument(format!(
            "ground truth has {} values but prediction has {}",
            ground_truth.len(),
            prediction.len()
        )));
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn mean_of(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    values.sum::<f64>() / n as f64
}

/// Distinct values in ascending order.
fn distinct_classes(values: ArrayView1<'_, f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = values.to_vec();
    classes.sort_by(f64::total_cmp);
    classes.dedup();
    classes
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

impl Metric for MeanSquaredError {
    fn name(&self) -> &'static str {
        MEAN_SQUARED_ERROR
    }

    fn evaluate(&self, ground_truth: ArrayView1<'_, f64>, prediction: ArrayView1<'_, f64>) -> Result<f64> {
        check_lengths(ground_truth, prediction)?;
        let errors = ground_truth.iter().zip(prediction.iter()).map(|(y, p)| (y - p).powi(2));
        Ok(mean_of(errors, ground_truth.len()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAbsoluteError;

impl Metric for MeanAbsoluteError {
    fn name(&self) -> &'static str {
        MEAN_ABSOLUTE_ERROR
    }

    fn evaluate(&self, ground_truth: ArrayView1<'_, f64>, prediction: ArrayView1<'_, f64>) -> Result<f64> {
        check_lengths(ground_truth, prediction)?;
        let errors = ground_truth.iter().zip(prediction.iter()).map(|(y, p)| (y - p).abs());
        Ok(mean_of(errors, ground_truth.len()))
    }
}

/// Coefficient of determination.
///
/// A constant ground truth scores 1.0 when predicted exactly and 0.0 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct RSquared;

impl Metric for RSquared {
    fn name(&self) -> &'static str {
        R_SQUARED
    }

    fn evaluate(&self, ground_truth: ArrayView1<'_, f64>, prediction: ArrayView1<'_, f64>) -> Result<f64> {
        check_lengths(ground_truth, prediction)?;
        let mean = mean_of(ground_truth.iter().copied(), ground_truth.len());
        let ss_res: f64 = ground_truth
            .iter()
            .zip(prediction.iter())
            .map(|(y, p)| (y - p).powi(2))
            .sum();
        let ss_tot: f64 = ground_truth.iter().map(|y| (y - mean).powi(2)).sum();

        if ss_tot == 0.0 {
            return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
        }
        Ok(1.0 - ss_res / ss_tot)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl Metric for Accuracy {
    fn name(&self) -> &'static str {
        ACCURACY
    }

    fn evaluate(&self, ground_truth: ArrayView1<'_, f64>, prediction: ArrayView1<'_, f64>) -> Result<f64> {
        check_lengths(ground_truth, prediction)?;
        let hits = ground_truth
            .iter()
            .zip(prediction.iter())
            .map(|(y, p)| if y == p { 1.0 } else { 0.0 });
        Ok(mean_of(hits, ground_truth.len()))
    }
}

/// Per-class true positives, predicted positives and actual positives.
fn class_counts(
    ground_truth: ArrayView1<'_, f64>,
    prediction: ArrayView1<'_, f64>,
    class: f64,
) -> (usize, usize, usize) {
    let mut tp = 0;
    let mut predicted = 0;
    let mut actual = 0;
    for (y, p) in ground_truth.iter().zip(prediction.iter()) {
        let is_actual = *y == class;
        let is_predicted = *p == class;
        if is_actual {
            actual += 1;
        }
        if is_predicted {
            predicted += 1;
        }
        if is_actual && is_predicted {
            tp += 1;
        }
    }
    (tp, predicted, actual)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Unweighted mean of per-class precision over the classes present in the ground truth.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroPrecision;

impl Metric for MacroPrecision {
    fn name(&self) -> &'static str {
        MACRO_PRECISION
    }

    fn evaluate(&self, ground_truth: ArrayView1<'_, f64>, prediction: ArrayView1<'_, f64>) -> Result<f64> {
        check_lengths(ground_truth, prediction)?;
        let classes = distinct_classes(ground_truth);
        let per_class = classes.iter().map(|&class| {
            let (tp, predicted, _) = class_counts(ground_truth, prediction, class);
            ratio(tp, predicted)
        });
        Ok(mean_of(per_class, classes.len()))
    }
}

/// Unweighted mean of per-class recall over the classes present in the ground truth.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacroRecall;

impl Metric for MacroRecall {
    fn name(&self) -> &'static str {
        MACRO_RECALL
    }

    fn evaluate(&self, ground_truth: ArrayView1<'_, f64>, prediction: ArrayView1<'_, f64>) -> Result<f64> {
        check_lengths(ground_truth, prediction)?;
        let classes = distinct_classes(ground_truth);
        let per_class = classes.iter().map(|&class| {
            let (tp, _, actual) = class_counts(ground_truth, prediction, class);
            ratio(tp, actual)
        });
        Ok(mean_of(per_class, classes.len()))
    }
}
