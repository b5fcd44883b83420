//! Inference seam
//!
//! The model is an external collaborator: a tensor goes in, a tensor or an
//! error comes out. Failures here are advisory. Callers drop to "no findings"
//! instead of aborting the study.

use crate::tensor::InferenceTensor;
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors returned by an inference adapter
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    /// The adapter could not run the model
    #[error("Inference failed in '{adapter}': {message}")]
    Failed {
        /// Adapter name
        adapter: String,
        /// Failure detail
        message: String,
    },

    /// The model produced something that cannot be summarized
    #[error("Invalid inference output: {0}")]
    InvalidOutput(String),
}

impl InferenceError {
    pub fn failed(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            adapter: adapter.into(),
            message: message.into(),
        }
    }
}

/// Tensor-in, tensor-out model call
///
/// Implementations may block (GPU, remote runtime). They must be safe to
/// share across worker threads.
pub trait InferenceAdapter: Send + Sync {
    /// Run the model on a `(1, 1, H, W)` tensor
    fn infer(&self, tensor: &InferenceTensor) -> Result<InferenceTensor, InferenceError>;

    /// Adapter name (for logging)
    fn name(&self) -> &str;
}

/// Intensity threshold segmenter
///
/// Stand-in model for offline runs: marks every pixel at or above `threshold`
/// as class 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSegmenter {
    threshold: f32,
}

impl ThresholdSegmenter {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for ThresholdSegmenter {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl InferenceAdapter for ThresholdSegmenter {
    fn infer(&self, tensor: &InferenceTensor) -> Result<InferenceTensor, InferenceError> {
        if !self.threshold.is_finite() {
            return Err(InferenceError::failed(self.name(), "threshold is not finite"));
        }
        let threshold = self.threshold;
        let mask = tensor
            .view()
            .mapv(|v| if v >= threshold { 1.0 } else { 0.0 });
        InferenceTensor::from_array(mask).map_err(|e| InferenceError::failed(self.name(), e.to_string()))
    }

    fn name(&self) -> &str {
        "threshold"
    }
}

/// Pixel coverage of one detected class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassCoverage {
    pub class_id: usize,
    pub label: String,
    pub pixels: usize,
    /// Fraction of all pixels, 0-1
    pub fraction: f64,
}

/// Compact description of an inference result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingsSummary {
    /// Foreground classes, ordered by class id
    pub classes: Vec<ClassCoverage>,
    pub total_pixels: usize,
}

impl FindingsSummary {
    pub fn has_findings(&self) -> bool {
        !self.classes.is_empty()
    }

    /// One-line text for the prompt
    pub fn to_text(&self) -> String {
        if self.classes.is_empty() {
            return "No foreground regions detected.".to_string();
        }
        self.classes
            .iter()
            .map(|c| format!("{} covers {:.1}% of the image", c.label, c.fraction * 100.0))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Largest class id accepted from a single-channel class map
pub const MAX_CLASS_ID: usize = 65_535;

/// Summarize a class map.
///
/// Single-channel output is read as class ids (rounded). Multi-channel output
/// is read as per-class scores and reduced with argmax. Class 0 is background.
/// `labels[i]` names class `i`; missing labels fall back to `class <i>`.
pub fn summarize(result: &InferenceTensor, labels: &[String]) -> Result<FindingsSummary, InferenceError> {
    let [_, channels, height, width] = result.shape();
    let total_pixels = height * width;
    if channels == 0 || total_pixels == 0 {
        return Err(InferenceError::InvalidOutput(format!(
            "empty output tensor {:?}",
            result.shape()
        )));
    }

    let view = result.view();
    let batch = view.index_axis(Axis(0), 0);
    if let Some(bad) = batch.iter().find(|v| !v.is_finite()) {
        return Err(InferenceError::InvalidOutput(format!(
            "non-finite value {} in output",
            bad
        )));
    }

    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    let mut bump = |class: usize| *counts.entry(class).or_insert(0) += 1;

    if channels == 1 {
        for &v in batch.index_axis(Axis(0), 0).iter() {
            let class = v.round();
            if class < 0.0 || class > MAX_CLASS_ID as f32 {
                return Err(InferenceError::InvalidOutput(format!(
                    "class id {} outside 0..={}",
                    v, MAX_CLASS_ID
                )));
            }
            bump(class as usize);
        }
    } else {
        for h in 0..height {
            for w in 0..width {
                let mut best = 0;
                let mut best_score = f32::NEG_INFINITY;
                for c in 0..channels {
                    let score = batch[[c, h, w]];
                    if score > best_score {
                        best = c;
                        best_score = score;
                    }
                }
                bump(best);
            }
        }
    }

    let classes = counts
        .into_iter()
        .filter(|&(class_id, _)| class_id > 0)
        .map(|(class_id, pixels)| ClassCoverage {
            class_id,
            label: labels
                .get(class_id)
                .cloned()
                .unwrap_or_else(|| format!("class {}", class_id)),
            pixels,
            fraction: pixels as f64 / total_pixels as f64,
        })
        .collect();

    Ok(FindingsSummary {
        classes,
        total_pixels,
    })
}
