//! Synchronous imaging stage
//!
//! Runs frame selection, normalization, composition and (optionally)
//! inference for one study. Input problems abort with an error. Inference
//! problems are recorded on the result and the study continues without
//! findings.

use crate::config::ImagingConfig;
use crate::error::Result;
use crate::frame::FrameSelector;
use crate::inference::{summarize, FindingsSummary, InferenceAdapter, InferenceError};
use crate::intensity::{normalize_with, DisplayImage, IntensityOptions};
use crate::tensor::{InferenceTensor, TensorComposer};
use ndarray::ArrayViewD;
use std::time::Instant;

/// Output of the imaging stage
#[derive(Debug, Clone)]
pub struct PreparedStudy {
    /// Index of the frame used, `None` for single-frame input
    pub frame_index: Option<usize>,
    pub display: DisplayImage,
    pub tensor: InferenceTensor,
    pub findings: Option<FindingsSummary>,
    /// Why inference produced no findings, if it was attempted and failed
    pub inference_error: Option<InferenceError>,
}

impl PreparedStudy {
    /// Findings text for the prompt, `None` when inference did not succeed
    pub fn findings_text(&self) -> Option<String> {
        self.findings.as_ref().map(FindingsSummary::to_text)
    }
}

/// Frame selection → normalization → composition → inference
#[derive(Debug, Clone)]
pub struct ImagingPipeline {
    selector: FrameSelector,
    composer: TensorComposer,
    class_labels: Vec<String>,
}

impl ImagingPipeline {
    pub fn from_config(config: &ImagingConfig) -> Result<Self> {
        Ok(Self {
            selector: FrameSelector::new(config.frame),
            composer: TensorComposer::with_options(
                config.target,
                config.interpolation,
                config.output_range,
            )?,
            class_labels: config.class_labels.clone(),
        })
    }

    pub fn composer(&self) -> &TensorComposer {
        &self.composer
    }

    /// Run the stage on one decoded buffer.
    pub fn prepare(
        &self,
        buffer: ArrayViewD<'_, f32>,
        options: &IntensityOptions,
        adapter: Option<&dyn InferenceAdapter>,
    ) -> Result<PreparedStudy> {
        let frame = self.selector.select(buffer)?;
        let display = normalize_with(&frame, options)?;
        let tensor = self.composer.compose(&display)?;

        let (findings, inference_error) = match adapter {
            Some(adapter) => match self.run_inference(adapter, &tensor) {
                Ok(summary) => (Some(summary), None),
                Err(e) => {
                    tracing::warn!(
                        adapter = adapter.name(),
                        error = %e,
                        "Inference failed, continuing without findings"
                    );
                    (None, Some(e))
                }
            },
            None => (None, None),
        };

        Ok(PreparedStudy {
            frame_index: frame.index(),
            display,
            tensor,
            findings,
            inference_error,
        })
    }

    fn run_inference(
        &self,
        adapter: &dyn InferenceAdapter,
        tensor: &InferenceTensor,
    ) -> std::result::Result<FindingsSummary, InferenceError> {
        let start = Instant::now();
        let output = adapter.infer(tensor)?;
        let summary = summarize(&output, &self.class_labels)?;

        tracing::debug!(
            adapter = adapter.name(),
            output_shape = ?output.shape(),
            classes = summary.classes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Inference complete"
        );

        Ok(summary)
    }
}
