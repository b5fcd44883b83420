//! MedPrompt Core - image normalization and prompt building
//!
//! This crate turns a decoded medical image into the three things the rest of
//! the system needs:
//!
//! - an 8-bit display image (`DisplayImage`) for previews
//! - an NCHW inference tensor (`InferenceTensor`) for a segmentation model
//! - a `ClinicalPrompt` for a text-generation backend
//!
//! # Stages
//!
//! ```text
//! pixel buffer ─► FrameSelector ─► IntensityNormalizer ─┬─► DisplayImage
//!                                                       └─► TensorComposer ─► InferenceAdapter
//!                                                                              │
//! ScanAttributes ───────────────────────────────────────► PromptBuilder ◄─────┘ (findings)
//! ```
//!
//! Every stage is synchronous and pure given its inputs. File decoding, the
//! model itself and the text backend are external collaborators.
//!
//! # Example
//!
//! ```ignore
//! use medprompt_core::{ImagingConfig, ImagingPipeline, IntensityOptions, PromptBuilder, ScanAttributes};
//!
//! let pipeline = ImagingPipeline::from_config(&ImagingConfig::default())?;
//! let prepared = pipeline.prepare(pixels.view(), &IntensityOptions::default(), None)?;
//! let prompt = PromptBuilder::new().build(&attributes, prepared.findings_text().as_deref());
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod frame;
pub mod inference;
pub mod intensity;
pub mod pipeline;
pub mod prompt;
pub mod tensor;

#[cfg(feature = "onnx")]
pub mod onnx;

mod error;
pub use error::{Error, Result};

pub use config::ImagingConfig;
pub use frame::{frame_count, select_frame, FramePolicy, FrameSelector, RawFrame};
pub use inference::{
    summarize, ClassCoverage, FindingsSummary, InferenceAdapter, InferenceError, ThresholdSegmenter,
    MAX_CLASS_ID,
};
pub use intensity::{
    normalize, normalize_with, DisplayImage, IntensityNormalizer, IntensityOptions, ModalityRescale,
    PhotometricConvention, WindowParameters,
};
pub use pipeline::{ImagingPipeline, PreparedStudy};
pub use prompt::{ClinicalPrompt, PromptBuilder, PromptRole, PromptSegment, ScanAttributes, NO_FINDINGS};
pub use tensor::{ComposeInput, InferenceTensor, Interpolation, OutputRange, TargetSize, TensorComposer};

#[cfg(feature = "onnx")]
pub use onnx::OrtSegmentationAdapter;

/// Initialize logging
///
/// Installs a `tracing` fmt subscriber filtered by `RUST_LOG` (default
/// `info`). Call once at startup; later calls return an error.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| Error::Configuration(format!("logging already initialized: {}", e)))?;

    tracing::info!("MedPrompt core initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        // Should not panic, even if another test installed a subscriber
        init().ok();
    }
}
