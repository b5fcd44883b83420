//! Imaging stage configuration

use crate::frame::FramePolicy;
use crate::tensor::{Interpolation, OutputRange, TargetSize};
use serde::{Deserialize, Serialize};

/// Settings for frame selection, tensor composition and findings labelling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagingConfig {
    /// Which frame of a stack to use
    #[serde(default)]
    pub frame: FramePolicy,

    /// Spatial size of the inference tensor
    #[serde(default)]
    pub target: TargetSize,

    /// Resize policy for the inference tensor
    #[serde(default)]
    pub interpolation: Interpolation,

    /// Intensity range expected by the model
    #[serde(default)]
    pub output_range: OutputRange,

    /// Class names indexed by class id; index 0 is background
    #[serde(default = "default_class_labels")]
    pub class_labels: Vec<String>,

    /// Attach a base64 PNG of the display image to reports
    #[serde(default = "default_include_preview")]
    pub include_preview: bool,
}

fn default_class_labels() -> Vec<String> {
    vec!["background".to_string(), "abnormal region".to_string()]
}

fn default_include_preview() -> bool {
    true
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            frame: FramePolicy::default(),
            target: TargetSize::default(),
            interpolation: Interpolation::default(),
            output_range: OutputRange::default(),
            class_labels: default_class_labels(),
            include_preview: default_include_preview(),
        }
    }
}
