//! ONNX Runtime segmentation adapter
//!
//! Runs a single-input, single-output segmentation model on the CPU execution
//! provider. Output is expected as `(1, C, H, W)` scores or `(1, 1, H, W)`
//! class ids.

use crate::inference::{InferenceAdapter, InferenceError};
use crate::tensor::InferenceTensor;
use ort::{
    execution_providers::CPUExecutionProvider,
    session::{Session, SessionOutputs},
    value::Tensor,
};
use std::path::Path;
use std::sync::Mutex;

/// Segmentation model backed by an ONNX Runtime session
pub struct OrtSegmentationAdapter {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OrtSegmentationAdapter {
    /// Load a model from disk.
    pub fn from_file(
        model_path: impl AsRef<Path>,
        input_name: impl Into<String>,
        output_name: impl Into<String>,
    ) -> Result<Self, InferenceError> {
        let model_path = model_path.as_ref();
        tracing::info!(path = %model_path.display(), "Loading ONNX segmentation model");

        let session = Session::builder()
            .and_then(|b| b.with_execution_providers([CPUExecutionProvider::default().build()]))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| InferenceError::failed("onnx", format!("failed to load model: {}", e)))?;

        let input_name = input_name.into();
        let output_name = output_name.into();
        let inputs: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        let outputs: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        require_name("input", &input_name, &inputs)?;
        require_name("output", &output_name, &outputs)?;

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

/// Configured tensor names must exist on the loaded model
fn require_name(kind: &str, wanted: &str, available: &[&str]) -> Result<(), InferenceError> {
    if available.contains(&wanted) {
        return Ok(());
    }
    Err(InferenceError::failed(
        "onnx",
        format!("model has no {} named '{}' (available: {:?})", kind, wanted, available),
    ))
}

impl InferenceAdapter for OrtSegmentationAdapter {
    fn infer(&self, tensor: &InferenceTensor) -> Result<InferenceTensor, InferenceError> {
        let input = Tensor::from_array((tensor.shape(), tensor.to_vec()))
            .map_err(|e| InferenceError::failed(self.name(), e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::failed(self.name(), "session mutex poisoned"))?;

        let outputs: SessionOutputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| InferenceError::failed(self.name(), e.to_string()))?;

        let (shape, data) = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| {
                InferenceError::InvalidOutput(format!("model produced no output named '{}'", self.output_name))
            })?
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::failed(self.name(), e.to_string()))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        let shape: [usize; 4] = dims.as_slice().try_into().map_err(|_| {
            InferenceError::InvalidOutput(format!("expected rank-4 output, got {:?}", dims))
        })?;

        tracing::debug!(output_shape = ?shape, "ONNX inference complete");

        InferenceTensor::from_shape_vec(shape, data.to_vec())
            .map_err(|e| InferenceError::InvalidOutput(e.to_string()))
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
