//! Error types for medprompt-core

use thiserror::Error;

/// Result type alias for medprompt-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Precondition failures raised by the imaging and prompt stages.
///
/// Every variant here means the input itself is unusable. Callers should
/// report it rather than fall back to a default image or tensor.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Frame has a zero dimension
    #[error("Empty input: frame is {rows}x{cols}")]
    EmptyInput {
        /// Number of rows in the offending frame
        rows: usize,
        /// Number of columns in the offending frame
        cols: usize,
    },

    /// Frame contains NaN or infinite samples
    #[error("Invalid sample data: non-finite value at row {row}, col {col}")]
    InvalidSampleData {
        /// Row of the first non-finite sample
        row: usize,
        /// Column of the first non-finite sample
        col: usize,
    },

    /// Requested frame does not exist in the stack
    #[error("Frame index {index} out of range for {frames} frame(s)")]
    IndexOutOfRange {
        /// Requested frame index
        index: usize,
        /// Number of frames available
        frames: usize,
    },

    /// Array shape differs from what the stage contract requires
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Shape the stage requires
        expected: String,
        /// Shape actually observed
        actual: String,
    },

    /// Window center/width cannot define a value range
    #[error("Invalid window: center={center}, width={width}")]
    InvalidWindow {
        /// Window center
        center: f64,
        /// Window width
        width: f64,
    },

    /// Invalid stage configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Preview encoding failed
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl Error {
    /// Build a shape mismatch from two shape slices
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}
