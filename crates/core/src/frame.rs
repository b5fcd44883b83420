//! Frame selection
//!
//! Picks a single 2D slice out of a decoded pixel buffer. Frame stacks are
//! laid out `(frames, rows, cols)`; a plain 2D buffer counts as one frame.
//! Nothing here looks at pixel values.

use crate::error::{Error, Result};
use ndarray::{ArrayView2, ArrayViewD, Axis, Ix2};
use serde::{Deserialize, Serialize};

/// A borrowed 2D grayscale frame
#[derive(Debug, Clone)]
pub struct RawFrame<'a> {
    pixels: ArrayView2<'a, f32>,
    index: Option<usize>,
}

impl<'a> RawFrame<'a> {
    /// Wrap a 2D view that did not come from a frame stack
    pub fn new(pixels: ArrayView2<'a, f32>) -> Self {
        Self {
            pixels,
            index: None,
        }
    }

    /// Sample view, `(rows, cols)`
    pub fn pixels(&self) -> &ArrayView2<'a, f32> {
        &self.pixels
    }

    /// Position in the source stack, `None` for single-frame buffers
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    /// Fail with `EmptyInput` or `InvalidSampleData` if the frame cannot be
    /// normalized.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyInput {
                rows: self.height(),
                cols: self.width(),
            });
        }

        if let Some(((row, col), _)) = self.pixels.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::InvalidSampleData { row, col });
        }

        Ok(())
    }

    /// Observed `(min, max)` over all samples. Assumes `validate` passed.
    pub fn min_max(&self) -> (f64, f64) {
        self.pixels
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                let v = v as f64;
                (lo.min(v), hi.max(v))
            })
    }
}

/// How the frame index is chosen when the caller does not pass one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FramePolicy {
    /// Always the first frame
    #[default]
    First,
    /// `frames / 2`, the representative slice for a stack
    Middle,
    /// A fixed index
    Index(usize),
}

impl FramePolicy {
    /// Resolve the policy against a buffer's frame count
    pub fn resolve(&self, buffer: &ArrayViewD<'_, f32>) -> usize {
        match self {
            FramePolicy::First => 0,
            FramePolicy::Middle => frame_count(buffer) / 2,
            FramePolicy::Index(index) => *index,
        }
    }
}

/// Number of frames in a buffer: leading axis for stacks, 1 for a 2D image
pub fn frame_count(buffer: &ArrayViewD<'_, f32>) -> usize {
    if buffer.ndim() > 2 {
        buffer.len_of(Axis(0))
    } else {
        1
    }
}

/// Select the frame at `requested_index`.
///
/// A 2D buffer is returned as-is for index 0. Any index at or past the frame
/// count is `IndexOutOfRange`; callers that want clamping must clamp first.
pub fn select_frame<'a>(buffer: ArrayViewD<'a, f32>, requested_index: usize) -> Result<RawFrame<'a>> {
    let shape = buffer.shape().to_vec();

    match buffer.ndim() {
        0 | 1 => Err(Error::ShapeMismatch {
            expected: "[rows, cols] or [frames, rows, cols]".to_string(),
            actual: format!("{:?}", shape),
        }),
        2 => {
            if requested_index != 0 {
                return Err(Error::IndexOutOfRange {
                    index: requested_index,
                    frames: 1,
                });
            }
            let pixels = buffer
                .into_dimensionality::<Ix2>()
                .map_err(|_| Error::shape_mismatch(&[0, 0], &shape))?;
            Ok(RawFrame::new(pixels))
        }
        _ => {
            let frames = shape[0];
            if requested_index >= frames {
                return Err(Error::IndexOutOfRange {
                    index: requested_index,
                    frames,
                });
            }

            let slice = buffer.index_axis_move(Axis(0), requested_index);
            if slice.ndim() != 2 {
                return Err(Error::ShapeMismatch {
                    expected: "[frames, rows, cols]".to_string(),
                    actual: format!("{:?}", shape),
                });
            }
            let pixels = slice
                .into_dimensionality::<Ix2>()
                .map_err(|_| Error::shape_mismatch(&[0, 0], &shape))?;

            tracing::debug!(
                frame = requested_index,
                frames,
                rows = pixels.nrows(),
                cols = pixels.ncols(),
                "Selected frame from stack"
            );

            Ok(RawFrame {
                pixels,
                index: Some(requested_index),
            })
        }
    }
}

/// Frame selector bound to a configured policy
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSelector {
    policy: FramePolicy,
}

impl FrameSelector {
    pub fn new(policy: FramePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> FramePolicy {
        self.policy
    }

    /// Select the frame the policy names
    pub fn select<'a>(&self, buffer: ArrayViewD<'a, f32>) -> Result<RawFrame<'a>> {
        let index = self.policy.resolve(&buffer);
        select_frame(buffer, index)
    }
}
