//! Tensor composition for the inference step
//!
//! Converts a display image or raw frame into an NCHW `f32` tensor. The order
//! is fixed: channel axis first, then spatial resize, then intensity rescale,
//! then the batch axis. The result is checked against `(1, 1, H', W')` before
//! it is returned.

use crate::error::{Error, Result};
use crate::frame::RawFrame;
use crate::intensity::DisplayImage;
use ndarray::{Array2, Array3, Array4, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Default spatial size of the composed tensor
pub const DEFAULT_TARGET_SIZE: TargetSize = TargetSize {
    height: 256,
    width: 256,
};

/// Output spatial dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub height: usize,
    pub width: usize,
}

impl TargetSize {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }
}

impl Default for TargetSize {
    fn default() -> Self {
        DEFAULT_TARGET_SIZE
    }
}

/// Resize policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Nearest source pixel by centre
    Nearest,
    /// Bilinear with half-pixel centres, edge-clamped
    #[default]
    Bilinear,
}

/// Numeric range the inference step expects
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputRange {
    pub min: f32,
    pub max: f32,
}

impl Default for OutputRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// Batched NCHW tensor with batch size 1
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceTensor {
    data: Array4<f32>,
}

impl InferenceTensor {
    /// Wrap an array, requiring batch size 1
    pub fn from_array(data: Array4<f32>) -> Result<Self> {
        if data.len_of(Axis(0)) != 1 {
            return Err(Error::ShapeMismatch {
                expected: "[1, C, H, W]".to_string(),
                actual: format!("{:?}", data.shape()),
            });
        }
        Ok(Self { data })
    }

    /// Build from a flat NCHW vector
    pub fn from_shape_vec(shape: [usize; 4], values: Vec<f32>) -> Result<Self> {
        let len = values.len();
        let data = Array4::from_shape_vec(shape, values)
            .map_err(|_| Error::shape_mismatch(&shape, &[len]))?;
        Self::from_array(data)
    }

    /// `[N, C, H, W]`
    pub fn shape(&self) -> [usize; 4] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3]]
    }

    pub fn channels(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn view(&self) -> ndarray::ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }

    /// Flat row-major values, cloned
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

/// Input accepted by the composer
#[derive(Debug, Clone, Copy)]
pub enum ComposeInput<'a> {
    /// 8-bit display image, rescaled by `v / 255`
    Display(&'a DisplayImage),
    /// Raw frame, min-max scaled
    Raw(&'a RawFrame<'a>),
}

impl<'a> From<&'a DisplayImage> for ComposeInput<'a> {
    fn from(image: &'a DisplayImage) -> Self {
        ComposeInput::Display(image)
    }
}

impl<'a> From<&'a RawFrame<'a>> for ComposeInput<'a> {
    fn from(frame: &'a RawFrame<'a>) -> Self {
        ComposeInput::Raw(frame)
    }
}

/// Builds inference tensors of a fixed size
#[derive(Debug, Clone, Copy)]
pub struct TensorComposer {
    target: TargetSize,
    interpolation: Interpolation,
    range: OutputRange,
}

impl Default for TensorComposer {
    fn default() -> Self {
        Self {
            target: TargetSize::default(),
            interpolation: Interpolation::default(),
            range: OutputRange::default(),
        }
    }
}

impl TensorComposer {
    /// Composer for `target`, bilinear, output in `[0, 1]`
    pub fn new(target: TargetSize) -> Result<Self> {
        Self::with_options(target, Interpolation::default(), OutputRange::default())
    }

    pub fn with_options(
        target: TargetSize,
        interpolation: Interpolation,
        range: OutputRange,
    ) -> Result<Self> {
        if target.height == 0 || target.width == 0 {
            return Err(Error::Configuration(format!(
                "Target size must be non-zero, got {}x{}",
                target.height, target.width
            )));
        }
        if !range.min.is_finite() || !range.max.is_finite() || range.min >= range.max {
            return Err(Error::Configuration(format!(
                "Output range must satisfy min < max, got [{}, {}]",
                range.min, range.max
            )));
        }

        Ok(Self {
            target,
            interpolation,
            range,
        })
    }

    pub fn target(&self) -> TargetSize {
        self.target
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Compose `(1, 1, H', W')` from a display image or raw frame
    pub fn compose<'a>(&self, input: impl Into<ComposeInput<'a>>) -> Result<InferenceTensor> {
        let input = input.into();

        // (a) channel axis
        let (plane, low, high) = match input {
            ComposeInput::Display(image) => {
                if image.width() == 0 || image.height() == 0 {
                    return Err(Error::EmptyInput {
                        rows: image.height(),
                        cols: image.width(),
                    });
                }
                let plane = Array2::from_shape_vec(
                    (image.height(), image.width()),
                    image.as_bytes().iter().map(|&v| v as f32).collect(),
                )
                .map_err(|_| {
                    Error::shape_mismatch(&[image.height(), image.width()], &[image.as_bytes().len()])
                })?;
                (plane, 0.0f32, 255.0f32)
            }
            ComposeInput::Raw(frame) => {
                frame.validate()?;
                // Min/max to [0, 1] in f64 before resizing
                let (low, high) = frame.min_max();
                let span = high - low;
                let plane = if span > 0.0 && span.is_finite() {
                    frame.pixels().mapv(|v| ((v as f64 - low) / span) as f32)
                } else {
                    Array2::zeros((frame.height(), frame.width()))
                };
                (plane, 0.0f32, 1.0f32)
            }
        };
        let channeled: Array3<f32> = plane.insert_axis(Axis(0));

        // (b) spatial resize, per channel
        let mut resized = Array3::<f32>::zeros((
            channeled.len_of(Axis(0)),
            self.target.height,
            self.target.width,
        ));
        for (src, mut dst) in channeled.outer_iter().zip(resized.outer_iter_mut()) {
            dst.assign(&resize_plane(src, self.target, self.interpolation));
        }

        // (c) intensity rescale
        let (low, span) = (low as f64, (high - low) as f64);
        let out_span = self.range.max as f64 - self.range.min as f64;
        let out_min = self.range.min as f64;
        resized.mapv_inplace(|v| {
            let unit = ((v as f64 - low) / span).clamp(0.0, 1.0);
            (out_min + unit * out_span) as f32
        });

        // (d) batch axis
        let batched: Array4<f32> = resized.insert_axis(Axis(0));

        let expected = [1, 1, self.target.height, self.target.width];
        if batched.ndim() != 4 || batched.shape() != expected {
            return Err(Error::shape_mismatch(&expected, batched.shape()));
        }

        tracing::debug!(
            shape = ?expected,
            interpolation = ?self.interpolation,
            "Composed inference tensor"
        );

        InferenceTensor::from_array(batched)
    }
}

fn resize_plane(src: ArrayView2<'_, f32>, target: TargetSize, interpolation: Interpolation) -> Array2<f32> {
    let (src_h, src_w) = src.dim();
    if (src_h, src_w) == (target.height, target.width) {
        return src.to_owned();
    }

    let scale_h = src_h as f32 / target.height as f32;
    let scale_w = src_w as f32 / target.width as f32;

    match interpolation {
        Interpolation::Nearest => Array2::from_shape_fn((target.height, target.width), |(h, w)| {
            let sh = (((h as f32 + 0.5) * scale_h) as usize).min(src_h - 1);
            let sw = (((w as f32 + 0.5) * scale_w) as usize).min(src_w - 1);
            src[[sh, sw]]
        }),
        Interpolation::Bilinear => Array2::from_shape_fn((target.height, target.width), |(h, w)| {
            let src_y = ((h as f32 + 0.5) * scale_h - 0.5).clamp(0.0, (src_h - 1) as f32);
            let src_x = ((w as f32 + 0.5) * scale_w - 0.5).clamp(0.0, (src_w - 1) as f32);

            let y0 = src_y.floor() as usize;
            let x0 = src_x.floor() as usize;
            let y1 = (y0 + 1).min(src_h - 1);
            let x1 = (x0 + 1).min(src_w - 1);
            let dy = src_y - y0 as f32;
            let dx = src_x - x0 as f32;

            let top = (1.0 - dx).mul_add(src[[y0, x0]], src[[y0, x1]] * dx);
            let bottom = (1.0 - dx).mul_add(src[[y1, x0]], src[[y1, x1]] * dx);
            (1.0 - dy).mul_add(top, bottom * dy)
        }),
    }
}
