//! Intensity normalization
//!
//! Turns a raw frame into an 8-bit display image. The steps are fixed:
//!
//! 1. optional modality rescale (`s * slope + intercept`)
//! 2. value range from the VOI window, or the observed min/max
//! 3. linear map into `[0, 255]` with rounding and clamping
//! 4. photometric inversion (`255 - v`) for MONOCHROME1 data
//!
//! A flat range maps every sample to 0.

use crate::error::{Error, Result};
use crate::frame::RawFrame;
use base64::Engine;
use image::{GrayImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::str::FromStr;

/// Whether higher sample values are brighter or darker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PhotometricConvention {
    /// Higher values are brighter (MONOCHROME2)
    #[default]
    Normal,
    /// Higher values are darker (MONOCHROME1)
    Inverted,
}

impl FromStr for PhotometricConvention {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MONOCHROME2" | "NORMAL" => Ok(Self::Normal),
            "MONOCHROME1" | "INVERTED" => Ok(Self::Inverted),
            other => Err(Error::Configuration(format!(
                "Unsupported photometric interpretation: {}",
                other
            ))),
        }
    }
}

/// Value-of-interest window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowParameters {
    pub center: f64,
    pub width: f64,
}

impl WindowParameters {
    pub fn new(center: f64, width: f64) -> Self {
        Self { center, width }
    }

    /// `[center - width/2, center + width/2]`
    pub fn range(&self) -> Result<(f64, f64)> {
        if !self.center.is_finite() || !self.width.is_finite() || self.width < 0.0 {
            return Err(Error::InvalidWindow {
                center: self.center,
                width: self.width,
            });
        }
        let half = self.width / 2.0;
        Ok((self.center - half, self.center + half))
    }
}

/// Modality LUT stored alongside the pixels (RescaleSlope/RescaleIntercept)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModalityRescale {
    pub slope: f64,
    pub intercept: f64,
}

impl ModalityRescale {
    #[inline]
    fn apply(&self, sample: f64) -> f64 {
        sample * self.slope + self.intercept
    }
}

impl Default for ModalityRescale {
    fn default() -> Self {
        Self {
            slope: 1.0,
            intercept: 0.0,
        }
    }
}

/// Everything that controls how a frame becomes a display image
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntensityOptions {
    pub convention: PhotometricConvention,
    pub window: Option<WindowParameters>,
    pub rescale: Option<ModalityRescale>,
}

/// 8-bit single-channel image, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl DisplayImage {
    /// Wrap row-major bytes. `data.len()` must equal `width * height`.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::shape_mismatch(&[height, width], &[data.len()]));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Sample at `(row, col)`
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        if row < self.height && col < self.width {
            Some(self.data[row * self.width + col])
        } else {
            None
        }
    }

    /// New image with every value replaced by `255 - v`
    pub fn inverted(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|v| 255 - v).collect(),
        }
    }

    /// Copy into an `image` buffer
    pub fn to_gray_image(&self) -> Result<GrayImage> {
        GrayImage::from_raw(self.width as u32, self.height as u32, self.data.clone())
            .ok_or_else(|| Error::Encoding("display buffer does not match its dimensions".into()))
    }

    /// Encode as PNG
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.to_gray_image()?
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| Error::Encoding(format!("PNG encoding failed: {}", e)))?;
        Ok(out.into_inner())
    }

    /// PNG encoded as standard base64, for JSON previews
    pub fn to_base64_png(&self) -> Result<String> {
        let png = self.encode_png()?;
        Ok(base64::engine::general_purpose::STANDARD.encode(png))
    }
}

/// Normalize a frame for display.
pub fn normalize(
    frame: &RawFrame<'_>,
    convention: PhotometricConvention,
    window: Option<WindowParameters>,
) -> Result<DisplayImage> {
    normalize_with(
        frame,
        &IntensityOptions {
            convention,
            window,
            rescale: None,
        },
    )
}

/// Normalize a frame with the full option set
pub fn normalize_with(frame: &RawFrame<'_>, options: &IntensityOptions) -> Result<DisplayImage> {
    frame.validate()?;

    let rescale = options.rescale.unwrap_or_default();
    if !rescale.slope.is_finite() || !rescale.intercept.is_finite() {
        return Err(Error::Configuration(format!(
            "Rescale slope/intercept must be finite, got {}/{}",
            rescale.slope, rescale.intercept
        )));
    }

    let (low, high) = match options.window {
        Some(window) => window.range()?,
        None => {
            // Rescale is linear, so mapping the extremes is enough; a negative
            // slope swaps them.
            let (lo, hi) = frame.min_max();
            let (a, b) = (rescale.apply(lo), rescale.apply(hi));
            (a.min(b), a.max(b))
        }
    };

    let span = high - low;
    if !low.is_finite() || !high.is_finite() || !span.is_finite() {
        return Err(Error::Configuration(format!(
            "Intensity range [{}, {}] overflows after rescale slope {} intercept {}",
            low, high, rescale.slope, rescale.intercept
        )));
    }
    tracing::debug!(
        rows = frame.height(),
        cols = frame.width(),
        low,
        high,
        convention = ?options.convention,
        windowed = options.window.is_some(),
        "Normalizing frame"
    );

    let data: Vec<u8> = if span > 0.0 {
        frame
            .pixels()
            .iter()
            .map(|&s| {
                let scaled = (rescale.apply(s as f64) - low) / span * 255.0;
                let v = scaled.round().clamp(0.0, 255.0) as u8;
                match options.convention {
                    PhotometricConvention::Normal => v,
                    PhotometricConvention::Inverted => 255 - v,
                }
            })
            .collect()
    } else {
        // Flat range. Output is 0 regardless of convention.
        vec![0u8; frame.height() * frame.width()]
    };

    DisplayImage::from_raw(frame.width(), frame.height(), data)
}

/// Stateless normalizer carrying a fixed option set
#[derive(Debug, Clone, Copy, Default)]
pub struct IntensityNormalizer {
    options: IntensityOptions,
}

impl IntensityNormalizer {
    pub fn new(options: IntensityOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &IntensityOptions {
        &self.options
    }

    pub fn normalize(&self, frame: &RawFrame<'_>) -> Result<DisplayImage> {
        normalize_with(frame, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn ramp() -> Array2<f32> {
        // 0, 250, 500, 750, 1000
        Array2::from_shape_fn((1, 5), |(_, c)| (c * 250) as f32)
    }

    #[test]
    fn test_flat_frame_maps_to_zero() {
        let flat = Array2::from_elem((100, 100), 500.0f32);
        let frame = RawFrame::new(flat.view());

        let image = normalize(&frame, PhotometricConvention::Normal, None).unwrap();
        assert_eq!(image.width(), 100);
        assert_eq!(image.height(), 100);
        assert!(image.as_bytes().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_flat_frame_inverted_still_zero() {
        let flat = Array2::from_elem((4, 4), -3.0f32);
        let frame = RawFrame::new(flat.view());

        let image = normalize(&frame, PhotometricConvention::Inverted, None).unwrap();
        assert!(image.as_bytes().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_zero_width_window_maps_to_zero() {
        let pixels = ramp();
        let frame = RawFrame::new(pixels.view());

        let image = normalize(
            &frame,
            PhotometricConvention::Normal,
            Some(WindowParameters::new(500.0, 0.0)),
        )
        .unwrap();
        assert!(image.as_bytes().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_min_max_mapping() {
        let pixels = ramp();
        let frame = RawFrame::new(pixels.view());

        let image = normalize(&frame, PhotometricConvention::Normal, None).unwrap();
        // 0.25 * 255 = 63.75 -> 64, 0.5 * 255 = 127.5 -> 128
        assert_eq!(image.as_bytes(), &[0, 64, 128, 191, 255]);
    }

    #[test]
    fn test_inverted_mapping() {
        let pixels = ramp();
        let frame = RawFrame::new(pixels.view());

        let image = normalize(&frame, PhotometricConvention::Inverted, None).unwrap();
        assert_eq!(image.get(0, 4), Some(0));
        assert_eq!(image.get(0, 0), Some(255));
    }

    #[test]
    fn test_double_inversion_is_identity() {
        let pixels = ramp();
        let frame = RawFrame::new(pixels.view());

        let normal = normalize(&frame, PhotometricConvention::Normal, None).unwrap();
        let inverted = normalize(&frame, PhotometricConvention::Inverted, None).unwrap();
        assert_eq!(normal.inverted(), inverted);
        assert_eq!(normal.inverted().inverted(), normal);
    }

    #[test]
    fn test_window_clamps_outside_values() {
        let pixels = ramp();
        let frame = RawFrame::new(pixels.view());

        // Range [250, 750]
        let image = normalize(
            &frame,
            PhotometricConvention::Normal,
            Some(WindowParameters::new(500.0, 500.0)),
        )
        .unwrap();
        assert_eq!(image.as_bytes(), &[0, 0, 128, 255, 255]);
    }

    #[test]
    fn test_negative_window_width_rejected() {
        let pixels = ramp();
        let frame = RawFrame::new(pixels.view());

        let err = normalize(
            &frame,
            PhotometricConvention::Normal,
            Some(WindowParameters::new(0.0, -1.0)),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidWindow { .. }));
    }

    #[test]
    fn test_empty_frame_rejected() {
        let pixels = Array2::<f32>::zeros((0, 0));
        let frame = RawFrame::new(pixels.view());

        assert_eq!(
            normalize(&frame, PhotometricConvention::Normal, None).unwrap_err(),
            Error::EmptyInput { rows: 0, cols: 0 }
        );
    }

    #[test]
    fn test_non_finite_sample_rejected() {
        let mut pixels = ramp();
        pixels[[0, 3]] = f32::INFINITY;
        let frame = RawFrame::new(pixels.view());

        assert_eq!(
            normalize(&frame, PhotometricConvention::Normal, None).unwrap_err(),
            Error::InvalidSampleData { row: 0, col: 3 }
        );
    }

    #[test]
    fn test_rescale_then_window_in_rescaled_units() {
        // Stored values 0..1000 with intercept -1024 are -1024..-24 HU
        let pixels = ramp();
        let frame = RawFrame::new(pixels.view());
        let options = IntensityOptions {
            convention: PhotometricConvention::Normal,
            window: Some(WindowParameters::new(-524.0, 1000.0)),
            rescale: Some(ModalityRescale {
                slope: 1.0,
                intercept: -1024.0,
            }),
        };

        let image = normalize_with(&frame, &options).unwrap();
        assert_eq!(image.as_bytes(), &[0, 64, 128, 191, 255]);
    }

    #[test]
    fn test_negative_slope_without_window() {
        let pixels = ramp();
        let frame = RawFrame::new(pixels.view());
        let options = IntensityOptions {
            rescale: Some(ModalityRescale {
                slope: -1.0,
                intercept: 0.0,
            }),
            ..Default::default()
        };

        let image = normalize_with(&frame, &options).unwrap();
        assert_eq!(image.as_bytes(), &[255, 191, 128, 64, 0]);
    }

    #[test]
    fn test_overflowing_rescale_rejected() {
        let pixels = ramp();
        let frame = RawFrame::new(pixels.view());

        for slope in [1e307, -1e307, f64::MAX] {
            let options = IntensityOptions {
                rescale: Some(ModalityRescale { slope, intercept: 0.0 }),
                ..Default::default()
            };
            assert!(matches!(
                normalize_with(&frame, &options),
                Err(Error::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_photometric_parse() {
        assert_eq!(
            "MONOCHROME1".parse::<PhotometricConvention>().unwrap(),
            PhotometricConvention::Inverted
        );
        assert_eq!(
            " monochrome2 ".parse::<PhotometricConvention>().unwrap(),
            PhotometricConvention::Normal
        );
        assert!("RGB".parse::<PhotometricConvention>().is_err());
    }

    #[test]
    fn test_png_preview_round_trip_dimensions() {
        let image = DisplayImage::from_raw(3, 2, vec![0, 50, 100, 150, 200, 255]).unwrap();
        let png = image.encode_png().unwrap();

        let decoded = image::load_from_memory(&png).unwrap().into_luma8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.as_raw(), image.as_bytes());
        assert!(!image.to_base64_png().unwrap().is_empty());
    }
}
