//! Bounded-size preview payloads
//!
//! A canonical array becomes either an `image` payload (rank 3 with an RGB or
//! RGBA trailing axis, encoded as PNG) or a `tensor` payload (nested lists,
//! downsampled so neither spatial axis exceeds `max_dim`).
//!
//! The `tensor` payload's `shape` always reports the array's original shape,
//! while `data` follows the downsampled shape. Viewers rely on that.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::PreviewConfig;
use crate::error::{TensorError, TensorResult};
use crate::tensor::{TensorData, TensorDtype, TensorMeta};

/// `origin` value for images built from numeric arrays
pub const ORIGIN_NPY: &str = "npy";

/// Preview payload, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PreviewPayload {
    /// PNG image
    Image {
        /// Always `png`
        format: String,
        /// Base64 of the PNG bytes
        base64: String,
        /// (height, width)
        shape: [u32; 2],
        /// `npy` when the pixels came from a numeric array
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<String>,
    },
    /// Nested numeric lists
    Tensor {
        /// Original shape, before any downsampling
        shape: Vec<usize>,
        /// Original dtype name
        dtype: String,
        /// Possibly downsampled values
        data: Value,
    },
}

/// How an array is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    /// Rank 3 with an image channel count on the last axis
    Image,
    /// Everything else
    Tensor,
}

/// Builds preview payloads from canonical arrays
#[derive(Debug, Clone, Default)]
pub struct PreviewBuilder {
    config: PreviewConfig,
}

impl PreviewBuilder {
    /// Create a builder with the given configuration
    #[must_use]
    pub fn new(config: PreviewConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Shape-only classification; dtype is not consulted
    #[must_use]
    pub fn classify(&self, shape: &[usize]) -> PreviewKind {
        match shape {
            [_, _, channels] if self.config.image_channels.contains(channels) => PreviewKind::Image,
            _ => PreviewKind::Tensor,
        }
    }

    /// Build the payload for an array that came from a numeric source
    pub fn build(&self, tensor: &TensorData) -> TensorResult<PreviewPayload> {
        match self.classify(tensor.shape()) {
            PreviewKind::Image => image_payload(tensor, Some(ORIGIN_NPY)),
            PreviewKind::Tensor => self.tensor_payload(tensor),
        }
    }

    /// Nested-list payload, downsampled when a spatial axis exceeds `max_dim`
    pub fn tensor_payload(&self, tensor: &TensorData) -> TensorResult<PreviewPayload> {
        let shape = tensor.shape();
        let rank = shape.len();
        let (h, w) = if rank >= 2 {
            (shape[rank - 2], shape[rank - 1])
        } else {
            (1, 1)
        };
        let scale = (h.max(w) as f64 / self.config.max_dim as f64).max(1.0);

        let data = if scale > 1.0 && rank >= 2 {
            let new_h = ((h as f64 / scale) as usize).max(1);
            let new_w = ((w as f64 / scale) as usize).max(1);
            debug!(?shape, new_h, new_w, scale, "downsampling tensor preview");
            self.downsample(tensor, new_h, new_w)?.to_nested()
        } else {
            tensor.to_nested()
        };

        Ok(PreviewPayload::Tensor {
            shape: shape.to_vec(),
            dtype: tensor.dtype().name().to_string(),
            data,
        })
    }

    /// Normalize the whole array, keep index 0 of every axis past the second,
    /// and resize that grid to `new_h` x `new_w`
    fn downsample(&self, tensor: &TensorData, new_h: usize, new_w: usize) -> TensorResult<TensorData> {
        let shape = tensor.shape();
        let (rows, cols) = (shape[0], shape[1]);
        let trailing: usize = shape[2..].iter().product();
        if rows == 0 || cols == 0 || trailing == 0 {
            return Err(TensorError::InvalidShape(format!(
                "cannot downsample empty array of shape {shape:?}"
            )));
        }

        let normalized = normalize_to_u8(tensor);
        let grid: Vec<u8> = (0..rows * cols)
            .map(|i| normalized.data[i * trailing])
            .collect();

        let gray = GrayImage::from_raw(dim_u32(cols)?, dim_u32(rows)?, grid).ok_or_else(|| {
            TensorError::InvalidShape(format!("grid buffer does not match {rows}x{cols}"))
        })?;
        let resized = image::imageops::resize(
            &gray,
            dim_u32(new_w)?,
            dim_u32(new_h)?,
            self.config.filter.to_filter_type(),
        );

        TensorData::new(
            vec![new_h, new_w],
            TensorDtype::UInt8,
            Bytes::from(resized.into_raw()),
        )
    }
}

/// Min-max rescale to `[0, 255]` truncated to uint8.
///
/// A constant array (or one whose range is undefined because it is empty or
/// holds NaN) becomes all zeros.
#[must_use]
pub fn normalize_to_u8(tensor: &TensorData) -> TensorData {
    let values = tensor.to_f64_vec();
    let (min, max) = value_range(&values);
    let range = max - min;

    let pixels: Vec<u8> = if range > 0.0 {
        values
            .iter()
            .map(|v| ((v - min) / range * 255.0) as u8)
            .collect()
    } else {
        vec![0; values.len()]
    };

    TensorData {
        meta: TensorMeta::for_buffer(tensor.shape().to_vec(), TensorDtype::UInt8, pixels.len()),
        data: Bytes::from(pixels),
    }
}

fn value_range(values: &[f64]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        if v.is_nan() {
            return (f64::NAN, f64::NAN);
        }
        min = min.min(v);
        max = max.max(v);
    }
    (min, max)
}

/// PNG payload for a (height, width, 3|4) array
pub fn image_payload(tensor: &TensorData, origin: Option<&str>) -> TensorResult<PreviewPayload> {
    let shape = tensor.shape();
    let &[h, w, channels] = shape else {
        return Err(TensorError::InvalidShape(format!(
            "image preview needs (height, width, channels), got {shape:?}"
        )));
    };

    let pixels = if tensor.dtype() == TensorDtype::UInt8 {
        tensor.data.to_vec()
    } else {
        normalize_to_u8(tensor).data.to_vec()
    };

    let (width, height) = (dim_u32(w)?, dim_u32(h)?);
    let image = match channels {
        3 => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8),
        _ => None,
    }
    .ok_or_else(|| {
        TensorError::InvalidShape(format!("cannot build an image from shape {shape:?}"))
    })?;

    Ok(PreviewPayload::Image {
        format: "png".to_string(),
        base64: encode_png_base64(&image)?,
        shape: [height, width],
        origin: origin.map(str::to_string),
    })
}

/// PNG payload for an image file: converted to RGBA, no `origin`
pub fn image_file_payload(image: &DynamicImage) -> TensorResult<PreviewPayload> {
    let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
    Ok(PreviewPayload::Image {
        format: "png".to_string(),
        base64: encode_png_base64(&rgba)?,
        shape: [rgba.height(), rgba.width()],
        origin: None,
    })
}

/// Encode as PNG, then base64
pub fn encode_png_base64(image: &DynamicImage) -> TensorResult<String> {
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(STANDARD.encode(&png))
}

fn dim_u32(dim: usize) -> TensorResult<u32> {
    u32::try_from(dim)
        .map_err(|_| TensorError::InvalidShape(format!("dimension {dim} too large for an image")))
}
