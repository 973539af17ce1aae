//! Array-like sources and their conversion to [`TensorData`]
//!
//! [`Artifact`] is the closed set of things a caller can hand to the encoders:
//! a framework tensor, an already canonical array, a raster image, an ordered
//! mapping (what a checkpoint loads as), or an opaque value that only carries
//! its type name. Only the first three expose array conversion.

use bytes::Bytes;
use image::{ColorType, DynamicImage};
use ndarray::ArrayD;

use crate::error::{TensorError, TensorResult};
use crate::tensor::{Element, TensorData, TensorDtype};

/// An input that may or may not be convertible to a canonical array
#[derive(Debug, Clone)]
pub enum Artifact {
    /// Framework tensor (possibly graph-attached, possibly on a device)
    #[cfg(feature = "torch")]
    Tensor(candle_core::Tensor),
    /// Canonical array, passed through unchanged
    Array(TensorData),
    /// Raster image
    Image(DynamicImage),
    /// Ordered key/value entries, e.g. a loaded state dict
    Mapping(Vec<(String, Artifact)>),
    /// Any other value
    Opaque {
        /// Runtime type name reported in errors
        type_name: String,
    },
}

impl Artifact {
    /// Wrap an arbitrary value by its type name
    pub fn opaque(type_name: impl Into<String>) -> Self {
        Self::Opaque {
            type_name: type_name.into(),
        }
    }

    /// Runtime type name of this artifact
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            #[cfg(feature = "torch")]
            Self::Tensor(_) => "Tensor",
            Self::Array(_) => "ndarray",
            Self::Image(_) => "Image",
            Self::Mapping(_) => "dict",
            Self::Opaque { type_name } => type_name,
        }
    }

    /// Whether this artifact can be materialized as a canonical array
    #[must_use]
    pub fn is_array_like(&self) -> bool {
        match self {
            #[cfg(feature = "torch")]
            Self::Tensor(_) => true,
            Self::Array(_) | Self::Image(_) => true,
            Self::Mapping(_) | Self::Opaque { .. } => false,
        }
    }

    /// First array-like value: the artifact itself, else mapping values in order
    #[must_use]
    pub fn find_array(&self) -> Option<&Artifact> {
        if self.is_array_like() {
            return Some(self);
        }
        match self {
            Self::Mapping(entries) => entries
                .iter()
                .map(|(_, value)| value)
                .find(|value| value.is_array_like()),
            _ => None,
        }
    }

    /// Materialize as a canonical array
    pub fn to_canonical(&self) -> TensorResult<TensorData> {
        match self {
            #[cfg(feature = "torch")]
            Self::Tensor(tensor) => tensor_to_canonical(tensor),
            Self::Array(array) => Ok(array.clone()),
            Self::Image(image) => image_to_canonical(image),
            Self::Mapping(_) | Self::Opaque { .. } => {
                Err(TensorError::UnsupportedType(self.type_name().to_string()))
            }
        }
    }
}

/// Materialize any artifact as a canonical array
pub fn to_canonical(artifact: &Artifact) -> TensorResult<TensorData> {
    artifact.to_canonical()
}

impl From<TensorData> for Artifact {
    fn from(array: TensorData) -> Self {
        Self::Array(array)
    }
}

impl<T: Element> From<ArrayD<T>> for Artifact {
    fn from(array: ArrayD<T>) -> Self {
        Self::Array(TensorData::from_ndarray(&array))
    }
}

impl From<DynamicImage> for Artifact {
    fn from(image: DynamicImage) -> Self {
        Self::Image(image)
    }
}

#[cfg(feature = "torch")]
impl From<candle_core::Tensor> for Artifact {
    fn from(tensor: candle_core::Tensor) -> Self {
        Self::Tensor(tensor)
    }
}

impl From<Vec<(String, Artifact)>> for Artifact {
    fn from(entries: Vec<(String, Artifact)>) -> Self {
        Self::Mapping(entries)
    }
}

impl From<&str> for Artifact {
    fn from(_: &str) -> Self {
        Self::opaque("str")
    }
}

impl From<String> for Artifact {
    fn from(_: String) -> Self {
        Self::opaque("str")
    }
}

impl From<i64> for Artifact {
    fn from(_: i64) -> Self {
        Self::opaque("int")
    }
}

impl From<f64> for Artifact {
    fn from(_: f64) -> Self {
        Self::opaque("float")
    }
}

impl From<bool> for Artifact {
    fn from(_: bool) -> Self {
        Self::opaque("bool")
    }
}

/// Pixels as (height, width[, channels]) with an integer dtype
fn image_to_canonical(image: &DynamicImage) -> TensorResult<TensorData> {
    let height = image.height() as usize;
    let width = image.width() as usize;

    let (channels, wide) = match image.color() {
        ColorType::L8 => (1, false),
        ColorType::La8 => (2, false),
        ColorType::Rgb8 => (3, false),
        ColorType::Rgba8 => (4, false),
        ColorType::L16 => (1, true),
        ColorType::La16 => (2, true),
        ColorType::Rgb16 | ColorType::Rgb32F => (3, true),
        _ => (4, true),
    };

    let shape = if channels == 1 {
        vec![height, width]
    } else {
        vec![height, width, channels]
    };

    if wide {
        let pixels: Vec<u16> = match channels {
            1 => image.to_luma16().into_raw(),
            2 => image.to_luma_alpha16().into_raw(),
            3 => image.to_rgb16().into_raw(),
            _ => image.to_rgba16().into_raw(),
        };
        TensorData::from_slice(shape, &pixels)
    } else {
        let pixels: Vec<u8> = match channels {
            1 => image.to_luma8().into_raw(),
            2 => image.to_luma_alpha8().into_raw(),
            3 => image.to_rgb8().into_raw(),
            _ => image.to_rgba8().into_raw(),
        };
        TensorData::new(shape, TensorDtype::UInt8, Bytes::from(pixels))
    }
}

/// Detach, move to host memory and copy out densely
#[cfg(feature = "torch")]
#[allow(unreachable_patterns)]
fn tensor_to_canonical(tensor: &candle_core::Tensor) -> TensorResult<TensorData> {
    use candle_core::{DType, Device};

    let host = tensor.detach().to_device(&Device::Cpu)?;
    let shape = host.dims().to_vec();
    let flat = host.flatten_all()?;

    match host.dtype() {
        DType::U8 => TensorData::from_slice(shape, &flat.to_vec1::<u8>()?),
        DType::U32 => TensorData::from_slice(shape, &flat.to_vec1::<u32>()?),
        DType::I64 => TensorData::from_slice(shape, &flat.to_vec1::<i64>()?),
        DType::F16 => TensorData::from_slice(shape, &flat.to_vec1::<half::f16>()?),
        DType::BF16 => TensorData::from_slice(shape, &flat.to_vec1::<half::bf16>()?),
        DType::F32 => TensorData::from_slice(shape, &flat.to_vec1::<f32>()?),
        DType::F64 => TensorData::from_slice(shape, &flat.to_vec1::<f64>()?),
        other => Err(TensorError::UnsupportedType(format!(
            "Tensor with dtype {other:?}"
        ))),
    }
}
