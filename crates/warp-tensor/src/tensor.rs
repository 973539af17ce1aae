//! Tensor types and metadata
//!
//! [`TensorData`] is the canonical array every source is converted into: a
//! shape, a dtype and a dense buffer of elements in row-major order using the
//! host's native byte order.

use bytes::Bytes;
use half::{bf16, f16};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TensorError, TensorResult};

/// Tensor data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorDtype {
    /// Boolean (one byte per element)
    Bool,
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit unsigned integer
    UInt64,
    /// 16-bit floating point (IEEE)
    Float16,
    /// Brain floating point (bfloat16)
    BFloat16,
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
}

impl TensorDtype {
    /// Get the size of one element in bytes
    #[must_use]
    pub fn element_size(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Get the canonical name of the dtype
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float16 => "float16",
            Self::BFloat16 => "bfloat16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Whether elements are floating point
    #[must_use]
    pub fn is_float(&self) -> bool {
        matches!(
            self,
            Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64
        )
    }
}

impl std::fmt::Display for TensorDtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for TensorDtype {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bool" => Ok(Self::Bool),
            "int8" | "i8" => Ok(Self::Int8),
            "int16" | "i16" => Ok(Self::Int16),
            "int32" | "i32" => Ok(Self::Int32),
            "int64" | "i64" => Ok(Self::Int64),
            "uint8" | "u8" => Ok(Self::UInt8),
            "uint16" | "u16" => Ok(Self::UInt16),
            "uint32" | "u32" => Ok(Self::UInt32),
            "uint64" | "u64" => Ok(Self::UInt64),
            "float16" | "f16" => Ok(Self::Float16),
            "bfloat16" | "bf16" => Ok(Self::BFloat16),
            "float32" | "f32" => Ok(Self::Float32),
            "float64" | "f64" => Ok(Self::Float64),
            _ => Err(TensorError::InvalidDtype(format!("unknown tensor dtype: {s}"))),
        }
    }
}

/// Element types that can be packed into a [`TensorData`]
pub trait Element: Copy + Send + Sync + 'static {
    /// Dtype tag for this element type
    const DTYPE: TensorDtype;

    /// Append the native-endian bytes of this element
    fn extend_ne_bytes(self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: TensorDtype = TensorDtype::$dtype;

                fn extend_ne_bytes(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_element! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f16 => Float16,
    bf16 => BFloat16,
    f32 => Float32,
    f64 => Float64,
}

impl Element for bool {
    const DTYPE: TensorDtype = TensorDtype::Bool;

    fn extend_ne_bytes(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }
}

/// Tensor metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorMeta {
    /// Shape
    pub shape: Vec<usize>,
    /// Data type
    pub dtype: TensorDtype,
    /// Number of elements
    pub numel: u64,
    /// Size in bytes
    pub size_bytes: u64,
}

impl TensorMeta {
    /// Create new tensor metadata
    ///
    /// Fails with [`TensorError::InvalidShape`] when the element count or
    /// byte size does not fit in memory.
    pub fn new(shape: Vec<usize>, dtype: TensorDtype) -> TensorResult<Self> {
        let size = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .and_then(|numel| Some((numel, numel.checked_mul(dtype.element_size())?)));
        let Some((numel, size_bytes)) = size else {
            return Err(TensorError::InvalidShape(format!(
                "shape {shape:?} of {dtype} overflows the addressable size"
            )));
        };

        Ok(Self {
            shape,
            dtype,
            numel: numel as u64,
            size_bytes: size_bytes as u64,
        })
    }

    /// Metadata for a shape already backed by `numel` elements in memory
    pub(crate) fn for_buffer(shape: Vec<usize>, dtype: TensorDtype, numel: usize) -> Self {
        Self {
            shape,
            dtype,
            numel: numel as u64,
            size_bytes: (numel * dtype.element_size()) as u64,
        }
    }

    /// Number of dimensions
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

/// A single decoded element
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// Boolean element
    Bool(bool),
    /// Signed integer element
    Int(i64),
    /// Unsigned integer element
    UInt(u64),
    /// Floating point element
    Float(f64),
}

impl Scalar {
    /// Numeric value as f64
    #[must_use]
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Bool(b) => f64::from(u8::from(b)),
            Self::Int(i) => i as f64,
            Self::UInt(u) => u as f64,
            Self::Float(f) => f,
        }
    }

    /// JSON representation; non-finite floats become `null`
    #[must_use]
    pub fn to_json(self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::from(i),
            Self::UInt(u) => Value::from(u),
            Self::Float(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        }
    }
}

/// Canonical array: metadata plus dense row-major element bytes
#[derive(Debug, Clone, PartialEq)]
pub struct TensorData {
    /// Tensor metadata
    pub meta: TensorMeta,
    /// Raw data bytes (native byte order)
    pub data: Bytes,
}

impl TensorData {
    /// Create tensor data, checking the buffer length against the shape
    pub fn new(shape: Vec<usize>, dtype: TensorDtype, data: Bytes) -> TensorResult<Self> {
        let meta = TensorMeta::new(shape, dtype)?;
        if meta.size_bytes != data.len() as u64 {
            return Err(TensorError::DataCorrupted(format!(
                "expected {} bytes for shape {:?} of {}, got {}",
                meta.size_bytes,
                meta.shape,
                dtype,
                data.len()
            )));
        }
        Ok(Self { meta, data })
    }

    /// Create tensor from a flat row-major slice
    pub fn from_slice<T: Element>(shape: Vec<usize>, values: &[T]) -> TensorResult<Self> {
        let mut bytes = Vec::with_capacity(values.len() * T::DTYPE.element_size());
        for &v in values {
            v.extend_ne_bytes(&mut bytes);
        }
        Self::new(shape, T::DTYPE, Bytes::from(bytes))
    }

    /// Create tensor from an ndarray, in logical (row-major) order whatever
    /// the memory layout of the source
    #[must_use]
    pub fn from_ndarray<T: Element>(array: &ArrayD<T>) -> Self {
        let mut bytes = Vec::with_capacity(array.len() * T::DTYPE.element_size());
        for &v in array {
            v.extend_ne_bytes(&mut bytes);
        }
        Self {
            meta: TensorMeta::for_buffer(array.shape().to_vec(), T::DTYPE, array.len()),
            data: Bytes::from(bytes),
        }
    }

    /// Get shape
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.meta.shape
    }

    /// Get dtype
    #[must_use]
    pub fn dtype(&self) -> TensorDtype {
        self.meta.dtype
    }

    /// Number of dimensions
    #[must_use]
    pub fn rank(&self) -> usize {
        self.meta.rank()
    }

    /// Number of elements
    #[must_use]
    pub fn numel(&self) -> usize {
        self.meta.shape.iter().product()
    }

    /// Raw element bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Decode every element in row-major order
    #[must_use]
    pub fn scalars(&self) -> Vec<Scalar> {
        let d = &self.data[..];
        match self.meta.dtype {
            TensorDtype::Bool => d.iter().map(|&b| Scalar::Bool(b != 0)).collect(),
            TensorDtype::Int8 => ne_chunks::<1>(d)
                .map(|b| Scalar::Int(i8::from_ne_bytes(b).into()))
                .collect(),
            TensorDtype::Int16 => ne_chunks::<2>(d)
                .map(|b| Scalar::Int(i16::from_ne_bytes(b).into()))
                .collect(),
            TensorDtype::Int32 => ne_chunks::<4>(d)
                .map(|b| Scalar::Int(i32::from_ne_bytes(b).into()))
                .collect(),
            TensorDtype::Int64 => ne_chunks::<8>(d)
                .map(|b| Scalar::Int(i64::from_ne_bytes(b)))
                .collect(),
            TensorDtype::UInt8 => d.iter().map(|&b| Scalar::UInt(b.into())).collect(),
            TensorDtype::UInt16 => ne_chunks::<2>(d)
                .map(|b| Scalar::UInt(u16::from_ne_bytes(b).into()))
                .collect(),
            TensorDtype::UInt32 => ne_chunks::<4>(d)
                .map(|b| Scalar::UInt(u32::from_ne_bytes(b).into()))
                .collect(),
            TensorDtype::UInt64 => ne_chunks::<8>(d)
                .map(|b| Scalar::UInt(u64::from_ne_bytes(b)))
                .collect(),
            TensorDtype::Float16 => ne_chunks::<2>(d)
                .map(|b| Scalar::Float(f16::from_ne_bytes(b).to_f64()))
                .collect(),
            TensorDtype::BFloat16 => ne_chunks::<2>(d)
                .map(|b| Scalar::Float(bf16::from_ne_bytes(b).to_f64()))
                .collect(),
            TensorDtype::Float32 => ne_chunks::<4>(d)
                .map(|b| Scalar::Float(f32::from_ne_bytes(b).into()))
                .collect(),
            TensorDtype::Float64 => ne_chunks::<8>(d)
                .map(|b| Scalar::Float(f64::from_ne_bytes(b)))
                .collect(),
        }
    }

    /// Every element widened to f64
    #[must_use]
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.scalars().into_iter().map(Scalar::to_f64).collect()
    }

    /// Elements as nested JSON lists following the shape; rank 0 gives a bare scalar
    #[must_use]
    pub fn to_nested(&self) -> Value {
        nest(&self.scalars(), self.shape())
    }
}

fn ne_chunks<const N: usize>(data: &[u8]) -> impl Iterator<Item = [u8; N]> + '_ {
    data.chunks_exact(N).map(|chunk| {
        let mut buf = [0u8; N];
        buf.copy_from_slice(chunk);
        buf
    })
}

/// Build nested JSON lists from row-major values
pub(crate) fn nest(values: &[Scalar], shape: &[usize]) -> Value {
    match shape.split_first() {
        None => values.first().map_or(Value::Null, |v| v.to_json()),
        Some((&len, rest)) => {
            let stride: usize = rest.iter().product();
            Value::Array(
                (0..len)
                    .map(|i| nest(&values[i * stride..(i + 1) * stride], rest))
                    .collect(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{IxDyn, ShapeBuilder};
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_tensor_dtype_size() {
        assert_eq!(TensorDtype::Float32.element_size(), 4);
        assert_eq!(TensorDtype::Float64.element_size(), 8);
        assert_eq!(TensorDtype::Float16.element_size(), 2);
        assert_eq!(TensorDtype::BFloat16.element_size(), 2);
        assert_eq!(TensorDtype::Int8.element_size(), 1);
        assert_eq!(TensorDtype::Bool.element_size(), 1);
    }

    #[test]
    fn test_tensor_dtype_from_str() {
        assert_eq!(TensorDtype::from_str("float32").unwrap(), TensorDtype::Float32);
        assert_eq!(TensorDtype::from_str("f32").unwrap(), TensorDtype::Float32);
        assert_eq!(TensorDtype::from_str("UINT8").unwrap(), TensorDtype::UInt8);
        assert_eq!(TensorDtype::from_str("bf16").unwrap(), TensorDtype::BFloat16);
        assert!(TensorDtype::from_str("complex64").is_err());
    }

    #[test]
    fn test_dtype_serde_uses_canonical_names() {
        for dtype in [
            TensorDtype::UInt8,
            TensorDtype::BFloat16,
            TensorDtype::Float32,
            TensorDtype::Int64,
        ] {
            let encoded = serde_json::to_string(&dtype).unwrap();
            assert_eq!(encoded, format!("\"{}\"", dtype.name()));
        }
    }

    #[test]
    fn test_tensor_meta() {
        let meta = TensorMeta::new(vec![1024, 512], TensorDtype::Float32).unwrap();
        assert_eq!(meta.shape, vec![1024, 512]);
        assert_eq!(meta.numel, 1024 * 512);
        assert_eq!(meta.size_bytes, 1024 * 512 * 4);
        assert_eq!(meta.rank(), 2);
    }

    #[test]
    fn test_overflowing_shape_rejected() {
        let huge = 1usize << 40;
        assert!(matches!(
            TensorMeta::new(vec![huge, huge, huge], TensorDtype::UInt8),
            Err(TensorError::InvalidShape(_))
        ));
        // element count fits, byte size does not
        assert!(matches!(
            TensorMeta::new(vec![usize::MAX / 2 + 1], TensorDtype::Float64),
            Err(TensorError::InvalidShape(_))
        ));
        assert!(matches!(
            TensorData::new(vec![huge, huge, huge], TensorDtype::UInt8, Bytes::new()),
            Err(TensorError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = TensorData::new(vec![2, 2], TensorDtype::Float32, Bytes::from(vec![0u8; 12]));
        assert!(matches!(result, Err(TensorError::DataCorrupted(_))));
    }

    #[test]
    fn test_scalars_decode() {
        let tensor = TensorData::from_slice(vec![2, 2], &[1.0f32, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(tensor.dtype(), TensorDtype::Float32);
        assert_eq!(tensor.to_f64_vec(), vec![1.0, 2.0, 3.0, 4.0]);

        let ints = TensorData::from_slice(vec![3], &[-1i16, 0, 7]).unwrap();
        assert_eq!(
            ints.scalars(),
            vec![Scalar::Int(-1), Scalar::Int(0), Scalar::Int(7)]
        );

        let halves = TensorData::from_slice(vec![2], &[f16::from_f32(0.5), f16::from_f32(-2.0)]).unwrap();
        assert_eq!(halves.to_f64_vec(), vec![0.5, -2.0]);
    }

    #[test]
    fn test_from_ndarray_fortran_order() {
        let array = ndarray::Array::from_shape_vec(IxDyn(&[2, 3]).f(), vec![1i32, 4, 2, 5, 3, 6])
            .unwrap();
        let tensor = TensorData::from_ndarray(&array);
        assert_eq!(tensor.shape(), &[2, 3]);
        assert_eq!(tensor.to_f64_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_nested_lists() {
        let tensor = TensorData::from_slice(vec![2, 3], &[1u8, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(tensor.to_nested(), json!([[1, 2, 3], [4, 5, 6]]));

        let scalar = TensorData::from_slice(vec![], &[2.5f64]).unwrap();
        assert_eq!(scalar.to_nested(), json!(2.5));

        let empty = TensorData::from_slice::<f32>(vec![2, 0], &[]).unwrap();
        assert_eq!(empty.to_nested(), json!([[], []]));

        let flags = TensorData::from_slice(vec![2], &[true, false]).unwrap();
        assert_eq!(flags.to_nested(), json!([true, false]));
    }

    #[test]
    fn test_non_finite_floats_become_null() {
        let tensor = TensorData::from_slice(vec![2], &[f32::NAN, 1.0]).unwrap();
        assert_eq!(tensor.to_nested(), json!([null, 1.0]));
    }
}
