//! Tensor format readers

use std::cmp::Ordering;
use std::io::Read;
use std::path::Path;

use half::f16;
use image::DynamicImage;
use ndarray::ArrayD;
use ndarray_npy::{ReadDataError, ReadNpyError, ReadNpyExt, ReadableElement};
use py_literal::Value as PyValue;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TensorError, TensorResult};
use crate::source::Artifact;
use crate::tensor::{Element, TensorData};

/// Supported source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TensorFormat {
    /// Raster image (PNG, JPEG, BMP, TIFF)
    Image,
    /// `NumPy` .npy format
    Numpy,
    /// `PyTorch` .pt/.pth checkpoint (pickle-based)
    PyTorch,
}

impl TensorFormat {
    /// File extensions routed to this format
    #[must_use]
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Image => &[".png", ".jpg", ".jpeg", ".bmp", ".tif", ".tiff"],
            Self::Numpy => &[".npy"],
            Self::PyTorch => &[".pt", ".pth"],
        }
    }

    /// Detect format from file extension (with or without the dot)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "bmp" | "tif" | "tiff" => Some(Self::Image),
            "npy" => Some(Self::Numpy),
            "pt" | "pth" => Some(Self::PyTorch),
            _ => None,
        }
    }

    /// Detect format from a path's extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Format reader trait
pub trait FormatReader {
    /// Format handled by this reader
    fn format(&self) -> TensorFormat;

    /// Load the whole file into memory
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid for this format.
    fn read(&self, path: &Path) -> TensorResult<Artifact>;
}

/// Image reader; the format is sniffed from content, not the extension
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageReader;

impl ImageReader {
    /// Create a new reader
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode the file into an image
    pub fn decode(&self, path: &Path) -> TensorResult<DynamicImage> {
        let image = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?;
        debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            color = ?image.color(),
            "decoded image"
        );
        Ok(image)
    }
}

impl FormatReader for ImageReader {
    fn format(&self) -> TensorFormat {
        TensorFormat::Image
    }

    fn read(&self, path: &Path) -> TensorResult<Artifact> {
        Ok(Artifact::Image(self.decode(path)?))
    }
}

/// `.npy` reader
#[derive(Debug, Clone, Copy, Default)]
pub struct NumpyReader;

impl NumpyReader {
    /// Create a new reader
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FormatReader for NumpyReader {
    fn format(&self) -> TensorFormat {
        TensorFormat::Numpy
    }

    fn read(&self, path: &Path) -> TensorResult<Artifact> {
        let bytes = std::fs::read(path)?;
        let tensor = read_npy_bytes(&bytes)?;
        debug!(
            path = %path.display(),
            shape = ?tensor.shape(),
            dtype = %tensor.dtype(),
            "loaded npy array"
        );
        Ok(Artifact::Array(tensor))
    }
}

/// Parse an in-memory `.npy` file of any supported element type
pub fn read_npy_bytes(bytes: &[u8]) -> TensorResult<TensorData> {
    macro_rules! try_element {
        ($($ty:ty),*) => {
            $(
                if let Some(tensor) = try_read_npy::<$ty>(bytes)? {
                    return Ok(tensor);
                }
            )*
        };
    }

    try_element!(f32, f64, i64, i32, i16, i8, u8, u16, u32, u64, bool);

    match ArrayD::<NpyF16>::read_npy(bytes) {
        Ok(array) => return Ok(TensorData::from_ndarray(&array.mapv(|v| v.0))),
        Err(ReadNpyError::WrongDescriptor(_)) => {}
        Err(e) => return Err(e.into()),
    }

    Err(TensorError::InvalidDtype(
        "npy element type is not supported".to_string(),
    ))
}

/// `Ok(None)` when the descriptor names a different element type
fn try_read_npy<T>(bytes: &[u8]) -> TensorResult<Option<TensorData>>
where
    T: Element + ReadableElement,
{
    match ArrayD::<T>::read_npy(bytes) {
        Ok(array) => Ok(Some(TensorData::from_ndarray(&array))),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Half-precision `.npy` element (`<f2`, `>f2`)
#[derive(Debug, Clone, Copy)]
struct NpyF16(f16);

impl ReadableElement for NpyF16 {
    fn read_to_end_exact_vec<R: Read>(
        mut reader: R,
        type_desc: &PyValue,
        len: usize,
    ) -> Result<Vec<Self>, ReadDataError> {
        let from_bytes: fn([u8; 2]) -> f16 = match type_desc {
            PyValue::String(s) if s == "<f2" => f16::from_le_bytes,
            PyValue::String(s) if s == ">f2" => f16::from_be_bytes,
            PyValue::String(s) if s == "e" || s == "=f2" => f16::from_ne_bytes,
            other => return Err(ReadDataError::WrongDescriptor(other.clone())),
        };

        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        let expected = len.checked_mul(2).ok_or(ReadDataError::MissingData)?;
        match raw.len().cmp(&expected) {
            Ordering::Less => Err(ReadDataError::MissingData),
            Ordering::Greater => Err(ReadDataError::ExtraBytes(raw.len() - expected)),
            Ordering::Equal => Ok(raw
                .chunks_exact(2)
                .map(|pair| NpyF16(from_bytes([pair[0], pair[1]])))
                .collect()),
        }
    }
}

/// `.pt`/`.pth` checkpoint reader
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckpointReader;

impl CheckpointReader {
    /// Create a new reader
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FormatReader for CheckpointReader {
    fn format(&self) -> TensorFormat {
        TensorFormat::PyTorch
    }

    /// Loads a bare tensor as itself, otherwise the checkpoint's tensors as an
    /// ordered mapping
    #[cfg(feature = "torch")]
    fn read(&self, path: &Path) -> TensorResult<Artifact> {
        use candle_core::pickle::{read_pth_tensor_info, PthTensors};

        let infos = read_pth_tensor_info(path, false, None)?;
        if infos.is_empty() {
            if let Some(tensor) = read_bare_tensor(path)? {
                debug!(path = %path.display(), shape = ?tensor.dims(), "loaded bare checkpoint tensor");
                return Ok(Artifact::Tensor(tensor));
            }
        }
        let tensors = PthTensors::new(path, None)?;

        let mut entries = Vec::with_capacity(infos.len());
        for info in infos {
            if let Some(tensor) = tensors.get(&info.name)? {
                entries.push((info.name, Artifact::Tensor(tensor)));
            }
        }
        debug!(path = %path.display(), tensors = entries.len(), "loaded checkpoint");
        Ok(Artifact::Mapping(entries))
    }

    #[cfg(not(feature = "torch"))]
    fn read(&self, _path: &Path) -> TensorResult<Artifact> {
        Err(TensorError::UnavailableDependency("torch".to_string()))
    }
}

/// Load a checkpoint whose pickled root is one tensor rather than a dict.
///
/// `Ok(None)` when the root is anything else.
#[cfg(feature = "torch")]
fn read_bare_tensor(path: &Path) -> TensorResult<Option<candle_core::Tensor>> {
    use candle_core::pickle::{Object, Stack};
    use candle_core::{Device, Tensor};
    use std::io::BufReader;

    let mut archive = zip::ZipArchive::new(BufReader::new(std::fs::File::open(path)?))?;
    let Some(pickle_name) = archive
        .file_names()
        .find(|name| name.ends_with("data.pkl"))
        .map(str::to_string)
    else {
        return Ok(None);
    };
    let dir_name = pickle_name.strip_suffix(".pkl").unwrap_or(&pickle_name);

    let mut stack = Stack::empty();
    stack.read_loop(&mut BufReader::new(archive.by_name(&pickle_name)?))?;
    let root = stack.finalize()?;
    let Some(info) = root.into_tensor_info(Object::Unicode(String::new()), Path::new(dir_name))?
    else {
        return Ok(None);
    };

    if !info.layout.is_contiguous() {
        return Err(TensorError::InvalidShape(format!(
            "non-contiguous checkpoint tensor of shape {:?}",
            info.layout.dims()
        )));
    }

    let element_size = info.dtype.size_in_bytes();
    let mut storage = archive.by_name(&info.path)?;
    let skip = (info.layout.start_offset() * element_size) as u64;
    std::io::copy(&mut storage.by_ref().take(skip), &mut std::io::sink())?;
    let mut raw = vec![0u8; info.layout.shape().elem_count() * element_size];
    storage.read_exact(&mut raw)?;

    Ok(Some(Tensor::from_raw_buffer(
        &raw,
        info.dtype,
        info.layout.dims(),
        &Device::Cpu,
    )?))
}

/// Create a reader for a specific format
///
/// # Errors
///
/// Returns [`TensorError::UnavailableDependency`] for checkpoints when the
/// `torch` feature is not compiled in.
pub fn create_reader(format: TensorFormat) -> TensorResult<Box<dyn FormatReader>> {
    match format {
        TensorFormat::Image => Ok(Box::new(ImageReader::new())),
        TensorFormat::Numpy => Ok(Box::new(NumpyReader::new())),
        #[cfg(feature = "torch")]
        TensorFormat::PyTorch => Ok(Box::new(CheckpointReader::new())),
        #[cfg(not(feature = "torch"))]
        TensorFormat::PyTorch => Err(TensorError::UnavailableDependency("torch".to_string())),
    }
}
