//! Error types for tensor conversion, encoding and preview

use std::io;
use thiserror::Error;

/// Tensor errors
#[derive(Debug, Error)]
pub enum TensorError {
    /// Input is not one of the recognized array-like variants
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Array rank exceeds what the lossless path accepts
    #[error("Unsupported dim: the rank of data must be no more than {max}, now is {rank}")]
    UnsupportedRank {
        /// Actual rank
        rank: usize,
        /// Maximum allowed rank
        max: usize,
    },

    /// A loader was requested but is not compiled into this build
    #[error("{0} not installed")]
    UnavailableDependency(String),

    /// Checkpoint loaded but nothing array-like was found in it
    #[error("no tensor found in file: {0}")]
    NoTensorFound(String),

    /// No reader accepted the file
    #[error("unsupported tensor format: {0}")]
    UnsupportedFormat(String),

    /// Shape cannot be used for the requested operation
    #[error("invalid tensor shape: {0}")]
    InvalidShape(String),

    /// Unknown or unsupported dtype name
    #[error("invalid dtype: {0}")]
    InvalidDtype(String),

    /// Tensor data does not match its metadata
    #[error("tensor data corrupted: {0}")]
    DataCorrupted(String),

    /// Image decode/encode error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// `.npy` parse error
    #[error("npy error: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    /// Checkpoint loader error
    #[cfg(feature = "torch")]
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] candle_core::Error),

    /// Checkpoint archive error
    #[cfg(feature = "torch")]
    #[error("checkpoint archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Base64 decode error
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl TensorError {
    /// Short code reported in the `error` field of a preview error object
    #[must_use]
    pub fn error_code(&self) -> String {
        match self {
            Self::UnavailableDependency(_) => self.to_string(),
            Self::NoTensorFound(_) => "no tensor found in file".to_string(),
            Self::UnsupportedFormat(_) => "unsupported format".to_string(),
            _ => "exception".to_string(),
        }
    }

    /// Whether this error ends the preview process with a non-zero status
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnavailableDependency(_) | Self::NoTensorFound(_)
        )
    }
}

impl From<serde_json::Error> for TensorError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for tensor operations
pub type TensorResult<T> = Result<T, TensorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_message_mentions_rank() {
        let err = TensorError::UnsupportedRank { rank: 4, max: 3 };
        assert!(err.to_string().contains("now is 4"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TensorError::UnavailableDependency("torch".into()).error_code(),
            "torch not installed"
        );
        assert_eq!(
            TensorError::NoTensorFound("a.pt".into()).error_code(),
            "no tensor found in file"
        );
        assert_eq!(
            TensorError::UnsupportedFormat("x".into()).error_code(),
            "unsupported format"
        );
        assert_eq!(
            TensorError::InvalidDtype("complex64".into()).error_code(),
            "exception"
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(TensorError::UnavailableDependency("torch".into()).is_fatal());
        assert!(TensorError::NoTensorFound("a.pt".into()).is_fatal());
        assert!(!TensorError::UnsupportedFormat("x".into()).is_fatal());
        assert!(!TensorError::UnsupportedType("str".into()).is_fatal());
    }
}
