//! Lossless base64 + metadata envelope
//!
//! The payload is the array's raw element bytes (row-major, native byte order)
//! encoded with the standard base64 alphabet. The metadata sidecar records the
//! shape and dtype name, which is everything needed to rebuild the array
//! bit-for-bit.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LosslessConfig;
use crate::error::{TensorError, TensorResult};
use crate::source::Artifact;
use crate::tensor::{TensorData, TensorDtype};

/// Status returned by [`save`] on success
pub const STATUS_OK: &str = "OK";

/// Prefix of the status returned by [`save`] on failure
pub const STATUS_ERROR_PREFIX: &str = "ERROR: ";

/// Sidecar metadata: exactly `shape` and `dtype`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LosslessMeta {
    /// Shape, zero-length dimensions included
    pub shape: Vec<usize>,
    /// Canonical dtype name
    pub dtype: String,
}

impl LosslessMeta {
    /// Parse metadata JSON
    pub fn from_json(content: &str) -> TensorResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Serialize metadata JSON
    pub fn to_json(&self) -> TensorResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Resolve the dtype name
    pub fn dtype(&self) -> TensorResult<TensorDtype> {
        self.dtype.parse()
    }
}

/// Base64 payload plus metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LosslessEnvelope {
    /// Base64 of the raw element bytes
    pub base64_payload: String,
    /// Shape and dtype
    pub metadata: LosslessMeta,
}

impl LosslessEnvelope {
    /// Rebuild the array this envelope was made from
    pub fn decode(&self) -> TensorResult<TensorData> {
        decode(&self.base64_payload, &self.metadata)
    }
}

/// Encode with the default rank limit
pub fn encode(tensor: &TensorData) -> TensorResult<LosslessEnvelope> {
    encode_with_config(tensor, &LosslessConfig::default())
}

/// Encode, rejecting arrays above the configured rank
pub fn encode_with_config(
    tensor: &TensorData,
    config: &LosslessConfig,
) -> TensorResult<LosslessEnvelope> {
    if tensor.rank() > config.max_rank {
        return Err(TensorError::UnsupportedRank {
            rank: tensor.rank(),
            max: config.max_rank,
        });
    }

    let base64_payload = STANDARD.encode(tensor.as_bytes());
    debug!(
        shape = ?tensor.shape(),
        dtype = %tensor.dtype(),
        bytes = tensor.as_bytes().len(),
        "encoded lossless payload"
    );

    Ok(LosslessEnvelope {
        base64_payload,
        metadata: LosslessMeta {
            shape: tensor.shape().to_vec(),
            dtype: tensor.dtype().name().to_string(),
        },
    })
}

/// Rebuild an array from a base64 payload and its metadata
pub fn decode(payload: &str, meta: &LosslessMeta) -> TensorResult<TensorData> {
    let dtype = meta.dtype()?;
    let raw = STANDARD.decode(payload.trim())?;
    TensorData::new(meta.shape.clone(), dtype, Bytes::from(raw))
}

/// Convert, validate, encode and write the data/metadata file pair.
///
/// Never fails: returns [`STATUS_OK`] or `"ERROR: <message>"`.
pub fn save(
    artifact: &Artifact,
    data_path: impl AsRef<Path>,
    meta_path: impl AsRef<Path>,
) -> String {
    save_with_config(artifact, data_path, meta_path, &LosslessConfig::default())
}

/// [`save`] with an explicit configuration
pub fn save_with_config(
    artifact: &Artifact,
    data_path: impl AsRef<Path>,
    meta_path: impl AsRef<Path>,
    config: &LosslessConfig,
) -> String {
    match try_save(artifact, data_path.as_ref(), meta_path.as_ref(), config) {
        Ok(()) => STATUS_OK.to_string(),
        Err(e) => {
            warn!(error = %e, "lossless save failed");
            format!("{STATUS_ERROR_PREFIX}{e}")
        }
    }
}

fn try_save(
    artifact: &Artifact,
    data_path: &Path,
    meta_path: &Path,
    config: &LosslessConfig,
) -> TensorResult<()> {
    let tensor = artifact.to_canonical()?;
    let envelope = encode_with_config(&tensor, config)?;
    let meta_json = envelope.metadata.to_json()?;

    std::fs::write(data_path, envelope.base64_payload.as_bytes())?;
    std::fs::write(meta_path, meta_json.as_bytes())?;

    debug!(
        data = %data_path.display(),
        meta = %meta_path.display(),
        "wrote lossless file pair"
    );
    Ok(())
}

/// Read a data/metadata file pair written by [`save`]
pub fn load(data_path: impl AsRef<Path>, meta_path: impl AsRef<Path>) -> TensorResult<TensorData> {
    let payload = std::fs::read_to_string(data_path.as_ref())?;
    let meta = LosslessMeta::from_json(&std::fs::read_to_string(meta_path.as_ref())?)?;
    decode(&payload, &meta)
}
