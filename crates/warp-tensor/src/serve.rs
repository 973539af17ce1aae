//! One-file preview: route a path to a reader and build the JSON report
//!
//! Every failure is folded into an [`ErrorReport`]. Two of them, a missing
//! checkpoint loader and a checkpoint with no tensors, are additionally marked
//! fatal so the caller can exit non-zero.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PreviewConfig;
use crate::error::{TensorError, TensorResult};
use crate::format::{create_reader, FormatReader, ImageReader, NumpyReader, TensorFormat};
use crate::preview::{image_file_payload, PreviewBuilder, PreviewPayload};

/// `{"error": <code>[, "exception": <message>]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Short error code
    pub error: String,
    /// Underlying message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl ErrorReport {
    /// Report for a preview failure
    #[must_use]
    pub fn from_error(err: &TensorError) -> Self {
        let exception = match err {
            TensorError::UnavailableDependency(_) | TensorError::NoTensorFound(_) => None,
            TensorError::UnsupportedFormat(msg) => Some(msg.clone()),
            other => Some(other.to_string()),
        };
        Self {
            error: err.error_code(),
            exception,
        }
    }
}

/// The single JSON object printed per file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreviewReport {
    /// Image or tensor payload
    Payload(PreviewPayload),
    /// Error object
    Error(ErrorReport),
}

/// Report plus whether the failure should end the process
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOutcome {
    /// JSON report
    pub report: PreviewReport,
    /// Fatal failures exit non-zero
    pub fatal: bool,
}

impl PreviewOutcome {
    /// Process exit status for this outcome
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.fatal)
    }

    /// Serialize the report as a single-line JSON object
    pub fn to_json(&self) -> TensorResult<String> {
        Ok(serde_json::to_string(&self.report)?)
    }
}

/// Turns files into preview reports
#[derive(Debug, Clone, Default)]
pub struct PreviewService {
    builder: PreviewBuilder,
}

impl PreviewService {
    /// Create a service with the given preview configuration
    #[must_use]
    pub fn new(config: PreviewConfig) -> Self {
        Self {
            builder: PreviewBuilder::new(config),
        }
    }

    /// Preview one file, never failing
    pub fn preview_file(&self, path: &Path) -> PreviewOutcome {
        match self.try_preview(path) {
            Ok(payload) => {
                info!(path = %path.display(), "preview built");
                PreviewOutcome {
                    report: PreviewReport::Payload(payload),
                    fatal: false,
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "preview failed");
                PreviewOutcome {
                    report: PreviewReport::Error(ErrorReport::from_error(&e)),
                    fatal: e.is_fatal(),
                }
            }
        }
    }

    /// Route by extension; unknown extensions try image then npy
    pub fn try_preview(&self, path: &Path) -> TensorResult<PreviewPayload> {
        match TensorFormat::from_path(path) {
            Some(TensorFormat::Image) => self.preview_image(path),
            Some(TensorFormat::Numpy) => self.preview_numpy(path),
            Some(TensorFormat::PyTorch) => self.preview_checkpoint(path),
            None => self.preview_fallback(path),
        }
    }

    fn preview_image(&self, path: &Path) -> TensorResult<PreviewPayload> {
        let image = ImageReader::new().decode(path)?;
        image_file_payload(&image)
    }

    fn preview_numpy(&self, path: &Path) -> TensorResult<PreviewPayload> {
        let artifact = NumpyReader::new().read(path)?;
        self.builder.build(&artifact.to_canonical()?)
    }

    fn preview_checkpoint(&self, path: &Path) -> TensorResult<PreviewPayload> {
        let loaded = create_reader(TensorFormat::PyTorch)?.read(path)?;
        let found = loaded
            .find_array()
            .ok_or_else(|| TensorError::NoTensorFound(path.display().to_string()))?;
        self.builder.build(&found.to_canonical()?)
    }

    fn preview_fallback(&self, path: &Path) -> TensorResult<PreviewPayload> {
        let attempts: [(&str, fn(&Self, &Path) -> TensorResult<PreviewPayload>); 2] = [
            ("image", Self::preview_image),
            ("npy", Self::preview_numpy),
        ];

        let mut last_error = None;
        for (name, attempt) in attempts {
            match attempt(self, path) {
                Ok(payload) => return Ok(payload),
                Err(e) => {
                    debug!(path = %path.display(), attempt = name, error = %e, "fallback attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(TensorError::UnsupportedFormat(
            last_error.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}

/// Preview one file with the default configuration
pub fn preview_file(path: &Path) -> PreviewOutcome {
    PreviewService::default().preview_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_report_shapes() {
        let fatal = ErrorReport::from_error(&TensorError::NoTensorFound("a.pt".into()));
        assert_eq!(
            serde_json::to_value(&fatal).unwrap(),
            json!({"error": "no tensor found in file"})
        );

        let unsupported = ErrorReport::from_error(&TensorError::UnsupportedFormat("bad magic".into()));
        assert_eq!(
            serde_json::to_value(&unsupported).unwrap(),
            json!({"error": "unsupported format", "exception": "bad magic"})
        );

        let generic = ErrorReport::from_error(&TensorError::InvalidShape("oops".into()));
        assert_eq!(generic.error, "exception");
        assert!(generic.exception.unwrap().contains("oops"));
    }

    #[test]
    fn test_missing_file_is_not_fatal() {
        let outcome = preview_file(Path::new("/nonexistent/warp-view/array.npy"));
        assert!(!outcome.fatal);
        assert_eq!(outcome.exit_code(), 0);
        let PreviewReport::Error(report) = outcome.report else {
            panic!("expected error report");
        };
        assert_eq!(report.error, "exception");
    }

    #[test]
    fn test_missing_file_without_extension_is_unsupported() {
        let outcome = preview_file(Path::new("/nonexistent/warp-view/blob"));
        let PreviewReport::Error(report) = outcome.report else {
            panic!("expected error report");
        };
        assert_eq!(report.error, "unsupported format");
        assert!(report.exception.is_some());
    }

    #[test]
    fn test_fatal_exit_code() {
        let outcome = PreviewOutcome {
            report: PreviewReport::Error(ErrorReport {
                error: "torch not installed".into(),
                exception: None,
            }),
            fatal: true,
        };
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(outcome.to_json().unwrap(), r#"{"error":"torch not installed"}"#);
    }
}
