//! Tensor encoding and previews for WARP
//!
//! This crate turns array-like artifacts (framework tensors, `.npy` arrays,
//! raster images, model checkpoints) into one canonical array type and then
//! into one of two representations: a lossless base64 + metadata pair, or a
//! bounded-size JSON preview a viewer can render.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Sources                                  │
//! │   .png/.jpg/.bmp/.tif   .npy      .pt/.pth      in-memory values │
//! └──────────┬───────────────┬──────────┬────────────────┬──────────┘
//!            │               │          │                │
//! ┌──────────▼───────────────▼──────────▼────────────────▼──────────┐
//! │  FormatReader (format)  ──►  Artifact (source)                   │
//! │   ImageReader / NumpyReader / CheckpointReader                   │
//! └────────────────────────────┬────────────────────────────────────┘
//!                              │ to_canonical / find_array
//! ┌────────────────────────────▼────────────────────────────────────┐
//! │                    TensorData (tensor)                           │
//! │        shape + dtype + row-major native-endian bytes             │
//! └──────────────┬──────────────────────────────────┬───────────────┘
//!                │                                  │
//! ┌──────────────▼──────────────┐   ┌───────────────▼───────────────┐
//! │   lossless                  │   │   preview                     │
//! │   base64 payload + meta     │   │   image (PNG) | tensor (lists)│
//! │   rank <= 3, round-trips    │   │   min-max + downsampling      │
//! └─────────────────────────────┘   └───────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use warp_tensor::{lossless, Artifact, PreviewBuilder, TensorData};
//!
//! let weights = TensorData::from_slice(vec![2, 3], &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?;
//!
//! // Lossless pair for the viewer
//! let status = lossless::save(&Artifact::from(weights.clone()), "data.txt", "meta.json");
//! assert_eq!(status, "OK");
//!
//! // Bounded JSON preview
//! let payload = PreviewBuilder::default().build(&weights)?;
//! println!("{}", serde_json::to_string(&payload)?);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod error;
pub mod format;
pub mod lossless;
pub mod preview;
pub mod serve;
pub mod source;
pub mod tensor;

pub use config::{LosslessConfig, PreviewConfig, ResampleFilter, TensorConfig};
pub use error::{TensorError, TensorResult};
pub use format::{create_reader, FormatReader, TensorFormat};
pub use lossless::{LosslessEnvelope, LosslessMeta};
pub use preview::{normalize_to_u8, PreviewBuilder, PreviewKind, PreviewPayload};
pub use serve::{preview_file, ErrorReport, PreviewOutcome, PreviewReport, PreviewService};
pub use source::{to_canonical, Artifact};
pub use tensor::{Element, Scalar, TensorData, TensorDtype, TensorMeta};
