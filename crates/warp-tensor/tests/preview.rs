//! Integration tests for file previews through `PreviewService`

use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use ndarray_npy::WriteNpyExt;
use tempfile::TempDir;
use warp_tensor::{
    preview_file, ErrorReport, PreviewConfig, PreviewPayload, PreviewReport, PreviewService,
    ResampleFilter,
};

fn write_npy<T: ndarray_npy::WritableElement>(path: &Path, array: &ArrayD<T>) {
    let file = std::fs::File::create(path).unwrap();
    array.write_npy(file).unwrap();
}

fn expect_payload(report: PreviewReport) -> PreviewPayload {
    match report {
        PreviewReport::Payload(payload) => payload,
        PreviewReport::Error(err) => panic!("unexpected error report: {err:?}"),
    }
}

fn expect_error(report: PreviewReport) -> ErrorReport {
    match report {
        PreviewReport::Error(err) => err,
        PreviewReport::Payload(payload) => panic!("unexpected payload: {payload:?}"),
    }
}

#[test]
fn test_large_npy_is_downsampled() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("big.npy");
    let values: Vec<f32> = (0..512 * 300).map(|v| (v % 97) as f32).collect();
    write_npy(&path, &ArrayD::from_shape_vec(IxDyn(&[512, 300]), values).unwrap());

    let outcome = preview_file(&path);
    assert!(!outcome.fatal);
    let PreviewPayload::Tensor { shape, dtype, data } = expect_payload(outcome.report) else {
        panic!("expected tensor payload");
    };
    assert_eq!(shape, vec![512, 300]);
    assert_eq!(dtype, "float32");

    let rows = data.as_array().unwrap();
    assert_eq!(rows.len(), 256);
    for row in rows {
        let row = row.as_array().unwrap();
        assert_eq!(row.len(), 150);
        assert!(row.iter().all(|v| v.as_u64().is_some_and(|p| p <= 255)));
    }
}

#[test]
fn test_rgba_npy_is_image() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("rgba.npy");
    write_npy(&path, &ArrayD::from_elem(IxDyn(&[3, 5, 4]), 200u8));

    let PreviewPayload::Image { shape, origin, base64, .. } =
        expect_payload(preview_file(&path).report)
    else {
        panic!("expected image payload");
    };
    assert_eq!(shape, [3, 5]);
    assert_eq!(origin.as_deref(), Some("npy"));

    use base64::Engine;
    let png = base64::engine::general_purpose::STANDARD.decode(base64).unwrap();
    let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (5, 3));
    assert_eq!(decoded.get_pixel(4, 2).0, [200, 200, 200, 200]);
}

#[test]
fn test_grayscale_png_file_becomes_rgba() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("gray.png");
    image::GrayImage::from_pixel(9, 2, image::Luma([77])).save(&path).unwrap();

    let PreviewPayload::Image { shape, origin, base64, .. } =
        expect_payload(preview_file(&path).report)
    else {
        panic!("expected image payload");
    };
    assert_eq!(shape, [2, 9]);
    assert!(origin.is_none());

    use base64::Engine;
    let png = base64::engine::general_purpose::STANDARD.decode(base64).unwrap();
    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!(decoded.color(), image::ColorType::Rgba8);
}

#[test]
fn test_extension_routing_is_case_insensitive() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ARRAY.NPY");
    write_npy(&path, &ArrayD::from_elem(IxDyn(&[2]), 1u16));

    let PreviewPayload::Tensor { dtype, .. } = expect_payload(preview_file(&path).report) else {
        panic!("expected tensor payload");
    };
    assert_eq!(dtype, "uint16");
}

#[test]
fn test_png_bytes_behind_unknown_extension() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("snapshot.dat");
    let mut png = Vec::new();
    image::RgbImage::new(3, 3)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(&path, png).unwrap();

    let payload = expect_payload(preview_file(&path).report);
    assert!(matches!(payload, PreviewPayload::Image { origin: None, .. }));
}

#[test]
fn test_unsupported_bytes() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("random.xyz");
    std::fs::write(&path, [0u8, 1, 2, 3, 4, 5]).unwrap();

    let outcome = preview_file(&path);
    assert!(!outcome.fatal);
    let err = expect_error(outcome.report);
    assert_eq!(err.error, "unsupported format");
    assert!(err.exception.is_some());
}

#[cfg(not(feature = "torch"))]
#[test]
fn test_checkpoint_requires_torch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("model.pt");
    std::fs::write(&path, b"pickle").unwrap();

    let outcome = preview_file(&path);
    assert!(outcome.fatal);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(outcome.to_json().unwrap(), r#"{"error":"torch not installed"}"#);
}

#[test]
fn test_service_with_nearest_filter() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("steps.npy");
    let values: Vec<i32> = (0..4 * 4).map(|i| if i % 4 < 2 { 0 } else { 10 }).collect();
    write_npy(&path, &ArrayD::from_shape_vec(IxDyn(&[4, 4]), values).unwrap());

    let service = PreviewService::new(PreviewConfig {
        max_dim: 2,
        filter: ResampleFilter::Nearest,
        ..PreviewConfig::default()
    });
    let PreviewPayload::Tensor { data, .. } = expect_payload(service.preview_file(&path).report)
    else {
        panic!("expected tensor payload");
    };
    assert_eq!(data, serde_json::json!([[0, 255], [0, 255]]));
}
