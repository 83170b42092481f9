use std::io::Read;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tiny_http::Request;
use tracing::{error, info, warn};

use neuroscan::Status;

use crate::routes::{error_response, json_response, JsonResponse};
use crate::state::{AppState, SharedState};
use crate::util::multipart::{extract_boundary, extract_file_part, sanitize_filename};

/// Form field carrying the upload.
const FILE_FIELD: &str = "file";

// ---------------------------------------------------------------------------
// POST /api/predict
// ---------------------------------------------------------------------------

pub fn handle(request: &mut Request, state: &SharedState) -> JsonResponse {
    let limit = state.settings.max_upload_size;

    let content_type = request.headers().iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_owned())
        .unwrap_or_default();
    if !content_type.starts_with("multipart/form-data") {
        return error_response(400, "Expected a multipart/form-data upload");
    }

    if request.body_length().is_some_and(|len| len > limit) {
        return too_large(limit);
    }
    let mut body: Vec<u8> = Vec::new();
    if let Err(e) = request.as_reader().take(limit as u64 + 1).read_to_end(&mut body) {
        warn!(error = %e, "cannot read request body");
        return error_response(400, "Cannot read request body");
    }
    upload(&content_type, &body, state)
}

/// Handles a fully read multipart body.
fn upload(content_type: &str, body: &[u8], state: &AppState) -> JsonResponse {
    let limit = state.settings.max_upload_size;
    if body.len() > limit {
        return too_large(limit);
    }
    let Some(boundary) = extract_boundary(content_type) else {
        return error_response(400, "Missing multipart boundary");
    };

    let Some(part) = extract_file_part(body, &boundary, FILE_FIELD) else {
        return error_response(400, "No file uploaded");
    };
    if !part.content_type.starts_with("image/") {
        return error_response(400, "File must be an image");
    }

    let saved = match store_upload(&state.settings.upload_dir, &part.filename, &part.data) {
        Ok(path) => path,
        Err(e) => {
            error!(error = %e, "cannot store upload");
            return error_response(500, "Cannot store upload");
        }
    };
    let saved_display = saved.display().to_string();
    info!(path = %saved_display, bytes = part.data.len(), "upload stored");

    let result = state.pipeline.predict(&part.data, Some(&saved_display));
    let status = if result.status == Status::Error { 500 } else { 200 };
    json_response(status, &result)
}

fn too_large(limit: usize) -> JsonResponse {
    error_response(413, &format!("File too large (limit {limit} bytes)"))
}

/// Writes the upload as `<millis>_<sanitised name>` under `dir`.
fn store_upload(dir: &std::path::Path, filename: &str, data: &[u8]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let path = dir.join(format!("{stamp}_{}", sanitize_filename(filename)));
    std::fs::write(&path, data)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma};
    use neuroscan::classify::{Classifier, ClassifyError, PredictionSource, Probabilities, Sample};
    use neuroscan::config::settings::MAX_UPLOAD_SIZE_KEY;
    use neuroscan::{ClassLabels, InferencePipeline, PipelineConfig};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tiny_http::{Header, Method, TestRequest};

    use crate::routes::tests::read;
    use crate::state::tests::{test_settings, test_state};

    const BOUNDARY: &str = "neuroscanBoundary";

    fn multipart(disposition: &str, part_type: Option<&str>, data: &[u8]) -> Vec<u8> {
        let mut out = format!("--{BOUNDARY}\r\nContent-Disposition: form-data; {disposition}\r\n").into_bytes();
        if let Some(t) = part_type {
            out.extend_from_slice(format!("Content-Type: {t}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(data);
        out.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        out
    }

    fn multipart_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    /// A POST carrying `body`, which must be UTF-8 for `TestRequest`.
    fn post(content_type: &str, body: Vec<u8>) -> Request {
        let body: &'static str = Box::leak(String::from_utf8(body).unwrap().into_boxed_str());
        let header: Header = format!("Content-Type: {content_type}").parse().unwrap();
        TestRequest::new()
            .with_method(Method::Post)
            .with_path("/api/predict")
            .with_header(header)
            .with_body(body)
            .into()
    }

    fn noisy_png() -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(21);
        let gray = GrayImage::from_fn(200, 200, |_, _| Luma([rng.gen()]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(gray).write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn non_multipart_request_is_400() {
        let (_dir, state) = test_state(&[]);
        let mut request = post("application/json", b"{}".to_vec());
        let (status, body) = read(handle(&mut request, &state));
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("multipart"));
    }

    #[test]
    fn missing_boundary_is_400() {
        let (_dir, state) = test_state(&[]);
        let mut request = post("multipart/form-data", Vec::new());
        assert_eq!(read(handle(&mut request, &state)).0, 400);
    }

    #[test]
    fn form_without_file_part_is_400() {
        let (_dir, state) = test_state(&[]);
        let body = multipart("name=\"note\"", None, b"just text");
        let mut request = post(&multipart_type(), body);
        let (status, body) = read(handle(&mut request, &state));
        assert_eq!(status, 400);
        assert_eq!(body["error"], "No file uploaded");
    }

    #[test]
    fn non_image_part_is_400() {
        let (_dir, state) = test_state(&[]);
        let body = multipart("name=\"file\"; filename=\"notes.txt\"", Some("text/plain"), b"hello");
        let mut request = post(&multipart_type(), body);
        let (status, body) = read(handle(&mut request, &state));
        assert_eq!(status, 400);
        assert_eq!(body["error"], "File must be an image");
    }

    #[test]
    fn oversized_body_is_413() {
        let (_dir, state) = test_state(&[(MAX_UPLOAD_SIZE_KEY, "64")]);
        let body = multipart("name=\"file\"; filename=\"a.png\"", Some("image/png"), &[b'x'; 256]);
        let mut request = post(&multipart_type(), body);
        let (status, body) = read(handle(&mut request, &state));
        assert_eq!(status, 413);
        assert!(body["error"].as_str().unwrap().contains("64 bytes"));
    }

    #[test]
    fn undecodable_image_is_stored_and_answered_200() {
        let (dir, state) = test_state(&[]);
        let body = multipart("name=\"file\"; filename=\"../scan.png\"", Some("image/png"), b"not really a png");
        let mut request = post(&multipart_type(), body);
        let (status, body) = read(handle(&mut request, &state));

        assert_eq!(status, 200);
        assert_eq!(body["status"], "invalid_image");
        let saved = body["image_path"].as_str().unwrap();
        assert!(saved.ends_with("_scan.png"), "{saved}");
        assert!(saved.starts_with(dir.path().join("uploads").to_string_lossy().as_ref()));
        assert_eq!(std::fs::read(saved).unwrap(), b"not really a png");
    }

    #[test]
    fn scan_upload_returns_ranked_predictions() {
        let (_dir, state) = test_state(&[]);
        let body = multipart("name=\"file\"; filename=\"scan.png\"", Some("image/png"), &noisy_png());
        let (status, body) = read(upload(&multipart_type(), &body, &state));

        assert_eq!(status, 200);
        assert_eq!(body["status"], "success");
        assert_eq!(body["prediction_source"], "fallback");
        assert_eq!(body["predictions"].as_array().unwrap().len(), 4);
        assert!(body["top_prediction"].is_object());
    }

    #[test]
    fn pipeline_error_is_500() {
        struct Broken;
        impl Classifier for Broken {
            fn source(&self) -> PredictionSource { PredictionSource::Model }
            fn classify(&self, _: &Sample<'_>) -> Result<Probabilities, ClassifyError> {
                Err(ClassifyError::InvalidOutput("entry NaN".into()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(&dir, &[]);
        let pipeline = InferencePipeline::with_classifier(
            PipelineConfig::from(&settings),
            ClassLabels::default(),
            Box::new(Broken),
            "broken.json",
        );
        let state = Arc::new(AppState { settings, pipeline });

        let body = multipart("name=\"file\"; filename=\"scan.png\"", Some("image/png"), &noisy_png());
        let (status, body) = read(upload(&multipart_type(), &body, &state));
        assert_eq!(status, 500);
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().contains("entry NaN"));
    }
}
