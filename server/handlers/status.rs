use serde::Serialize;
use serde_json::json;

use crate::routes::{json_response, JsonResponse};
use crate::state::SharedState;

#[derive(Serialize)]
struct StatusReport<'a> {
    status:             &'static str,
    version:            &'static str,
    validation_profile: &'static str,
    thresholds_file:    Option<String>,
    image_size:         u32,
    labels:             &'a [String],
    model_path:         String,
    model_available:    bool,
    model_error:        Option<String>,
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

pub fn handle_status(state: &SharedState) -> JsonResponse {
    let model_error = state.pipeline.model_error();
    let report = StatusReport {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        validation_profile: state.settings.validation_profile_name(),
        thresholds_file: state.settings.thresholds_file.as_ref().map(|p| p.display().to_string()),
        image_size: state.pipeline.config().target_size,
        labels: state.pipeline.labels().as_slice(),
        model_path: state.settings.model_path.display().to_string(),
        model_available: model_error.is_none(),
        model_error,
    };
    json_response(200, &report)
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

pub fn handle_health() -> JsonResponse {
    json_response(200, &json!({ "status": "ok" }))
}
