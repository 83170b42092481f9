use std::sync::Arc;

use neuroscan::{InferencePipeline, Settings};

// ---------------------------------------------------------------------------
// Shared server state
// ---------------------------------------------------------------------------

/// Read-only after startup; every request thread holds a clone of the `Arc`.
pub struct AppState {
    pub settings: Settings,
    pub pipeline: InferencePipeline,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let pipeline = InferencePipeline::from_settings(&settings);
        AppState { settings, pipeline }
    }
}

pub type SharedState = Arc<AppState>;
