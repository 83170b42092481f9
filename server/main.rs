/// neuroscan HTTP API
///
/// Upload screening and tumor-type inference over JSON, served by a
/// synchronous tiny_http server with one thread per request.
///
/// Run with:
///   cargo run --bin server --release
///
/// Routes:
///   POST /api/predict   multipart upload, field `file`
///   GET  /api/status    configuration and model availability
///   GET  /api/health    liveness

mod handlers;
mod routes;
mod state;
mod util;

use std::process::ExitCode;
use std::sync::Arc;

use tiny_http::Server;
use tracing::{error, info};

use neuroscan::logging::init_tracing;
use neuroscan::Settings;

use state::AppState;

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing("info");
            error!(error = %e, "invalid configuration");
            return ExitCode::from(2);
        }
    };
    init_tracing(&settings.log_filter);

    if let Err(e) = std::fs::create_dir_all(&settings.upload_dir) {
        error!(dir = %settings.upload_dir.display(), error = %e, "cannot create upload directory");
        return ExitCode::FAILURE;
    }

    let addr = settings.bind_addr.clone();
    let server = match Server::http(&addr) {
        Ok(server) => server,
        Err(e) => {
            error!(addr = %addr, error = %e, "failed to bind HTTP server");
            return ExitCode::FAILURE;
        }
    };

    let shared_state = Arc::new(AppState::new(settings));
    info!(
        addr = %addr,
        profile = %shared_state.settings.profile,
        model = %shared_state.settings.model_path.display(),
        "neuroscan API listening"
    );

    for request in server.incoming_requests() {
        let state_clone = Arc::clone(&shared_state);
        std::thread::spawn(move || {
            routes::dispatch(request, state_clone);
        });
    }
    ExitCode::SUCCESS
}
