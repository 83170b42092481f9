use std::io::Cursor;

use serde::Serialize;
use serde_json::json;
use tiny_http::{Header, Method, Request, Response, StatusCode};
use tracing::{error, info, warn};

use crate::handlers;
use crate::state::SharedState;

pub type JsonResponse = Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

pub fn json_response<T: Serialize>(status: u16, body: &T) -> JsonResponse {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "cannot serialise response body");
            return error_response(500, "internal error");
        }
    };
    let len = bytes.len();
    let headers: Vec<Header> = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .ok()
        .into_iter()
        .collect();
    Response::new(StatusCode(status), headers, Cursor::new(bytes), Some(len), None)
}

pub fn error_response(status: u16, message: &str) -> JsonResponse {
    let bytes = json!({ "error": message }).to_string().into_bytes();
    let len = bytes.len();
    let headers: Vec<Header> = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .ok()
        .into_iter()
        .collect();
    Response::new(StatusCode(status), headers, Cursor::new(bytes), Some(len), None)
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

/// Routes one request and writes its response.
pub fn dispatch(mut request: Request, state: SharedState) {
    let response = route(&mut request, &state);
    let url = request.url().to_owned();
    if let Err(e) = request.respond(response) {
        warn!(error = %e, url = %url, "failed to send response");
    }
}

pub fn route(request: &mut Request, state: &SharedState) -> JsonResponse {
    let method = request.method().clone();
    let url    = request.url().to_owned();
    let path   = url.split('?').next().unwrap_or("");

    info!(method = %method, path = %path, "request");

    match (&method, path) {
        (Method::Post, "/api/predict") => handlers::predict::handle(request, state),
        (Method::Get,  "/api/status")  => handlers::status::handle_status(state),
        (Method::Get,  "/api/health")  => handlers::status::handle_health(),
        _ => error_response(404, "not found"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::Value;
    use tiny_http::TestRequest;

    use crate::state::tests::test_state;

    /// Status code and decoded JSON body.
    pub(crate) fn read(response: JsonResponse) -> (u16, Value) {
        let status = response.status_code().0;
        let body = response.into_reader().into_inner();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn unknown_route_is_json_404() {
        let (_dir, state) = test_state(&[]);
        let mut request: Request = TestRequest::new().with_method(Method::Get).with_path("/api/nope").into();
        let (status, body) = read(route(&mut request, &state));
        assert_eq!(status, 404);
        assert_eq!(body["error"], "not found");
    }

    #[test]
    fn wrong_method_is_404() {
        let (_dir, state) = test_state(&[]);
        let mut request: Request = TestRequest::new().with_method(Method::Get).with_path("/api/predict").into();
        assert_eq!(read(route(&mut request, &state)).0, 404);
    }

    #[test]
    fn health_ignores_query_string() {
        let (_dir, state) = test_state(&[]);
        let mut request: Request = TestRequest::new().with_method(Method::Get).with_path("/api/health?verbose=1").into();
        let (status, body) = read(route(&mut request, &state));
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
    }
}
