use std::io::Cursor;
use tiny_http::{Header, Method, Request, Response, StatusCode};
use tracing::debug;

use crate::state::SharedState;
use crate::handlers;

pub type HttpResponse = Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn headers(pairs: &[(&str, &str)]) -> Vec<Header> {
    pairs
        .iter()
        .filter_map(|(field, value)| Header::from_bytes(field.as_bytes(), value.as_bytes()).ok())
        .collect()
}

fn response(status: u16, pairs: &[(&str, &str)], body: Vec<u8>) -> HttpResponse {
    let len = body.len();
    Response::new(StatusCode(status), headers(pairs), Cursor::new(body), Some(len), None)
}

pub fn html_response(body: String) -> HttpResponse {
    response(200, &[("Content-Type", "text/html; charset=utf-8")], body.into_bytes())
}

pub fn redirect(location: &str) -> HttpResponse {
    response(303, &[("Location", location)], Vec::new())
}

pub fn png_response(bytes: Vec<u8>) -> HttpResponse {
    response(200, &[("Content-Type", "image/png"), ("Cache-Control", "no-store")], bytes)
}

pub fn not_found() -> HttpResponse {
    response(404, &[("Content-Type", "text/plain")], b"404 Not Found".to_vec())
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

/// Every page and action the app serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Welcome,
    TryNow,
    Logout,
    Check,
    CheckImage,
    Camera,
    Gallery,
    Detect,
    Cancel,
}

/// Maps a method and path (query already stripped) to its route.
pub fn resolve(method: &Method, path: &str) -> Option<Route> {
    let route = match (method, path) {
        // ── Welcome / Try now ────────────────────────────────────────────
        (Method::Get,  "/")       => Route::Welcome,
        (Method::Get,  "/trynow") => Route::TryNow,
        (Method::Post, "/logout") => Route::Logout,

        // ── Check ────────────────────────────────────────────────────────
        (Method::Get,  "/check")         => Route::Check,
        (Method::Get,  "/check/image")   => Route::CheckImage,
        (Method::Post, "/check/camera")  => Route::Camera,
        (Method::Post, "/check/gallery") => Route::Gallery,
        (Method::Post, "/check/detect")  => Route::Detect,
        (Method::Post, "/check/cancel")  => Route::Cancel,

        _ => return None,
    };
    Some(route)
}

/// Dispatches an incoming request to its handler and sends the response.
pub fn dispatch(mut request: Request, state: SharedState) {
    let method = request.method().clone();
    let url    = request.url().to_owned();
    let path   = url.split('?').next().unwrap_or("");

    debug!(%method, %path, "request");

    let response = match resolve(&method, path) {
        Some(Route::Welcome)    => handlers::screens::handle_welcome(state),
        Some(Route::TryNow)     => handlers::screens::handle_trynow(state),
        Some(Route::Logout)     => handlers::screens::handle_logout(state),
        Some(Route::Check)      => handlers::check::handle_get(state),
        Some(Route::CheckImage) => handlers::check::handle_image(state),
        Some(Route::Camera)     => handlers::check::handle_camera(&mut request, state),
        Some(Route::Gallery)    => handlers::check::handle_gallery(&mut request, state),
        Some(Route::Detect)     => handlers::check::handle_detect(state),
        Some(Route::Cancel)     => handlers::check::handle_cancel(state),
        None                    => not_found(),
    };

    let _ = request.respond(response);
}
