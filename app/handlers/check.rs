use std::io::{Cursor, Read};

use image::ImageOutputFormat;
use tiny_http::Request;
use tracing::{info, warn};

use leafscan::{CheckSession, DetectionStatus, Error, ImageSource, ModelState};

use crate::render::{html_escape, render_page, Screen};
use crate::routes::{html_response, not_found, png_response, redirect, HttpResponse};
use crate::state::{lock, AppState, FlashMessage, SharedState};
use crate::util::multipart::{extract_boundary, extract_file};

/// Largest upload accepted, in bytes. Phone photos sit well below this.
const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Longest side of the preview served back to the browser.
const PREVIEW_SIDE: u32 = 480;

// ---------------------------------------------------------------------------
// GET /check
// ---------------------------------------------------------------------------

pub fn handle_get(state: SharedState) -> HttpResponse {
    let mut st = lock(&state);
    let flash = st.take_flash();
    let version = st.image_version;

    let page = match st.session() {
        Ok(session) => {
            session.poll();
            build_check_page(session, version)
        }
        Err(e) => {
            warn!(error = %e, "could not open check session");
            format!(
                r#"<div class="card"><h1>Check your plant</h1><p class="model-status model-missing">{}</p></div>"#,
                html_escape(&e.to_string())
            )
        }
    };
    let busy = st.session.as_ref().map_or(false, CheckSession::is_busy);
    drop(st);

    html_response(render_page(Screen::Check, flash.as_ref(), |t| {
        let head = if busy { r#"<meta http-equiv="refresh" content="1">"# } else { "" };
        t.replace("{{HEAD_EXTRA}}", head).replace("{{CONTENT}}", &page)
    }))
}

fn build_check_page(session: &CheckSession, version: u64) -> String {
    let model_status = match session.detector().model_state() {
        ModelState::Loaded(model) => format!(
            r#"<span class="model-status model-ok">Model ready: {}</span>"#,
            html_escape(&model.describe())
        ),
        ModelState::Unloaded { reason } => format!(
            r#"<span class="model-status model-missing">Model unavailable: {}</span>"#,
            html_escape(reason)
        ),
    };

    let preview = match session.image() {
        Some(selected) => {
            let (w, h) = selected.dimensions();
            format!(
                r#"<img src="/check/image?v={v}" alt="Selected leaf ({w}x{h}, {src})">"#,
                v = version, w = w, h = h, src = selected.source
            )
        }
        None => r#"<span class="hint">No photo selected yet.</span>"#.to_owned(),
    };

    let result = session.result_text().map(|t| html_escape(&t)).unwrap_or_default();
    let can_detect = session.image().is_some() && !session.is_busy();

    let cancel = if session.is_running() {
        r#"<form method="POST" action="/check/cancel"><button type="submit" class="btn">Cancel</button></form>"#
    } else {
        ""
    };

    format!(
        r#"<div class="card">
  <h1>Check your plant</h1>
  {model_status}
  <div class="preview">{preview}</div>
  <div class="actions">
    <form method="POST" action="/check/camera" enctype="multipart/form-data">
      <label class="btn">Take photo
        <input type="file" name="image" accept="image/*" capture="environment" onchange="this.form.submit()">
      </label>
    </form>
    <form method="POST" action="/check/gallery" enctype="multipart/form-data">
      <label class="btn">Choose from gallery
        <input type="file" name="image" accept="image/*" onchange="this.form.submit()">
      </label>
    </form>
  </div>
  <div class="actions">
    <form method="POST" action="/check/detect"><button type="submit" class="btn btn-primary"{disabled}>Detect</button></form>
    {cancel}
    <form method="POST" action="/logout"><button type="submit" class="btn">Log out</button></form>
  </div>
  <div class="result">{result}</div>
</div>"#,
        model_status = model_status,
        preview      = preview,
        disabled     = if can_detect { "" } else { " disabled" },
        cancel       = cancel,
        result       = result,
    )
}

// ---------------------------------------------------------------------------
// GET /check/image
// ---------------------------------------------------------------------------

pub fn handle_image(state: SharedState) -> HttpResponse {
    let thumb = {
        let st = lock(&state);
        match st.session.as_ref().and_then(CheckSession::image) {
            Some(selected) => selected.image.thumbnail(PREVIEW_SIDE, PREVIEW_SIDE),
            None => return not_found(),
        }
    };

    let mut buf = Cursor::new(Vec::new());
    match thumb.write_to(&mut buf, ImageOutputFormat::Png) {
        Ok(()) => png_response(buf.into_inner()),
        Err(e) => {
            warn!(error = %e, "could not encode preview");
            not_found()
        }
    }
}

// ---------------------------------------------------------------------------
// POST /check/camera  and  POST /check/gallery
// ---------------------------------------------------------------------------

pub fn handle_camera(request: &mut Request, state: SharedState) -> HttpResponse {
    handle_upload(request, state, ImageSource::Camera)
}

pub fn handle_gallery(request: &mut Request, state: SharedState) -> HttpResponse {
    handle_upload(request, state, ImageSource::Gallery)
}

fn handle_upload(request: &mut Request, state: SharedState, source: ImageSource) -> HttpResponse {
    let content_type = request.headers().iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_owned())
        .unwrap_or_default();
    let upload = read_upload(&content_type, request.as_reader());

    accept_upload(&mut lock(&state), source, upload);
    redirect("/check")
}

/// Reads a multipart body and returns the bytes of its `image` part.
fn read_upload<R: Read + ?Sized>(content_type: &str, body: &mut R) -> Result<Vec<u8>, String> {
    let boundary = extract_boundary(content_type)
        .ok_or_else(|| "Expected a multipart upload.".to_owned())?;

    let mut bytes = Vec::new();
    body.take(MAX_UPLOAD_BYTES + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| format!("Could not read the upload: {}", e))?;
    if bytes.len() as u64 > MAX_UPLOAD_BYTES {
        return Err("That photo is too large.".into());
    }

    match extract_file(&bytes, &boundary, "image") {
        Some(file) if !file.is_empty() => Ok(file),
        _ => Err("No photo was selected.".into()),
    }
}

/// Hands an uploaded photo to the session and leaves a flash for the page.
fn accept_upload(st: &mut AppState, source: ImageSource, upload: Result<Vec<u8>, String>) {
    let flash = match upload {
        Ok(bytes) => match st.session().and_then(|session| session.set_image_bytes(source, &bytes)) {
            Ok(()) => {
                st.image_version += 1;
                FlashMessage::success(format!("Photo loaded from {}.", source))
            }
            Err(e) => {
                warn!(%source, error = %e, "image rejected");
                FlashMessage::error(format!("Could not use that photo: {}", e))
            }
        },
        Err(msg) => FlashMessage::error(msg),
    };
    st.flash = Some(flash);
}

// ---------------------------------------------------------------------------
// POST /check/detect
// ---------------------------------------------------------------------------

pub fn handle_detect(state: SharedState) -> HttpResponse {
    start_detection(&mut lock(&state));
    redirect("/check")
}

fn start_detection(st: &mut AppState) {
    match st.session().and_then(CheckSession::start_detection) {
        Ok(()) => info!("detection started"),
        Err(Error::Busy) => {
            st.flash = Some(FlashMessage::error("A detection is already running."));
        }
        Err(e) => {
            warn!(error = %e, "detection not started");
            st.flash = Some(FlashMessage::error(e.to_string()));
        }
    }
}

// ---------------------------------------------------------------------------
// POST /check/cancel
// ---------------------------------------------------------------------------

pub fn handle_cancel(state: SharedState) -> HttpResponse {
    cancel_detection(&mut lock(&state));
    redirect("/check")
}

fn cancel_detection(st: &mut AppState) {
    let Some(session) = st.session.as_mut() else { return };
    session.poll();
    if !session.cancel() && matches!(session.status(), DetectionStatus::Done(_)) {
        st.flash = Some(FlashMessage::error("Detection had already finished."));
    }
}
