use tracing::info;

use crate::render::{render_page, Screen};
use crate::routes::{html_response, redirect, HttpResponse};
use crate::state::{lock, FlashMessage, SharedState};

// ---------------------------------------------------------------------------
// GET /
// ---------------------------------------------------------------------------

pub fn handle_welcome(state: SharedState) -> HttpResponse {
    let flash = lock(&state).take_flash();

    let content = r#"<div class="card">
  <h1>Leafscan</h1>
  <p>Spot plant leaf disease from a single photo.</p>
  <p class="hint">Photos stay on this machine. Nothing is uploaded anywhere else.</p>
  <div class="actions">
    <a class="btn btn-primary" href="/trynow">Get started</a>
  </div>
</div>"#;

    html_response(render_page(Screen::Welcome, flash.as_ref(), |t| {
        t.replace("{{CONTENT}}", content)
    }))
}

// ---------------------------------------------------------------------------
// GET /trynow
// ---------------------------------------------------------------------------

pub fn handle_trynow(state: SharedState) -> HttpResponse {
    let flash = lock(&state).take_flash();

    let content = r#"<div class="card">
  <h1>Try it now</h1>
  <p>Take a photo of one leaf, or pick one from your gallery, and leafscan
     will estimate how likely it is to be diseased.</p>
  <p class="hint">Fill the frame with the leaf and avoid strong shadows.</p>
  <div class="actions">
    <a class="btn btn-primary" href="/check">Check a plant</a>
    <a class="btn" href="/">Back</a>
  </div>
</div>"#;

    html_response(render_page(Screen::TryNow, flash.as_ref(), |t| {
        t.replace("{{CONTENT}}", content)
    }))
}

// ---------------------------------------------------------------------------
// POST /logout
// ---------------------------------------------------------------------------

pub fn handle_logout(state: SharedState) -> HttpResponse {
    let mut st = lock(&state);
    st.close_session();
    st.flash = Some(FlashMessage::success("Logged out"));
    info!("logged out");
    redirect("/")
}
