use std::sync::{Arc, Mutex, MutexGuard};

use leafscan::{CheckSession, Config, Result};

// ---------------------------------------------------------------------------
// Flash messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum FlashKind { Success, Error }

#[derive(Debug, Clone)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub text: String,
}

impl FlashMessage {
    pub fn success(text: impl Into<String>) -> Self {
        FlashMessage { kind: FlashKind::Success, text: text.into() }
    }
    pub fn error(text: impl Into<String>) -> Self {
        FlashMessage { kind: FlashKind::Error, text: text.into() }
    }
}

// ---------------------------------------------------------------------------
// Main state struct
// ---------------------------------------------------------------------------

pub struct AppState {
    pub config: Config,
    /// The check screen. Opened on first visit, closed on logout.
    pub session: Option<CheckSession>,
    /// One-shot flash message for the next page render.
    pub flash: Option<FlashMessage>,
    /// Bumped on every new image so the browser refetches the preview.
    pub image_version: u64,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState { config, session: None, flash: None, image_version: 0 }
    }

    /// The check screen session, opening it (and loading the model) if needed.
    pub fn session(&mut self) -> Result<&mut CheckSession> {
        let session = match self.session.take() {
            Some(session) => session,
            None => CheckSession::open(&self.config)?,
        };
        Ok(self.session.insert(session))
    }

    /// Closes the check screen and releases its model.
    pub fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }

    /// Takes and returns the current flash message, clearing it.
    pub fn take_flash(&mut self) -> Option<FlashMessage> {
        self.flash.take()
    }
}

/// Shared state type — an `Arc<Mutex<AppState>>` passed to every handler.
pub type SharedState = Arc<Mutex<AppState>>;

/// Locks the shared state. A handler that panicked while holding the lock
/// leaves the state as it was; later requests keep using it.
pub fn lock(state: &SharedState) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
