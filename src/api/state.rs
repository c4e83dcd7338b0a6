//! Application state shared across handlers.

use std::sync::Arc;

use crate::hub::Hub;
use crate::sharedfs::SharedFs;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The hub service: rooms, agents, messages, tasks, memory, notifications.
    pub hub: Arc<Hub>,
    /// Sandboxed shared workspace.
    pub files: SharedFs,
}

impl AppState {
    pub fn new(hub: Arc<Hub>, files: SharedFs) -> Self {
        Self { hub, files }
    }
}
