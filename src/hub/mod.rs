//! Authoritative hub state and the service orchestrating it.

mod service;
mod state;

pub use service::{Hub, HubStats, JoinOutcome, NewTask, RoomStats, RoomSummary, TaskPatch};
pub use state::{HubState, RoomInner, RoomState};
