//! Push sessions: long-lived WebSocket connections carrying hub events.

mod handler;
mod registry;
mod types;

pub use handler::ws_handler;
pub use registry::{PushBinding, PushRegistry};
pub use types::{ClientFrame, EchoFrame, RegisterFrame};
