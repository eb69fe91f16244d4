//! State machine module.

pub mod handlers;
pub mod machine;

pub use handlers::{HandleResult, HandlerContext, handle_message, request_config};
pub use machine::{AccessState, LinkState, PortStatus, SessionState};
