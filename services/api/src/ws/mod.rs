//! WebSocket Session Management
//!
//! - `protocol`: the JSON message format between client and server.
//! - `channel`: the data channel that pushes agent transcript payloads.
//! - `session`: the connection lifecycle, from `init` to close.

pub mod channel;
pub mod protocol;
pub mod session;

pub use session::ws_handler;
