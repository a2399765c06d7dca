//! Parley API Library Crate
//!
//! Hosts the demos over HTTP: a small REST surface that lists the demos and
//! their tools, and a WebSocket endpoint that runs one conversation per
//! connection. The `api` binary is a thin wrapper around this library.

pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;

pub use parley_demos::config;
