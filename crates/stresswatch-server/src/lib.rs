//! Stresswatch server library - HTTP/WebSocket surface over the live session
//! coordinator.
//!
//! Routes, WebSocket handlers and application state live here so integration
//! tests can build the router without the binary.

pub mod config;
pub mod global_ws;
pub mod logging;
pub mod routes;
pub mod state;
