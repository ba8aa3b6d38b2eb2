//! HTTP handler modules for the writethru API.
//!
//! Handlers are thin: they parse requests, call into [`AppState`] or the
//! proxy, and return JSON responses.
//!
//! [`AppState`]: crate::state::AppState

pub mod proxy;
pub mod sessions;
pub mod targets;
