//! Push sessions over `WebSocket`: the session registry and the per-session
//! poll-and-push loop.

pub mod registry;
pub mod session;
