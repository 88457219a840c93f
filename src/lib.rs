//! Intake chat — a scripted vaccination-scheduling assistant with a REST
//! backend and optimistic client-side message sync.

pub mod api;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod model;
pub mod repl;
pub mod store;
pub mod sync;
