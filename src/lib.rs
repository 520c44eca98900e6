//! nami-bot - a minimal bot host with hot-pluggable functionality
//!
//! The interesting part lives in [`plugins`]: discovery into an immutable
//! registry, durable enabled/auto-load state, hook-gated load/unload, and
//! install/removal through an external package manager.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod plugins;
