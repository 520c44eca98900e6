//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Services: Command dispatch
//! - Errors: Domain-specific errors

pub mod errors;
pub mod services;
