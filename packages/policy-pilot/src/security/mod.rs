//! Handling of secrets passed in from configuration.

pub mod credentials;
