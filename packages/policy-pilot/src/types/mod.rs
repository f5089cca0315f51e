//! Core data types.

pub mod company;
pub mod config;
pub mod matching;
pub mod policy;
pub mod stats;
