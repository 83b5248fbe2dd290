//! servd-core: Core types for the servd bootstrap orchestrator
//!
//! This crate provides the fundamental types used throughout servd:
//! - Runtime parameters resolved from the process environment
//! - Bootstrap file configuration
//! - API spec documents and predictor kinds
//! - Startup strategy classification
//! - Error handling

pub mod config;
pub mod error;
pub mod spec;
pub mod strategy;

pub use config::*;
pub use error::*;
pub use spec::*;
pub use strategy::*;
