//! jsbox – run untrusted JavaScript snippets safely
//!
//! This crate implements a parse → transform → sandboxed-execute →
//! result-assembly pipeline:
//! - A hand-written parser for a JavaScript subset, producing a spanned syntax tree
//! - Pure, idempotent rewrite rules and code generation back to source text
//! - A tree-walking interpreter that runs each program in a fresh context
//!   under wall-clock, heap, call-depth and output limits
//! - A single response record for every submission, failures included
//! - An NDJSON service (stdio or TCP) and a CLI on top

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Pipeline facade, configuration and response assembly
pub mod pipeline;

/// Isolated, time-limited execution
pub mod sandbox;

/// NDJSON front end
pub mod service;

/// Parsing and code generation
pub mod syntax;

/// Program rewriting
pub mod transform;

// Re-export key types for convenience
pub use pipeline::{Pipeline, PipelineConfig, PipelineResponse};

/// Current version of jsbox
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
