//! Use-case services on top of the store.
//!
//! # Responsibility
//! - Turn project input files into upsert and link calls.
//! - Keep the CLI decoupled from storage details.

pub mod loader;
