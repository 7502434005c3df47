//! Repository layer: the upsert engine and read-only query facades.
//!
//! # Responsibility
//! - Describe every table to the generic upsert engine.
//! - Expose use-case oriented, read-only queries per entity group.
//! - Isolate SQLite query details from the loader and the CLI.
//!
//! # Invariants
//! - Query facades never write.
//! - "Not found" is an empty result, never an error.

pub mod error;
pub mod experiment_repo;
pub mod gene_repo;
pub mod go_repo;
pub mod homologue_repo;
pub mod query;
pub mod upsert;
