//! Core data layer for the Xerophyta gene-expression store.
//! This crate owns the schema, the upsert engine and every read query.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use db::{DbError, DbResult, DEFAULT_DATABASE_NAME};
pub use logging::{
    default_log_dir, default_log_level, init_logging, logging_status, LoggingError,
};
pub use model::experiment::{ComparisonSet, DegFilter, Direction};
pub use model::go_term::expand_go_term;
pub use repo::error::{RepoError, RepoResult};
pub use repo::experiment_repo::{
    ExpressionQuery, ExpressionRepository, ExpressionRow, LinkOutcome, EXPRESSION_COLUMNS,
};
pub use repo::gene_repo::GeneRepository;
pub use repo::go_repo::{GeneGoHit, GoRepository};
pub use repo::homologue_repo::{HomologueHit, HomologueRepository};
pub use repo::query::SetMatch;
pub use repo::upsert::{
    lookup_fields, PrimaryKeyed, UpsertEngine, UpsertKind, UpsertOptions, UpsertSummary,
    DEFAULT_BATCH_SIZE,
};
pub use service::loader::{
    BatchLoader, LoadError, LoadOptions, LoadReport, LoadResult, DEFAULT_SPECIES,
};
pub use store::GeneStore;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
