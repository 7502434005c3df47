//! Process-wide store context.
//!
//! # Responsibility
//! - Own the single SQLite connection for the lifetime of the process.
//! - Hand out the upsert engine and borrowed read-only repositories.
//! - Run the get-or-create and link operations that span several tables.
//!
//! # Invariants
//! - Every connection handed out has migrations applied.
//! - Link operations never overwrite an existing experiment → species link.

use crate::db::{open_db, open_db_in_memory, recreate_db, DbResult};
use crate::model::experiment::{Experiment, ExperimentField, ExperimentRecord};
use crate::model::gene::{GeneId, Species, SpeciesField, SpeciesRecord};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::experiment_repo::{
    link_species, ExpressionRepository, LinkOutcome, SqliteExpressionRepository,
};
use crate::repo::gene_repo::{GeneRepository, SqliteGeneRepository};
use crate::repo::go_repo::{annotate_gene, GoRepository, SqliteGoRepository};
use crate::repo::homologue_repo::{
    link_gene_homologue, link_genes_by_hit_accession, SqliteHomologueRepository,
};
use crate::repo::upsert::{UpsertEngine, UpsertOptions};
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;

/// Owns the connection and the write options shared by every operation.
pub struct GeneStore {
    conn: Connection,
    options: UpsertOptions,
}

impl GeneStore {
    /// Opens (or creates) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Deletes the store at `path` and starts over with an empty schema.
    pub fn recreate(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(recreate_db(path)?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            options: UpsertOptions::default(),
        }
    }

    pub fn with_options(mut self, options: UpsertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> UpsertOptions {
        self.options
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Upsert engine bound to this store's connection and options.
    pub fn upsert(&mut self) -> UpsertEngine<'_> {
        UpsertEngine::with_options(&mut self.conn, self.options)
    }

    pub fn genes(&self) -> SqliteGeneRepository<'_> {
        SqliteGeneRepository::new(&self.conn)
    }

    pub fn expressions(&self) -> SqliteExpressionRepository<'_> {
        SqliteExpressionRepository::new(&self.conn)
    }

    pub fn go_terms(&self) -> SqliteGoRepository<'_> {
        SqliteGoRepository::new(&self.conn)
    }

    pub fn homologues(&self) -> SqliteHomologueRepository<'_> {
        SqliteHomologueRepository::new(&self.conn)
    }

    /// Returns the species named `name`, creating it when missing.
    pub fn ensure_species(&mut self, name: &str) -> RepoResult<Species> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::IncompleteRecord {
                kind: "species",
                field: "name",
            });
        }
        if let Some(species) = self.genes().species_by_name(name)? {
            return Ok(species);
        }

        let summary = self.upsert().upsert_by_lookup::<Species, _>(
            [SpeciesRecord::named(name)],
            &[SpeciesField::Name],
        )?;
        summary.last.ok_or_else(|| missing_result("species", name))
    }

    /// Returns the experiment named `name`, creating it unlinked when missing.
    pub fn ensure_experiment(&mut self, name: &str) -> RepoResult<Experiment> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::IncompleteRecord {
                kind: "experiments",
                field: "experiment_name",
            });
        }
        if let Some(experiment) = self.expressions().experiment_by_name(name)? {
            return Ok(experiment);
        }

        let summary = self.upsert().upsert_by_lookup::<Experiment, _>(
            [ExperimentRecord::named(name)],
            &[ExperimentField::ExperimentName],
        )?;
        summary.last.ok_or_else(|| missing_result("experiments", name))
    }

    /// Get-or-creates both sides and links the experiment to the species.
    ///
    /// A conflicting existing link is reported as [`LinkOutcome::Conflict`]
    /// and left untouched.
    pub fn link_experiment_species(
        &mut self,
        experiment_name: &str,
        species_name: &str,
    ) -> RepoResult<LinkOutcome> {
        let species = self.ensure_species(species_name)?;
        let experiment = self.ensure_experiment(experiment_name)?;
        link_species(&self.conn, &experiment, &species)
    }

    /// Links a stored gene to a stored homologue; `false` if already linked.
    pub fn link_gene_homologue(&self, gene_id: GeneId, accession: &str) -> RepoResult<bool> {
        link_gene_homologue(&self.conn, gene_id, accession.trim())
    }

    /// Annotates `gene_name` with a stored GO term.
    ///
    /// An unprefixed `go_id` resolves to the first stored category in
    /// `C`, `F`, `P` order. Returns `false` when the annotation already existed.
    pub fn annotate_gene_go(&self, gene_name: &str, go_id: &str) -> RepoResult<bool> {
        annotate_resolved(&self.conn, gene_name, go_id)
    }

    /// Annotates every `(gene_name, go_id)` pair in one transaction.
    ///
    /// Returns the number of new annotations. An unknown term rolls the
    /// whole set back.
    pub fn annotate_genes_go(&mut self, pairs: &[(String, String)]) -> RepoResult<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut added = 0;
        for (gene_name, go_id) in pairs {
            if annotate_resolved(&tx, gene_name, go_id)? {
                added += 1;
            }
        }
        tx.commit()?;
        Ok(added)
    }

    /// Links every gene whose annotation hit is one of `accessions` to that
    /// homologue, in one transaction. Returns the number of new links.
    pub fn link_homologues_by_hit(&mut self, accessions: &[String]) -> RepoResult<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut linked = 0;
        for accession in accessions {
            linked += link_genes_by_hit_accession(&tx, accession.trim())?;
        }
        tx.commit()?;
        Ok(linked)
    }
}

fn annotate_resolved(conn: &Connection, gene_name: &str, go_id: &str) -> RepoResult<bool> {
    let term = SqliteGoRepository::new(conn)
        .go_term(go_id)?
        .ok_or_else(|| RepoError::UnknownReference {
            kind: "go_terms",
            key: go_id.trim().to_string(),
        })?;
    annotate_gene(conn, gene_name.trim(), &term.go_id)
}

fn missing_result(kind: &'static str, key: &str) -> RepoError {
    RepoError::InvalidData(format!("upsert into `{kind}` returned no row for `{key}`"))
}
