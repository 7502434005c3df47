//! Batch loader for the project's CSV and FASTA inputs.
//!
//! # Responsibility
//! - Parse one input file completely into typed records.
//! - Drive the upsert engine and the link operations of [`GeneStore`].
//!
//! # Invariants
//! - A malformed row aborts the load before anything is written.
//! - Expression ids are stored as `<sample id>_<gene name>`.
//! - Experiments referenced by a file are linked to the configured species.

use crate::model::experiment::{
    DifferentialExpression, DifferentialExpressionField, DifferentialExpressionRecord,
    GeneExpression, GeneExpressionRecord,
};
use crate::model::gene::{Gene, GeneField, GeneInfo, GeneInfoRecord, GeneRecord};
use crate::model::go_term::{GoTerm, GoTermRecord};
use crate::model::homologue::{
    common_names_from, extract_arabidopsis_locus, ArabidopsisHomologue,
    ArabidopsisHomologueRecord, CommonName, CommonNameField, CommonNameRecord,
};
use crate::repo::error::RepoError;
use crate::repo::experiment_repo::LinkOutcome;
use crate::repo::upsert::UpsertSummary;
use crate::store::GeneStore;
use bio::io::fasta;
use csv::{ReaderBuilder, Trim};
use log::{error, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Species that loaded genes and experiments belong to by default.
pub const DEFAULT_SPECIES: &str = "Xerophyta elegans";

pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug)]
pub enum LoadError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Csv {
        path: PathBuf,
        source: csv::Error,
    },
    Fasta {
        path: PathBuf,
        message: String,
    },
    /// A row has no value in a column the load needs.
    MissingValue {
        path: PathBuf,
        line: usize,
        column: &'static str,
    },
    Repo(RepoError),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read `{}`: {source}", path.display()),
            Self::Csv { path, source } => {
                write!(f, "malformed CSV in `{}`: {source}", path.display())
            }
            Self::Fasta { path, message } => {
                write!(f, "malformed FASTA in `{}`: {message}", path.display())
            }
            Self::MissingValue { path, line, column } => write!(
                f,
                "`{}` line {line}: missing value for `{column}`",
                path.display()
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
            Self::Fasta { .. } | Self::MissingValue { .. } => None,
        }
    }
}

impl From<RepoError> for LoadError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// What one load did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub inserted: usize,
    pub updated: usize,
    /// New gene ↔ homologue links or gene ↔ GO annotations.
    pub linked: usize,
    /// Referenced experiments already tied to a different species.
    pub conflicts: usize,
}

impl LoadReport {
    fn read(rows_read: usize) -> Self {
        Self {
            rows_read,
            ..Self::default()
        }
    }

    fn add<E>(&mut self, summary: &UpsertSummary<E>) {
        self.inserted += summary.inserted;
        self.updated += summary.updated;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Species that genes and experiments are attached to.
    pub species: String,
    /// Experiment for rows that do not name one.
    pub experiment: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            species: DEFAULT_SPECIES.to_string(),
            experiment: None,
        }
    }
}

/// UniProt id-mapping export row; extra export columns are ignored.
#[derive(Debug, Deserialize)]
struct UniprotRow {
    #[serde(rename = "Hit_ACC")]
    hit_acc: Option<String>,
    #[serde(rename = "Gene Names")]
    gene_names: Option<String>,
    #[serde(rename = "Protein names", default)]
    protein_names: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GeneGoRow {
    gene_name: Option<String>,
    go_id: Option<String>,
}

/// Loads input files into one store.
pub struct BatchLoader<'store> {
    store: &'store mut GeneStore,
    options: LoadOptions,
}

impl<'store> BatchLoader<'store> {
    pub fn new(store: &'store mut GeneStore) -> Self {
        Self::with_options(store, LoadOptions::default())
    }

    pub fn with_options(store: &'store mut GeneStore, options: LoadOptions) -> Self {
        Self { store, options }
    }

    /// Loads a tidy RNA-seq table (one row per gene and sample).
    pub fn load_rna_seq(&mut self, path: impl AsRef<Path>) -> LoadResult<LoadReport> {
        self.logged("rna_seq", path.as_ref(), Self::rna_seq)
    }

    /// Registers every distinct gene of a tidy RNA-seq table.
    pub fn load_gene_names(&mut self, path: impl AsRef<Path>) -> LoadResult<LoadReport> {
        self.logged("gene_names", path.as_ref(), Self::gene_names)
    }

    /// Stores coding sequences keyed by FASTA record id.
    pub fn load_sequences(&mut self, path: impl AsRef<Path>) -> LoadResult<LoadReport> {
        self.logged("sequences", path.as_ref(), Self::sequences)
    }

    /// Loads top-hit annotations (`gene_name`, `sequence_description`, `Hit_ACC`).
    pub fn load_annotations(&mut self, path: impl AsRef<Path>) -> LoadResult<LoadReport> {
        self.logged("annotations", path.as_ref(), Self::annotations)
    }

    /// Loads a UniProt → Arabidopsis mapping and links annotated genes to it.
    pub fn load_uniprot_mapping(&mut self, path: impl AsRef<Path>) -> LoadResult<LoadReport> {
        self.logged("uniprot_mapping", path.as_ref(), Self::uniprot_mapping)
    }

    pub fn load_go_terms(&mut self, path: impl AsRef<Path>) -> LoadResult<LoadReport> {
        self.logged("go_terms", path.as_ref(), Self::go_terms)
    }

    pub fn load_go_annotations(&mut self, path: impl AsRef<Path>) -> LoadResult<LoadReport> {
        self.logged("go_annotations", path.as_ref(), Self::go_annotations)
    }

    pub fn load_differential_expression(
        &mut self,
        path: impl AsRef<Path>,
    ) -> LoadResult<LoadReport> {
        self.logged(
            "differential_expression",
            path.as_ref(),
            Self::differential_expression,
        )
    }

    fn logged<F>(&mut self, kind: &'static str, path: &Path, load: F) -> LoadResult<LoadReport>
    where
        F: FnOnce(&mut Self, &Path) -> LoadResult<LoadReport>,
    {
        let started_at = Instant::now();
        info!(
            "event=load_file module=loader status=start kind={} path={}",
            kind,
            path.display()
        );

        match load(self, path) {
            Ok(report) => {
                info!(
                    "event=load_file module=loader status=ok kind={} rows={} inserted={} updated={} linked={} conflicts={} duration_ms={}",
                    kind,
                    report.rows_read,
                    report.inserted,
                    report.updated,
                    report.linked,
                    report.conflicts,
                    started_at.elapsed().as_millis()
                );
                Ok(report)
            }
            Err(err) => {
                error!(
                    "event=load_file module=loader status=error kind={} duration_ms={} error={}",
                    kind,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn rna_seq(&mut self, path: &Path) -> LoadResult<LoadReport> {
        let mut records: Vec<GeneExpressionRecord> = read_csv(path)?;
        let mut experiments: Vec<String> = Vec::new();

        for (index, record) in records.iter_mut().enumerate() {
            let line = index + 2;
            let id = cell(&record.id, path, line, "id")?;
            let gene_name = cell(&record.gene_name, path, line, "gene_name")?;
            record.id = Some(format!("{id}_{gene_name}"));
            record.gene_name = Some(gene_name);

            if record.experiment_name.is_none() {
                record.experiment_name = self.options.experiment.clone();
            }
            if let Some(name) = &record.experiment_name {
                push_distinct(&mut experiments, name);
            }
        }

        let mut report = LoadReport::read(records.len());
        report.conflicts = self.link_experiments(&experiments)?;
        let summary = self
            .store
            .upsert()
            .upsert_by_primary_key::<GeneExpression, _>(records)?;
        report.add(&summary);
        Ok(report)
    }

    fn gene_names(&mut self, path: &Path) -> LoadResult<LoadReport> {
        let records: Vec<GeneExpressionRecord> = read_csv(path)?;
        let mut gene_names: Vec<String> = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let gene_name = cell(&record.gene_name, path, index + 2, "gene_name")?;
            push_distinct(&mut gene_names, &gene_name);
        }

        let mut report = LoadReport::read(records.len());
        let species = self.store.ensure_species(&self.options.species)?;
        let genes = gene_names
            .into_iter()
            .map(|gene_name| GeneRecord::named(gene_name).in_species(species.id));
        let summary = self
            .store
            .upsert()
            .upsert_by_lookup::<Gene, _>(genes, &[GeneField::SpeciesId, GeneField::GeneName])?;
        report.add(&summary);
        Ok(report)
    }

    fn sequences(&mut self, path: &Path) -> LoadResult<LoadReport> {
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = fasta::Reader::new(BufReader::new(file));

        let mut sequences: Vec<(String, String)> = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|err| LoadError::Fasta {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
            record.check().map_err(|message| LoadError::Fasta {
                path: path.to_path_buf(),
                message: format!("record `{}`: {message}", record.id()),
            })?;
            let sequence = String::from_utf8(record.seq().to_vec()).map_err(|err| {
                LoadError::Fasta {
                    path: path.to_path_buf(),
                    message: format!("record `{}`: {err}", record.id()),
                }
            })?;
            sequences.push((record.id().to_string(), sequence));
        }

        let mut report = LoadReport::read(sequences.len());
        let species = self.store.ensure_species(&self.options.species)?;
        let genes = sequences.into_iter().map(|(gene_name, sequence)| {
            GeneRecord::named(gene_name)
                .in_species(species.id)
                .with_nt_sequence(sequence)
        });
        let summary = self
            .store
            .upsert()
            .upsert_by_lookup::<Gene, _>(genes, &[GeneField::SpeciesId, GeneField::GeneName])?;
        report.add(&summary);
        Ok(report)
    }

    fn annotations(&mut self, path: &Path) -> LoadResult<LoadReport> {
        let records: Vec<GeneInfoRecord> = read_csv(path)?;
        for (index, record) in records.iter().enumerate() {
            cell(&record.gene_name, path, index + 2, "gene_name")?;
        }

        let mut report = LoadReport::read(records.len());
        let summary = self
            .store
            .upsert()
            .upsert_by_primary_key::<GeneInfo, _>(records)?;
        report.add(&summary);
        Ok(report)
    }

    fn uniprot_mapping(&mut self, path: &Path) -> LoadResult<LoadReport> {
        let rows: Vec<UniprotRow> = read_csv(path)?;
        let mut homologues = Vec::with_capacity(rows.len());
        let mut common_names = Vec::new();
        let mut accessions: Vec<String> = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            let accession = cell(&row.hit_acc, path, index + 2, "Hit_ACC")?;
            let gene_names = row.gene_names.as_deref().unwrap_or_default();
            homologues.push(ArabidopsisHomologueRecord {
                accession: Some(accession.clone()),
                at_locus_id: extract_arabidopsis_locus(gene_names),
                description: row.protein_names.clone(),
            });
            for name in common_names_from(gene_names) {
                common_names.push(CommonNameRecord::new(accession.clone(), name));
            }
            push_distinct(&mut accessions, &accession);
        }

        let mut report = LoadReport::read(rows.len());
        let summary = self
            .store
            .upsert()
            .upsert_by_primary_key::<ArabidopsisHomologue, _>(homologues)?;
        report.add(&summary);
        let summary = self.store.upsert().upsert_by_lookup::<CommonName, _>(
            common_names,
            &[CommonNameField::Accession, CommonNameField::Name],
        )?;
        report.add(&summary);
        report.linked = self.store.link_homologues_by_hit(&accessions)?;
        Ok(report)
    }

    fn go_terms(&mut self, path: &Path) -> LoadResult<LoadReport> {
        let records: Vec<GoTermRecord> = read_csv(path)?;
        for (index, record) in records.iter().enumerate() {
            let line = index + 2;
            cell(&record.go_id, path, line, "go_id")?;
            cell(&record.go_name, path, line, "go_name")?;
            if record.canonical_go_id().is_none() {
                return Err(missing(path, line, "category"));
            }
        }

        let mut report = LoadReport::read(records.len());
        let summary = self
            .store
            .upsert()
            .upsert_by_primary_key::<GoTerm, _>(records)?;
        report.add(&summary);
        Ok(report)
    }

    fn go_annotations(&mut self, path: &Path) -> LoadResult<LoadReport> {
        let rows: Vec<GeneGoRow> = read_csv(path)?;
        let mut pairs = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let line = index + 2;
            pairs.push((
                cell(&row.gene_name, path, line, "gene_name")?,
                cell(&row.go_id, path, line, "go_id")?,
            ));
        }

        let mut report = LoadReport::read(rows.len());
        report.linked = self.store.annotate_genes_go(&pairs)?;
        Ok(report)
    }

    fn differential_expression(&mut self, path: &Path) -> LoadResult<LoadReport> {
        let mut records: Vec<DifferentialExpressionRecord> = read_csv(path)?;
        let mut experiments: Vec<String> = Vec::new();

        for (index, record) in records.iter_mut().enumerate() {
            let line = index + 2;
            cell(&record.gene_name, path, line, "gene_name")?;
            if record.experiment_name.is_none() {
                record.experiment_name = self.options.experiment.clone();
            }
            let experiment = cell(&record.experiment_name, path, line, "experiment_name")?;
            push_distinct(&mut experiments, &experiment);
        }

        let mut report = LoadReport::read(records.len());
        report.conflicts = self.link_experiments(&experiments)?;
        let summary = self
            .store
            .upsert()
            .upsert_by_lookup::<DifferentialExpression, _>(
                records,
                &[
                    DifferentialExpressionField::GeneName,
                    DifferentialExpressionField::ExperimentName,
                ],
            )?;
        report.add(&summary);
        Ok(report)
    }

    /// Returns how many experiments were left on another species.
    fn link_experiments(&mut self, experiments: &[String]) -> LoadResult<usize> {
        let mut conflicts = 0;
        for experiment in experiments {
            let outcome = self
                .store
                .link_experiment_species(experiment, &self.options.species)?;
            if matches!(outcome, LinkOutcome::Conflict { .. }) {
                conflicts += 1;
            }
        }
        Ok(conflicts)
    }
}

/// Parses every row of a headed CSV file, failing on the first bad row.
fn read_csv<T: DeserializeOwned>(path: &Path) -> LoadResult<Vec<T>> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(file);

    let mut rows = Vec::new();
    for row in reader.deserialize::<T>() {
        rows.push(row.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?);
    }
    Ok(rows)
}

/// Returns a non-blank cell value or `MissingValue`.
fn cell(
    value: &Option<String>,
    path: &Path,
    line: usize,
    column: &'static str,
) -> LoadResult<String> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(missing(path, line, column)),
    }
}

fn missing(path: &Path, line: usize, column: &'static str) -> LoadError {
    LoadError::MissingValue {
        path: path.to_path_buf(),
        line,
        column,
    }
}

fn push_distinct(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|known| known == value) {
        values.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::{cell, push_distinct, LoadError};
    use std::path::Path;

    #[test]
    fn cell_rejects_blank_values() {
        let path = Path::new("rows.csv");
        assert_eq!(
            cell(&Some(" Xe_0001 ".to_string()), path, 2, "gene_name").unwrap(),
            "Xe_0001"
        );

        let err = cell(&Some("   ".to_string()), path, 7, "gene_name").unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingValue { line: 7, column: "gene_name", .. }
        ));
        assert!(cell(&None, path, 3, "id").is_err());
    }

    #[test]
    fn push_distinct_keeps_first_occurrence_order() {
        let mut values = Vec::new();
        for value in ["b", "a", "b", "c", "a"] {
            push_distinct(&mut values, value);
        }
        assert_eq!(values, vec!["b", "a", "c"]);
    }
}
