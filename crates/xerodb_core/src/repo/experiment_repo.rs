//! Experiment, expression and differential-expression persistence.
//!
//! # Responsibility
//! - Describe `experiments`, `gene_expressions` and `differential_expressions`
//!   to the upsert engine.
//! - Guard the write-once experiment → species link.
//! - Serve the joined, DEG-faceted expression table.
//!
//! # Invariants
//! - An experiment linked to one species is never relinked to another.
//! - Expression table columns always come in `EXPRESSION_COLUMNS` order.

use crate::model::experiment::{
    ComparisonSet, DegFilter, DifferentialExpression, DifferentialExpressionField,
    DifferentialExpressionRecord, Direction, Experiment, ExperimentField, ExperimentRecord,
    GeneExpression, GeneExpressionField, GeneExpressionRecord,
};
use crate::model::gene::Species;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::gene_repo::collect_strings;
use crate::repo::query::{MatchKey, SetMatch};
use crate::repo::upsert::{
    integer_value, real_value, required, text_value, PrimaryKeyed, UpsertKind,
};
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;

/// Column order of [`ExpressionRow`] for positional consumers.
pub const EXPRESSION_COLUMNS: [&str; 7] = [
    "gene_name",
    "experiment_name",
    "treatment",
    "time",
    "replicate",
    "normalised_expression",
    "log2_expression",
];

/// One row of the expression table; fields follow `EXPRESSION_COLUMNS`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpressionRow {
    pub gene_name: String,
    pub experiment_name: Option<String>,
    pub treatment: Option<String>,
    pub time: Option<String>,
    pub replicate: Option<i64>,
    pub normalised_expression: Option<f64>,
    pub log2_expression: Option<f64>,
}

/// Filter for [`ExpressionRepository::expression_table`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionQuery {
    pub experiment_name: String,
    /// `None` keeps every gene; `Some(empty)` yields an empty table.
    pub genes: Option<Vec<String>>,
    pub deg_filter: DegFilter,
    pub comparison: ComparisonSet,
}

impl ExpressionQuery {
    pub fn for_experiment(experiment_name: impl Into<String>) -> Self {
        Self {
            experiment_name: experiment_name.into(),
            ..Self::default()
        }
    }
}

/// Result of linking an experiment to a species.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    /// The experiment already pointed at the requested species.
    AlreadyLinked,
    /// The experiment points at another species; nothing was changed.
    Conflict { existing: Species },
}

impl UpsertKind for Experiment {
    const KIND: &'static str = "experiments";
    const SELECT_SQL: &'static str =
        "SELECT id, experiment_name, species_id, description FROM experiments";

    type Field = ExperimentField;
    type Record = ExperimentRecord;

    fn lookup_value(record: &ExperimentRecord, field: ExperimentField) -> Option<Value> {
        match field {
            ExperimentField::ExperimentName => text_value(&record.experiment_name),
            ExperimentField::Description => text_value(&record.description),
        }
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            experiment_name: row.get("experiment_name")?,
            species_id: row.get("species_id")?,
            description: row.get("description")?,
        })
    }

    fn merge(&mut self, record: &ExperimentRecord) {
        self.apply(record);
    }

    fn insert(conn: &Connection, record: &ExperimentRecord) -> RepoResult<Self> {
        let name = required(&record.experiment_name, Self::KIND, "experiment_name")?;
        conn.execute(
            "INSERT INTO experiments (experiment_name, description) VALUES (?1, ?2);",
            params![name, record.description.as_deref()],
        )?;
        Ok(Self {
            id: conn.last_insert_rowid(),
            experiment_name: name.clone(),
            species_id: None,
            description: record.description.clone(),
        })
    }

    // Leaves `species_id` alone; `link_species` owns it.
    fn update(&self, conn: &Connection, stored: &Self) -> RepoResult<usize> {
        Ok(conn.execute(
            "UPDATE experiments SET experiment_name = ?2, description = ?3 WHERE id = ?1;",
            params![stored.id, self.experiment_name, self.description.as_deref()],
        )?)
    }
}

impl UpsertKind for GeneExpression {
    const KIND: &'static str = "gene_expressions";
    const SELECT_SQL: &'static str = "SELECT
        id,
        gene_name,
        experiment_name,
        treatment,
        time,
        replicate,
        normalised_expression,
        log2_expression
    FROM gene_expressions";

    type Field = GeneExpressionField;
    type Record = GeneExpressionRecord;

    fn lookup_value(record: &GeneExpressionRecord, field: GeneExpressionField) -> Option<Value> {
        match field {
            GeneExpressionField::Id => text_value(&record.id),
            GeneExpressionField::GeneName => text_value(&record.gene_name),
            GeneExpressionField::ExperimentName => text_value(&record.experiment_name),
            GeneExpressionField::Treatment => text_value(&record.treatment),
            GeneExpressionField::Time => text_value(&record.time),
            GeneExpressionField::Replicate => integer_value(record.replicate),
            GeneExpressionField::NormalisedExpression => real_value(record.normalised_expression),
            GeneExpressionField::Log2Expression => real_value(record.log2_expression),
        }
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        parse_expression_row(row)
    }

    fn merge(&mut self, record: &GeneExpressionRecord) {
        self.apply(record);
    }

    fn insert(conn: &Connection, record: &GeneExpressionRecord) -> RepoResult<Self> {
        let id = required(&record.id, Self::KIND, "id")?;
        let gene_name = required(&record.gene_name, Self::KIND, "gene_name")?;
        let expression = GeneExpression {
            id: id.clone(),
            gene_name: gene_name.clone(),
            experiment_name: record.experiment_name.clone(),
            treatment: record.treatment.clone(),
            time: record.time.clone(),
            replicate: record.replicate,
            normalised_expression: record.normalised_expression,
            log2_expression: record.log2_expression,
        };
        conn.execute(
            "INSERT INTO gene_expressions (
                id,
                gene_name,
                experiment_name,
                treatment,
                time,
                replicate,
                normalised_expression,
                log2_expression
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                expression.id,
                expression.gene_name,
                expression.experiment_name.as_deref(),
                expression.treatment.as_deref(),
                expression.time.as_deref(),
                expression.replicate,
                expression.normalised_expression,
                expression.log2_expression,
            ],
        )?;
        Ok(expression)
    }

    fn update(&self, conn: &Connection, stored: &Self) -> RepoResult<usize> {
        Ok(conn.execute(
            "UPDATE gene_expressions
             SET
                id = ?9,
                gene_name = ?2,
                experiment_name = ?3,
                treatment = ?4,
                time = ?5,
                replicate = ?6,
                normalised_expression = ?7,
                log2_expression = ?8
             WHERE id = ?1;",
            params![
                stored.id,
                self.gene_name,
                self.experiment_name.as_deref(),
                self.treatment.as_deref(),
                self.time.as_deref(),
                self.replicate,
                self.normalised_expression,
                self.log2_expression,
                self.id,
            ],
        )?)
    }
}

impl MatchKey for GeneExpression {
    type Key = String;

    fn match_key(&self) -> String {
        self.id.clone()
    }
}

impl PrimaryKeyed for GeneExpression {
    const PRIMARY_KEY: GeneExpressionField = GeneExpressionField::Id;
}

impl UpsertKind for DifferentialExpression {
    const KIND: &'static str = "differential_expressions";
    const SELECT_SQL: &'static str = "SELECT
        id,
        gene_name,
        experiment_name,
        re_set,
        re_direction,
        de_set,
        de_direction
    FROM differential_expressions";

    type Field = DifferentialExpressionField;
    type Record = DifferentialExpressionRecord;

    fn lookup_value(
        record: &DifferentialExpressionRecord,
        field: DifferentialExpressionField,
    ) -> Option<Value> {
        match field {
            DifferentialExpressionField::GeneName => text_value(&record.gene_name),
            DifferentialExpressionField::ExperimentName => text_value(&record.experiment_name),
            DifferentialExpressionField::ReSet => text_value(&record.re_set),
            DifferentialExpressionField::ReDirection => record
                .re_direction
                .map(|direction| Value::Text(direction.as_db().to_string())),
            DifferentialExpressionField::DeSet => text_value(&record.de_set),
            DifferentialExpressionField::DeDirection => record
                .de_direction
                .map(|direction| Value::Text(direction.as_db().to_string())),
        }
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            gene_name: row.get("gene_name")?,
            experiment_name: row.get("experiment_name")?,
            re_set: row.get("re_set")?,
            re_direction: parse_direction(row, "re_direction")?,
            de_set: row.get("de_set")?,
            de_direction: parse_direction(row, "de_direction")?,
        })
    }

    fn merge(&mut self, record: &DifferentialExpressionRecord) {
        self.apply(record);
    }

    fn insert(conn: &Connection, record: &DifferentialExpressionRecord) -> RepoResult<Self> {
        let gene_name = required(&record.gene_name, Self::KIND, "gene_name")?;
        let experiment_name = required(&record.experiment_name, Self::KIND, "experiment_name")?;
        conn.execute(
            "INSERT INTO differential_expressions (
                gene_name,
                experiment_name,
                re_set,
                re_direction,
                de_set,
                de_direction
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                gene_name,
                experiment_name,
                record.re_set.as_deref(),
                record.re_direction.map(Direction::as_db),
                record.de_set.as_deref(),
                record.de_direction.map(Direction::as_db),
            ],
        )?;
        Ok(Self {
            id: conn.last_insert_rowid(),
            gene_name: gene_name.clone(),
            experiment_name: experiment_name.clone(),
            re_set: record.re_set.clone(),
            re_direction: record.re_direction,
            de_set: record.de_set.clone(),
            de_direction: record.de_direction,
        })
    }

    fn update(&self, conn: &Connection, stored: &Self) -> RepoResult<usize> {
        Ok(conn.execute(
            "UPDATE differential_expressions
             SET
                gene_name = ?2,
                experiment_name = ?3,
                re_set = ?4,
                re_direction = ?5,
                de_set = ?6,
                de_direction = ?7
             WHERE id = ?1;",
            params![
                stored.id,
                self.gene_name,
                self.experiment_name,
                self.re_set.as_deref(),
                self.re_direction.map(Direction::as_db),
                self.de_set.as_deref(),
                self.de_direction.map(Direction::as_db),
            ],
        )?)
    }
}

/// Links `experiment` to `species` unless it is already linked elsewhere.
///
/// A conflicting link is logged and reported, never overwritten.
pub fn link_species(
    conn: &Connection,
    experiment: &Experiment,
    species: &Species,
) -> RepoResult<LinkOutcome> {
    let changed = conn.execute(
        "UPDATE experiments SET species_id = ?2 WHERE id = ?1 AND species_id IS NULL;",
        params![experiment.id, species.id],
    )?;
    if changed == 1 {
        return Ok(LinkOutcome::Linked);
    }

    let existing = conn.query_row(
        "SELECT s.id, s.name
         FROM experiments e
         INNER JOIN species s ON s.id = e.species_id
         WHERE e.id = ?1;",
        [experiment.id],
        |row| {
            Ok(Species {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )?;

    if existing.id == species.id {
        return Ok(LinkOutcome::AlreadyLinked);
    }

    warn!(
        "event=link_conflict module=repo status=skipped experiment={} existing_species={} requested_species={}",
        experiment.experiment_name, existing.name, species.name
    );
    Ok(LinkOutcome::Conflict { existing })
}

/// Read-only experiment and expression queries.
pub trait ExpressionRepository {
    fn experiment_by_name(&self, name: &str) -> RepoResult<Option<Experiment>>;
    fn experiments(&self) -> RepoResult<Vec<Experiment>>;
    fn expression_for_gene(&self, gene_name: &str) -> RepoResult<Vec<GeneExpression>>;
    /// Measurements for every listed gene plus the genes that had none.
    fn expression_for_genes(&self, gene_names: &[String]) -> RepoResult<SetMatch<GeneExpression>>;
    fn genes_with_expression_data(&self) -> RepoResult<Vec<String>>;
    fn differential_expression(
        &self,
        gene_name: &str,
        experiment_name: &str,
    ) -> RepoResult<Option<DifferentialExpression>>;
    /// Expression rows of one experiment, faceted by DEG classification.
    fn expression_table(&self, query: &ExpressionQuery) -> RepoResult<Vec<ExpressionRow>>;
}

pub struct SqliteExpressionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteExpressionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ExpressionRepository for SqliteExpressionRepository<'_> {
    fn experiment_by_name(&self, name: &str) -> RepoResult<Option<Experiment>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE experiment_name = ?1;", Experiment::SELECT_SQL))?;
        let mut rows = stmt.query([name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(Experiment::from_row(row)?));
        }
        Ok(None)
    }

    fn experiments(&self) -> RepoResult<Vec<Experiment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} ORDER BY experiment_name ASC;",
            Experiment::SELECT_SQL
        ))?;
        let mut rows = stmt.query([])?;
        let mut experiments = Vec::new();
        while let Some(row) = rows.next()? {
            experiments.push(Experiment::from_row(row)?);
        }
        Ok(experiments)
    }

    fn expression_for_gene(&self, gene_name: &str) -> RepoResult<Vec<GeneExpression>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{}
             WHERE gene_name = ?1
             ORDER BY experiment_name ASC, treatment ASC, time ASC, replicate ASC, id ASC;",
            GeneExpression::SELECT_SQL
        ))?;
        let mut rows = stmt.query([gene_name.trim()])?;
        let mut expressions = Vec::new();
        while let Some(row) = rows.next()? {
            expressions.push(parse_expression_row(row)?);
        }
        Ok(expressions)
    }

    fn expression_for_genes(&self, gene_names: &[String]) -> RepoResult<SetMatch<GeneExpression>> {
        SetMatch::collect(gene_names, |gene_name| self.expression_for_gene(gene_name))
    }

    fn genes_with_expression_data(&self) -> RepoResult<Vec<String>> {
        collect_strings(
            self.conn,
            "SELECT DISTINCT gene_name FROM gene_expressions ORDER BY gene_name ASC;",
        )
    }

    fn differential_expression(
        &self,
        gene_name: &str,
        experiment_name: &str,
    ) -> RepoResult<Option<DifferentialExpression>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE gene_name = ?1 AND experiment_name = ?2;",
            DifferentialExpression::SELECT_SQL
        ))?;
        let mut rows = stmt.query([gene_name, experiment_name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(DifferentialExpression::from_row(row)?));
        }
        Ok(None)
    }

    fn expression_table(&self, query: &ExpressionQuery) -> RepoResult<Vec<ExpressionRow>> {
        let mut sql = String::from(
            "SELECT
                ge.gene_name,
                ge.experiment_name,
                ge.treatment,
                ge.time,
                ge.replicate,
                ge.normalised_expression,
                ge.log2_expression
             FROM gene_expressions ge
             LEFT JOIN differential_expressions de
                ON de.gene_name = ge.gene_name
               AND de.experiment_name = ge.experiment_name
             WHERE ge.experiment_name = ?",
        );
        let mut bind_values: Vec<Value> = vec![Value::Text(query.experiment_name.clone())];

        if let Some(genes) = query.genes.as_ref() {
            if genes.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; genes.len()].join(", ");
            sql.push_str(&format!(" AND ge.gene_name IN ({placeholders})"));
            bind_values.extend(genes.iter().map(|gene| Value::Text(gene.trim().to_string())));
        }

        let direction = query.comparison.direction_column();
        match query.deg_filter {
            DegFilter::ShowAll => {}
            DegFilter::ShowDeg => sql.push_str(&format!(" AND de.{direction} IS NOT NULL")),
            DegFilter::ShowUp => {
                sql.push_str(&format!(" AND de.{direction} = ?"));
                bind_values.push(Value::Text(Direction::Up.as_db().to_string()));
            }
            DegFilter::ShowDown => {
                sql.push_str(&format!(" AND de.{direction} = ?"));
                bind_values.push(Value::Text(Direction::Down.as_db().to_string()));
            }
        }

        sql.push_str(
            " ORDER BY ge.gene_name ASC, ge.treatment ASC, ge.time ASC, ge.replicate ASC, ge.id ASC;",
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut table = Vec::new();
        while let Some(row) = rows.next()? {
            table.push(ExpressionRow {
                gene_name: row.get(0)?,
                experiment_name: row.get(1)?,
                treatment: row.get(2)?,
                time: row.get(3)?,
                replicate: row.get(4)?,
                normalised_expression: row.get(5)?,
                log2_expression: row.get(6)?,
            });
        }
        Ok(table)
    }
}

fn parse_expression_row(row: &Row<'_>) -> RepoResult<GeneExpression> {
    Ok(GeneExpression {
        id: row.get("id")?,
        gene_name: row.get("gene_name")?,
        experiment_name: row.get("experiment_name")?,
        treatment: row.get("treatment")?,
        time: row.get("time")?,
        replicate: row.get("replicate")?,
        normalised_expression: row.get("normalised_expression")?,
        log2_expression: row.get("log2_expression")?,
    })
}

fn parse_direction(row: &Row<'_>, column: &str) -> RepoResult<Option<Direction>> {
    match row.get::<_, Option<String>>(column)? {
        Some(value) => Direction::from_db(&value).map(Some).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid direction `{value}` in differential_expressions.{column}"
            ))
        }),
        None => Ok(None),
    }
}
