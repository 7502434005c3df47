//! Experiment, expression measurement and differential-expression records.
//!
//! # Invariants
//! - Experiment names are unique.
//! - An experiment's species link is written once; relinking is refused by
//!   the repository, never by overwriting `species_id` through `apply`.
//! - One differential-expression row per (gene, experiment).

use super::gene::SpeciesId;
use super::FieldName;
use serde::{Deserialize, Serialize};

pub type ExperimentId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: ExperimentId,
    pub experiment_name: String,
    pub species_id: Option<SpeciesId>,
    pub description: Option<String>,
}

/// Partial experiment record.
///
/// Carries no species: the species link goes through
/// `link_experiment_species` so conflicting relinks can be detected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentRecord {
    pub experiment_name: Option<String>,
    pub description: Option<String>,
}

impl ExperimentRecord {
    pub fn named(experiment_name: impl Into<String>) -> Self {
        Self {
            experiment_name: Some(experiment_name.into()),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentField {
    ExperimentName,
    Description,
}

impl FieldName for ExperimentField {
    const ALL: &'static [Self] = &[Self::ExperimentName, Self::Description];

    fn column(self) -> &'static str {
        match self {
            Self::ExperimentName => "experiment_name",
            Self::Description => "description",
        }
    }
}

impl Experiment {
    pub fn apply(&mut self, record: &ExperimentRecord) {
        if let Some(name) = &record.experiment_name {
            self.experiment_name = name.clone();
        }
        if record.description.is_some() {
            self.description = record.description.clone();
        }
    }
}

/// One normalised RNA-seq measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneExpression {
    /// Caller-supplied composite id (sample id + gene name).
    pub id: String,
    pub gene_name: String,
    pub experiment_name: Option<String>,
    pub treatment: Option<String>,
    pub time: Option<String>,
    pub replicate: Option<i64>,
    pub normalised_expression: Option<f64>,
    pub log2_expression: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneExpressionRecord {
    pub id: Option<String>,
    pub gene_name: Option<String>,
    pub experiment_name: Option<String>,
    pub treatment: Option<String>,
    pub time: Option<String>,
    pub replicate: Option<i64>,
    #[serde(alias = "normalised_counts")]
    pub normalised_expression: Option<f64>,
    #[serde(alias = "log2_counts")]
    pub log2_expression: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneExpressionField {
    Id,
    GeneName,
    ExperimentName,
    Treatment,
    Time,
    Replicate,
    NormalisedExpression,
    Log2Expression,
}

impl FieldName for GeneExpressionField {
    const ALL: &'static [Self] = &[
        Self::Id,
        Self::GeneName,
        Self::ExperimentName,
        Self::Treatment,
        Self::Time,
        Self::Replicate,
        Self::NormalisedExpression,
        Self::Log2Expression,
    ];

    fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::GeneName => "gene_name",
            Self::ExperimentName => "experiment_name",
            Self::Treatment => "treatment",
            Self::Time => "time",
            Self::Replicate => "replicate",
            Self::NormalisedExpression => "normalised_expression",
            Self::Log2Expression => "log2_expression",
        }
    }
}

impl GeneExpression {
    pub fn apply(&mut self, record: &GeneExpressionRecord) {
        if let Some(id) = &record.id {
            self.id = id.clone();
        }
        if let Some(gene_name) = &record.gene_name {
            self.gene_name = gene_name.clone();
        }
        if record.experiment_name.is_some() {
            self.experiment_name = record.experiment_name.clone();
        }
        if record.treatment.is_some() {
            self.treatment = record.treatment.clone();
        }
        if record.time.is_some() {
            self.time = record.time.clone();
        }
        if record.replicate.is_some() {
            self.replicate = record.replicate;
        }
        if record.normalised_expression.is_some() {
            self.normalised_expression = record.normalised_expression;
        }
        if record.log2_expression.is_some() {
            self.log2_expression = record.log2_expression;
        }
    }
}

/// Regulation direction of a differentially expressed gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "UP", alias = "Up")]
    Up,
    #[serde(alias = "DOWN", alias = "Down")]
    Down,
}

impl Direction {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Up/down classification of one gene in one experiment.
///
/// `re_*` and `de_*` are two independent comparison sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifferentialExpression {
    pub id: i64,
    pub gene_name: String,
    pub experiment_name: String,
    pub re_set: Option<String>,
    pub re_direction: Option<Direction>,
    pub de_set: Option<String>,
    pub de_direction: Option<Direction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DifferentialExpressionRecord {
    pub gene_name: Option<String>,
    pub experiment_name: Option<String>,
    pub re_set: Option<String>,
    pub re_direction: Option<Direction>,
    pub de_set: Option<String>,
    pub de_direction: Option<Direction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferentialExpressionField {
    GeneName,
    ExperimentName,
    ReSet,
    ReDirection,
    DeSet,
    DeDirection,
}

impl FieldName for DifferentialExpressionField {
    const ALL: &'static [Self] = &[
        Self::GeneName,
        Self::ExperimentName,
        Self::ReSet,
        Self::ReDirection,
        Self::DeSet,
        Self::DeDirection,
    ];

    fn column(self) -> &'static str {
        match self {
            Self::GeneName => "gene_name",
            Self::ExperimentName => "experiment_name",
            Self::ReSet => "re_set",
            Self::ReDirection => "re_direction",
            Self::DeSet => "de_set",
            Self::DeDirection => "de_direction",
        }
    }
}

impl DifferentialExpression {
    pub fn apply(&mut self, record: &DifferentialExpressionRecord) {
        if let Some(gene_name) = &record.gene_name {
            self.gene_name = gene_name.clone();
        }
        if let Some(experiment_name) = &record.experiment_name {
            self.experiment_name = experiment_name.clone();
        }
        if record.re_set.is_some() {
            self.re_set = record.re_set.clone();
        }
        if record.re_direction.is_some() {
            self.re_direction = record.re_direction;
        }
        if record.de_set.is_some() {
            self.de_set = record.de_set.clone();
        }
        if record.de_direction.is_some() {
            self.de_direction = record.de_direction;
        }
    }
}

/// Differential-expression facet used by expression queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DegFilter {
    #[default]
    ShowAll,
    /// Genes classified up or down.
    ShowDeg,
    ShowUp,
    ShowDown,
}

/// Which of the two comparison sets a `DegFilter` reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonSet {
    Re,
    #[default]
    De,
}

impl ComparisonSet {
    pub fn direction_column(self) -> &'static str {
        match self {
            Self::Re => "re_direction",
            Self::De => "de_direction",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DegFilter, Direction, DifferentialExpressionRecord};

    #[test]
    fn direction_accepts_common_spellings() {
        let record: DifferentialExpressionRecord = serde_json::from_value(serde_json::json!({
            "gene_name": "Xe_0001",
            "experiment_name": "seedlings",
            "re_direction": "UP",
            "de_direction": "down"
        }))
        .unwrap();

        assert_eq!(record.re_direction, Some(Direction::Up));
        assert_eq!(record.de_direction, Some(Direction::Down));
        assert_eq!(Direction::from_db(Direction::Up.as_db()), Some(Direction::Up));
    }

    #[test]
    fn deg_filter_uses_front_end_names() {
        let filter: DegFilter = serde_json::from_str("\"SHOW_DEG\"").unwrap();
        assert_eq!(filter, DegFilter::ShowDeg);
        assert_eq!(DegFilter::default(), DegFilter::ShowAll);
    }
}
