//! Species, gene and gene annotation records.
//!
//! # Invariants
//! - Species names are unique.
//! - A gene name is unique within one species.
//! - `GeneInfo` is keyed by the caller-supplied `gene_name`.

use super::FieldName;
use serde::{Deserialize, Serialize};

pub type SpeciesId = i64;
pub type GeneId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub id: SpeciesId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeciesRecord {
    pub name: Option<String>,
}

impl SpeciesRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeciesField {
    Name,
}

impl FieldName for SpeciesField {
    const ALL: &'static [Self] = &[Self::Name];

    fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
        }
    }
}

impl Species {
    pub fn apply(&mut self, record: &SpeciesRecord) {
        if let Some(name) = &record.name {
            self.name = name.clone();
        }
    }
}

/// Gene of one species with its coding sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    pub id: GeneId,
    pub gene_name: String,
    /// `None` only for rows imported before species tracking.
    pub species_id: Option<SpeciesId>,
    pub nt_sequence: Option<String>,
    pub aa_sequence: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneRecord {
    pub gene_name: Option<String>,
    pub species_id: Option<SpeciesId>,
    #[serde(alias = "seq", alias = "sequence")]
    pub nt_sequence: Option<String>,
    pub aa_sequence: Option<String>,
}

impl GeneRecord {
    pub fn named(gene_name: impl Into<String>) -> Self {
        Self {
            gene_name: Some(gene_name.into()),
            ..Self::default()
        }
    }

    pub fn in_species(mut self, species_id: SpeciesId) -> Self {
        self.species_id = Some(species_id);
        self
    }

    pub fn with_nt_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.nt_sequence = Some(sequence.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneField {
    GeneName,
    SpeciesId,
    NtSequence,
    AaSequence,
}

impl FieldName for GeneField {
    const ALL: &'static [Self] = &[
        Self::GeneName,
        Self::SpeciesId,
        Self::NtSequence,
        Self::AaSequence,
    ];

    fn column(self) -> &'static str {
        match self {
            Self::GeneName => "gene_name",
            Self::SpeciesId => "species_id",
            Self::NtSequence => "nt_sequence",
            Self::AaSequence => "aa_sequence",
        }
    }
}

impl Gene {
    pub fn apply(&mut self, record: &GeneRecord) {
        if let Some(gene_name) = &record.gene_name {
            self.gene_name = gene_name.clone();
        }
        if record.species_id.is_some() {
            self.species_id = record.species_id;
        }
        if record.nt_sequence.is_some() {
            self.nt_sequence = record.nt_sequence.clone();
        }
        if record.aa_sequence.is_some() {
            self.aa_sequence = record.aa_sequence.clone();
        }
    }
}

/// Functional annotation of a gene from its top homology hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneInfo {
    pub gene_name: String,
    pub sequence_description: Option<String>,
    /// Accession of the best homology hit (UniProt).
    pub hit_acc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneInfoRecord {
    pub gene_name: Option<String>,
    pub sequence_description: Option<String>,
    #[serde(alias = "Hit_ACC")]
    pub hit_acc: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneInfoField {
    GeneName,
    SequenceDescription,
    HitAcc,
}

impl FieldName for GeneInfoField {
    const ALL: &'static [Self] = &[Self::GeneName, Self::SequenceDescription, Self::HitAcc];

    fn column(self) -> &'static str {
        match self {
            Self::GeneName => "gene_name",
            Self::SequenceDescription => "sequence_description",
            Self::HitAcc => "hit_acc",
        }
    }
}

impl GeneInfo {
    pub fn apply(&mut self, record: &GeneInfoRecord) {
        if let Some(gene_name) = &record.gene_name {
            self.gene_name = gene_name.clone();
        }
        if record.sequence_description.is_some() {
            self.sequence_description = record.sequence_description.clone();
        }
        if record.hit_acc.is_some() {
            self.hit_acc = record.hit_acc.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldName, Gene, GeneField, GeneRecord};

    #[test]
    fn apply_only_overwrites_present_fields() {
        let mut gene = Gene {
            id: 7,
            gene_name: "Xe_0001".to_string(),
            species_id: Some(1),
            nt_sequence: Some("ATG".to_string()),
            aa_sequence: Some("M".to_string()),
        };

        gene.apply(&GeneRecord::named("Xe_0001").with_nt_sequence("ATGC"));

        assert_eq!(gene.nt_sequence.as_deref(), Some("ATGC"));
        assert_eq!(gene.aa_sequence.as_deref(), Some("M"));
        assert_eq!(gene.species_id, Some(1));
    }

    #[test]
    fn parse_field_rejects_unknown_names() {
        assert_eq!(GeneField::parse_field("gene_name"), Some(GeneField::GeneName));
        assert_eq!(GeneField::parse_field(" nt_sequence "), Some(GeneField::NtSequence));
        assert_eq!(GeneField::parse_field("colour"), None);
    }
}
