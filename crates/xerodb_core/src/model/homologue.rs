//! Arabidopsis homologue records and TAIR locus helpers.
//!
//! # Invariants
//! - A homologue is keyed by its (UniProt) accession.
//! - Common names are unique per homologue.
//! - Locus ids are stored upper-case (`AT1G01010`).

use super::FieldName;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static AT_LOCUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bAt[1-5]g\d{5}\b").expect("valid locus regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArabidopsisHomologue {
    pub accession: String,
    pub at_locus_id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArabidopsisHomologueRecord {
    #[serde(alias = "Hit_ACC")]
    pub accession: Option<String>,
    pub at_locus_id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArabidopsisHomologueField {
    Accession,
    AtLocusId,
    Description,
}

impl FieldName for ArabidopsisHomologueField {
    const ALL: &'static [Self] = &[Self::Accession, Self::AtLocusId, Self::Description];

    fn column(self) -> &'static str {
        match self {
            Self::Accession => "accession",
            Self::AtLocusId => "at_locus_id",
            Self::Description => "description",
        }
    }
}

impl ArabidopsisHomologue {
    pub fn apply(&mut self, record: &ArabidopsisHomologueRecord) {
        if let Some(accession) = &record.accession {
            self.accession = accession.clone();
        }
        if record.at_locus_id.is_some() {
            self.at_locus_id = record.at_locus_id.clone();
        }
        if record.description.is_some() {
            self.description = record.description.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonName {
    pub id: i64,
    pub accession: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommonNameRecord {
    pub accession: Option<String>,
    pub name: Option<String>,
}

impl CommonNameRecord {
    pub fn new(accession: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            accession: Some(accession.into()),
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommonNameField {
    Accession,
    Name,
}

impl FieldName for CommonNameField {
    const ALL: &'static [Self] = &[Self::Accession, Self::Name];

    fn column(self) -> &'static str {
        match self {
            Self::Accession => "accession",
            Self::Name => "name",
        }
    }
}

impl CommonName {
    pub fn apply(&mut self, record: &CommonNameRecord) {
        if let Some(accession) = &record.accession {
            self.accession = accession.clone();
        }
        if let Some(name) = &record.name {
            self.name = name.clone();
        }
    }
}

/// Returns the first Arabidopsis locus id found in a UniProt gene-names cell.
pub fn extract_arabidopsis_locus(gene_names: &str) -> Option<String> {
    AT_LOCUS_RE
        .find(gene_names)
        .map(|found| found.as_str().to_ascii_uppercase())
}

/// Returns the gene-names cell with every locus id removed.
pub fn remove_arabidopsis_locus(gene_names: &str) -> String {
    let stripped = AT_LOCUS_RE.replace_all(gene_names, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits the non-locus part of a gene-names cell into distinct common names.
pub fn common_names_from(gene_names: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in remove_arabidopsis_locus(gene_names).split_whitespace() {
        if !names.iter().any(|known| known == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::{common_names_from, extract_arabidopsis_locus, remove_arabidopsis_locus};

    #[test]
    fn extracts_locus_regardless_of_case() {
        assert_eq!(
            extract_arabidopsis_locus("NAC001 ANAC001 At1g01010 T25K16.1").as_deref(),
            Some("AT1G01010")
        );
        assert_eq!(
            extract_arabidopsis_locus("LEA4-5 AT5G06760").as_deref(),
            Some("AT5G06760")
        );
        assert_eq!(extract_arabidopsis_locus("ERD10 LTI45"), None);
    }

    #[test]
    fn removal_leaves_common_names() {
        assert_eq!(
            remove_arabidopsis_locus("  RAB18 At5g66400  "),
            "RAB18".to_string()
        );
        assert_eq!(
            common_names_from("ERD10 At1g20450 LTI45 ERD10"),
            vec!["ERD10".to_string(), "LTI45".to_string()]
        );
    }

    #[test]
    fn locus_must_be_a_whole_word() {
        assert_eq!(extract_arabidopsis_locus("XAT1G010101"), None);
    }
}
