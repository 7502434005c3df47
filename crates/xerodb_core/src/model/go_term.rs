//! Gene Ontology vocabulary.
//!
//! Stored GO ids always carry a category prefix (`P:`, `F:` or `C:`), so
//! user input without one is expanded before matching.

use super::FieldName;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoCategory {
    #[serde(rename = "P")]
    Process,
    #[serde(rename = "F")]
    Function,
    #[serde(rename = "C")]
    Component,
}

impl GoCategory {
    pub const ALL: [Self; 3] = [Self::Process, Self::Function, Self::Component];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Process => "P",
            Self::Function => "F",
            Self::Component => "C",
        }
    }

    pub fn from_prefix(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "P" => Some(Self::Process),
            "F" => Some(Self::Function),
            "C" => Some(Self::Component),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoTerm {
    /// Prefixed id, e.g. `P:0008150`.
    pub go_id: String,
    pub go_name: String,
    pub category: GoCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoTermRecord {
    pub go_id: Option<String>,
    pub go_name: Option<String>,
    /// Needed only when `go_id` has no category prefix.
    pub category: Option<GoCategory>,
}

impl GoTermRecord {
    pub fn new(go_id: impl Into<String>, go_name: impl Into<String>) -> Self {
        Self {
            go_id: Some(go_id.into()),
            go_name: Some(go_name.into()),
            category: None,
        }
    }

    /// Prefixed id of this record, if it can be determined.
    pub fn canonical_go_id(&self) -> Option<String> {
        let raw = self.go_id.as_deref()?;
        if let Some((category, id)) = split_category(raw) {
            return Some(format!("{}:{id}", category.prefix()));
        }
        let category = self.category?;
        Some(format!("{}:{}", category.prefix(), strip_go_prefix(raw)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoTermField {
    GoId,
    GoName,
    Category,
}

impl FieldName for GoTermField {
    const ALL: &'static [Self] = &[Self::GoId, Self::GoName, Self::Category];

    fn column(self) -> &'static str {
        match self {
            Self::GoId => "go_id",
            Self::GoName => "go_name",
            Self::Category => "category",
        }
    }
}

impl GoTerm {
    /// Merges a record; the id (and therefore the category) never changes.
    pub fn apply(&mut self, record: &GoTermRecord) {
        if let Some(go_name) = &record.go_name {
            self.go_name = go_name.clone();
        }
    }
}

/// Expands one GO query term into the stored, prefixed forms it may match.
///
/// `P:0008150` stays as is; `0008150` and `GO:0008150` become
/// `P:0008150`, `F:0008150` and `C:0008150`. Blank input yields nothing.
pub fn expand_go_term(term: &str) -> Vec<String> {
    let term = term.trim();
    if term.is_empty() {
        return Vec::new();
    }
    if let Some((category, id)) = split_category(term) {
        return vec![format!("{}:{id}", category.prefix())];
    }

    let id = strip_go_prefix(term);
    GoCategory::ALL
        .iter()
        .map(|category| format!("{}:{id}", category.prefix()))
        .collect()
}

/// Splits `X:rest` when `X` is a GO category letter.
pub fn split_category(value: &str) -> Option<(GoCategory, &str)> {
    let (prefix, rest) = value.trim().split_once(':')?;
    if prefix.len() != 1 || rest.is_empty() {
        return None;
    }
    GoCategory::from_prefix(prefix).map(|category| (category, rest))
}

fn strip_go_prefix(value: &str) -> &str {
    let value = value.trim();
    match value.get(..3) {
        Some(head) if head.eq_ignore_ascii_case("GO:") => &value[3..],
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::{expand_go_term, split_category, GoCategory, GoTermRecord};

    #[test]
    fn unprefixed_term_expands_to_all_categories() {
        assert_eq!(
            expand_go_term("0008150"),
            vec!["P:0008150", "F:0008150", "C:0008150"]
        );
        assert_eq!(
            expand_go_term("GO:0008150"),
            vec!["P:0008150", "F:0008150", "C:0008150"]
        );
    }

    #[test]
    fn prefixed_term_is_kept() {
        assert_eq!(expand_go_term("p:0003674"), vec!["P:0003674"]);
        assert!(expand_go_term("   ").is_empty());
    }

    #[test]
    fn split_category_ignores_go_namespace() {
        assert_eq!(
            split_category("C:0005575"),
            Some((GoCategory::Component, "0005575"))
        );
        assert_eq!(split_category("GO:0005575"), None);
    }

    #[test]
    fn canonical_id_uses_category_when_unprefixed() {
        let mut record = GoTermRecord::new("GO:0003674", "molecular_function");
        assert_eq!(record.canonical_go_id(), None);

        record.category = Some(GoCategory::Function);
        assert_eq!(record.canonical_go_id().as_deref(), Some("F:0003674"));
    }
}
