//! Domain model for the gene-expression store.
//!
//! # Responsibility
//! - Define stored entities and the partial records used to create/update them.
//! - Name every writable field through a per-kind field enum.
//!
//! # Invariants
//! - A record field set to `None` means "absent": updates leave it untouched.
//! - Unknown field names are rejected when a record is constructed.

use std::fmt::Debug;

pub mod experiment;
pub mod gene;
pub mod go_term;
pub mod homologue;

/// Writable field of one entity kind, mapped 1:1 to a table column.
pub trait FieldName: Copy + Eq + Debug + 'static {
    /// Every field of the kind, in column order.
    const ALL: &'static [Self];

    /// Column name, also the record attribute name.
    fn column(self) -> &'static str;

    /// Resolves an attribute name; `None` for unknown attributes.
    fn parse_field(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.iter().copied().find(|field| field.column() == name)
    }
}
