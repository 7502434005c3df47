//! GO vocabulary and gene ↔ GO annotation persistence.
//!
//! # Invariants
//! - Stored `go_id` values always carry a category prefix.
//! - Query input without a prefix matches any of the three categories.

use crate::model::go_term::{
    expand_go_term, split_category, GoCategory, GoTerm, GoTermField, GoTermRecord,
};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::query::{contains_pattern, MatchKey, SetMatch};
use crate::repo::upsert::{required, text_value, PrimaryKeyed, UpsertKind};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;

/// One gene annotated with one GO term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneGoHit {
    pub gene_name: String,
    pub go_id: String,
    pub go_name: String,
}

impl MatchKey for GeneGoHit {
    type Key = (String, String);

    fn match_key(&self) -> Self::Key {
        (self.gene_name.clone(), self.go_id.clone())
    }
}

impl UpsertKind for GoTerm {
    const KIND: &'static str = "go_terms";
    const SELECT_SQL: &'static str = "SELECT go_id, go_name, category FROM go_terms";

    type Field = GoTermField;
    type Record = GoTermRecord;

    fn lookup_value(record: &GoTermRecord, field: GoTermField) -> Option<Value> {
        match field {
            GoTermField::GoId => record.canonical_go_id().map(Value::Text),
            GoTermField::GoName => text_value(&record.go_name),
            GoTermField::Category => record
                .canonical_go_id()
                .and_then(|go_id| split_category(&go_id).map(|(category, _)| category))
                .map(|category| Value::Text(category.prefix().to_string())),
        }
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        parse_go_term_row(row)
    }

    fn merge(&mut self, record: &GoTermRecord) {
        self.apply(record);
    }

    fn insert(conn: &Connection, record: &GoTermRecord) -> RepoResult<Self> {
        required(&record.go_id, Self::KIND, "go_id")?;
        let go_name = required(&record.go_name, Self::KIND, "go_name")?;
        let go_id = record
            .canonical_go_id()
            .ok_or(RepoError::IncompleteRecord {
                kind: Self::KIND,
                field: "category",
            })?;
        let (category, _) = split_category(&go_id).ok_or_else(|| {
            RepoError::InvalidData(format!("go id `{go_id}` has no category prefix"))
        })?;

        conn.execute(
            "INSERT INTO go_terms (go_id, go_name, category) VALUES (?1, ?2, ?3);",
            params![go_id, go_name, category.prefix()],
        )?;
        Ok(Self {
            go_id,
            go_name: go_name.clone(),
            category,
        })
    }

    fn update(&self, conn: &Connection, stored: &Self) -> RepoResult<usize> {
        Ok(conn.execute(
            "UPDATE go_terms SET go_name = ?2 WHERE go_id = ?1;",
            params![stored.go_id, self.go_name],
        )?)
    }
}

impl PrimaryKeyed for GoTerm {
    const PRIMARY_KEY: GoTermField = GoTermField::GoId;
}

/// Records that `gene_name` is annotated with the stored term `go_id`.
///
/// Returns `false` when the pair already existed.
pub fn annotate_gene(conn: &Connection, gene_name: &str, go_id: &str) -> RepoResult<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO gene_go_annotations (gene_name, go_id) VALUES (?1, ?2);",
        params![gene_name, go_id],
    )?;
    Ok(changed == 1)
}

/// Read-only GO queries.
pub trait GoRepository {
    /// Finds a term by id, expanding an unprefixed id first.
    fn go_term(&self, term: &str) -> RepoResult<Option<GoTerm>>;
    /// One flag per input term, in input order.
    fn go_terms_exist(&self, terms: &[String]) -> RepoResult<Vec<bool>>;
    /// Case-insensitive substring search over term names.
    fn search_go_terms(&self, text: &str) -> RepoResult<Vec<GoTerm>>;
    fn go_terms_for_gene(&self, gene_name: &str) -> RepoResult<Vec<GoTerm>>;
    /// Genes annotated with each term plus the terms nothing matched.
    fn genes_for_go_terms(&self, terms: &[String]) -> RepoResult<SetMatch<GeneGoHit>>;
}

pub struct SqliteGoRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGoRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn terms_matching(&self, term: &str) -> RepoResult<Vec<GoTerm>> {
        let candidates = expand_go_term(term);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; candidates.len()].join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE go_id IN ({placeholders}) ORDER BY go_id ASC;",
            GoTerm::SELECT_SQL
        ))?;
        let mut rows = stmt.query(params_from_iter(candidates))?;
        let mut terms = Vec::new();
        while let Some(row) = rows.next()? {
            terms.push(parse_go_term_row(row)?);
        }
        Ok(terms)
    }

    fn genes_for_term(&self, term: &str) -> RepoResult<Vec<GeneGoHit>> {
        let mut hits = Vec::new();
        for go_term in self.terms_matching(term)? {
            let mut stmt = self.conn.prepare_cached(
                "SELECT gene_name
                 FROM gene_go_annotations
                 WHERE go_id = ?1
                 ORDER BY gene_name ASC;",
            )?;
            let mut rows = stmt.query([go_term.go_id.as_str()])?;
            while let Some(row) = rows.next()? {
                hits.push(GeneGoHit {
                    gene_name: row.get(0)?,
                    go_id: go_term.go_id.clone(),
                    go_name: go_term.go_name.clone(),
                });
            }
        }
        Ok(hits)
    }
}

impl GoRepository for SqliteGoRepository<'_> {
    fn go_term(&self, term: &str) -> RepoResult<Option<GoTerm>> {
        Ok(self.terms_matching(term)?.into_iter().next())
    }

    fn go_terms_exist(&self, terms: &[String]) -> RepoResult<Vec<bool>> {
        terms
            .iter()
            .map(|term| Ok(!self.terms_matching(term)?.is_empty()))
            .collect()
    }

    fn search_go_terms(&self, text: &str) -> RepoResult<Vec<GoTerm>> {
        let Some(pattern) = contains_pattern(text) else {
            return Ok(Vec::new());
        };
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE go_name LIKE ?1 ESCAPE '\\' ORDER BY go_name ASC, go_id ASC;",
            GoTerm::SELECT_SQL
        ))?;
        let mut rows = stmt.query([pattern])?;
        let mut terms = Vec::new();
        while let Some(row) = rows.next()? {
            terms.push(parse_go_term_row(row)?);
        }
        Ok(terms)
    }

    fn go_terms_for_gene(&self, gene_name: &str) -> RepoResult<Vec<GoTerm>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.go_id, t.go_name, t.category
             FROM gene_go_annotations a
             INNER JOIN go_terms t ON t.go_id = a.go_id
             WHERE a.gene_name = ?1
             ORDER BY t.go_id ASC;",
        )?;
        let mut rows = stmt.query([gene_name.trim()])?;
        let mut terms = Vec::new();
        while let Some(row) = rows.next()? {
            terms.push(parse_go_term_row(row)?);
        }
        Ok(terms)
    }

    fn genes_for_go_terms(&self, terms: &[String]) -> RepoResult<SetMatch<GeneGoHit>> {
        SetMatch::collect(terms, |term| self.genes_for_term(term))
    }
}

fn parse_go_term_row(row: &Row<'_>) -> RepoResult<GoTerm> {
    let category_text: String = row.get("category")?;
    let category = GoCategory::from_prefix(&category_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid category `{category_text}` in go_terms.category"
        ))
    })?;
    Ok(GoTerm {
        go_id: row.get("go_id")?,
        go_name: row.get("go_name")?,
        category,
    })
}
