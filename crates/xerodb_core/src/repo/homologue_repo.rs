//! Arabidopsis homologue, common-name and gene ↔ homologue persistence.
//!
//! # Invariants
//! - A gene is linked to a homologue at most once.
//! - Locus and common-name matching is case-insensitive.

use crate::model::gene::GeneId;
use crate::model::homologue::{
    ArabidopsisHomologue, ArabidopsisHomologueField, ArabidopsisHomologueRecord, CommonName,
    CommonNameField, CommonNameRecord,
};
use crate::repo::error::RepoResult;
use crate::repo::query::{contains_pattern, MatchKey, SetMatch};
use crate::repo::upsert::{required, text_value, PrimaryKeyed, UpsertKind};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};
use serde::Serialize;

/// One gene reached through an Arabidopsis homologue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomologueHit {
    pub gene_name: String,
    pub accession: String,
    pub at_locus_id: Option<String>,
}

impl MatchKey for HomologueHit {
    type Key = (String, String);

    fn match_key(&self) -> Self::Key {
        (self.gene_name.clone(), self.accession.clone())
    }
}

impl UpsertKind for ArabidopsisHomologue {
    const KIND: &'static str = "arabidopsis_homologues";
    const SELECT_SQL: &'static str =
        "SELECT accession, at_locus_id, description FROM arabidopsis_homologues";

    type Field = ArabidopsisHomologueField;
    type Record = ArabidopsisHomologueRecord;

    fn lookup_value(
        record: &ArabidopsisHomologueRecord,
        field: ArabidopsisHomologueField,
    ) -> Option<Value> {
        match field {
            ArabidopsisHomologueField::Accession => text_value(&record.accession),
            ArabidopsisHomologueField::AtLocusId => text_value(&record.at_locus_id),
            ArabidopsisHomologueField::Description => text_value(&record.description),
        }
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            accession: row.get("accession")?,
            at_locus_id: row.get("at_locus_id")?,
            description: row.get("description")?,
        })
    }

    fn merge(&mut self, record: &ArabidopsisHomologueRecord) {
        self.apply(record);
    }

    fn insert(conn: &Connection, record: &ArabidopsisHomologueRecord) -> RepoResult<Self> {
        let accession = required(&record.accession, Self::KIND, "accession")?;
        conn.execute(
            "INSERT INTO arabidopsis_homologues (accession, at_locus_id, description)
             VALUES (?1, ?2, ?3);",
            params![
                accession,
                record.at_locus_id.as_deref(),
                record.description.as_deref(),
            ],
        )?;
        Ok(Self {
            accession: accession.clone(),
            at_locus_id: record.at_locus_id.clone(),
            description: record.description.clone(),
        })
    }

    fn update(&self, conn: &Connection, stored: &Self) -> RepoResult<usize> {
        Ok(conn.execute(
            "UPDATE arabidopsis_homologues
             SET accession = ?4, at_locus_id = ?2, description = ?3
             WHERE accession = ?1;",
            params![
                stored.accession,
                self.at_locus_id.as_deref(),
                self.description.as_deref(),
                self.accession,
            ],
        )?)
    }
}

impl PrimaryKeyed for ArabidopsisHomologue {
    const PRIMARY_KEY: ArabidopsisHomologueField = ArabidopsisHomologueField::Accession;
}

impl UpsertKind for CommonName {
    const KIND: &'static str = "common_names";
    const SELECT_SQL: &'static str = "SELECT id, accession, name FROM common_names";

    type Field = CommonNameField;
    type Record = CommonNameRecord;

    fn lookup_value(record: &CommonNameRecord, field: CommonNameField) -> Option<Value> {
        match field {
            CommonNameField::Accession => text_value(&record.accession),
            CommonNameField::Name => text_value(&record.name),
        }
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            accession: row.get("accession")?,
            name: row.get("name")?,
        })
    }

    fn merge(&mut self, record: &CommonNameRecord) {
        self.apply(record);
    }

    fn insert(conn: &Connection, record: &CommonNameRecord) -> RepoResult<Self> {
        let accession = required(&record.accession, Self::KIND, "accession")?;
        let name = required(&record.name, Self::KIND, "name")?;
        conn.execute(
            "INSERT INTO common_names (accession, name) VALUES (?1, ?2);",
            params![accession, name],
        )?;
        Ok(Self {
            id: conn.last_insert_rowid(),
            accession: accession.clone(),
            name: name.clone(),
        })
    }

    fn update(&self, conn: &Connection, stored: &Self) -> RepoResult<usize> {
        Ok(conn.execute(
            "UPDATE common_names SET accession = ?2, name = ?3 WHERE id = ?1;",
            params![stored.id, self.accession, self.name],
        )?)
    }
}

/// Links a gene to a homologue unless the link already exists.
///
/// Returns `true` when a new link was written.
pub fn link_gene_homologue(conn: &Connection, gene_id: GeneId, accession: &str) -> RepoResult<bool> {
    let linked: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM gene_homologues
            WHERE gene_id = ?1 AND accession = ?2
        );",
        params![gene_id, accession],
        |row| row.get(0),
    )?;
    if linked == 1 {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO gene_homologues (gene_id, accession) VALUES (?1, ?2);",
        params![gene_id, accession],
    )?;
    Ok(true)
}

/// Links every gene whose annotation hit is `accession` to that homologue.
///
/// Returns the number of new links.
pub fn link_genes_by_hit_accession(conn: &Connection, accession: &str) -> RepoResult<usize> {
    let gene_ids = {
        let mut stmt = conn.prepare_cached(
            "SELECT g.id
             FROM genes g
             INNER JOIN gene_info gi ON gi.gene_name = g.gene_name
             WHERE gi.hit_acc = ?1
             ORDER BY g.id ASC;",
        )?;
        let mut rows = stmt.query([accession])?;
        let mut ids: Vec<GeneId> = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        ids
    };

    let mut linked = 0;
    for gene_id in gene_ids {
        if link_gene_homologue(conn, gene_id, accession)? {
            linked += 1;
        }
    }
    Ok(linked)
}

/// Read-only homologue queries.
pub trait HomologueRepository {
    fn homologue(&self, accession: &str) -> RepoResult<Option<ArabidopsisHomologue>>;
    fn common_names_for(&self, accession: &str) -> RepoResult<Vec<String>>;
    fn homologues_for_gene(&self, gene_name: &str) -> RepoResult<Vec<ArabidopsisHomologue>>;
    /// Genes linked to each Arabidopsis identifier (locus id, accession or
    /// common name) plus the identifiers nothing matched.
    fn genes_for_arabidopsis(&self, identifiers: &[String]) -> RepoResult<SetMatch<HomologueHit>>;
    /// Genes whose homologue has a common name containing `text`.
    fn search_common_names(&self, text: &str) -> RepoResult<Vec<HomologueHit>>;
}

pub struct SqliteHomologueRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHomologueRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn genes_for_identifier(&self, identifier: &str) -> RepoResult<Vec<HomologueHit>> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT g.gene_name, h.accession, h.at_locus_id
             FROM arabidopsis_homologues h
             INNER JOIN gene_homologues gh ON gh.accession = h.accession
             INNER JOIN genes g ON g.id = gh.gene_id
             WHERE h.at_locus_id = ?1 COLLATE NOCASE
                OR h.accession = ?1
                OR EXISTS (
                    SELECT 1
                    FROM common_names c
                    WHERE c.accession = h.accession
                      AND c.name = ?1 COLLATE NOCASE
                )
             ORDER BY g.gene_name ASC, h.accession ASC;",
        )?;
        let mut rows = stmt.query([identifier])?;
        collect_hits(&mut rows)
    }
}

impl HomologueRepository for SqliteHomologueRepository<'_> {
    fn homologue(&self, accession: &str) -> RepoResult<Option<ArabidopsisHomologue>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE accession = ?1;",
            ArabidopsisHomologue::SELECT_SQL
        ))?;
        let mut rows = stmt.query([accession])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(ArabidopsisHomologue::from_row(row)?));
        }
        Ok(None)
    }

    fn common_names_for(&self, accession: &str) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM common_names WHERE accession = ?1 ORDER BY id ASC;")?;
        let mut rows = stmt.query([accession])?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(row.get(0)?);
        }
        Ok(names)
    }

    fn homologues_for_gene(&self, gene_name: &str) -> RepoResult<Vec<ArabidopsisHomologue>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT h.accession, h.at_locus_id, h.description
             FROM arabidopsis_homologues h
             INNER JOIN gene_homologues gh ON gh.accession = h.accession
             INNER JOIN genes g ON g.id = gh.gene_id
             WHERE g.gene_name = ?1
             ORDER BY h.accession ASC;",
        )?;
        let mut rows = stmt.query([gene_name.trim()])?;
        let mut homologues = Vec::new();
        while let Some(row) = rows.next()? {
            homologues.push(ArabidopsisHomologue::from_row(row)?);
        }
        Ok(homologues)
    }

    fn genes_for_arabidopsis(&self, identifiers: &[String]) -> RepoResult<SetMatch<HomologueHit>> {
        SetMatch::collect(identifiers, |identifier| self.genes_for_identifier(identifier))
    }

    fn search_common_names(&self, text: &str) -> RepoResult<Vec<HomologueHit>> {
        let Some(pattern) = contains_pattern(text) else {
            return Ok(Vec::new());
        };
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT g.gene_name, h.accession, h.at_locus_id
             FROM common_names c
             INNER JOIN arabidopsis_homologues h ON h.accession = c.accession
             INNER JOIN gene_homologues gh ON gh.accession = h.accession
             INNER JOIN genes g ON g.id = gh.gene_id
             WHERE c.name LIKE ?1 ESCAPE '\\'
             ORDER BY g.gene_name ASC, h.accession ASC;",
        )?;
        let mut rows = stmt.query([pattern])?;
        collect_hits(&mut rows)
    }
}

fn collect_hits(rows: &mut rusqlite::Rows<'_>) -> RepoResult<Vec<HomologueHit>> {
    let mut hits = Vec::new();
    while let Some(row) = rows.next()? {
        hits.push(HomologueHit {
            gene_name: row.get(0)?,
            accession: row.get(1)?,
            at_locus_id: row.get(2)?,
        });
    }
    Ok(hits)
}
