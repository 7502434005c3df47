//! Species, gene and gene annotation persistence.
//!
//! # Responsibility
//! - Describe the `species`, `genes` and `gene_info` tables to the upsert engine.
//! - Provide read-only lookups, existence checks and text search over genes.
//!
//! # Invariants
//! - Read paths never write.
//! - "Not found" is `None` or an empty list, never an error.

use crate::model::gene::{
    Gene, GeneField, GeneInfo, GeneInfoField, GeneInfoRecord, GeneRecord, Species, SpeciesField,
    SpeciesId, SpeciesRecord,
};
use crate::repo::error::RepoResult;
use crate::repo::query::contains_pattern;
use crate::repo::upsert::{integer_value, required, text_value, PrimaryKeyed, UpsertKind};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};

impl UpsertKind for Species {
    const KIND: &'static str = "species";
    const SELECT_SQL: &'static str = "SELECT id, name FROM species";

    type Field = SpeciesField;
    type Record = SpeciesRecord;

    fn lookup_value(record: &SpeciesRecord, field: SpeciesField) -> Option<Value> {
        match field {
            SpeciesField::Name => text_value(&record.name),
        }
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }

    fn merge(&mut self, record: &SpeciesRecord) {
        self.apply(record);
    }

    fn insert(conn: &Connection, record: &SpeciesRecord) -> RepoResult<Self> {
        let name = required(&record.name, Self::KIND, "name")?;
        conn.execute("INSERT INTO species (name) VALUES (?1);", [name])?;
        Ok(Self {
            id: conn.last_insert_rowid(),
            name: name.clone(),
        })
    }

    fn update(&self, conn: &Connection, stored: &Self) -> RepoResult<usize> {
        Ok(conn.execute(
            "UPDATE species SET name = ?2 WHERE id = ?1;",
            params![stored.id, self.name],
        )?)
    }
}

impl UpsertKind for Gene {
    const KIND: &'static str = "genes";
    const SELECT_SQL: &'static str =
        "SELECT id, gene_name, species_id, nt_sequence, aa_sequence FROM genes";

    type Field = GeneField;
    type Record = GeneRecord;

    fn lookup_value(record: &GeneRecord, field: GeneField) -> Option<Value> {
        match field {
            GeneField::GeneName => text_value(&record.gene_name),
            GeneField::SpeciesId => integer_value(record.species_id),
            GeneField::NtSequence => text_value(&record.nt_sequence),
            GeneField::AaSequence => text_value(&record.aa_sequence),
        }
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        parse_gene_row(row)
    }

    fn merge(&mut self, record: &GeneRecord) {
        self.apply(record);
    }

    fn insert(conn: &Connection, record: &GeneRecord) -> RepoResult<Self> {
        let gene_name = required(&record.gene_name, Self::KIND, "gene_name")?;
        conn.execute(
            "INSERT INTO genes (gene_name, species_id, nt_sequence, aa_sequence)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                gene_name,
                record.species_id,
                record.nt_sequence.as_deref(),
                record.aa_sequence.as_deref(),
            ],
        )?;
        Ok(Self {
            id: conn.last_insert_rowid(),
            gene_name: gene_name.clone(),
            species_id: record.species_id,
            nt_sequence: record.nt_sequence.clone(),
            aa_sequence: record.aa_sequence.clone(),
        })
    }

    fn update(&self, conn: &Connection, stored: &Self) -> RepoResult<usize> {
        Ok(conn.execute(
            "UPDATE genes
             SET
                gene_name = ?2,
                species_id = ?3,
                nt_sequence = ?4,
                aa_sequence = ?5
             WHERE id = ?1;",
            params![
                stored.id,
                self.gene_name,
                self.species_id,
                self.nt_sequence.as_deref(),
                self.aa_sequence.as_deref(),
            ],
        )?)
    }
}

impl UpsertKind for GeneInfo {
    const KIND: &'static str = "gene_info";
    const SELECT_SQL: &'static str =
        "SELECT gene_name, sequence_description, hit_acc FROM gene_info";

    type Field = GeneInfoField;
    type Record = GeneInfoRecord;

    fn lookup_value(record: &GeneInfoRecord, field: GeneInfoField) -> Option<Value> {
        match field {
            GeneInfoField::GeneName => text_value(&record.gene_name),
            GeneInfoField::SequenceDescription => text_value(&record.sequence_description),
            GeneInfoField::HitAcc => text_value(&record.hit_acc),
        }
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        parse_gene_info_row(row)
    }

    fn merge(&mut self, record: &GeneInfoRecord) {
        self.apply(record);
    }

    fn insert(conn: &Connection, record: &GeneInfoRecord) -> RepoResult<Self> {
        let gene_name = required(&record.gene_name, Self::KIND, "gene_name")?;
        conn.execute(
            "INSERT INTO gene_info (gene_name, sequence_description, hit_acc)
             VALUES (?1, ?2, ?3);",
            params![
                gene_name,
                record.sequence_description.as_deref(),
                record.hit_acc.as_deref(),
            ],
        )?;
        Ok(Self {
            gene_name: gene_name.clone(),
            sequence_description: record.sequence_description.clone(),
            hit_acc: record.hit_acc.clone(),
        })
    }

    fn update(&self, conn: &Connection, stored: &Self) -> RepoResult<usize> {
        Ok(conn.execute(
            "UPDATE gene_info
             SET gene_name = ?4, sequence_description = ?2, hit_acc = ?3
             WHERE gene_name = ?1;",
            params![
                stored.gene_name,
                self.sequence_description.as_deref(),
                self.hit_acc.as_deref(),
                self.gene_name,
            ],
        )?)
    }
}

impl PrimaryKeyed for GeneInfo {
    const PRIMARY_KEY: GeneInfoField = GeneInfoField::GeneName;
}

/// Read-only gene queries.
pub trait GeneRepository {
    fn species_by_name(&self, name: &str) -> RepoResult<Option<Species>>;
    /// Finds a gene by name, optionally restricted to one species.
    ///
    /// Without a species the lowest-id match is returned.
    fn gene_by_name(&self, gene_name: &str, species: Option<SpeciesId>)
        -> RepoResult<Option<Gene>>;
    fn gene_info(&self, gene_name: &str) -> RepoResult<Option<GeneInfo>>;
    /// One flag per input name, in input order.
    fn genes_exist(&self, gene_names: &[String]) -> RepoResult<Vec<bool>>;
    fn gene_names(&self) -> RepoResult<Vec<String>>;
    /// Genes with no annotation row or an annotation without description.
    fn genes_without_description(&self) -> RepoResult<Vec<String>>;
    /// Distinct homology-hit accessions referenced by annotations.
    fn hit_accessions(&self) -> RepoResult<Vec<String>>;
    /// Case-insensitive substring search over sequence descriptions.
    fn search_gene_descriptions(&self, text: &str) -> RepoResult<Vec<GeneInfo>>;
}

pub struct SqliteGeneRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGeneRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl GeneRepository for SqliteGeneRepository<'_> {
    fn species_by_name(&self, name: &str) -> RepoResult<Option<Species>> {
        let species = self
            .conn
            .query_row(
                "SELECT id, name FROM species WHERE name = ?1;",
                [name],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(species.map(|(id, name)| Species { id, name }))
    }

    fn gene_by_name(
        &self,
        gene_name: &str,
        species: Option<SpeciesId>,
    ) -> RepoResult<Option<Gene>> {
        let mut stmt = self.conn.prepare(&format!(
            "{}
             WHERE gene_name = ?1
               AND (?2 IS NULL OR species_id = ?2)
             ORDER BY id ASC
             LIMIT 1;",
            Gene::SELECT_SQL
        ))?;
        let mut rows = stmt.query(params![gene_name, species])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_gene_row(row)?));
        }
        Ok(None)
    }

    fn gene_info(&self, gene_name: &str) -> RepoResult<Option<GeneInfo>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE gene_name = ?1;", GeneInfo::SELECT_SQL))?;
        let mut rows = stmt.query([gene_name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_gene_info_row(row)?));
        }
        Ok(None)
    }

    fn genes_exist(&self, gene_names: &[String]) -> RepoResult<Vec<bool>> {
        let mut stmt = self
            .conn
            .prepare("SELECT EXISTS(SELECT 1 FROM genes WHERE gene_name = ?1);")?;
        let mut flags = Vec::with_capacity(gene_names.len());
        for gene_name in gene_names {
            let exists: i64 = stmt.query_row([gene_name.trim()], |row| row.get(0))?;
            flags.push(exists == 1);
        }
        Ok(flags)
    }

    fn gene_names(&self) -> RepoResult<Vec<String>> {
        collect_strings(
            self.conn,
            "SELECT DISTINCT gene_name FROM genes ORDER BY gene_name ASC;",
        )
    }

    fn genes_without_description(&self) -> RepoResult<Vec<String>> {
        collect_strings(
            self.conn,
            "SELECT DISTINCT g.gene_name
             FROM genes g
             LEFT JOIN gene_info gi ON gi.gene_name = g.gene_name
             WHERE gi.sequence_description IS NULL
             ORDER BY g.gene_name ASC;",
        )
    }

    fn hit_accessions(&self) -> RepoResult<Vec<String>> {
        collect_strings(
            self.conn,
            "SELECT DISTINCT hit_acc
             FROM gene_info
             WHERE hit_acc IS NOT NULL
             ORDER BY hit_acc ASC;",
        )
    }

    fn search_gene_descriptions(&self, text: &str) -> RepoResult<Vec<GeneInfo>> {
        let Some(pattern) = contains_pattern(text) else {
            return Ok(Vec::new());
        };
        let mut stmt = self.conn.prepare(&format!(
            "{}
             WHERE sequence_description LIKE ?1 ESCAPE '\\'
             ORDER BY gene_name ASC;",
            GeneInfo::SELECT_SQL
        ))?;
        let mut rows = stmt.query([pattern])?;
        let mut infos = Vec::new();
        while let Some(row) = rows.next()? {
            infos.push(parse_gene_info_row(row)?);
        }
        Ok(infos)
    }
}

pub(crate) fn parse_gene_row(row: &Row<'_>) -> RepoResult<Gene> {
    Ok(Gene {
        id: row.get("id")?,
        gene_name: row.get("gene_name")?,
        species_id: row.get("species_id")?,
        nt_sequence: row.get("nt_sequence")?,
        aa_sequence: row.get("aa_sequence")?,
    })
}

fn parse_gene_info_row(row: &Row<'_>) -> RepoResult<GeneInfo> {
    Ok(GeneInfo {
        gene_name: row.get("gene_name")?,
        sequence_description: row.get("sequence_description")?,
        hit_acc: row.get("hit_acc")?,
    })
}

/// Runs a parameterless query returning one text column.
pub(crate) fn collect_strings(conn: &Connection, sql: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        values.push(row.get(0)?);
    }
    Ok(values)
}
