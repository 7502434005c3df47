//! Generic create-or-update engine.
//!
//! # Responsibility
//! - Insert or update records of any [`UpsertKind`] by a set of lookup fields.
//! - Bound transaction size by committing in fixed-size windows.
//!
//! # Invariants
//! - A record matches an existing row only when *all* lookup fields are equal.
//! - Every record is committed before a successful call returns.
//! - A failing window is rolled back; windows committed before it persist.
//! - Later records in a batch see earlier ones (last write wins).

use crate::model::FieldName;
use crate::repo::error::{RepoError, RepoResult};
use log::{debug, error, info};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row, TransactionBehavior};
use std::time::Instant;

/// Records per transaction when callers do not choose otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// One storable entity kind.
///
/// Implementations own the SQL of their table and an explicit merge, so the
/// engine never assigns fields by name at runtime.
pub trait UpsertKind: Sized + Clone {
    /// Table name, also used in errors and log events.
    const KIND: &'static str;
    /// `SELECT <all columns> FROM <table>` without a `WHERE` clause.
    const SELECT_SQL: &'static str;

    type Field: FieldName;
    type Record;

    /// Value of `field` in `record`, or `None` when the record leaves it out.
    fn lookup_value(record: &Self::Record, field: Self::Field) -> Option<Value>;

    fn from_row(row: &Row<'_>) -> RepoResult<Self>;

    /// Copies every field present in `record` onto `self`.
    fn merge(&mut self, record: &Self::Record);

    /// Inserts a new row built from `record` and returns it as stored.
    fn insert(conn: &Connection, record: &Self::Record) -> RepoResult<Self>;

    /// Writes `self` over the row that was loaded as `stored`.
    ///
    /// Returns the number of rows changed.
    fn update(&self, conn: &Connection, stored: &Self) -> RepoResult<usize>;
}

/// Kinds whose primary key is supplied by the caller rather than generated.
pub trait PrimaryKeyed: UpsertKind {
    const PRIMARY_KEY: Self::Field;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOptions {
    /// Records per committed window. `0` is treated as `1`.
    pub batch_size: usize,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Outcome of one upsert call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertSummary<E> {
    /// Last processed entity; `None` for empty input.
    pub last: Option<E>,
    pub inserted: usize,
    pub updated: usize,
    pub windows_committed: usize,
}

impl<E> UpsertSummary<E> {
    fn empty() -> Self {
        Self {
            last: None,
            inserted: 0,
            updated: 0,
            windows_committed: 0,
        }
    }

    /// Number of records written.
    pub fn processed(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Windowed upsert executor over one connection.
pub struct UpsertEngine<'conn> {
    conn: &'conn mut Connection,
    options: UpsertOptions,
}

impl<'conn> UpsertEngine<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self::with_options(conn, UpsertOptions::default())
    }

    pub fn with_options(conn: &'conn mut Connection, options: UpsertOptions) -> Self {
        Self { conn, options }
    }

    pub fn options(&self) -> UpsertOptions {
        self.options
    }

    /// Creates or updates each record, matching existing rows on `lookup`.
    ///
    /// # Errors
    /// - `EmptyLookup` when `lookup` is empty (nothing is written).
    /// - `MissingLookupField` / `IncompleteRecord` / storage errors abort the
    ///   current window; previously committed windows stay persisted.
    pub fn upsert_by_lookup<K, I>(
        &mut self,
        records: I,
        lookup: &[K::Field],
    ) -> RepoResult<UpsertSummary<K>>
    where
        K: UpsertKind,
        I: IntoIterator<Item = K::Record>,
    {
        if lookup.is_empty() {
            return Err(RepoError::EmptyLookup { kind: K::KIND });
        }

        let started_at = Instant::now();
        let batch_size = self.options.batch_size.max(1);
        let select_sql = lookup_sql::<K>(lookup);
        let mut records = records.into_iter().peekable();
        let mut summary = UpsertSummary::empty();

        info!(
            "event=upsert_batch module=repo status=start kind={} batch_size={}",
            K::KIND,
            batch_size
        );

        while records.peek().is_some() {
            let window = summary.windows_committed + 1;
            let window_result = self.run_window::<K>(
                records.by_ref().take(batch_size),
                &select_sql,
                lookup,
            );

            match window_result {
                Ok(stats) => {
                    summary.inserted += stats.inserted;
                    summary.updated += stats.updated;
                    summary.windows_committed = window;
                    if stats.last.is_some() {
                        summary.last = stats.last;
                    }
                    debug!(
                        "event=upsert_window module=repo status=ok kind={} window={} inserted={} updated={}",
                        K::KIND,
                        window,
                        stats.inserted,
                        stats.updated
                    );
                }
                Err(err) => {
                    error!(
                        "event=upsert_window module=repo status=error kind={} window={} committed_windows={} error={}",
                        K::KIND,
                        window,
                        summary.windows_committed,
                        err
                    );
                    return Err(err);
                }
            }
        }

        info!(
            "event=upsert_batch module=repo status=ok kind={} inserted={} updated={} windows={} duration_ms={}",
            K::KIND,
            summary.inserted,
            summary.updated,
            summary.windows_committed,
            started_at.elapsed().as_millis()
        );
        Ok(summary)
    }

    /// Creates or updates each record by the kind's caller-supplied primary key.
    pub fn upsert_by_primary_key<K, I>(&mut self, records: I) -> RepoResult<UpsertSummary<K>>
    where
        K: PrimaryKeyed,
        I: IntoIterator<Item = K::Record>,
    {
        self.upsert_by_lookup::<K, I>(records, &[K::PRIMARY_KEY])
    }

    fn run_window<K: UpsertKind>(
        &mut self,
        records: impl Iterator<Item = K::Record>,
        select_sql: &str,
        lookup: &[K::Field],
    ) -> RepoResult<UpsertSummary<K>> {
        // Dropping `tx` on an early return rolls the window back.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut stats = UpsertSummary::empty();

        for record in records {
            let (entity, inserted) = upsert_one::<K>(&tx, select_sql, lookup, &record)?;
            if inserted {
                stats.inserted += 1;
            } else {
                stats.updated += 1;
            }
            stats.last = Some(entity);
        }

        tx.commit()?;
        Ok(stats)
    }
}

/// Resolves field names (e.g. CSV headers) into a lookup set for `K`.
pub fn lookup_fields<K: UpsertKind>(names: &[&str]) -> RepoResult<Vec<K::Field>> {
    names
        .iter()
        .map(|name| {
            K::Field::parse_field(name).ok_or_else(|| RepoError::UnknownField {
                kind: K::KIND,
                field: (*name).to_string(),
            })
        })
        .collect()
}

fn upsert_one<K: UpsertKind>(
    conn: &Connection,
    select_sql: &str,
    lookup: &[K::Field],
    record: &K::Record,
) -> RepoResult<(K, bool)> {
    let mut values = Vec::with_capacity(lookup.len());
    for field in lookup {
        let value =
            K::lookup_value(record, *field).ok_or_else(|| RepoError::MissingLookupField {
                kind: K::KIND,
                field: field.column(),
            })?;
        values.push(value);
    }

    let existing = {
        let mut stmt = conn.prepare_cached(select_sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        match rows.next()? {
            Some(row) => Some(K::from_row(row)?),
            None => None,
        }
    };

    match existing {
        Some(stored) => {
            let mut entity = stored.clone();
            entity.merge(record);
            let changed = entity.update(conn, &stored)?;
            if changed != 1 {
                return Err(RepoError::UpdateMismatch {
                    kind: K::KIND,
                    changed,
                });
            }
            Ok((entity, false))
        }
        None => Ok((K::insert(conn, record)?, true)),
    }
}

fn lookup_sql<K: UpsertKind>(lookup: &[K::Field]) -> String {
    let conditions = lookup
        .iter()
        .enumerate()
        .map(|(index, field)| format!("{} = ?{}", field.column(), index + 1))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!("{} WHERE {conditions} LIMIT 1;", K::SELECT_SQL)
}

/// Converts an optional text field into a lookup value.
pub(crate) fn text_value(value: &Option<String>) -> Option<Value> {
    value.as_ref().map(|text| Value::Text(text.clone()))
}

/// Converts an optional integer field into a lookup value.
pub(crate) fn integer_value(value: Option<i64>) -> Option<Value> {
    value.map(Value::Integer)
}

/// Converts an optional real field into a lookup value.
pub(crate) fn real_value(value: Option<f64>) -> Option<Value> {
    value.map(Value::Real)
}

/// Returns a required record field or `IncompleteRecord`.
pub(crate) fn required<'a, T>(
    value: &'a Option<T>,
    kind: &'static str,
    field: &'static str,
) -> RepoResult<&'a T> {
    value
        .as_ref()
        .ok_or(RepoError::IncompleteRecord { kind, field })
}

#[cfg(test)]
mod tests {
    use super::{lookup_fields, lookup_sql};
    use crate::model::gene::{Gene, GeneField};
    use crate::repo::error::RepoError;

    #[test]
    fn lookup_sql_is_a_conjunction() {
        let sql = lookup_sql::<Gene>(&[GeneField::SpeciesId, GeneField::GeneName]);
        assert!(sql.ends_with("WHERE species_id = ?1 AND gene_name = ?2 LIMIT 1;"));
    }

    #[test]
    fn lookup_fields_rejects_unknown_attribute() {
        let fields = lookup_fields::<Gene>(&["species_id", "gene_name"]).unwrap();
        assert_eq!(fields, vec![GeneField::SpeciesId, GeneField::GeneName]);

        let err = lookup_fields::<Gene>(&["gene_name", "Hit_ACC"]).unwrap_err();
        assert!(matches!(
            err,
            RepoError::UnknownField { kind: "genes", ref field } if field == "Hit_ACC"
        ));
    }
}
