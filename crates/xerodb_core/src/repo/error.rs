//! Error type shared by repositories and the upsert engine.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// An upsert was called without any lookup field.
    EmptyLookup { kind: &'static str },
    /// A record lacks a value for one of the lookup fields.
    MissingLookupField {
        kind: &'static str,
        field: &'static str,
    },
    /// A record cannot create a new entity because a required field is absent.
    IncompleteRecord {
        kind: &'static str,
        field: &'static str,
    },
    /// A field name that the entity kind does not have.
    UnknownField { kind: &'static str, field: String },
    /// A link names an entity that is not stored.
    UnknownReference { kind: &'static str, key: String },
    /// Rewriting a matched row touched a number of rows other than one.
    UpdateMismatch { kind: &'static str, changed: usize },
    /// Persisted data cannot be converted to a valid model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::EmptyLookup { kind } => {
                write!(f, "upsert into `{kind}` needs at least one lookup field")
            }
            Self::MissingLookupField { kind, field } => {
                write!(f, "`{kind}` record has no value for lookup field `{field}`")
            }
            Self::IncompleteRecord { kind, field } => {
                write!(f, "cannot create `{kind}` row without `{field}`")
            }
            Self::UnknownField { kind, field } => {
                write!(f, "`{kind}` has no field named `{field}`")
            }
            Self::UnknownReference { kind, key } => {
                write!(f, "no `{kind}` row with key `{key}`")
            }
            Self::UpdateMismatch { kind, changed } => {
                write!(f, "update of a matched `{kind}` row changed {changed} rows")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
