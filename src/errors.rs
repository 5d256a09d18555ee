use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::FormatTag;

/// A single unusable row. Parsers turn these into warnings and keep going.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RowError {
    #[error("{field} '{value}' is not a number")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unparseable date '{0}'")]
    InvalidDate(String),

    #[error("missing column {0}")]
    MissingField(&'static str),

    #[error("quantity {0} must be positive")]
    NonPositiveQuantity(Decimal),

    #[error("unsupported row type '{0}'")]
    UnsupportedType(String),
}

/// File-level failure. Fatal for that file only.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(
        "could not recognise the file format ({0}); expected a DeGiro, IBKR, Revolut or Revolut X CSV export"
    )]
    FormatDetection(String),

    #[error("unreadable file encoding: {0}")]
    Encoding(String),

    #[error("malformed {format} file: {reason}")]
    Structure { format: FormatTag, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("lookup rate limited after {0} retries")]
    RateLimited(u32),

    #[error("lookup returned HTTP {0}")]
    Http(u16),

    #[error("lookup transport failure: {0}")]
    Transport(String),

    #[error("unexpected lookup response: {0}")]
    Protocol(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FifoError {
    #[error("lot quantity {0} must be positive")]
    NonPositiveQuantity(Decimal),

    #[error("lot value out of range")]
    Overflow,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("asset {asset_id} oversold by {shortfall} on {date}")]
    Oversell {
        asset_id: i64,
        shortfall: Decimal,
        date: chrono::NaiveDateTime,
    },

    #[error("transaction {transaction_id}: {source}")]
    Lot {
        transaction_id: i64,
        #[source]
        source: FifoError,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Row(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("account {0} does not exist")]
    UnknownAccount(i64),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
