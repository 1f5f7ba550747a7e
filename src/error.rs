// ABOUTME: Typed failure taxonomy for backup and restore operations
// ABOUTME: Attached to anyhow chains as root cause or context and recovered with classify()

use crate::convert::ConvertError;
use crate::dialect::Dialect;
use thiserror::Error;

/// Broad category of a backup failure, used by callers to decide how to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Extraction,
    Decode,
    Insert,
    Meta,
    SequenceSync,
    Deadline,
    Io,
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("no tables selected after resolving the requested table list")]
    NoTablesSelected,

    #[error("unsupported database dialect '{0}' (expected sqlite or postgres)")]
    UnsupportedDialect(String),

    #[error("dialect '{declared}' does not match the database URL, which is {inferred}")]
    DialectMismatch { declared: Dialect, inferred: Dialect },

    #[error("database connection string is missing")]
    MissingConnectionString,

    #[error("invalid table catalog: {0}")]
    InvalidCatalog(String),

    #[error("batch size {0} is too large")]
    InvalidBatchSize(usize),

    #[error("failed to connect to {0} database")]
    Connection(Dialect),

    #[error("failed to export table '{table}'")]
    Extraction { table: String },

    #[error("column {table}.{column}: {source}")]
    Field {
        table: String,
        column: String,
        #[source]
        source: ConvertError,
    },

    #[error("malformed backup record on line {line}")]
    MalformedRecord { line: usize },

    #[error("failed to write row into table '{table}'")]
    Insert { table: String },

    #[error("backup format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("backup stream contains no meta record")]
    MissingMeta,

    #[error("failed to synchronize sequence for {table}.{column}")]
    SequenceSync { table: String, column: String },

    #[error("operation deadline exceeded before {step}")]
    DeadlineExceeded { step: String },

    #[error("failed to {0} backup stream")]
    Stream(&'static str),
}

impl BackupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackupError::UnknownTable(_)
            | BackupError::NoTablesSelected
            | BackupError::UnsupportedDialect(_)
            | BackupError::DialectMismatch { .. }
            | BackupError::MissingConnectionString
            | BackupError::InvalidCatalog(_)
            | BackupError::InvalidBatchSize(_) => ErrorKind::Configuration,
            BackupError::Connection(_) => ErrorKind::Connection,
            BackupError::Extraction { .. } => ErrorKind::Extraction,
            BackupError::Field { .. } | BackupError::MalformedRecord { .. } => ErrorKind::Decode,
            BackupError::Insert { .. } => ErrorKind::Insert,
            BackupError::UnsupportedVersion { .. } | BackupError::MissingMeta => ErrorKind::Meta,
            BackupError::SequenceSync { .. } => ErrorKind::SequenceSync,
            BackupError::DeadlineExceeded { .. } => ErrorKind::Deadline,
            BackupError::Stream(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn field(table: &str, column: &str, source: ConvertError) -> Self {
        BackupError::Field {
            table: table.to_string(),
            column: column.to_string(),
            source,
        }
    }
}

/// Find the outermost [`BackupError`] in an error chain.
///
/// anyhow lets a typed value sit either at the root of a chain or in any context layer, so
/// this works for errors built with `Err(BackupError::..)?` as well as
/// `.with_context(|| BackupError::..)`.
pub fn classify(err: &anyhow::Error) -> Option<&BackupError> {
    err.downcast_ref::<BackupError>()
}

/// Shorthand for `classify(err).map(BackupError::kind)`.
pub fn kind_of(err: &anyhow::Error) -> Option<ErrorKind> {
    classify(err).map(BackupError::kind)
}
