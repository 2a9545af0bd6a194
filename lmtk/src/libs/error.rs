use std::path::PathBuf;

use thiserror::Error as ThisError;

#[rustfmt::skip]
#[derive(ThisError, Debug)]
pub enum Error {
    #[error("Failed to open file: {path:?}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("Io error: {0}")]
    StdIo(#[from] std::io::Error),

    #[error("Csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed genotype input: {reason}")]
    MalformedInput { reason: String },

    #[error("Exactly two parents are required, {found} were given")]
    IncompatibleParentCount { found: usize },

    #[error("Symbol alias {alias:?} ({role}) collides with a symbol already in use{}", .locus.as_ref().map(|l| format!(" at locus {l}")).unwrap_or_default())]
    UnknownSymbolAlias { alias: char, role: &'static str, locus: Option<String> },

    #[error("Unparsable record at line {line}: {reason}: {record:?}")]
    UnparsableRecord { line: usize, record: String, reason: String },

    #[error("Locus {locus} is not present in the known locus set{}", .line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    UnknownLocusReference { locus: String, line: Option<usize> },

    #[error("Map order violated in group {group} at record {record}: {distance} after {previous}")]
    InvalidMapOrder { group: String, record: usize, previous: f64, distance: f64 },

    #[error("Locus {locus} maps to more than one group ({first} and {second}) in the assignment of {parent}")]
    AmbiguousGroupMapping { locus: String, parent: String, first: u32, second: u32 },

    #[error("Engine session failed: {message}")]
    EngineSession { message: String },
}

impl Error {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            reason: reason.into(),
        }
    }

    pub fn unparsable(line: usize, record: &str, reason: impl Into<String>) -> Self {
        Self::UnparsableRecord {
            line,
            record: record.to_string(),
            reason: reason.into(),
        }
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::EngineSession {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
