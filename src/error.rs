use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuideError>;

#[derive(Error, Debug)]
pub enum GuideError {
    /// The event source (or the run's own settings) cannot be used. Nothing is written.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("data integrity error: {0}")]
    DataIntegrity(#[from] DataIntegrityError),

    #[error("render error: {0}")]
    Render(String),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GuideError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        GuideError::Configuration(msg.into())
    }

    /// Process exit code used by the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            GuideError::Configuration(_) => 2,
            _ => 1,
        }
    }
}

/// A single row that could not become an [`crate::event::Event`].
#[derive(Error, Debug, Clone, PartialEq)]
#[error("row {row} ({}): {violation}", .play_id.as_deref().unwrap_or("<no id>"))]
pub struct DataIntegrityError {
    pub play_id: Option<String>,
    /// SQLite rowid of the offending row, `0` when the row did not come from a table.
    pub row: i64,
    pub violation: IntegrityViolation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityViolation {
    MissingField(&'static str),
    InvalidPlayId,
    InvalidTimestamp { field: &'static str, value: String },
    StartAfterStop,
    DuplicatePlayId,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityViolation::MissingField(field) => write!(f, "missing required field `{field}`"),
            IntegrityViolation::InvalidPlayId => {
                write!(f, "play id contains whitespace or control characters")
            }
            IntegrityViolation::InvalidTimestamp { field, value } => {
                write!(f, "cannot parse `{field}` timestamp {value:?}")
            }
            IntegrityViolation::StartAfterStop => write!(f, "start is after stop"),
            IntegrityViolation::DuplicatePlayId => {
                write!(f, "duplicate play id with conflicting content")
            }
        }
    }
}
