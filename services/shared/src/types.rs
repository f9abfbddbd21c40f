/// Type-safe wrappers for protocol primitives
///
/// These types enforce the wire invariants at construction time so the codec
/// never has to re-check them: identifiers and records never contain a line
/// terminator, and a batch is never empty.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::FIELD_SEPARATOR;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Agency ID must not be empty")]
    EmptyAgencyId,

    #[error("Agency ID contains a reserved character: {0:?}")]
    InvalidAgencyId(String),

    #[error("Bet record contains a line terminator: {0:?}")]
    RecordContainsLineTerminator(String),

    #[error("Batch must contain at least one record")]
    EmptyBatch,
}

fn has_line_terminator(value: &str) -> bool {
    value.contains('\n') || value.contains('\r')
}

/// Identifier of the submitting agency
///
/// Travels inside `|`-delimited request lines, so it may contain neither the
/// field separator nor a line terminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgencyId(String);

impl AgencyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AgencyId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyAgencyId);
        }
        if trimmed.contains(FIELD_SEPARATOR) || has_line_terminator(trimmed) {
            return Err(ValidationError::InvalidAgencyId(value));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<&str> for AgencyId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl std::fmt::Display for AgencyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One bet as a single delimited text line
///
/// The fields (first name, last name, document, birth date, number) are never
/// interpreted here; the line is sent verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRecord(String);

impl BetRecord {
    pub fn new(line: impl Into<String>) -> Result<Self, ValidationError> {
        let line = line.into();
        if has_line_terminator(&line) {
            return Err(ValidationError::RecordContainsLineTerminator(line));
        }
        Ok(Self(line))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BetRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable, non-empty group of records sent in one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Local correlation id for logs; never sent on the wire
    pub batch_id: Uuid,
    /// Zero-based position of this batch within the run
    pub index: usize,
    pub agency: AgencyId,
    records: Vec<BetRecord>,
}

impl Batch {
    pub fn new(
        index: usize,
        agency: AgencyId,
        records: Vec<BetRecord>,
    ) -> Result<Self, ValidationError> {
        if records.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        Ok(Self {
            batch_id: Uuid::new_v4(),
            index,
            agency,
            records,
        })
    }

    pub fn records(&self) -> &[BetRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
