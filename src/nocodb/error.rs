use crate::commands::RecordOutcome;
use crate::gateway::GatewayError;
use crate::model::RowId;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Where an ambiguous match key was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityOrigin {
    /// Two or more remote rows share the key.
    Remote,
    /// Two or more incoming records share the key.
    Incoming,
}

impl fmt::Display for AmbiguityOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmbiguityOrigin::Remote => write!(f, "rows"),
            AmbiguityOrigin::Incoming => write!(f, "incoming records"),
        }
    }
}

/// Record-level failure. Embedded in bulk outcome reports, so it must stay cloneable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Multiple rows matched {key}: {count} {origin} share this key")]
    AmbiguousMatch {
        key: String,
        count: usize,
        origin: AmbiguityOrigin,
    },

    #[error("No row matched {key} and update-only mode forbids creating one")]
    NoMatchForUpdate { key: String },

    #[error("Row {id} already matches {key} and create-only mode forbids updating it")]
    MatchExistsForCreate { key: String, id: RowId },

    #[error("Record is missing identity field '{field}'")]
    MissingIdentity { field: String },

    #[error("Gateway error: {0}")]
    Gateway(GatewayError),
}

impl RecordError {
    /// Stable machine-readable name, used in JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::AmbiguousMatch { .. } => "ambiguousMatch",
            RecordError::NoMatchForUpdate { .. } => "noMatchForUpdate",
            RecordError::MatchExistsForCreate { .. } => "matchExistsForCreate",
            RecordError::MissingIdentity { .. } => "missingIdentity",
            RecordError::Gateway(_) => "gatewayError",
        }
    }
}

impl Serialize for RecordError {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("kind", self.kind())?;
        map.serialize_entry("message", &self.to_string())?;
        map.end()
    }
}

#[derive(Error, Debug)]
pub enum NocoError {
    #[error("Invalid match spec: {0}")]
    InvalidMatchSpec(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("Bulk operation aborted at record {index}: {cause}")]
    Aborted {
        index: usize,
        cause: RecordError,
        completed: Vec<RecordOutcome>,
    },

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Api Error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, NocoError>;
