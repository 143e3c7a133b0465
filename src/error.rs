use thiserror::Error;

/// Rejected entity payloads. Raised while constructing an entity, before the
/// store ever sees it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EntityError {
    #[error("malformed {entity} payload: {reason}")]
    Malformed { entity: &'static str, reason: String },

    #[error("{field} out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("form history has {len} entries (max 10)")]
    FormTooLong { len: usize },

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
}

/// Errors surfaced by a single analysis call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyzeError {
    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error("not a match key: {key}")]
    InvalidMatchKey { key: String },
}
