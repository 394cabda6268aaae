//! Entries of a record's error stack.

use thiserror::Error;

/// A soft failure recorded while operating on a record.
///
/// These never abort an operation chain: they are pushed onto the record's
/// error stack and the operation reports `false`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("field {0} does not exist")]
    FieldMissing(String),

    #[error("field {0} is read-only")]
    ReadOnlyField(String),

    #[error("missing required value: {0}")]
    RequiredMissing(String),

    #[error("value not allowed for {field}: '{value}'")]
    InvalidValue { field: String, value: String },

    #[error("empty identifier")]
    EmptyIdentifier,

    #[error("invalid identifier")]
    InvalidIdentifier,

    #[error("record not found: {key} = {value}")]
    NotFound { key: String, value: String },

    #[error("value and field lists must be non-empty and of equal length")]
    InvalidLookup,

    #[error("records of table {0} are read-only")]
    ReadOnlyTable(String),

    /// Error text reported by the server for a failed statement.
    #[error("{0}")]
    Query(String),

    #[error("child relation {0} does not exist")]
    UnknownRelation(String),

    #[error("child record {relation} - {key} not found")]
    UnknownChild { relation: String, key: String },

    #[error("child data for {0} must be an object keyed by child key")]
    InvalidChildData(String),

    #[error("{relation} - {key}: {message}")]
    Child {
        relation: String,
        key: String,
        message: String,
    },

    #[error("could not delete residual records of table {0}")]
    ResidualCleanup(String),

    #[error("no identifier was generated for table {0}")]
    MissingGeneratedId(String),

    #[error("child relations require a single-field parent key")]
    CompositeParentKey,

    #[error("child set of {0} is fixed")]
    FixedRelation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            RecordError::NotFound {
                key: "id".into(),
                value: "7".into()
            }
            .to_string(),
            "record not found: id = 7"
        );
        assert_eq!(
            RecordError::Child {
                relation: "tags".into(),
                key: "A".into(),
                message: "field x does not exist".into()
            }
            .to_string(),
            "tags - A: field x does not exist"
        );
    }
}
