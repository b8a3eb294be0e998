//! Error types for bottledwater operations

use thiserror::Error;

/// Upstream collaborators handed the encoders something they promised never to send.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("{command} action without a tuple")]
    MissingNewTuple { command: &'static str },

    #[error("unknown change action {code}")]
    UnknownAction { code: i32 },

    #[error("{command} events do not carry relation-scoped fields")]
    UnexpectedRelationFields { command: &'static str },

    #[error("{command} event has no relation")]
    MissingRelation { command: &'static str },

    #[error("expected exactly 1 row from cursor, but got {rows} rows")]
    MultiRowFetch { rows: usize },

    #[error("row has {got} values but descriptor has {expected} columns")]
    ArityMismatch { expected: usize, got: usize },

    #[error("value {value} does not match column type {type_name}")]
    TypeMismatch { type_name: String, value: &'static str },

    #[error("argument '{argument}' cannot be null")]
    NullArgument { argument: &'static str },

    #[error("invalid stream state: {reason}")]
    InvalidState { reason: String },
}

/// A date or timestamp could not be decomposed into calendar fields.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("date out of range: {days} days from 2000-01-01")]
    DateOutOfRange { days: i32 },

    #[error("timestamp out of range: {micros} microseconds from 2000-01-01")]
    TimestampOutOfRange { micros: i64 },
}

/// Catalog metadata the encoders needed was not there.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("relation not found: {name}")]
    RelationNotFound { name: String },

    #[error("relation oid {oid} not found")]
    RelationOidNotFound { oid: u32 },

    #[error("index oid {oid} not found")]
    IndexNotFound { oid: u32 },

    #[error("namespace not found: {namespace}")]
    NamespaceNotFound { namespace: String },

    #[error("could not find default expression for adrelid {relation}, adnum {attnum}")]
    DefaultExpressionMissing { relation: u32, attnum: i16 },

    #[error("catalog lock poisoned")]
    LockPoisoned,
}

/// Inputs the encoders deliberately refuse rather than guess about.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnsupportedInput {
    #[error("snapshot query must scan exactly one base relation, found {count}")]
    RelationCount { count: usize },

    #[error("relation {name} is a {kind}, not an ordinary table")]
    NotATable { name: String, kind: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unknown option: {key}")]
    UnknownOption { key: String },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all bottledwater errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BottledWaterError {
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),

    #[error("range error: {0}")]
    Range(#[from] RangeError),

    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("unsupported input: {0}")]
    UnsupportedInput(#[from] UnsupportedInput),

    /// Message is fixed per output format.
    #[error("{message}")]
    UnsupportedFeature { message: &'static str },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("serialization failed: {reason}")]
    Serialization { reason: String },
}

impl BottledWaterError {
    /// Whether the error came from an upstream collaborator breaking its contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation(_))
    }
}

/// Result type alias for bottledwater operations.
pub type BottledWaterResult<T> = Result<T, BottledWaterError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tuple_display() {
        let err = ContractViolation::MissingNewTuple { command: "INSERT" };
        assert_eq!(format!("{}", err), "INSERT action without a tuple");
    }

    #[test]
    fn test_multi_row_display() {
        let err = ContractViolation::MultiRowFetch { rows: 3 };
        assert_eq!(
            format!("{}", err),
            "expected exactly 1 row from cursor, but got 3 rows"
        );
    }

    #[test]
    fn test_default_missing_display() {
        let err = LookupError::DefaultExpressionMissing {
            relation: 16384,
            attnum: 2,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("adrelid 16384"));
        assert!(msg.contains("adnum 2"));
    }

    #[test]
    fn test_master_error_from_conversions() {
        let err: BottledWaterError = RangeError::TimestampOutOfRange { micros: 1 }.into();
        assert!(matches!(err, BottledWaterError::Range(_)));
        assert!(!err.is_contract_violation());

        let err: BottledWaterError = ContractViolation::UnknownAction { code: 9 }.into();
        assert!(err.is_contract_violation());
        assert!(format!("{}", err).contains("unknown change action 9"));
    }

    #[test]
    fn test_unsupported_feature_message_is_verbatim() {
        let err = BottledWaterError::UnsupportedFeature {
            message: "this version of bottledwater was built without AVRO format support",
        };
        assert_eq!(
            err.to_string(),
            "this version of bottledwater was built without AVRO format support"
        );
    }
}
