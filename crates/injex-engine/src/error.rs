//! Errors raised while resolving keys.
//!
//! A key with no binding and no assisted fallback is not an error; lookups
//! report it as `Ok(None)`.

use crate::key::Key;
use crate::types::TypeId;

pub type Result<T, E = InjectError> = std::result::Result<T, E>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum InjectError {
    /// Malformed request at the public lookup surface.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `key` was re-entered while already on its resolution chain.
    #[error("cycle detected while resolving {path}")]
    CycleDetected { key: Key, path: String },

    /// A produced value failed conformance against its declared or requested type.
    #[error("type mismatch for {subject}: expected {expected_name}, got {actual_name}")]
    TypeMismatch {
        key: Key,
        expected: TypeId,
        actual: TypeId,
        subject: String,
        expected_name: String,
        actual_name: String,
    },

    /// A binding has neither a producer descriptor nor a multibind shape.
    #[error("binding {binding} has no producer")]
    UnboundProducer { key: Key, binding: String },

    /// A multibinding declares an aggregate type other than sequence or mapping.
    #[error("multibinding {binding} has unsupported aggregate type {type_name}")]
    UnsupportedAggregateKind {
        key: Key,
        binding: String,
        type_name: String,
    },

    /// A contribution list referenced a key with no entry.
    #[error("multibinding {binding} references missing contribution {contributor}")]
    MissingContribution { binding: String, contributor: String },

    /// A mapping combinator refused a second contribution under one name.
    #[error("multibinding {binding} received a duplicate contribution for '{name}'")]
    DuplicateContribution { binding: String, name: String },

    #[error("resolution chain exceeded {limit} nested lookups at {subject}")]
    ResolutionDepthExceeded { key: Key, subject: String, limit: u32 },

    /// One chain attempted more lookups in total than its step budget.
    #[error("resolution chain exceeded {limit} lookup steps at {subject}")]
    ResolutionStepsExceeded { key: Key, subject: String, limit: u32 },

    #[error("producer descriptor for {binding} is nested deeper than {limit}")]
    DescriptorTooDeep { binding: String, limit: u32 },

    #[error("unknown class '{0}'")]
    UnknownClass(String),

    #[error("cannot construct {class}: {message}")]
    Construction { class: String, message: String },

    #[error("evaluation of '{expression}' failed: {message}")]
    Evaluation { expression: String, message: String },

    /// A producer-of-producer's first level yielded something that is not a producer.
    #[error("{binding} expected a producer, got {actual}")]
    NotAProducer { binding: String, actual: String },

    #[error("multibinding {binding} combinator is not usable: {reason}")]
    NotACombinator { binding: String, reason: String },

    /// The binding table was not fully configured when the injector was built.
    #[error("binding table is not fully configured")]
    Unconfigured,
}

impl InjectError {
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CycleDetected { .. })
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }
}
