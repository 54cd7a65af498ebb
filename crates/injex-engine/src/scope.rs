//! Execution context and expression evaluation capabilities.

use crate::error::{InjectError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// Caller-supplied execution context threaded through every producer.
///
/// The engine never inspects it. Any `Send + Sync + 'static` type is a
/// scope; `&()` works when the host has nothing to pass.
pub trait Scope: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync> Scope for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Scope + '_ {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Source of an expression handed to the host evaluator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Expression(Arc<str>);

impl Expression {
    pub fn new(source: &str) -> Self {
        Self(Arc::from(source))
    }

    pub fn source(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Expression {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

/// Parser mode for one evaluation, passed explicitly with every request.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalMode {
    #[default]
    Strict,
    Lenient,
}

/// One evaluation request.
pub struct EvalRequest<'a> {
    pub expression: &'a Expression,
    pub scope: &'a dyn Scope,
    pub mode: EvalMode,
    /// Named values visible to the expression (merge expressions bind
    /// `memo`, `value` and, for mappings, `name` and `current`).
    pub locals: &'a [(&'a str, Value)],
}

impl EvalRequest<'_> {
    pub fn local(&self, name: &str) -> Option<&Value> {
        self.locals
            .iter()
            .find(|(local, _)| *local == name)
            .map(|(_, value)| value)
    }

    /// Evaluation error for this request's expression.
    pub fn error(&self, message: impl Into<String>) -> InjectError {
        InjectError::Evaluation {
            expression: self.expression.source().to_string(),
            message: message.into(),
        }
    }
}

/// Expression evaluation capability.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, request: &EvalRequest<'_>) -> Result<Value>;
}

impl<F> Evaluator for F
where
    F: Fn(&EvalRequest<'_>) -> Result<Value> + Send + Sync,
{
    fn evaluate(&self, request: &EvalRequest<'_>) -> Result<Value> {
        self(request)
    }
}

/// Evaluator for hosts that never bind `Evaluating` descriptors.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvaluator;

impl Evaluator for NoEvaluator {
    fn evaluate(&self, request: &EvalRequest<'_>) -> Result<Value> {
        Err(request.error("no expression evaluator is configured"))
    }
}
