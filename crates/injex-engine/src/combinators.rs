//! Merge strategies for multibinding aggregation.
//!
//! A sequence combinator folds each contribution into the accumulated list.
//! A mapping combinator decides the value stored under a contribution's name,
//! given whatever is already stored there.
//!
//! Custom combinators reach the engine as values: a producer whose result is
//! [`Combinator::into_value`] can be named as a multibinding's combinator.

use crate::binding::Binding;
use crate::error::{InjectError, Result};
use crate::injector::ResolveCx;
use crate::scope::{EvalMode, EvalRequest, Expression};
use crate::types::TypeSystem;
use crate::value::{Value, ValueMap};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub trait SequenceCombinator: Send + Sync {
    fn combine(
        &self,
        cx: &ResolveCx<'_>,
        binding: &Binding,
        types: &dyn TypeSystem,
        acc: Vec<Value>,
        next: Value,
    ) -> Result<Vec<Value>>;
}

pub trait MappingCombinator: Send + Sync {
    /// Returns the value to store under `name`.
    fn combine(
        &self,
        cx: &ResolveCx<'_>,
        binding: &Binding,
        types: &dyn TypeSystem,
        acc: &ValueMap,
        name: &str,
        previous: Option<&Value>,
        value: Value,
    ) -> Result<Value>;
}

#[derive(Clone)]
pub enum Combinator {
    Sequence(Arc<dyn SequenceCombinator>),
    Mapping(Arc<dyn MappingCombinator>),
}

impl Combinator {
    pub fn sequence(combinator: impl SequenceCombinator + 'static) -> Self {
        Self::Sequence(Arc::new(combinator))
    }

    pub fn mapping(combinator: impl MappingCombinator + 'static) -> Self {
        Self::Mapping(Arc::new(combinator))
    }

    pub fn into_value(self) -> Value {
        Value::native(self)
    }

    /// The combinator carried by a value built with [`into_value`](Self::into_value).
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .downcast_native::<Combinator>()
            .map(|combinator| (*combinator).clone())
    }

    pub(crate) fn shape(&self) -> &'static str {
        match self {
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }
}

impl std::fmt::Debug for Combinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Combinator({})", self.shape())
    }
}

// =============================================================================
// Built-in combinators
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinCombinator {
    /// Sequence default.
    Append,
    /// Skip contributions equal to one already collected.
    Unique,
    /// Splice list contributions element by element.
    Flatten,
    /// Mapping default: later contributions overwrite.
    Assign,
    KeepFirst,
    /// Shallow merge when both sides are maps, overwrite otherwise.
    Merge,
    /// Gather every value contributed under a name into a list.
    Collect,
    /// Fail on a second contribution under one name.
    RejectDuplicates,
}

impl BuiltinCombinator {
    pub fn is_sequence(self) -> bool {
        matches!(self, Self::Append | Self::Unique | Self::Flatten)
    }

    pub fn combinator(self) -> Combinator {
        match self {
            Self::Append => Combinator::sequence(Append),
            Self::Unique => Combinator::sequence(Unique),
            Self::Flatten => Combinator::sequence(Flatten),
            Self::Assign => Combinator::mapping(Assign),
            Self::KeepFirst => Combinator::mapping(KeepFirst),
            Self::Merge => Combinator::mapping(Merge),
            Self::Collect => Combinator::mapping(Collect),
            Self::RejectDuplicates => Combinator::mapping(RejectDuplicates),
        }
    }
}

struct Append;

impl SequenceCombinator for Append {
    fn combine(
        &self,
        _cx: &ResolveCx<'_>,
        _binding: &Binding,
        _types: &dyn TypeSystem,
        mut acc: Vec<Value>,
        next: Value,
    ) -> Result<Vec<Value>> {
        acc.push(next);
        Ok(acc)
    }
}

struct Unique;

impl SequenceCombinator for Unique {
    fn combine(
        &self,
        _cx: &ResolveCx<'_>,
        _binding: &Binding,
        _types: &dyn TypeSystem,
        mut acc: Vec<Value>,
        next: Value,
    ) -> Result<Vec<Value>> {
        if !acc.contains(&next) {
            acc.push(next);
        }
        Ok(acc)
    }
}

struct Flatten;

impl SequenceCombinator for Flatten {
    fn combine(
        &self,
        _cx: &ResolveCx<'_>,
        _binding: &Binding,
        _types: &dyn TypeSystem,
        mut acc: Vec<Value>,
        next: Value,
    ) -> Result<Vec<Value>> {
        match next.list_snapshot() {
            Some(items) => acc.extend(items),
            None => acc.push(next),
        }
        Ok(acc)
    }
}

struct Assign;

impl MappingCombinator for Assign {
    fn combine(
        &self,
        _cx: &ResolveCx<'_>,
        _binding: &Binding,
        _types: &dyn TypeSystem,
        _acc: &ValueMap,
        _name: &str,
        _previous: Option<&Value>,
        value: Value,
    ) -> Result<Value> {
        Ok(value)
    }
}

struct KeepFirst;

impl MappingCombinator for KeepFirst {
    fn combine(
        &self,
        _cx: &ResolveCx<'_>,
        _binding: &Binding,
        _types: &dyn TypeSystem,
        _acc: &ValueMap,
        _name: &str,
        previous: Option<&Value>,
        value: Value,
    ) -> Result<Value> {
        Ok(previous.cloned().unwrap_or(value))
    }
}

struct Merge;

impl MappingCombinator for Merge {
    fn combine(
        &self,
        _cx: &ResolveCx<'_>,
        _binding: &Binding,
        _types: &dyn TypeSystem,
        _acc: &ValueMap,
        _name: &str,
        previous: Option<&Value>,
        value: Value,
    ) -> Result<Value> {
        let (Some(mut merged), Some(incoming)) =
            (previous.and_then(Value::map_snapshot), value.map_snapshot())
        else {
            return Ok(value);
        };
        merged.extend(incoming);
        Ok(Value::from_map(merged))
    }
}

struct Collect;

impl MappingCombinator for Collect {
    fn combine(
        &self,
        _cx: &ResolveCx<'_>,
        _binding: &Binding,
        _types: &dyn TypeSystem,
        _acc: &ValueMap,
        _name: &str,
        previous: Option<&Value>,
        value: Value,
    ) -> Result<Value> {
        let mut items = previous
            .and_then(Value::list_snapshot)
            .unwrap_or_default();
        items.push(value);
        Ok(Value::list(items))
    }
}

struct RejectDuplicates;

impl MappingCombinator for RejectDuplicates {
    fn combine(
        &self,
        _cx: &ResolveCx<'_>,
        binding: &Binding,
        types: &dyn TypeSystem,
        _acc: &ValueMap,
        name: &str,
        previous: Option<&Value>,
        value: Value,
    ) -> Result<Value> {
        if previous.is_some() {
            return Err(InjectError::DuplicateContribution {
                binding: binding.describe(types),
                name: name.to_string(),
            });
        }
        Ok(value)
    }
}

// =============================================================================
// Merge expressions
// =============================================================================

/// Combinator evaluating a host expression per contribution.
///
/// Sequence locals: `memo` (list so far), `value`. The result must be a list.
/// Mapping locals: `memo`, `name`, `current` (`nil` when unset), `value`.
pub(crate) struct ExpressionCombinator {
    expression: Expression,
    mode: EvalMode,
}

impl ExpressionCombinator {
    pub(crate) fn new(expression: Expression, mode: EvalMode) -> Self {
        Self { expression, mode }
    }

    fn evaluate(&self, cx: &ResolveCx<'_>, locals: &[(&str, Value)]) -> Result<Value> {
        let request = EvalRequest {
            expression: &self.expression,
            scope: cx.scope(),
            mode: self.mode,
            locals,
        };
        cx.injector().evaluator().evaluate(&request)
    }
}

impl SequenceCombinator for ExpressionCombinator {
    fn combine(
        &self,
        cx: &ResolveCx<'_>,
        _binding: &Binding,
        _types: &dyn TypeSystem,
        acc: Vec<Value>,
        next: Value,
    ) -> Result<Vec<Value>> {
        let result = self.evaluate(cx, &[("memo", Value::list(acc)), ("value", next)])?;
        result.list_snapshot().ok_or_else(|| InjectError::Evaluation {
            expression: self.expression.source().to_string(),
            message: format!("merge expression must yield a sequence, got {result:?}"),
        })
    }
}

impl MappingCombinator for ExpressionCombinator {
    fn combine(
        &self,
        cx: &ResolveCx<'_>,
        _binding: &Binding,
        _types: &dyn TypeSystem,
        acc: &ValueMap,
        name: &str,
        previous: Option<&Value>,
        value: Value,
    ) -> Result<Value> {
        self.evaluate(
            cx,
            &[
                ("memo", Value::from_map(acc.clone())),
                ("name", Value::str(name)),
                ("current", previous.cloned().unwrap_or(Value::Nil)),
                ("value", value),
            ],
        )
    }
}

#[cfg(test)]
#[path = "../tests/combinator_tests.rs"]
mod tests;
