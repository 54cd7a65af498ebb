//! Multibinding aggregation.
//!
//! A multibinding's contributions are published under its contribution key
//! as an ordered list of contributor keys. Every produce call resolves that
//! list on the current chain, resolves each contributor, and folds the
//! values through the multibinding's combinator.

use crate::binding::{Binding, CombinatorSpec, MultibindSpec};
use crate::combinators::{BuiltinCombinator, Combinator, ExpressionCombinator};
use crate::error::{InjectError, Result};
use crate::injector::ResolveCx;
use crate::key::Key;
use crate::producers::{self, ProducerKind, ProducerRef};
use crate::transform;
use crate::types::TypeId;
use crate::value::{Value, ValueMap};
use std::sync::Arc;
use tracing::trace;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Aggregate {
    Sequence,
    Mapping,
}

impl Aggregate {
    fn name(self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
        }
    }
}

enum CombinatorSource {
    Fixed(Combinator),
    /// Compiled once; produced once per aggregation pass.
    Produced(ProducerRef),
}

struct Aggregation {
    binding: Arc<Binding>,
    aggregate: Aggregate,
    contributions: Key,
    element: Option<TypeId>,
    combinator: CombinatorSource,
}

pub(crate) fn compile(
    cx: &ResolveCx<'_>,
    binding: &Arc<Binding>,
    spec: &MultibindSpec,
) -> Result<ProducerRef> {
    let types = cx.injector().types();
    let aggregate = if types.is_subtype(binding.ty, TypeId::SEQUENCE) {
        Aggregate::Sequence
    } else if types.is_subtype(binding.ty, TypeId::MAPPING) {
        Aggregate::Mapping
    } else {
        return Err(InjectError::UnsupportedAggregateKind {
            key: cx.keys().key(binding.ty, &binding.name),
            binding: binding.describe(types),
            type_name: types.type_name(binding.ty).to_string(),
        });
    };

    let combinator = match &spec.combinator {
        None => CombinatorSource::Fixed(match aggregate {
            Aggregate::Sequence => BuiltinCombinator::Append.combinator(),
            Aggregate::Mapping => BuiltinCombinator::Assign.combinator(),
        }),
        Some(CombinatorSpec::Builtin(builtin)) => {
            CombinatorSource::Fixed(builtin.combinator())
        }
        Some(CombinatorSpec::Expression { expression, mode }) => {
            let merge = ExpressionCombinator::new(expression.clone(), *mode);
            CombinatorSource::Fixed(match aggregate {
                Aggregate::Sequence => Combinator::sequence(merge),
                Aggregate::Mapping => Combinator::mapping(merge),
            })
        }
        Some(CombinatorSpec::Producer(descriptor)) => {
            CombinatorSource::Produced(transform::compile_descriptor(cx, binding, descriptor)?)
        }
    };

    let aggregation = Aggregation {
        binding: binding.clone(),
        aggregate,
        contributions: cx.keys().contribution_key(binding.id),
        element: spec.element,
        combinator,
    };
    if let CombinatorSource::Fixed(combinator) = &aggregation.combinator {
        aggregation.check_shape(cx, combinator)?;
    }

    trace!(
        binding_id = binding.id.0,
        aggregate = aggregate.name(),
        "compiled multibinding"
    );
    let kind = match aggregate {
        Aggregate::Sequence => ProducerKind::SequenceMultibind,
        Aggregate::Mapping => ProducerKind::MappingMultibind,
    };
    Ok(producers::call(kind, move |cx| {
        aggregation.aggregate(cx).map(Some)
    }))
}

impl Aggregation {
    fn aggregate(&self, cx: &ResolveCx<'_>) -> Result<Value> {
        let contributors = self.contributors(cx)?;
        let combinator = self.combinator(cx)?;
        match combinator {
            Combinator::Sequence(combinator) => {
                let types = cx.injector().types();
                let mut acc = Vec::with_capacity(contributors.len());
                for key in contributors {
                    let Some((_, value)) = self.contribution(cx, key)? else {
                        continue;
                    };
                    acc = combinator.combine(cx, &self.binding, types, acc, value)?;
                }
                Ok(Value::list(acc))
            }
            Combinator::Mapping(combinator) => {
                let types = cx.injector().types();
                let mut acc = ValueMap::with_capacity(contributors.len());
                for key in contributors {
                    let Some((name, value)) = self.contribution(cx, key)? else {
                        continue;
                    };
                    let previous = acc.get(name.as_ref()).cloned();
                    let stored = combinator.combine(
                        cx,
                        &self.binding,
                        types,
                        &acc,
                        &name,
                        previous.as_ref(),
                        value,
                    )?;
                    acc.insert(name, stored);
                }
                Ok(Value::from_map(acc))
            }
        }
    }

    /// Ordered contributor keys; none published means no contributions.
    fn contributors(&self, cx: &ResolveCx<'_>) -> Result<Vec<Key>> {
        let Some(list) = cx.lookup_key(self.contributions)? else {
            return Ok(Vec::new());
        };
        let items = list.list_snapshot().unwrap_or_default();
        items
            .iter()
            .map(|item| {
                item.as_key().ok_or_else(|| InjectError::MissingContribution {
                    binding: self.describe(cx),
                    contributor: format!("{item:?}"),
                })
            })
            .collect()
    }

    /// Resolve one contributor to its name and value. Absent values are
    /// skipped by the caller.
    fn contribution(&self, cx: &ResolveCx<'_>, key: Key) -> Result<Option<(Arc<str>, Value)>> {
        let Some(entry) = cx.entry(key) else {
            return Err(InjectError::MissingContribution {
                binding: self.describe(cx),
                contributor: cx.keys().describe(key),
            });
        };
        let Some(value) = cx.lookup_key(key)? else {
            return Ok(None);
        };
        if let Some(element) = self.element {
            let types = cx.injector().types();
            if !types.is_instance(element, &value) {
                let actual = types.type_of(&value);
                return Err(InjectError::TypeMismatch {
                    key,
                    expected: element,
                    actual,
                    subject: format!(
                        "contribution {} to {}",
                        cx.keys().describe(key),
                        self.describe(cx)
                    ),
                    expected_name: types.type_name(element).to_string(),
                    actual_name: types.type_name(actual).to_string(),
                });
            }
        }
        let name = match entry.binding() {
            Some(binding) => binding.name.clone(),
            None => cx.keys().name_of(key),
        };
        Ok(Some((name, value)))
    }

    fn combinator(&self, cx: &ResolveCx<'_>) -> Result<Combinator> {
        match &self.combinator {
            CombinatorSource::Fixed(combinator) => Ok(combinator.clone()),
            CombinatorSource::Produced(producer) => {
                let produced = producer.produce(cx)?;
                let combinator = produced
                    .as_ref()
                    .and_then(Combinator::from_value)
                    .ok_or_else(|| InjectError::NotACombinator {
                        binding: self.describe(cx),
                        reason: match &produced {
                            Some(value) => format!("produced {value:?}"),
                            None => "produced nothing".to_string(),
                        },
                    })?;
                self.check_shape(cx, &combinator)?;
                Ok(combinator)
            }
        }
    }

    fn check_shape(&self, cx: &ResolveCx<'_>, combinator: &Combinator) -> Result<()> {
        let matches = matches!(
            (self.aggregate, combinator),
            (Aggregate::Sequence, Combinator::Sequence(_))
                | (Aggregate::Mapping, Combinator::Mapping(_))
        );
        if matches {
            return Ok(());
        }
        Err(InjectError::NotACombinator {
            binding: self.describe(cx),
            reason: format!(
                "{} combinator cannot aggregate a {}",
                combinator.shape(),
                self.aggregate.name()
            ),
        })
    }

    fn describe(&self, cx: &ResolveCx<'_>) -> String {
        self.binding.describe(cx.injector().types())
    }
}
