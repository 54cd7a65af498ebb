//! Producer descriptor compilation.
//!
//! Each descriptor node compiles to one producer. A node is singleton-scoped
//! unless its immediate parent is `NonCaching`; the decision is made here,
//! once, and baked into the producer:
//!
//! | Kind | Singleton | Per call |
//! |------|-----------|----------|
//! | Constant | stored value | deep copy (immutable kinds as-is) |
//! | Instance | constructed at compile time | constructed per call |
//! | Evaluating | evaluated at compile time | evaluated against the call's scope |
//! | ProducerOfProducer | first level collapsed at compile time | both levels per call |
//! | Lookup / LookupKey | looked up at compile time | looked up per call |
//! | FirstFound | first non-absent alternative, fixed | searched per call |
//!
//! Compile-time work runs on the resolving chain, so a singleton lookup
//! that loops back to its own key is reported as a cycle.

use crate::binding::{Binding, ProducerDescriptor};
use crate::error::{InjectError, Result};
use crate::injector::ResolveCx;
use crate::key::Key;
use crate::multibind;
use crate::producers::{self, ProducerKind, ProducerRef};
use crate::recursion::DepthCounter;
use crate::scope::{EvalMode, EvalRequest, Expression};
use crate::value::Value;
use std::sync::Arc;
use tracing::trace;

/// Compile the producer for `binding`, cached on the entry for `key`.
pub(crate) fn compile(cx: &ResolveCx<'_>, key: Key, binding: &Arc<Binding>) -> Result<ProducerRef> {
    trace!(
        key = %cx.keys().describe(key),
        binding_id = binding.id.0,
        "compiling producer"
    );
    match (&binding.producer, &binding.multibind) {
        (Some(descriptor), _) => compile_descriptor(cx, binding, descriptor),
        (None, Some(spec)) => multibind::compile(cx, binding, spec),
        (None, None) => Err(InjectError::UnboundProducer {
            key,
            binding: describe(cx, binding),
        }),
    }
}

/// Compile `descriptor` as a singleton root on behalf of `binding`.
pub(crate) fn compile_descriptor(
    cx: &ResolveCx<'_>,
    binding: &Binding,
    descriptor: &ProducerDescriptor,
) -> Result<ProducerRef> {
    let profile = cx.injector().options().descriptor_profile();
    let mut compiler = Compiler {
        cx,
        binding,
        depth: DepthCounter::with_profile(profile),
    };
    compiler.node(descriptor, true)
}

fn describe(cx: &ResolveCx<'_>, binding: &Binding) -> String {
    binding.describe(cx.injector().types())
}

struct Compiler<'c, 'a> {
    cx: &'c ResolveCx<'a>,
    binding: &'c Binding,
    depth: DepthCounter,
}

impl Compiler<'_, '_> {
    fn node(&mut self, descriptor: &ProducerDescriptor, singleton: bool) -> Result<ProducerRef> {
        if !self.depth.enter() {
            return Err(InjectError::DescriptorTooDeep {
                binding: describe(self.cx, self.binding),
                limit: self.depth.max_depth(),
            });
        }
        let result = self.dispatch(descriptor, singleton);
        self.depth.leave();
        result
    }

    fn dispatch(&mut self, descriptor: &ProducerDescriptor, singleton: bool) -> Result<ProducerRef> {
        match descriptor {
            ProducerDescriptor::Constant(value) => Ok(constant(value, singleton)),
            ProducerDescriptor::Instance { class, args } => self.instance(class, args, singleton),
            ProducerDescriptor::Evaluating { expression, mode } => {
                self.evaluating(expression, *mode, singleton)
            }
            ProducerDescriptor::ProducerOfProducer(inner) => {
                let inner = self.node(inner, true)?;
                self.producer_of(inner, singleton)
            }
            ProducerDescriptor::Lookup { ty, name } => {
                let key = self.cx.keys().key(*ty, name);
                self.lookup(key, None, singleton)
            }
            ProducerDescriptor::LookupKey { ty, name, entry } => {
                let key = self.cx.keys().key(*ty, name);
                self.lookup(key, Some(entry.clone()), singleton)
            }
            ProducerDescriptor::FirstFound(alternatives) => {
                let compiled = alternatives
                    .iter()
                    .map(|alternative| self.node(alternative, true))
                    .collect::<Result<Vec<_>>>()?;
                self.first_found(compiled, singleton)
            }
            // Not a behavior of its own: forces its child to per-call.
            ProducerDescriptor::NonCaching(inner) => self.node(inner, false),
        }
    }

    fn instance(&self, class: &str, args: &[Value], singleton: bool) -> Result<ProducerRef> {
        let reflection = self.cx.injector().reflection();
        let ty = reflection
            .resolve_class_by_name(class)
            .ok_or_else(|| InjectError::UnknownClass(class.to_string()))?;
        if singleton {
            let value = reflection.instantiate(ty, args)?;
            return Ok(producers::fixed(ProducerKind::Instance, Some(value)));
        }
        let args: Arc<[Value]> = Arc::from(args);
        Ok(producers::call(ProducerKind::Instance, move |cx| {
            cx.injector().reflection().instantiate(ty, &args).map(Some)
        }))
    }

    fn evaluating(
        &self,
        expression: &Expression,
        mode: EvalMode,
        singleton: bool,
    ) -> Result<ProducerRef> {
        if singleton {
            let value = evaluate(self.cx, expression, mode)?;
            return Ok(producers::fixed(ProducerKind::Evaluating, Some(value)));
        }
        let expression = expression.clone();
        Ok(producers::call(ProducerKind::Evaluating, move |cx| {
            evaluate(cx, &expression, mode).map(Some)
        }))
    }

    fn producer_of(&self, inner: ProducerRef, singleton: bool) -> Result<ProducerRef> {
        let binding: Arc<str> = Arc::from(describe(self.cx, self.binding));
        if singleton {
            let second = second_level(&binding, inner.produce(self.cx)?)?;
            return Ok(producers::call(ProducerKind::ProducerOfProducer, move |cx| {
                second.produce(cx)
            }));
        }
        Ok(producers::call(ProducerKind::ProducerOfProducer, move |cx| {
            second_level(&binding, inner.produce(cx)?)?.produce(cx)
        }))
    }

    fn lookup(&self, key: Key, entry: Option<Arc<str>>, singleton: bool) -> Result<ProducerRef> {
        let kind = if entry.is_some() {
            ProducerKind::LookupKey
        } else {
            ProducerKind::Lookup
        };
        if singleton {
            let value = delegate(self.cx, key, entry.as_deref())?;
            return Ok(producers::fixed(kind, value));
        }
        Ok(producers::call(kind, move |cx| {
            delegate(cx, key, entry.as_deref())
        }))
    }

    fn first_found(&self, alternatives: Vec<ProducerRef>, singleton: bool) -> Result<ProducerRef> {
        if singleton {
            let value = search(self.cx, &alternatives)?;
            return Ok(producers::fixed(ProducerKind::FirstFound, value));
        }
        Ok(producers::call(ProducerKind::FirstFound, move |cx| {
            search(cx, &alternatives)
        }))
    }
}

fn constant(value: &Value, singleton: bool) -> ProducerRef {
    if singleton || value.is_immutable() {
        return producers::fixed(ProducerKind::Constant, Some(value.clone()));
    }
    let seed = value.clone();
    producers::call(ProducerKind::DeepCopy, move |_| Ok(Some(seed.deep_copy())))
}

fn evaluate(cx: &ResolveCx<'_>, expression: &Expression, mode: EvalMode) -> Result<Value> {
    let request = EvalRequest {
        expression,
        scope: cx.scope(),
        mode,
        locals: &[],
    };
    cx.injector().evaluator().evaluate(&request)
}

fn second_level(binding: &str, first: Option<Value>) -> Result<ProducerRef> {
    match first {
        Some(Value::Producer(producer)) => Ok(producer),
        other => Err(InjectError::NotAProducer {
            binding: binding.to_string(),
            actual: match other {
                Some(value) => format!("{value:?}"),
                None => "nothing".to_string(),
            },
        }),
    }
}

/// Delegated lookup; with `entry`, extracts that entry from a mapping result.
fn delegate(cx: &ResolveCx<'_>, key: Key, entry: Option<&str>) -> Result<Option<Value>> {
    let value = cx.lookup_key(key)?;
    Ok(match entry {
        Some(entry) => value.and_then(|map| map.map_get(entry)),
        None => value,
    })
}

fn search(cx: &ResolveCx<'_>, alternatives: &[ProducerRef]) -> Result<Option<Value>> {
    for alternative in alternatives {
        if let Some(value) = alternative.produce(cx)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}
