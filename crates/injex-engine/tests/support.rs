//! Shared fixtures for engine tests.

use crate::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

/// Small expression language for tests.
///
/// - `<integer>`: that integer
/// - `count`: number of evaluations so far, including this one
/// - `scope`: the scope, when it is a `Value`; `nil` otherwise
/// - `mode`: `"strict"` or `"lenient"`
/// - `ticker`: a fresh producer yielding 1, 2, 3, ...
/// - `append`: sequence merge, `memo` with `value` appended
/// - `describe`: mapping merge, `"<name>:<value>"`
pub(crate) struct TestEvaluator {
    evaluations: AtomicUsize,
}

impl TestEvaluator {
    pub(crate) fn new() -> Self {
        Self {
            evaluations: AtomicUsize::new(0),
        }
    }

    pub(crate) fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

impl Evaluator for TestEvaluator {
    fn evaluate(&self, request: &EvalRequest<'_>) -> Result<Value> {
        let n = self.evaluations.fetch_add(1, Ordering::SeqCst) + 1;
        match request.expression.source() {
            "count" => Ok(Value::Int(n as i64)),
            "scope" => Ok(request
                .scope
                .downcast_ref::<Value>()
                .cloned()
                .unwrap_or(Value::Nil)),
            "mode" => Ok(Value::str(match request.mode {
                EvalMode::Strict => "strict",
                EvalMode::Lenient => "lenient",
            })),
            "ticker" => {
                let counter = Arc::new(AtomicI64::new(0));
                Ok(Value::Producer(from_fn(move |_| {
                    Ok(Some(Value::Int(counter.fetch_add(1, Ordering::SeqCst) + 1)))
                })))
            }
            "append" => {
                let mut memo = request
                    .local("memo")
                    .and_then(Value::list_snapshot)
                    .unwrap_or_default();
                memo.extend(request.local("value").cloned());
                Ok(Value::list(memo))
            }
            "describe" => {
                let name = request
                    .local("name")
                    .and_then(Value::as_string)
                    .unwrap_or_default();
                let value = request.local("value").cloned().unwrap_or(Value::Nil);
                Ok(Value::str(&format!("{name}:{value:?}")))
            }
            source => source
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| request.error("unsupported expression")),
        }
    }
}

/// Registry, evaluator and binding table under construction.
pub(crate) struct Fixture {
    pub registry: Arc<TypeRegistry>,
    pub evaluator: Arc<TestEvaluator>,
    pub builder: BindingMapBuilder,
    pub options: InjectorOptions,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let registry = Arc::new(TypeRegistry::new());
        Self {
            builder: BindingMapBuilder::new(registry.clone()),
            registry,
            evaluator: Arc::new(TestEvaluator::new()),
            options: InjectorOptions::default(),
        }
    }

    pub(crate) fn key(&self, ty: TypeId, name: &str) -> Key {
        self.builder.keys().key(ty, name)
    }

    /// Class whose default constructor numbers its instances 1, 2, 3, ...
    pub(crate) fn counted_class(&self, name: &str) -> (TypeId, Arc<AtomicUsize>) {
        let ty = self.registry.register_class(name, TypeId::OBJECT);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        self.registry.set_default_constructor(ty, move || {
            let serial = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Value::object(
                Instance::new(ty).with_field("serial", Value::Int(serial as i64)),
            ))
        });
        (ty, count)
    }

    pub(crate) fn build(self) -> Injector {
        Injector::builder(Arc::new(self.builder.finish()))
            .reflection(self.registry)
            .evaluator(self.evaluator)
            .options(self.options)
            .build()
            .expect("finished tables are configured")
    }
}

pub(crate) fn serial(value: &Value) -> Option<i64> {
    value.as_object()?.get("serial")?.as_int()
}

pub(crate) fn ints(values: &[i64]) -> Value {
    Value::list(values.iter().map(|v| Value::Int(*v)))
}
