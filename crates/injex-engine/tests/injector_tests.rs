use crate::test_support::*;
use crate::*;
use std::sync::Arc;

// =============================================================================
// Entry caching
// =============================================================================

#[test]
fn singleton_constant_returns_the_same_value() {
    let mut fx = Fixture::new();
    fx.builder.bind_named(
        TypeId::SEQUENCE,
        "items",
        ProducerDescriptor::constant(ints(&[1, 2, 3])),
    );
    let injector = fx.build();

    let first = injector.lookup(&(), (TypeId::SEQUENCE, "items")).unwrap().unwrap();
    let second = injector.lookup(&(), (TypeId::SEQUENCE, "items")).unwrap().unwrap();
    assert!(first.same(&second));
    assert_eq!(first, ints(&[1, 2, 3]));
}

#[test]
fn non_caching_constant_hands_out_copies() {
    let mut fx = Fixture::new();
    fx.builder.bind_named(
        TypeId::SEQUENCE,
        "items",
        ProducerDescriptor::non_caching(ProducerDescriptor::constant(ints(&[1, 2, 3]))),
    );
    let injector = fx.build();

    let first = injector.lookup(&(), (TypeId::SEQUENCE, "items")).unwrap().unwrap();
    let second = injector.lookup(&(), (TypeId::SEQUENCE, "items")).unwrap().unwrap();
    assert!(!first.same(&second));
    assert_eq!(first, second);

    first.push(Value::Int(4));
    assert_eq!(second, ints(&[1, 2, 3]));
    let third = injector.lookup(&(), (TypeId::SEQUENCE, "items")).unwrap().unwrap();
    assert_eq!(third, ints(&[1, 2, 3]));
}

#[test]
fn immutable_constants_skip_the_copy() {
    let mut fx = Fixture::new();
    fx.builder.bind_named(
        TypeId::INTEGER,
        "five",
        ProducerDescriptor::non_caching(ProducerDescriptor::constant(5)),
    );
    fx.builder.bind_named(
        TypeId::SEQUENCE,
        "list",
        ProducerDescriptor::non_caching(ProducerDescriptor::constant(ints(&[5]))),
    );
    let injector = fx.build();

    let five = injector.lookup_producer(&(), "five").unwrap().unwrap();
    assert_eq!(five.producer().kind(), ProducerKind::Constant);
    let list = injector
        .lookup_producer(&(), (TypeId::SEQUENCE, "list"))
        .unwrap()
        .unwrap();
    assert_eq!(list.producer().kind(), ProducerKind::DeepCopy);
}

#[test]
fn absent_keys_are_remembered() {
    let injector = Fixture::new().build();
    assert_eq!(injector.lookup(&(), "nothing").unwrap(), None);
    assert_eq!(injector.lookup(&(), "nothing").unwrap(), None);

    let stats = injector.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.entries, 0);
    assert!(injector.entry(injector.keys().data_key("nothing")).is_none());
}

#[test]
fn lookup_or_supplies_a_default() {
    let mut fx = Fixture::new();
    fx.builder
        .bind_named(TypeId::INTEGER, "port", ProducerDescriptor::constant(80));
    let injector = fx.build();

    let default = |value: Option<Value>| value.unwrap_or(Value::Int(8080));
    assert_eq!(injector.lookup_or(&(), "port", default).unwrap(), Value::Int(80));
    assert_eq!(injector.lookup_or(&(), "other", default).unwrap(), Value::Int(8080));
}

#[test]
fn lookup_with_passes_the_scope_through() {
    let injector = Fixture::new().build();
    let scope = Value::Int(7);
    let (seen, value) = injector
        .lookup_with(&scope, "missing", |scope: &dyn Scope, value: Option<Value>| {
            (scope.downcast_ref::<Value>().cloned(), value)
        })
        .unwrap();
    assert_eq!(seen, Some(Value::Int(7)));
    assert_eq!(value, None);
}

// =============================================================================
// Requests and type conformance
// =============================================================================

#[test]
fn bare_names_resolve_data_bindings() {
    let mut fx = Fixture::new();
    fx.builder
        .bind_named(TypeId::INTEGER, "port", ProducerDescriptor::constant(80));
    let injector = fx.build();

    assert_eq!(injector.lookup(&(), "port").unwrap(), Some(Value::Int(80)));
    assert_eq!(
        injector.lookup_by_type(&(), TypeId::NUMERIC, "port").unwrap(),
        Some(Value::Int(80))
    );
}

#[test]
fn typed_lookup_checks_the_requested_type() {
    let mut fx = Fixture::new();
    fx.builder
        .bind_named(TypeId::INTEGER, "port", ProducerDescriptor::constant(80));
    let injector = fx.build();

    // Text and Integer share the normalized data slot.
    let err = injector
        .lookup_by_type(&(), TypeId::TEXT, "port")
        .unwrap_err();
    match err {
        InjectError::TypeMismatch {
            expected,
            actual,
            expected_name,
            ..
        } => {
            assert_eq!(expected, TypeId::TEXT);
            assert_eq!(actual, TypeId::INTEGER);
            assert_eq!(expected_name, "Text");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn produced_values_must_conform_to_the_declared_type() {
    let mut fx = Fixture::new();
    fx.builder
        .bind_named(TypeId::INTEGER, "count", ProducerDescriptor::constant("three"));
    let injector = fx.build();

    let err = injector.lookup(&(), "count").unwrap_err();
    assert!(err.is_type_mismatch());
    match err {
        InjectError::TypeMismatch {
            subject,
            expected_name,
            actual_name,
            ..
        } => {
            assert_eq!(subject, "Data 'count'");
            assert_eq!(expected_name, "Integer");
            assert_eq!(actual_name, "Text");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn declared_check_can_be_disabled() {
    let mut fx = Fixture::new();
    fx.options.type_check = false;
    fx.builder
        .bind_named(TypeId::INTEGER, "count", ProducerDescriptor::constant("three"));
    let injector = fx.build();

    assert_eq!(
        injector.lookup(&(), "count").unwrap(),
        Some(Value::str("three"))
    );
    // An explicitly requested type is still enforced.
    assert!(
        injector
            .lookup_by_type(&(), TypeId::INTEGER, "count")
            .unwrap_err()
            .is_type_mismatch()
    );
}

#[test]
fn malformed_requests_are_rejected() {
    let injector = Fixture::new().build();
    assert!(matches!(
        injector.lookup(&(), (TypeId(999), "x")),
        Err(InjectError::InvalidArgument(_))
    ));
    assert!(matches!(
        injector.lookup(&(), ""),
        Err(InjectError::InvalidArgument(_))
    ));
}

#[test]
fn unconfigured_tables_are_refused() {
    let mut fx = Fixture::new();
    fx.builder
        .bind_named(TypeId::INTEGER, "port", ProducerDescriptor::constant(80));
    let table = Arc::new(fx.builder.snapshot());
    assert!(matches!(
        Injector::new(table),
        Err(InjectError::Unconfigured)
    ));
}

// =============================================================================
// Cycles and depth
// =============================================================================

#[test]
fn mutual_lookups_are_a_cycle() {
    let mut fx = Fixture::new();
    fx.builder
        .bind_named(TypeId::ANY, "a", ProducerDescriptor::lookup(TypeId::ANY, "b"));
    fx.builder
        .bind_named(TypeId::ANY, "b", ProducerDescriptor::lookup(TypeId::ANY, "a"));
    let injector = fx.build();

    let err = injector.lookup(&(), (TypeId::ANY, "a")).unwrap_err();
    match err {
        InjectError::CycleDetected { path, .. } => {
            assert_eq!(path, "Any 'a' -> Any 'b' -> Any 'a'");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Reported again, never cached as a value.
    assert!(
        injector
            .lookup(&(), (TypeId::ANY, "b"))
            .unwrap_err()
            .is_cycle()
    );
}

#[test]
fn self_lookup_is_a_cycle() {
    let mut fx = Fixture::new();
    fx.builder.bind_named(
        TypeId::ANY,
        "self",
        ProducerDescriptor::lookup(TypeId::ANY, "self"),
    );
    let injector = fx.build();

    match injector.lookup(&(), (TypeId::ANY, "self")).unwrap_err() {
        InjectError::CycleDetected { path, .. } => {
            assert_eq!(path, "Any 'self' -> Any 'self'");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn per_call_lookups_detect_cycles_when_produced() {
    let mut fx = Fixture::new();
    fx.builder.bind_named(
        TypeId::ANY,
        "x",
        ProducerDescriptor::non_caching(ProducerDescriptor::lookup(TypeId::ANY, "y")),
    );
    fx.builder.bind_named(
        TypeId::ANY,
        "y",
        ProducerDescriptor::non_caching(ProducerDescriptor::lookup(TypeId::ANY, "x")),
    );
    let injector = fx.build();

    assert!(
        injector
            .lookup(&(), (TypeId::ANY, "x"))
            .unwrap_err()
            .is_cycle()
    );
    // Compilation itself succeeded.
    let x = injector.entry(injector.keys().key(TypeId::ANY, "x")).unwrap();
    assert!(x.is_compiled());
}

#[test]
fn separate_lookups_do_not_share_a_chain() {
    let mut fx = Fixture::new();
    fx.builder
        .bind_named(TypeId::INTEGER, "base", ProducerDescriptor::constant(1));
    fx.builder.bind_named(
        TypeId::ANY,
        "first",
        ProducerDescriptor::lookup(TypeId::INTEGER, "base"),
    );
    fx.builder.bind_named(
        TypeId::ANY,
        "second",
        ProducerDescriptor::lookup(TypeId::INTEGER, "base"),
    );
    let injector = fx.build();

    assert_eq!(
        injector.lookup(&(), (TypeId::ANY, "first")).unwrap(),
        Some(Value::Int(1))
    );
    assert_eq!(
        injector.lookup(&(), (TypeId::ANY, "second")).unwrap(),
        Some(Value::Int(1))
    );
}

fn chain(fx: &mut Fixture, len: usize) {
    for i in 0..len - 1 {
        fx.builder.bind_named(
            TypeId::ANY,
            &format!("k{i}"),
            ProducerDescriptor::lookup(TypeId::ANY, &format!("k{}", i + 1)),
        );
    }
    fx.builder.bind_named(
        TypeId::ANY,
        &format!("k{}", len - 1),
        ProducerDescriptor::constant(1),
    );
}

#[test]
fn long_chains_resolve_within_the_default_depth() {
    let mut fx = Fixture::new();
    chain(&mut fx, 10);
    let injector = fx.build();
    assert_eq!(
        injector.lookup(&(), (TypeId::ANY, "k0")).unwrap(),
        Some(Value::Int(1))
    );
}

#[test]
fn resolution_depth_is_bounded() {
    let mut fx = Fixture::new();
    fx.options.max_resolution_depth = 4;
    chain(&mut fx, 10);
    let injector = fx.build();

    match injector.lookup(&(), (TypeId::ANY, "k0")).unwrap_err() {
        InjectError::ResolutionDepthExceeded { subject, limit, .. } => {
            assert_eq!(limit, 4);
            assert_eq!(subject, "Any 'k4'");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn resolution_steps_are_bounded_across_the_chain() {
    let mut fx = Fixture::new();
    fx.options.max_resolution_steps = 3;
    chain(&mut fx, 4);
    let injector = fx.build();

    match injector.lookup(&(), (TypeId::ANY, "k0")).unwrap_err() {
        InjectError::ResolutionStepsExceeded { subject, limit, .. } => {
            assert_eq!(limit, 3);
            assert_eq!(subject, "Any 'k3'");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // A fresh chain gets a fresh budget; the tail fits.
    assert_eq!(
        injector.lookup(&(), (TypeId::ANY, "k1")).unwrap(),
        Some(Value::Int(1))
    );
}

// =============================================================================
// Producer lookups
// =============================================================================

#[test]
fn singleton_producer_matches_value_lookup() {
    let mut fx = Fixture::new();
    fx.builder
        .bind_named(TypeId::INTEGER, "counted", ProducerDescriptor::evaluating("count"));
    let evaluator = fx.evaluator.clone();
    let injector = fx.build();

    let handle = injector.lookup_producer(&(), "counted").unwrap().unwrap();
    assert_eq!(handle.key(), injector.keys().data_key("counted"));
    assert_eq!(handle.produce(&()).unwrap(), Some(Value::Int(1)));
    assert_eq!(injector.lookup(&(), "counted").unwrap(), Some(Value::Int(1)));
    assert_eq!(evaluator.evaluations(), 1);
}

#[test]
fn per_call_producer_runs_only_when_produced() {
    let mut fx = Fixture::new();
    fx.builder.bind_named(
        TypeId::INTEGER,
        "counted",
        ProducerDescriptor::non_caching(ProducerDescriptor::evaluating("count")),
    );
    let evaluator = fx.evaluator.clone();
    let injector = fx.build();

    let handle = injector.lookup_producer(&(), "counted").unwrap().unwrap();
    assert_eq!(evaluator.evaluations(), 0);
    assert_eq!(handle.produce(&()).unwrap(), Some(Value::Int(1)));
    assert_eq!(handle.produce(&()).unwrap(), Some(Value::Int(2)));
    assert_eq!(injector.lookup(&(), "counted").unwrap(), Some(Value::Int(3)));
}

#[test]
fn producer_lookup_of_absent_key() {
    let injector = Fixture::new().build();
    assert!(injector.lookup_producer(&(), "nothing").unwrap().is_none());
    let seen = injector
        .lookup_producer_with(&(), "nothing", |_scope: &dyn Scope, handle| {
            handle.is_none()
        })
        .unwrap();
    assert!(seen);
}

#[test]
fn produced_values_are_checked_against_the_request() {
    let mut fx = Fixture::new();
    fx.builder
        .bind_named(TypeId::INTEGER, "port", ProducerDescriptor::constant(80));
    let injector = fx.build();

    let handle = injector
        .lookup_producer(&(), (TypeId::TEXT, "port"))
        .unwrap()
        .unwrap();
    assert!(handle.produce(&()).unwrap_err().is_type_mismatch());
}

// =============================================================================
// Inspection and failures
// =============================================================================

#[test]
fn entries_and_stats() {
    let mut fx = Fixture::new();
    let id = fx
        .builder
        .bind_named(TypeId::INTEGER, "port", ProducerDescriptor::constant(80));
    let injector = fx.build();
    let key = injector.keys().data_key("port");

    assert!(injector.has_binding(key));
    assert!(!injector.has_binding(injector.keys().data_key("other")));
    assert!(injector.entry(key).is_none());

    injector.lookup(&(), "port").unwrap();
    injector.lookup(&(), "port").unwrap();
    let entry = injector.entry(key).unwrap();
    assert!(entry.is_compiled());
    assert_eq!(entry.declared(), TypeId::INTEGER);
    assert_eq!(entry.binding().map(|b| b.id), Some(id));

    let stats = injector.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.compiled, 1);
    assert_eq!(stats.misses, 0);
    let json = serde_json::to_value(stats).unwrap();
    assert_eq!(json["compiled"], 1);
}

#[test]
fn failed_compilation_is_retried() {
    let mut fx = Fixture::new();
    fx.builder
        .bind_named(TypeId::ANY, "late", ProducerDescriptor::instance("Late", vec![]));
    let registry = fx.registry.clone();
    let key = fx.key(TypeId::ANY, "late");
    let injector = fx.build();

    let err = injector.lookup(&(), key).unwrap_err();
    assert!(matches!(err, InjectError::UnknownClass(ref name) if name == "Late"));
    let entry = injector.entry(key).unwrap();
    assert!(!entry.is_compiled());

    let late = registry.register_class("Late", TypeId::OBJECT);
    registry.set_default_constructor(late, move || Ok(Value::object(Instance::new(late))));
    let value = injector.lookup(&(), key).unwrap().unwrap();
    assert_eq!(value.type_id(), late);
    assert!(entry.is_compiled());
}

#[test]
fn bindings_without_producers_fail() {
    let mut fx = Fixture::new();
    fx.builder.bind_empty(TypeId::ANY, "hollow");
    let injector = fx.build();
    assert!(matches!(
        injector.lookup(&(), (TypeId::ANY, "hollow")),
        Err(InjectError::UnboundProducer { .. })
    ));
}

#[test]
fn options_from_json_reach_the_injector() {
    let mut fx = Fixture::new();
    fx.options = InjectorOptions::from_json(r#"{ "max_resolution_depth": 2 }"#).unwrap();
    chain(&mut fx, 3);
    let injector = fx.build();
    assert_eq!(injector.options().max_resolution_depth, 2);
    assert!(matches!(
        injector.lookup(&(), (TypeId::ANY, "k0")),
        Err(InjectError::ResolutionDepthExceeded { limit: 2, .. })
    ));
}

// =============================================================================
// Tracing
// =============================================================================

#[derive(Clone)]
struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn resolution_events_are_traced() {
    let mut fx = Fixture::new();
    fx.builder
        .bind_named(TypeId::INTEGER, "port", ProducerDescriptor::constant(80));
    let injector = fx.build();

    let capture = Capture(Arc::default());
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        injector.lookup(&(), "port").unwrap();
        injector.lookup(&(), "port").unwrap();
    });

    let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("injex::resolve_json"));
    assert!(output.contains(r#""event":"compile""#));
    assert!(output.contains(r#""phase":"start""#));
    assert!(output.contains(r#""cache_hit":true"#));
}

#[test]
fn failed_resolutions_close_their_trace_events() {
    let mut fx = Fixture::new();
    fx.builder
        .bind_named(TypeId::ANY, "a", ProducerDescriptor::lookup(TypeId::ANY, "b"));
    fx.builder
        .bind_named(TypeId::ANY, "b", ProducerDescriptor::lookup(TypeId::ANY, "a"));
    let injector = fx.build();

    let capture = Capture(Arc::default());
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        assert!(
            injector
                .lookup(&(), (TypeId::ANY, "a"))
                .unwrap_err()
                .is_cycle()
        );
    });

    let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    let starts = output.matches(r#""phase":"start""#).count();
    let ends = output.matches(r#""phase":"end""#).count();
    assert_eq!(starts, 3, "a, b, then a again");
    assert_eq!(starts, ends);
    assert_eq!(output.matches(r#""outcome":"error""#).count(), 3);
}
