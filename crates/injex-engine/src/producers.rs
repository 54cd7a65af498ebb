//! Executable producers.
//!
//! A producer yields a value (or absence) on demand. Every producer the
//! engine builds is a [`leaf`]: either a fixed outcome captured at compile
//! time or a callable re-run on each `produce`. Hosts wrap their own
//! closures the same way with [`from_fn`].

use crate::error::Result;
use crate::injector::ResolveCx;
use crate::value::Value;
use std::sync::Arc;

/// Capability yielding a value on demand.
pub trait Producer: Send + Sync {
    /// `Ok(None)` is absence, not failure.
    fn produce(&self, cx: &ResolveCx<'_>) -> Result<Option<Value>>;

    fn kind(&self) -> ProducerKind;
}

pub type ProducerRef = Arc<dyn Producer>;

pub type ProduceFn = Arc<dyn Fn(&ResolveCx<'_>) -> Result<Option<Value>> + Send + Sync>;

/// What a compiled producer came from. Diagnostics only.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProducerKind {
    Constant,
    /// Non-singleton constant over a mutable value.
    DeepCopy,
    Instance,
    Evaluating,
    ProducerOfProducer,
    Lookup,
    LookupKey,
    FirstFound,
    Assisted,
    SequenceMultibind,
    MappingMultibind,
    /// Host-supplied closure.
    Callable,
}

impl ProducerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::DeepCopy => "deep-copy",
            Self::Instance => "instance",
            Self::Evaluating => "evaluating",
            Self::ProducerOfProducer => "producer-of-producer",
            Self::Lookup => "lookup",
            Self::LookupKey => "lookup-key",
            Self::FirstFound => "first-found",
            Self::Assisted => "assisted",
            Self::SequenceMultibind => "sequence-multibind",
            Self::MappingMultibind => "mapping-multibind",
            Self::Callable => "callable",
        }
    }
}

pub enum ProducerSource {
    /// Outcome decided at compile time and returned on every call.
    Fixed(Option<Value>),
    /// Re-run on every call.
    Call(ProduceFn),
}

struct Leaf {
    kind: ProducerKind,
    source: ProducerSource,
}

impl Producer for Leaf {
    fn produce(&self, cx: &ResolveCx<'_>) -> Result<Option<Value>> {
        match &self.source {
            ProducerSource::Fixed(value) => Ok(value.clone()),
            ProducerSource::Call(f) => f(cx),
        }
    }

    fn kind(&self) -> ProducerKind {
        self.kind
    }
}

/// The single constructor for engine-built producers.
pub fn leaf(kind: ProducerKind, source: ProducerSource) -> ProducerRef {
    Arc::new(Leaf { kind, source })
}

/// Producer returning the same outcome on every call.
pub fn fixed(kind: ProducerKind, value: Option<Value>) -> ProducerRef {
    leaf(kind, ProducerSource::Fixed(value))
}

/// Producer re-running `f` on every call.
pub fn call(
    kind: ProducerKind,
    f: impl Fn(&ResolveCx<'_>) -> Result<Option<Value>> + Send + Sync + 'static,
) -> ProducerRef {
    leaf(kind, ProducerSource::Call(Arc::new(f)))
}

/// Wrap a host closure as a producer.
///
/// ```ignore
/// let counter = AtomicI64::new(0);
/// let next = from_fn(move |_cx| Ok(Some(Value::Int(counter.fetch_add(1, Ordering::SeqCst)))));
/// ```
pub fn from_fn(
    f: impl Fn(&ResolveCx<'_>) -> Result<Option<Value>> + Send + Sync + 'static,
) -> ProducerRef {
    call(ProducerKind::Callable, f)
}
