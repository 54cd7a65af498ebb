//! Bindings, producer descriptors and binding tables.
//!
//! Bindings are produced by a configuration phase and are read-only here.
//! The engine consumes them through [`BindingTable`]; [`BindingMap`] is a
//! finished in-memory table that hosts (and tests) can build directly.

use crate::combinators::BuiltinCombinator;
use crate::error::{InjectError, Result};
use crate::key::{Key, KeyFactory};
use crate::scope::{EvalMode, Expression};
use crate::types::{TypeId, TypeSystem};
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::trace;

// =============================================================================
// Descriptors
// =============================================================================

/// Tagged tree describing how a binding produces its value.
///
/// A node is compiled singleton-scoped unless its immediate parent is
/// [`NonCaching`](Self::NonCaching).
#[derive(Clone, Debug)]
pub enum ProducerDescriptor {
    Constant(Value),
    /// Instance of a class resolved by name, built from `args`.
    Instance { class: Arc<str>, args: Vec<Value> },
    Evaluating { expression: Expression, mode: EvalMode },
    /// The inner descriptor yields a producer, which is then invoked.
    ProducerOfProducer(Box<ProducerDescriptor>),
    /// Delegates to the binding at `(ty, name)`.
    Lookup { ty: TypeId, name: Arc<str> },
    /// Delegates to `(ty, name)` and extracts `entry` from the resulting map.
    LookupKey {
        ty: TypeId,
        name: Arc<str>,
        entry: Arc<str>,
    },
    /// First non-absent value among the alternatives.
    FirstFound(Vec<ProducerDescriptor>),
    /// Forces its immediate child to per-call behavior.
    NonCaching(Box<ProducerDescriptor>),
}

impl ProducerDescriptor {
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    pub fn instance(class: &str, args: Vec<Value>) -> Self {
        Self::Instance {
            class: Arc::from(class),
            args,
        }
    }

    pub fn evaluating(expression: &str) -> Self {
        Self::Evaluating {
            expression: Expression::new(expression),
            mode: EvalMode::default(),
        }
    }

    pub fn producer_of(inner: ProducerDescriptor) -> Self {
        Self::ProducerOfProducer(Box::new(inner))
    }

    pub fn lookup(ty: TypeId, name: &str) -> Self {
        Self::Lookup {
            ty,
            name: Arc::from(name),
        }
    }

    pub fn lookup_entry(ty: TypeId, name: &str, entry: &str) -> Self {
        Self::LookupKey {
            ty,
            name: Arc::from(name),
            entry: Arc::from(entry),
        }
    }

    pub fn first_found(alternatives: Vec<ProducerDescriptor>) -> Self {
        Self::FirstFound(alternatives)
    }

    pub fn non_caching(inner: ProducerDescriptor) -> Self {
        Self::NonCaching(Box::new(inner))
    }

    /// Kind name used in traces and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Constant(_) => "constant",
            Self::Instance { .. } => "instance",
            Self::Evaluating { .. } => "evaluating",
            Self::ProducerOfProducer(_) => "producer-of-producer",
            Self::Lookup { .. } => "lookup",
            Self::LookupKey { .. } => "lookup-key",
            Self::FirstFound(_) => "first-found",
            Self::NonCaching(_) => "non-caching",
        }
    }
}

/// How a multibinding folds its contributions.
#[derive(Clone, Debug)]
pub enum CombinatorSpec {
    Builtin(BuiltinCombinator),
    /// Merge expression evaluated per contribution.
    Expression { expression: Expression, mode: EvalMode },
    /// Descriptor whose produced value is a `Combinator`, compiled once and
    /// invoked once per aggregation pass.
    Producer(Box<ProducerDescriptor>),
}

#[derive(Clone, Debug, Default)]
pub struct MultibindSpec {
    /// Type every contribution must conform to.
    pub element: Option<TypeId>,
    pub combinator: Option<CombinatorSpec>,
}

impl MultibindSpec {
    pub fn with_element(mut self, element: TypeId) -> Self {
        self.element = Some(element);
        self
    }

    pub fn with_combinator(mut self, combinator: CombinatorSpec) -> Self {
        self.combinator = Some(combinator);
        self
    }
}

// =============================================================================
// Binding
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u32);

/// Immutable record describing how to satisfy one key.
///
/// For multibindings `ty` is the aggregate type (a sequence or mapping
/// type) and `producer` is absent.
#[derive(Clone, Debug)]
pub struct Binding {
    pub id: BindingId,
    pub ty: TypeId,
    pub name: Arc<str>,
    pub producer: Option<ProducerDescriptor>,
    pub multibind: Option<MultibindSpec>,
}

impl Binding {
    pub fn is_multibind(&self) -> bool {
        self.multibind.is_some()
    }

    /// `Type 'name'` form for diagnostics.
    pub fn describe(&self, types: &dyn TypeSystem) -> String {
        let ty = types.type_name(self.ty);
        if self.name.is_empty() {
            ty.to_string()
        } else {
            format!("{ty} '{}'", self.name)
        }
    }
}

// =============================================================================
// BindingTable
// =============================================================================

/// A finished mapping from key to binding, as produced by configuration.
pub trait BindingTable: Send + Sync {
    /// Whether configuration completed; injectors refuse unconfigured tables.
    fn is_configured(&self) -> bool;

    /// The factory every key of this table was minted by.
    fn keys(&self) -> &KeyFactory;

    fn binding(&self, key: &Key) -> Option<Arc<Binding>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory binding table.
pub struct BindingMap {
    keys: KeyFactory,
    bindings: FxHashMap<Key, Arc<Binding>>,
    configured: bool,
}

impl BindingMap {
    pub fn builder(types: Arc<dyn TypeSystem>) -> BindingMapBuilder {
        BindingMapBuilder::new(types)
    }

    /// Look up by `(ty, name)` without minting a key for the caller.
    pub fn get(&self, ty: TypeId, name: &str) -> Option<Arc<Binding>> {
        self.bindings.get(&self.keys.key(ty, name)).cloned()
    }
}

impl BindingTable for BindingMap {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn keys(&self) -> &KeyFactory {
        &self.keys
    }

    fn binding(&self, key: &Key) -> Option<Arc<Binding>> {
        self.bindings.get(key).cloned()
    }

    fn len(&self) -> usize {
        self.bindings.len()
    }
}

struct Contribution {
    position: i32,
    key: Key,
}

/// Assembles a [`BindingMap`]. Later bindings for the same key replace
/// earlier ones.
pub struct BindingMapBuilder {
    keys: KeyFactory,
    bindings: FxHashMap<Key, Arc<Binding>>,
    contributions: FxHashMap<BindingId, Vec<Contribution>>,
    multibinds: FxHashMap<BindingId, Key>,
    next_id: u32,
}

impl BindingMapBuilder {
    pub fn new(types: Arc<dyn TypeSystem>) -> Self {
        Self {
            keys: KeyFactory::new(types),
            bindings: FxHashMap::default(),
            contributions: FxHashMap::default(),
            multibinds: FxHashMap::default(),
            next_id: 1,
        }
    }

    pub fn keys(&self) -> &KeyFactory {
        &self.keys
    }

    /// Unnamed binding of `ty`.
    pub fn bind(&mut self, ty: TypeId, producer: ProducerDescriptor) -> BindingId {
        self.bind_named(ty, "", producer)
    }

    pub fn bind_named(
        &mut self,
        ty: TypeId,
        name: &str,
        producer: ProducerDescriptor,
    ) -> BindingId {
        self.insert(ty, name, Some(producer), None)
    }

    /// Binding with neither producer nor multibind shape. Resolving it
    /// fails; tables normally never contain one.
    pub fn bind_empty(&mut self, ty: TypeId, name: &str) -> BindingId {
        self.insert(ty, name, None, None)
    }

    /// Multibinding aggregating into `ty` (a sequence or mapping type).
    pub fn multibind(&mut self, ty: TypeId, name: &str, spec: MultibindSpec) -> BindingId {
        let id = self.insert(ty, name, None, Some(spec));
        self.multibinds.insert(id, self.keys.key(ty, name));
        self.contributions.entry(id).or_default();
        id
    }

    /// Contribute a binding of `(ty, name)` to `multibind` at `position`.
    ///
    /// Contributions are aggregated in ascending position, ties in
    /// contribution order. An empty `name` gets a generated unique one.
    pub fn contribute(
        &mut self,
        multibind: BindingId,
        ty: TypeId,
        name: &str,
        producer: ProducerDescriptor,
        position: i32,
    ) -> Result<BindingId> {
        if !self.multibinds.contains_key(&multibind) {
            return Err(InjectError::InvalidArgument(format!(
                "binding {} is not a multibinding",
                multibind.0
            )));
        }
        let generated;
        let name = if name.is_empty() {
            generated = format!("#contribution/{}/{}", multibind.0, self.next_id);
            generated.as_str()
        } else {
            name
        };
        let id = self.insert(ty, name, Some(producer), None);
        let key = self.keys.key(ty, name);
        self.contributions
            .entry(multibind)
            .or_default()
            .push(Contribution { position, key });
        Ok(id)
    }

    /// Publish contribution lists and mark the table configured.
    pub fn finish(mut self) -> BindingMap {
        let contributions = std::mem::take(&mut self.contributions);
        for (multibind, mut entries) in contributions {
            // Stable: equal positions keep contribution order.
            entries.sort_by_key(|c| c.position);
            let list = Value::list(entries.iter().map(|c| Value::Key(c.key)));
            let key = self.keys.contribution_key(multibind);
            let id = self.allocate();
            trace!(multibind = multibind.0, count = entries.len(), "publishing contributions");
            self.bindings.insert(
                key,
                Arc::new(Binding {
                    id,
                    ty: TypeId::CONTRIBUTIONS,
                    name: self.keys.name_of(key),
                    producer: Some(ProducerDescriptor::Constant(list)),
                    multibind: None,
                }),
            );
        }
        BindingMap {
            keys: self.keys,
            bindings: self.bindings,
            configured: true,
        }
    }

    /// The table as it stands, without finishing configuration.
    pub fn snapshot(self) -> BindingMap {
        BindingMap {
            keys: self.keys,
            bindings: self.bindings,
            configured: false,
        }
    }

    fn allocate(&mut self) -> BindingId {
        let id = BindingId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert(
        &mut self,
        ty: TypeId,
        name: &str,
        producer: Option<ProducerDescriptor>,
        multibind: Option<MultibindSpec>,
    ) -> BindingId {
        let id = self.allocate();
        let key = self.keys.key(ty, name);
        trace!(
            binding_id = id.0,
            key = %self.keys.describe(key),
            kind = producer.as_ref().map_or("multibind", ProducerDescriptor::kind_name),
            "BindingMapBuilder::insert"
        );
        self.bindings.insert(
            key,
            Arc::new(Binding {
                id,
                ty,
                name: Arc::from(name),
                producer,
                multibind,
            }),
        );
        id
    }
}

#[cfg(test)]
#[path = "../tests/binding_tests.rs"]
mod tests;
