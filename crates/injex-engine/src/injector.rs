//! Entry cache and resolution orchestration.
//!
//! The injector owns one [`Entry`] per key ever referenced. Entries are
//! created on first reference and never removed; a key proven to have no
//! binding and no assisted fallback is remembered with a negative marker.
//!
//! Each top-level call gets its own [`ResolveCx`], which carries the
//! caller's scope and the resolution stack for that chain. Producers
//! receive the context and resolve nested keys through it, so cycle
//! detection never sees another chain's keys.
//!
//! # Resolution of one key
//!
//! 1. Enter the key on the chain's stack (cycle and depth checks).
//! 2. Fetch or create the entry. Unbound keys try assisted injection.
//! 3. Compile the entry's producer if this is its first use. The compile
//!    runs at most once per entry, even under concurrent first lookups.
//!    A chain that finds another chain compiling the entry waits for it,
//!    unless that chain is (transitively) waiting on this one; the wait
//!    would never end, so it fails as a cycle instead.
//! 4. Produce, then check the value against the entry's declared type.
//! 5. Leave the key (also on failure).

use crate::assisted::AssistedResolver;
use crate::binding::{Binding, BindingTable};
use crate::error::{InjectError, Result};
use crate::key::{Key, KeyFactory};
use crate::options::InjectorOptions;
use crate::producers::ProducerRef;
use crate::query_trace;
use crate::recursion::{RecursionGuard, RecursionResult};
use crate::scope::{Evaluator, NoEvaluator, Scope};
use crate::transform;
use crate::types::{NoReflection, Reflection, TypeId, TypeSystem};
use crate::value::Value;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use injex_common::limits;
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace, trace_span};

/// How long a waiting chain sleeps before re-checking the wait-for graph.
const COMPILE_WAIT_SLICE: Duration = Duration::from_millis(10);

/// Identity of one resolution chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct ChainId(u64);

// =============================================================================
// Entry
// =============================================================================

/// Cache record pairing a key's binding with its once-compiled producer.
pub struct Entry {
    key: Key,
    binding: Option<Arc<Binding>>,
    declared: TypeId,
    producer: OnceCell<ProducerRef>,
    /// Chain currently compiling the producer.
    compiler: Mutex<Option<ChainId>>,
    released: Condvar,
}

impl Entry {
    fn bound(key: Key, binding: Arc<Binding>) -> Self {
        Self {
            key,
            declared: binding.ty,
            binding: Some(binding),
            producer: OnceCell::new(),
            compiler: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    fn assisted(key: Key, producer: ProducerRef) -> Self {
        Self {
            key,
            binding: None,
            declared: key.ty(),
            producer: OnceCell::with_value(producer),
            compiler: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    /// `None` for entries synthesized by assisted injection.
    pub fn binding(&self) -> Option<&Arc<Binding>> {
        self.binding.as_ref()
    }

    /// Type every value produced for this entry must conform to.
    pub fn declared(&self) -> TypeId {
        self.declared
    }

    pub fn is_compiled(&self) -> bool {
        self.producer.get().is_some()
    }

    /// Compile the producer. Callers hold this entry's compile claim.
    fn compile(&self, cx: &ResolveCx<'_>) -> Result<ProducerRef> {
        let Some(binding) = &self.binding else {
            return Err(InjectError::UnboundProducer {
                key: self.key,
                binding: cx.keys().describe(self.key),
            });
        };
        let producer = transform::compile(cx, self.key, binding)?;
        cx.injector.stats.compiled.fetch_add(1, Ordering::Relaxed);
        query_trace::compiled(self.key, binding.id.0, producer.kind().as_str());
        Ok(self.producer.get_or_init(|| producer).clone())
    }
}

/// Compile claim on an entry; released (and waiters woken) on drop, also
/// when the compile fails or panics.
struct Claim<'e>(&'e Entry);

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        *self.0.compiler.lock() = None;
        self.0.released.notify_all();
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("binding", &self.binding.as_ref().map(|b| b.id))
            .field("declared", &self.declared)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

#[derive(Clone)]
enum Slot {
    Bound(Arc<Entry>),
    /// No binding and no assisted fallback.
    Missing,
}

// =============================================================================
// Requests
// =============================================================================

/// The three shapes of public lookup.
#[derive(Copy, Clone, Debug)]
pub enum Request<'r> {
    Key(Key),
    /// Declared type and name; the result must also conform to the type.
    Typed(TypeId, &'r str),
    /// Bare name, resolved as a data lookup.
    Name(&'r str),
}

impl From<Key> for Request<'_> {
    fn from(key: Key) -> Self {
        Self::Key(key)
    }
}

impl<'r> From<(TypeId, &'r str)> for Request<'r> {
    fn from((ty, name): (TypeId, &'r str)) -> Self {
        Self::Typed(ty, name)
    }
}

impl<'r> From<&'r str> for Request<'r> {
    fn from(name: &'r str) -> Self {
        Self::Name(name)
    }
}

// =============================================================================
// Stats
// =============================================================================

#[derive(Default)]
struct Counters {
    entries: AtomicU64,
    compiled: AtomicU64,
    misses: AtomicU64,
    assisted: AtomicU64,
}

/// Entry cache statistics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InjectorStats {
    /// Entries holding a binding or an assisted producer.
    pub entries: u64,
    /// Producers compiled from bindings.
    pub compiled: u64,
    /// Keys cached as having no binding.
    pub misses: u64,
    /// Entries synthesized by assisted injection.
    pub assisted: u64,
}

// =============================================================================
// Injector
// =============================================================================

pub struct InjectorBuilder {
    table: Arc<dyn BindingTable>,
    reflection: Arc<dyn Reflection>,
    evaluator: Arc<dyn Evaluator>,
    options: InjectorOptions,
}

impl InjectorBuilder {
    pub fn reflection(mut self, reflection: Arc<dyn Reflection>) -> Self {
        self.reflection = reflection;
        self
    }

    pub fn evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn options(mut self, options: InjectorOptions) -> Self {
        self.options = options;
        self
    }

    /// Fails with [`InjectError::Unconfigured`] unless the table finished
    /// configuration.
    pub fn build(self) -> Result<Injector> {
        if !self.table.is_configured() {
            return Err(InjectError::Unconfigured);
        }
        debug!(bindings = self.table.len(), "Injector::build");
        Ok(Injector {
            table: self.table,
            reflection: self.reflection,
            evaluator: self.evaluator,
            options: self.options,
            entries: DashMap::new(),
            assisted: AssistedResolver::default(),
            stats: Counters::default(),
            next_chain: AtomicU64::new(1),
            waiting: DashMap::new(),
        })
    }
}

/// Resolves requests against one configured binding table.
///
/// `Injector` is `Send + Sync`; independent threads may resolve through a
/// shared reference. Each public call runs its own resolution chain.
pub struct Injector {
    table: Arc<dyn BindingTable>,
    reflection: Arc<dyn Reflection>,
    evaluator: Arc<dyn Evaluator>,
    options: InjectorOptions,
    entries: DashMap<Key, Slot>,
    assisted: AssistedResolver,
    stats: Counters,
    next_chain: AtomicU64,
    /// Entry each blocked chain is waiting for.
    waiting: DashMap<ChainId, Arc<Entry>>,
}

impl Injector {
    pub fn builder(table: Arc<dyn BindingTable>) -> InjectorBuilder {
        InjectorBuilder {
            table,
            reflection: Arc::new(NoReflection),
            evaluator: Arc::new(NoEvaluator),
            options: InjectorOptions::default(),
        }
    }

    /// Injector with default capabilities and options.
    pub fn new(table: Arc<dyn BindingTable>) -> Result<Self> {
        Self::builder(table).build()
    }

    pub fn keys(&self) -> &KeyFactory {
        self.table.keys()
    }

    pub fn types(&self) -> &dyn TypeSystem {
        self.table.keys().types().as_ref()
    }

    pub fn reflection(&self) -> &dyn Reflection {
        self.reflection.as_ref()
    }

    pub fn evaluator(&self) -> &dyn Evaluator {
        self.evaluator.as_ref()
    }

    pub fn options(&self) -> &InjectorOptions {
        &self.options
    }

    // -------------------------------------------------------------------------
    // Value lookups
    // -------------------------------------------------------------------------

    /// Resolve a request to a value; `Ok(None)` when nothing is bound.
    pub fn lookup<'r>(
        &self,
        scope: &dyn Scope,
        request: impl Into<Request<'r>>,
    ) -> Result<Option<Value>> {
        let (key, expected) = self.request_key(request.into())?;
        let cx = self.context(scope);
        let _span = trace_span!("lookup", key = %self.keys().describe(key), chain = cx.chain.0)
            .entered();
        let value = cx.resolve(key, "lookup")?;
        self.check_requested(key, expected, value.as_ref())?;
        Ok(value)
    }

    /// Resolve, then hand `(scope, value)` to `f` and return its result.
    pub fn lookup_with<'r, T>(
        &self,
        scope: &dyn Scope,
        request: impl Into<Request<'r>>,
        f: impl FnOnce(&dyn Scope, Option<Value>) -> T,
    ) -> Result<T> {
        let value = self.lookup(scope, request)?;
        Ok(f(scope, value))
    }

    /// Resolve, then hand the value to `f`, typically to supply a default.
    pub fn lookup_or<'r>(
        &self,
        scope: &dyn Scope,
        request: impl Into<Request<'r>>,
        f: impl FnOnce(Option<Value>) -> Value,
    ) -> Result<Value> {
        Ok(f(self.lookup(scope, request)?))
    }

    /// Lookup of `(ty, name)` whose result must conform to `ty`, even when
    /// the storage key was normalized onto `Data`.
    pub fn lookup_by_type(
        &self,
        scope: &dyn Scope,
        ty: TypeId,
        name: &str,
    ) -> Result<Option<Value>> {
        self.lookup(scope, Request::Typed(ty, name))
    }

    pub fn lookup_key(&self, scope: &dyn Scope, key: Key) -> Result<Option<Value>> {
        self.lookup(scope, Request::Key(key))
    }

    // -------------------------------------------------------------------------
    // Producer lookups
    // -------------------------------------------------------------------------

    /// Resolve a request to its producer without producing a value.
    pub fn lookup_producer<'r>(
        &self,
        scope: &dyn Scope,
        request: impl Into<Request<'r>>,
    ) -> Result<Option<ProducerHandle<'_>>> {
        let (key, expected) = self.request_key(request.into())?;
        let cx = self.context(scope);
        let Some((entry, producer)) = cx.resolve_producer(key)? else {
            return Ok(None);
        };
        Ok(Some(ProducerHandle {
            injector: self,
            entry,
            producer,
            expected,
        }))
    }

    /// Resolve the producer, then hand `(scope, producer)` to `f`.
    pub fn lookup_producer_with<'r, T>(
        &self,
        scope: &dyn Scope,
        request: impl Into<Request<'r>>,
        f: impl FnOnce(&dyn Scope, Option<ProducerHandle<'_>>) -> T,
    ) -> Result<T> {
        let handle = self.lookup_producer(scope, request)?;
        Ok(f(scope, handle))
    }

    pub fn lookup_producer_key(
        &self,
        scope: &dyn Scope,
        key: Key,
    ) -> Result<Option<ProducerHandle<'_>>> {
        self.lookup_producer(scope, Request::Key(key))
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// The cached entry for `key`, if one was created.
    pub fn entry(&self, key: Key) -> Option<Arc<Entry>> {
        match self.entries.get(&key)?.value() {
            Slot::Bound(entry) => Some(entry.clone()),
            Slot::Missing => None,
        }
    }

    /// Whether the binding table has a binding for `key`.
    pub fn has_binding(&self, key: Key) -> bool {
        self.table.binding(&key).is_some()
    }

    pub fn stats(&self) -> InjectorStats {
        InjectorStats {
            entries: self.stats.entries.load(Ordering::Relaxed),
            compiled: self.stats.compiled.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            assisted: self.stats.assisted.load(Ordering::Relaxed),
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    pub(crate) fn context<'a>(&'a self, scope: &'a dyn Scope) -> ResolveCx<'a> {
        ResolveCx {
            injector: self,
            scope,
            chain: ChainId(self.next_chain.fetch_add(1, Ordering::Relaxed)),
            stack: RefCell::new(RecursionGuard::with_profile(
                self.options.resolution_profile(),
            )),
        }
    }

    fn request_key(&self, request: Request<'_>) -> Result<(Key, Option<TypeId>)> {
        match request {
            Request::Key(key) => Ok((key, None)),
            Request::Typed(ty, name) => {
                if !self.types().is_known(ty) {
                    return Err(InjectError::InvalidArgument(format!(
                        "unknown type id {} in lookup of '{name}'",
                        ty.0
                    )));
                }
                Ok((self.keys().key(ty, name), Some(ty)))
            }
            Request::Name(name) => {
                if name.is_empty() {
                    return Err(InjectError::InvalidArgument(
                        "name lookup requires a non-empty name".to_string(),
                    ));
                }
                Ok((self.keys().data_key(name), None))
            }
        }
    }

    /// Entry for `key`, creating it on first reference.
    fn entry_for(&self, key: Key) -> Option<Arc<Entry>> {
        if let Some(slot) = self.entries.get(&key) {
            return match slot.value() {
                Slot::Bound(entry) => Some(entry.clone()),
                Slot::Missing => None,
            };
        }

        let slot = match self.table.binding(&key) {
            Some(binding) => Slot::Bound(Arc::new(Entry::bound(key, binding))),
            None => match self.assisted_producer(key) {
                Some(producer) => Slot::Bound(Arc::new(Entry::assisted(key, producer))),
                None => Slot::Missing,
            },
        };

        let slot = match self.entries.entry(key) {
            MapEntry::Occupied(existing) => existing.get().clone(),
            MapEntry::Vacant(vacant) => {
                match &slot {
                    Slot::Bound(entry) => {
                        self.stats.entries.fetch_add(1, Ordering::Relaxed);
                        if entry.binding.is_none() {
                            self.stats.assisted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Slot::Missing => {
                        self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    }
                }
                trace!(
                    key = %self.keys().describe(key),
                    missing = matches!(slot, Slot::Missing),
                    "entry created"
                );
                vacant.insert(slot).value().clone()
            }
        };

        match slot {
            Slot::Bound(entry) => Some(entry),
            Slot::Missing => None,
        }
    }

    fn assisted_producer(&self, key: Key) -> Option<ProducerRef> {
        if !self.options.assisted_injection {
            return None;
        }
        self.assisted.resolve(self.reflection.as_ref(), key)
    }

    /// Whether `owner` is, through the chains it waits on, waiting for an
    /// entry `chain` is compiling.
    fn waits_for(&self, mut owner: ChainId, chain: ChainId) -> bool {
        for _ in 0..limits::MAX_WAIT_CHAIN {
            if owner == chain {
                return true;
            }
            let Some(entry) = self.waiting.get(&owner).map(|e| e.value().clone()) else {
                return false;
            };
            let Some(next) = *entry.compiler.lock() else {
                return false;
            };
            owner = next;
        }
        false
    }

    fn check_declared(&self, entry: &Entry, value: Option<&Value>) -> Result<()> {
        if !self.options.type_check {
            return Ok(());
        }
        self.check(entry.key, entry.declared, value)
    }

    fn check_requested(
        &self,
        key: Key,
        expected: Option<TypeId>,
        value: Option<&Value>,
    ) -> Result<()> {
        match expected {
            Some(ty) => self.check(key, ty, value),
            None => Ok(()),
        }
    }

    fn check(&self, key: Key, expected: TypeId, value: Option<&Value>) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        let types = self.types();
        if types.is_instance(expected, value) {
            return Ok(());
        }
        let actual = types.type_of(value);
        Err(InjectError::TypeMismatch {
            key,
            expected,
            actual,
            subject: self.keys().describe(key),
            expected_name: types.type_name(expected).to_string(),
            actual_name: types.type_name(actual).to_string(),
        })
    }
}

// =============================================================================
// ProducerHandle
// =============================================================================

/// A resolved producer bound to the injector it came from.
///
/// `handle.produce(scope)` behaves exactly like a value lookup of the same
/// request, without repeating the entry resolution.
pub struct ProducerHandle<'i> {
    injector: &'i Injector,
    entry: Arc<Entry>,
    producer: ProducerRef,
    expected: Option<TypeId>,
}

impl ProducerHandle<'_> {
    pub fn key(&self) -> Key {
        self.entry.key
    }

    pub fn entry(&self) -> &Arc<Entry> {
        &self.entry
    }

    pub fn producer(&self) -> &ProducerRef {
        &self.producer
    }

    /// Run the producer on a new resolution chain.
    pub fn produce(&self, scope: &dyn Scope) -> Result<Option<Value>> {
        let cx = self.injector.context(scope);
        let key = self.entry.key;
        let _frame = cx.enter(key)?;
        let value = self.producer.produce(&cx)?;
        self.injector.check_declared(&self.entry, value.as_ref())?;
        self.injector
            .check_requested(key, self.expected, value.as_ref())?;
        Ok(value)
    }
}

impl std::fmt::Debug for ProducerHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("entry", &self.entry)
            .field("kind", &self.producer.kind())
            .finish()
    }
}

// =============================================================================
// ResolveCx
// =============================================================================

/// One resolution chain: the caller's scope plus the stack of keys being
/// resolved. Passed to every producer, factory and combinator.
pub struct ResolveCx<'a> {
    injector: &'a Injector,
    scope: &'a dyn Scope,
    chain: ChainId,
    stack: RefCell<RecursionGuard<Key>>,
}

/// Marks a chain as blocked on an entry for as long as it lives.
struct Waiting<'i> {
    injector: &'i Injector,
    chain: ChainId,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.injector.waiting.remove(&self.chain);
    }
}

/// Pops its key from the chain when dropped.
struct Frame<'c, 'a> {
    cx: &'c ResolveCx<'a>,
    key: Key,
}

impl Drop for Frame<'_, '_> {
    fn drop(&mut self) {
        self.cx.stack.borrow_mut().leave(self.key);
    }
}

impl<'a> ResolveCx<'a> {
    pub fn scope(&self) -> &'a dyn Scope {
        self.scope
    }

    pub fn injector(&self) -> &'a Injector {
        self.injector
    }

    pub fn keys(&self) -> &'a KeyFactory {
        self.injector.keys()
    }

    /// Nested value lookup of `(ty, name)` on this chain.
    pub fn lookup(&self, ty: TypeId, name: &str) -> Result<Option<Value>> {
        self.lookup_key(self.keys().key(ty, name))
    }

    /// Nested value lookup of `key` on this chain.
    pub fn lookup_key(&self, key: Key) -> Result<Option<Value>> {
        self.resolve(key, "nested")
    }

    /// Nested producer lookup of `(ty, name)` on this chain.
    pub fn lookup_producer(&self, ty: TypeId, name: &str) -> Result<Option<ProducerRef>> {
        self.lookup_producer_key(self.keys().key(ty, name))
    }

    pub fn lookup_producer_key(&self, key: Key) -> Result<Option<ProducerRef>> {
        Ok(self.resolve_producer(key)?.map(|(_, producer)| producer))
    }

    /// Keys being resolved, outermost first.
    pub fn path(&self) -> Vec<Key> {
        self.stack.borrow().path().to_vec()
    }

    pub fn depth(&self) -> u32 {
        self.stack.borrow().depth()
    }

    /// Entry for `key` without resolving it.
    pub(crate) fn entry(&self, key: Key) -> Option<Arc<Entry>> {
        self.injector.entry_for(key)
    }

    fn enter(&self, key: Key) -> Result<Frame<'_, 'a>> {
        let mut stack = self.stack.borrow_mut();
        match stack.enter(key) {
            RecursionResult::Entered => Ok(Frame { cx: self, key }),
            RecursionResult::Cycle => {
                let path = self.keys().describe_path(&stack.cycle_path(key));
                debug!(key = %self.keys().describe(key), %path, "cycle detected");
                Err(InjectError::CycleDetected { key, path })
            }
            RecursionResult::DepthExceeded => Err(InjectError::ResolutionDepthExceeded {
                key,
                subject: self.keys().describe(key),
                limit: stack.max_depth(),
            }),
            RecursionResult::IterationExceeded => Err(InjectError::ResolutionStepsExceeded {
                key,
                subject: self.keys().describe(key),
                limit: stack.max_iterations(),
            }),
        }
    }

    fn resolve(&self, key: Key, op: &'static str) -> Result<Option<Value>> {
        let query_id = query_trace::enabled().then(|| {
            let id = query_trace::next_query_id();
            query_trace::resolve_start(id, op, key, self.depth());
            id
        });

        let mut cache_hit = false;
        let result = self.resolve_value(key, &mut cache_hit);

        if let Some(id) = query_id {
            let outcome = match &result {
                Ok(Some(_)) => "value",
                Ok(None) => "absent",
                Err(_) => "error",
            };
            query_trace::resolve_end(id, op, outcome, cache_hit);
        }
        result
    }

    fn resolve_value(&self, key: Key, cache_hit: &mut bool) -> Result<Option<Value>> {
        let _frame = self.enter(key)?;
        let Some(entry) = self.injector.entry_for(key) else {
            *cache_hit = true;
            return Ok(None);
        };
        *cache_hit = entry.is_compiled();
        let value = self.producer_for(&entry)?.produce(self)?;
        self.injector.check_declared(&entry, value.as_ref())?;
        Ok(value)
    }

    fn resolve_producer(&self, key: Key) -> Result<Option<(Arc<Entry>, ProducerRef)>> {
        let _frame = self.enter(key)?;
        let Some(entry) = self.injector.entry_for(key) else {
            return Ok(None);
        };
        let producer = self.producer_for(&entry)?;
        Ok(Some((entry, producer)))
    }

    /// The entry's cached producer, compiling it on first use.
    ///
    /// At most one chain compiles an entry at a time. Others wait for it to
    /// finish; if it fails they retry the compile themselves.
    fn producer_for(&self, entry: &Arc<Entry>) -> Result<ProducerRef> {
        let mut waiting: Option<Waiting<'_>> = None;
        loop {
            if let Some(producer) = entry.producer.get() {
                return Ok(producer.clone());
            }
            let mut compiler = entry.compiler.lock();
            if entry.producer.get().is_some() {
                continue;
            }
            let Some(owner) = *compiler else {
                *compiler = Some(self.chain);
                drop(compiler);
                drop(waiting.take());
                let _claim = Claim(entry);
                return entry.compile(self);
            };
            drop(compiler);

            if waiting.is_none() {
                self.injector.waiting.insert(self.chain, entry.clone());
                waiting = Some(Waiting {
                    injector: self.injector,
                    chain: self.chain,
                });
            }
            if self.injector.waits_for(owner, self.chain) {
                let path = self.keys().describe_path(&self.path());
                debug!(key = %self.keys().describe(entry.key), %path, "cross-chain cycle detected");
                return Err(InjectError::CycleDetected {
                    key: entry.key,
                    path: format!("{path} (compiled by a chain waiting on this one)"),
                });
            }

            let mut compiler = entry.compiler.lock();
            if compiler.is_some() && entry.producer.get().is_none() {
                entry.released.wait_for(&mut compiler, COMPILE_WAIT_SLICE);
            }
        }
    }
}
