//! Dependency Lookup Engine
//!
//! Resolves typed and named requests against a finished binding table.
//! Bindings carry a tree of producer descriptors; the first lookup of a key
//! compiles that tree into an executable producer which is cached on the
//! key's entry for the lifetime of the injector.
//!
//! - **Entry cache**: `DashMap` of key -> entry, compiled at most once per key
//! - **Cycle detection**: an explicit per-chain resolution stack
//! - **Type conformance**: every produced value is checked against its
//!   declared type through the host's `TypeSystem`
//! - **Multibindings**: contributions folded through pluggable combinators
//! - **Assisted injection**: reflective construction for unbound class keys
mod assisted;
pub mod binding;
pub mod combinators;
pub mod error;
pub mod injector;
pub mod key;
mod multibind;
pub mod options;
pub mod producers;
mod query_trace;
pub mod recursion;
pub mod scope;
mod transform;
pub mod types;
pub mod value;

pub use binding::{
    Binding, BindingId, BindingMap, BindingMapBuilder, BindingTable, CombinatorSpec,
    MultibindSpec, ProducerDescriptor,
};
pub use combinators::{BuiltinCombinator, Combinator, MappingCombinator, SequenceCombinator};
pub use error::{InjectError, Result};
pub use injector::{
    Entry, Injector, InjectorBuilder, InjectorStats, ProducerHandle, Request, ResolveCx,
};
pub use key::{Key, KeyFactory};
pub use options::InjectorOptions;
pub use producers::{
    ProduceFn, Producer, ProducerKind, ProducerRef, ProducerSource, fixed, from_fn, leaf,
};
pub use recursion::{DepthCounter, RecursionGuard, RecursionProfile, RecursionResult};
pub use scope::{EvalMode, EvalRequest, Evaluator, Expression, NoEvaluator, Scope};
pub use types::{
    ClassDef, ConstructorFn, Construction, FactoryFn, InstanceFn, NoReflection, Reflection, TypeId,
    TypeRegistry, TypeSystem,
};
pub use value::{Instance, Shared, Value, ValueMap};

pub use injex_common::Atom;

// Test modules loaded here are not owned by a single source file.
#[cfg(test)]
#[path = "../tests/injector_tests.rs"]
mod injector_tests;
#[cfg(test)]
#[path = "../tests/descriptor_tests.rs"]
mod descriptor_tests;
#[cfg(test)]
#[path = "../tests/multibind_tests.rs"]
mod multibind_tests;
#[cfg(test)]
#[path = "../tests/assisted_tests.rs"]
mod assisted_tests;
#[cfg(test)]
#[path = "../tests/support.rs"]
mod test_support;
