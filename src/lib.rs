//! injex: a dependency lookup engine.
//!
//! Hosts hand the engine a finished binding table, a type system, and
//! optionally a reflection and an expression evaluator. The [`Injector`]
//! then resolves typed or named requests into values, compiling each
//! binding's producer descriptor on first use.
//!
//! ```ignore
//! let registry = Arc::new(TypeRegistry::new());
//! let mut builder = BindingMapBuilder::new(registry.clone());
//! builder.bind_named(TypeId::INTEGER, "port", ProducerDescriptor::constant(8080));
//!
//! let injector = Injector::builder(Arc::new(builder.finish()))
//!     .reflection(registry)
//!     .build()?;
//! assert_eq!(injector.lookup(&(), "port")?, Some(Value::Int(8080)));
//! ```

pub use injex_common::{Atom, ShardedInterner, limits};
pub use injex_engine::*;

// Tracing configuration (text / tree / json output)
pub mod tracing_config;
