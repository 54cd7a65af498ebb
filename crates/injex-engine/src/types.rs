//! Type identifiers and the host capabilities the engine consumes.
//!
//! The engine never implements a type algebra of its own. It asks a
//! [`TypeSystem`] whether values conform and whether one type refines
//! another, and a [`Reflection`] capability how to construct classes.
//!
//! [`TypeRegistry`] is a self-contained host implementation of both traits:
//! a flat class table with single inheritance and structural rules for the
//! built-in data types.
//!
//! | Built-in | Parent | Conforming values |
//! |----------|--------|-------------------|
//! | `Data` | `Any` | nil, booleans, numbers, text, tokens, lists/maps of data |
//! | `Integer`, `Float` | `Numeric` | `Int`, `Float` |
//! | `Numeric`, `Text`, `Token`, `Boolean`, `Nil` | `Data` | matching scalar |
//! | `Sequence`, `Mapping` | `Any` | any list / any map |
//! | `Object` | `Any` | class instances |

use crate::error::{InjectError, Result};
use crate::injector::ResolveCx;
use crate::value::Value;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::trace;

// =============================================================================
// TypeId
// =============================================================================

/// Opaque identifier of a declared type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const INVALID: Self = Self(0);
    pub const ANY: Self = Self(1);
    /// The generic data category. Keys of any subtype normalize onto it.
    pub const DATA: Self = Self(2);
    pub const NIL: Self = Self(3);
    pub const BOOLEAN: Self = Self(4);
    pub const INTEGER: Self = Self(5);
    pub const FLOAT: Self = Self(6);
    pub const NUMERIC: Self = Self(7);
    pub const TEXT: Self = Self(8);
    pub const TOKEN: Self = Self(9);
    pub const SEQUENCE: Self = Self(10);
    pub const MAPPING: Self = Self(11);
    pub const PRODUCER: Self = Self(12);
    pub const KEY: Self = Self(13);
    /// Type of synthesized multibind contribution lists.
    pub const CONTRIBUTIONS: Self = Self(14);
    pub const OBJECT: Self = Self(15);

    /// First id handed out to host-registered classes.
    pub const FIRST_USER: u32 = 100;

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    pub const fn is_builtin(self) -> bool {
        self.0 != 0 && self.0 < Self::FIRST_USER
    }

    /// Parent of a built-in type, `None` for `Any` and host types.
    pub const fn builtin_parent(self) -> Option<Self> {
        match self.0 {
            2 | 10 | 11 | 12 | 13 | 14 | 15 => Some(Self::ANY),
            3 | 4 | 7 | 8 | 9 => Some(Self::DATA),
            5 | 6 => Some(Self::NUMERIC),
            _ => None,
        }
    }

    pub const fn builtin_name(self) -> Option<&'static str> {
        Some(match self.0 {
            1 => "Any",
            2 => "Data",
            3 => "Nil",
            4 => "Boolean",
            5 => "Integer",
            6 => "Float",
            7 => "Numeric",
            8 => "Text",
            9 => "Token",
            10 => "Sequence",
            11 => "Mapping",
            12 => "Producer",
            13 => "Key",
            14 => "Contributions",
            15 => "Object",
            _ => return None,
        })
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// Type conformance capability.
pub trait TypeSystem: Send + Sync {
    /// Whether `value` satisfies `ty`.
    fn is_instance(&self, ty: TypeId, value: &Value) -> bool;

    /// Whether `sub` refines `sup` (reflexive).
    fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool;

    /// Whether `ty` is a type this system knows about.
    fn is_known(&self, ty: TypeId) -> bool;

    /// Display name used in diagnostics.
    fn type_name(&self, ty: TypeId) -> Arc<str>;

    /// Most specific type of a value, for diagnostics.
    fn type_of(&self, value: &Value) -> TypeId {
        value.type_id()
    }
}

/// Two-argument class-level factory: receives the resolution context, which
/// carries both the caller's scope and the injector.
pub type FactoryFn = Arc<dyn Fn(&ResolveCx<'_>) -> Result<Value> + Send + Sync>;

/// Zero-argument default constructor.
pub type ConstructorFn = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// Constructor taking explicit arguments, used by `Instance` descriptors.
pub type InstanceFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// How an unbound class can be constructed, probed once per type.
#[derive(Clone)]
pub enum Construction {
    HasFactory(FactoryFn),
    HasDefaultConstructor(ConstructorFn),
    Neither,
}

impl Construction {
    pub fn is_constructible(&self) -> bool {
        !matches!(self, Self::Neither)
    }
}

impl std::fmt::Debug for Construction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HasFactory(_) => f.write_str("HasFactory"),
            Self::HasDefaultConstructor(_) => f.write_str("HasDefaultConstructor"),
            Self::Neither => f.write_str("Neither"),
        }
    }
}

/// Class reflection capability.
pub trait Reflection: Send + Sync {
    fn static_factory(&self, ty: TypeId) -> Option<FactoryFn>;

    fn default_constructor(&self, ty: TypeId) -> Option<ConstructorFn>;

    fn resolve_class_by_name(&self, name: &str) -> Option<TypeId>;

    /// Construct `class` from explicit arguments.
    fn instantiate(&self, class: TypeId, args: &[Value]) -> Result<Value>;

    fn has_static_factory(&self, ty: TypeId) -> bool {
        self.static_factory(ty).is_some()
    }

    fn has_default_constructor(&self, ty: TypeId) -> bool {
        self.default_constructor(ty).is_some()
    }

    /// Factory first, then default constructor.
    fn construction(&self, ty: TypeId) -> Construction {
        if let Some(factory) = self.static_factory(ty) {
            Construction::HasFactory(factory)
        } else if let Some(ctor) = self.default_constructor(ty) {
            Construction::HasDefaultConstructor(ctor)
        } else {
            Construction::Neither
        }
    }
}

/// Reflection for hosts without classes: nothing is constructible.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReflection;

impl Reflection for NoReflection {
    fn static_factory(&self, _ty: TypeId) -> Option<FactoryFn> {
        None
    }

    fn default_constructor(&self, _ty: TypeId) -> Option<ConstructorFn> {
        None
    }

    fn resolve_class_by_name(&self, _name: &str) -> Option<TypeId> {
        None
    }

    fn instantiate(&self, class: TypeId, _args: &[Value]) -> Result<Value> {
        Err(InjectError::UnknownClass(format!("<type {}>", class.0)))
    }
}

// =============================================================================
// TypeRegistry
// =============================================================================

/// A registered host class.
#[derive(Clone)]
pub struct ClassDef {
    pub name: Arc<str>,
    pub parent: TypeId,
    pub factory: Option<FactoryFn>,
    pub default_constructor: Option<ConstructorFn>,
    pub constructor: Option<InstanceFn>,
}

/// Thread-safe class table implementing [`TypeSystem`] and [`Reflection`].
///
/// ```ignore
/// let registry = Arc::new(TypeRegistry::new());
/// let logger = registry.register_class("Logger", TypeId::OBJECT);
/// registry.set_default_constructor(logger, move || Ok(Value::object(Instance::new(logger))));
/// ```
pub struct TypeRegistry {
    classes: DashMap<TypeId, ClassDef>,
    by_name: DashMap<Arc<str>, TypeId>,
    next_id: AtomicU32,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let registry = Self {
            classes: DashMap::new(),
            by_name: DashMap::new(),
            next_id: AtomicU32::new(TypeId::FIRST_USER),
        };
        for raw in 1..=TypeId::OBJECT.0 {
            if let Some(name) = TypeId(raw).builtin_name() {
                registry.by_name.insert(Arc::from(name), TypeId(raw));
            }
        }
        registry
    }

    /// Register a class under `parent` and return its id.
    ///
    /// Registering an existing name returns the existing id.
    pub fn register_class(&self, name: &str, parent: TypeId) -> TypeId {
        if let Some(existing) = self.by_name.get(name) {
            return *existing;
        }
        // The name's shard stays locked until the class is in place.
        match self.by_name.entry(Arc::from(name)) {
            Entry::Occupied(existing) => *existing.get(),
            Entry::Vacant(slot) => {
                let id = TypeId(self.next_id.fetch_add(1, Ordering::SeqCst));
                let name = slot.key().clone();
                trace!(type_id = id.0, name = %name, parent = parent.0, "TypeRegistry::register_class");
                self.classes.insert(
                    id,
                    ClassDef {
                        name,
                        parent,
                        factory: None,
                        default_constructor: None,
                        constructor: None,
                    },
                );
                slot.insert(id);
                id
            }
        }
    }

    pub fn set_factory(
        &self,
        ty: TypeId,
        factory: impl Fn(&ResolveCx<'_>) -> Result<Value> + Send + Sync + 'static,
    ) {
        if let Some(mut class) = self.classes.get_mut(&ty) {
            class.factory = Some(Arc::new(factory));
        }
    }

    pub fn set_default_constructor(
        &self,
        ty: TypeId,
        ctor: impl Fn() -> Result<Value> + Send + Sync + 'static,
    ) {
        if let Some(mut class) = self.classes.get_mut(&ty) {
            class.default_constructor = Some(Arc::new(ctor));
        }
    }

    pub fn set_constructor(
        &self,
        ty: TypeId,
        ctor: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) {
        if let Some(mut class) = self.classes.get_mut(&ty) {
            class.constructor = Some(Arc::new(ctor));
        }
    }

    pub fn class(&self, ty: TypeId) -> Option<ClassDef> {
        self.classes.get(&ty).map(|c| c.clone())
    }

    fn parent_of(&self, ty: TypeId) -> Option<TypeId> {
        if ty.is_builtin() {
            ty.builtin_parent()
        } else {
            self.classes.get(&ty).map(|c| c.parent)
        }
    }

    /// Nearest built-in ancestor (or self) of a type.
    fn builtin_base(&self, ty: TypeId) -> Option<TypeId> {
        let mut current = ty;
        loop {
            if current.is_builtin() {
                return Some(current);
            }
            current = self.parent_of(current)?;
        }
    }
}

impl TypeSystem for TypeRegistry {
    fn is_instance(&self, ty: TypeId, value: &Value) -> bool {
        if !ty.is_builtin() {
            // Host classes: instances by class chain, refinements of
            // built-ins by their base.
            if let Value::Object(instance) = value {
                return self.is_subtype(instance.class(), ty);
            }
            return match self.builtin_base(ty) {
                Some(TypeId::OBJECT) | None => false,
                Some(base) => self.is_instance(base, value),
            };
        }
        match ty {
            TypeId::ANY => true,
            TypeId::DATA => value.is_data(),
            TypeId::NIL => matches!(value, Value::Nil),
            TypeId::BOOLEAN => matches!(value, Value::Bool(_)),
            TypeId::INTEGER => matches!(value, Value::Int(_)),
            TypeId::FLOAT => matches!(value, Value::Float(_)),
            TypeId::NUMERIC => matches!(value, Value::Int(_) | Value::Float(_)),
            TypeId::TEXT => matches!(value, Value::Str(_) | Value::Text(_)),
            TypeId::TOKEN => matches!(value, Value::Token(_)),
            TypeId::SEQUENCE => matches!(value, Value::List(_)),
            TypeId::MAPPING => matches!(value, Value::Map(_)),
            TypeId::PRODUCER => matches!(value, Value::Producer(_)),
            TypeId::KEY => matches!(value, Value::Key(_)),
            TypeId::CONTRIBUTIONS => value
                .list_snapshot()
                .is_some_and(|items| items.iter().all(|v| matches!(v, Value::Key(_)))),
            TypeId::OBJECT => matches!(value, Value::Object(_)),
            _ => false,
        }
    }

    fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        if sup == TypeId::ANY {
            return sub.is_valid();
        }
        let mut current = sub;
        loop {
            if current == sup {
                return true;
            }
            match self.parent_of(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn is_known(&self, ty: TypeId) -> bool {
        ty.builtin_name().is_some() || self.classes.contains_key(&ty)
    }

    fn type_name(&self, ty: TypeId) -> Arc<str> {
        if let Some(name) = ty.builtin_name() {
            return Arc::from(name);
        }
        self.classes
            .get(&ty)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| Arc::from(format!("<type {}>", ty.0)))
    }
}

impl Reflection for TypeRegistry {
    fn static_factory(&self, ty: TypeId) -> Option<FactoryFn> {
        self.classes.get(&ty).and_then(|c| c.factory.clone())
    }

    fn default_constructor(&self, ty: TypeId) -> Option<ConstructorFn> {
        self.classes.get(&ty).and_then(|c| c.default_constructor.clone())
    }

    fn resolve_class_by_name(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).map(|id| *id)
    }

    fn instantiate(&self, class: TypeId, args: &[Value]) -> Result<Value> {
        let Some(def) = self.class(class) else {
            return Err(InjectError::UnknownClass(self.type_name(class).to_string()));
        };
        if let Some(ctor) = &def.constructor {
            return ctor(args);
        }
        match (&def.default_constructor, args.is_empty()) {
            (Some(ctor), true) => ctor(),
            _ => Err(InjectError::Construction {
                class: def.name.to_string(),
                message: format!("no constructor accepting {} argument(s)", args.len()),
            }),
        }
    }
}

#[cfg(test)]
#[path = "../tests/types_tests.rs"]
mod tests;
