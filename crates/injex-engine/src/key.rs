//! Lookup keys and the shared key factory.
//!
//! A [`Key`] is a `(type, name)` pair of interned ids, so keys are `Copy`
//! and compare in O(1). Keys can only be minted by a [`KeyFactory`], which
//! applies the data normalization: every subtype of `Data` maps onto the
//! canonical `Data` key of the same name, giving one storage slot per name
//! regardless of which data refinement a caller asks for.

use crate::binding::BindingId;
use crate::types::{TypeId, TypeSystem};
use injex_common::{Atom, ShardedInterner};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    ty: TypeId,
    name: Atom,
}

impl Key {
    pub fn ty(self) -> TypeId {
        self.ty
    }

    pub fn name(self) -> Atom {
        self.name
    }

    /// Unnamed keys address the default binding of a type.
    pub fn is_unnamed(self) -> bool {
        self.name.is_none()
    }
}

/// Mints keys for one binding table.
pub struct KeyFactory {
    names: ShardedInterner,
    types: Arc<dyn TypeSystem>,
}

impl KeyFactory {
    pub fn new(types: Arc<dyn TypeSystem>) -> Self {
        Self {
            names: ShardedInterner::new(),
            types,
        }
    }

    pub fn types(&self) -> &Arc<dyn TypeSystem> {
        &self.types
    }

    /// Key for `(ty, name)`, normalized onto `Data` for data subtypes.
    pub fn key(&self, ty: TypeId, name: &str) -> Key {
        Key {
            ty: self.normalize(ty),
            name: self.names.intern(name),
        }
    }

    /// Unnamed key of a type.
    pub fn type_key(&self, ty: TypeId) -> Key {
        self.key(ty, "")
    }

    /// Key of a bare-name lookup.
    pub fn data_key(&self, name: &str) -> Key {
        Key {
            ty: TypeId::DATA,
            name: self.names.intern(name),
        }
    }

    /// Reserved key under which a multibinding's contributor keys are listed.
    pub fn contribution_key(&self, multibind: BindingId) -> Key {
        Key {
            ty: TypeId::CONTRIBUTIONS,
            name: self.names.intern(&format!("#contributions/{}", multibind.0)),
        }
    }

    pub fn intern(&self, name: &str) -> Atom {
        self.names.intern(name)
    }

    pub fn name_of(&self, key: Key) -> Arc<str> {
        self.names.resolve(key.name)
    }

    /// Human readable `Type 'name'` form used in diagnostics.
    pub fn describe(&self, key: Key) -> String {
        let ty = self.types.type_name(key.ty);
        if key.name.is_none() {
            ty.to_string()
        } else {
            format!("{ty} '{}'", self.names.resolve(key.name))
        }
    }

    /// `a -> b -> c` rendering of a chain of keys.
    pub fn describe_path(&self, path: &[Key]) -> String {
        path.iter()
            .map(|key| self.describe(*key))
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    fn normalize(&self, ty: TypeId) -> TypeId {
        if ty != TypeId::DATA && self.types.is_subtype(ty, TypeId::DATA) {
            TypeId::DATA
        } else {
            ty
        }
    }
}

#[cfg(test)]
#[path = "../tests/key_tests.rs"]
mod tests;
