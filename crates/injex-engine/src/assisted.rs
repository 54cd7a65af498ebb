//! Reflective construction for unbound class keys.
//!
//! Only an unnamed key of a type with no binding qualifies. The type's
//! static factory wins over its default constructor; a type with neither is
//! simply absent. Probes are cached per type, and the synthesized producer
//! constructs a new instance on every call.

use crate::key::Key;
use crate::producers::{self, ProducerKind, ProducerRef};
use crate::types::{Construction, Reflection, TypeId};
use dashmap::DashMap;
use tracing::debug;

#[derive(Default)]
pub(crate) struct AssistedResolver {
    probes: DashMap<TypeId, Construction>,
}

impl AssistedResolver {
    pub(crate) fn resolve(&self, reflection: &dyn Reflection, key: Key) -> Option<ProducerRef> {
        if !key.is_unnamed() || !key.ty().is_valid() {
            return None;
        }
        match self.probe(reflection, key.ty()) {
            Construction::HasFactory(factory) => {
                debug!(type_id = key.ty().0, "assisted injection via static factory");
                Some(producers::call(ProducerKind::Assisted, move |cx| {
                    factory(cx).map(Some)
                }))
            }
            Construction::HasDefaultConstructor(ctor) => {
                debug!(type_id = key.ty().0, "assisted injection via default constructor");
                Some(producers::call(ProducerKind::Assisted, move |_| ctor().map(Some)))
            }
            Construction::Neither => None,
        }
    }

    fn probe(&self, reflection: &dyn Reflection, ty: TypeId) -> Construction {
        if let Some(cached) = self.probes.get(&ty) {
            return cached.clone();
        }
        let construction = reflection.construction(ty);
        self.probes.entry(ty).or_insert(construction).clone()
    }
}
