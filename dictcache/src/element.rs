// Copyright 2026 dictcache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    sync::Arc,
};

use dictcache_common::{code::Key, slab::Token};

/// Capability of an object that can be cached in a [`SharedMultiMap`](crate::SharedMultiMap).
///
/// Each object can be looked up in up to three independent dimensions. A dimension the object does not take part in
/// yields `None`. Keys must be derived deterministically from the current object state, and at least one of them must
/// be present for the object to be cached.
pub trait Keyed: Send + Sync + 'static {
    /// Key of the id dimension.
    type IdKey: Key;
    /// Key of the name dimension.
    type NameKey: Key;
    /// Key of the auxiliary dimension, use `()` if the object has none.
    type AuxKey: Key;

    /// Derive the id key, or `None` if the object has no id key.
    fn id_key(&self) -> Option<Self::IdKey>;

    /// Derive the name key, or `None` if the object has no name key.
    fn name_key(&self) -> Option<Self::NameKey>;

    /// Derive the auxiliary key, or `None` if the object has no auxiliary key.
    fn aux_key(&self) -> Option<Self::AuxKey> {
        None
    }
}

/// A key in one of the three lookup dimensions of `T`.
pub enum CacheKey<T: Keyed> {
    /// Id dimension.
    Id(T::IdKey),
    /// Name dimension.
    Name(T::NameKey),
    /// Auxiliary dimension.
    Aux(T::AuxKey),
}

impl<T: Keyed> Clone for CacheKey<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Id(k) => Self::Id(k.clone()),
            Self::Name(k) => Self::Name(k.clone()),
            Self::Aux(k) => Self::Aux(k.clone()),
        }
    }
}

impl<T: Keyed> PartialEq for CacheKey<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Id(a), Self::Id(b)) => a == b,
            (Self::Name(a), Self::Name(b)) => a == b,
            (Self::Aux(a), Self::Aux(b)) => a == b,
            _ => false,
        }
    }
}

impl<T: Keyed> Eq for CacheKey<T> {}

impl<T: Keyed> Hash for CacheKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Id(k) => k.hash(state),
            Self::Name(k) => k.hash(state),
            Self::Aux(k) => k.hash(state),
        }
    }
}

impl<T: Keyed> Debug for CacheKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(k) => f.debug_tuple("Id").field(k).finish(),
            Self::Name(k) => f.debug_tuple("Name").field(k).finish(),
            Self::Aux(k) => f.debug_tuple("Aux").field(k).finish(),
        }
    }
}

impl<T: Keyed> Display for CacheKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The keys an object produced the last time they were generated.
pub struct ElementKeys<T: Keyed> {
    id: Option<T::IdKey>,
    name: Option<T::NameKey>,
    aux: Option<T::AuxKey>,
}

impl<T: Keyed> Default for ElementKeys<T> {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            aux: None,
        }
    }
}

impl<T: Keyed> Clone for ElementKeys<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            aux: self.aux.clone(),
        }
    }
}

impl<T: Keyed> Debug for ElementKeys<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementKeys")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("aux", &self.aux)
            .finish()
    }
}

impl<T: Keyed> ElementKeys<T> {
    /// Derive all keys from the object.
    pub fn from_object(object: &T) -> Self {
        Self {
            id: object.id_key(),
            name: object.name_key(),
            aux: object.aux_key(),
        }
    }

    /// Id key, if any.
    pub fn id(&self) -> Option<&T::IdKey> {
        self.id.as_ref()
    }

    /// Name key, if any.
    pub fn name(&self) -> Option<&T::NameKey> {
        self.name.as_ref()
    }

    /// Auxiliary key, if any.
    pub fn aux(&self) -> Option<&T::AuxKey> {
        self.aux.as_ref()
    }

    /// Check if no key is present.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.aux.is_none()
    }

    /// Check if the given key is one of the present keys.
    pub fn contains(&self, key: &CacheKey<T>) -> bool {
        match key {
            CacheKey::Id(k) => self.id.as_ref() == Some(k),
            CacheKey::Name(k) => self.name.as_ref() == Some(k),
            CacheKey::Aux(k) => self.aux.as_ref() == Some(k),
        }
    }

    /// Present keys in id, name, aux order.
    pub fn to_vec(&self) -> Vec<CacheKey<T>> {
        let mut keys = Vec::with_capacity(3);
        if let Some(k) = &self.id {
            keys.push(CacheKey::Id(k.clone()));
        }
        if let Some(k) = &self.name {
            keys.push(CacheKey::Name(k.clone()));
        }
        if let Some(k) = &self.aux {
            keys.push(CacheKey::Aux(k.clone()));
        }
        keys
    }

    fn clear(&mut self) {
        self.id = None;
        self.name = None;
        self.aux = None;
    }
}

/// Wrapper of one cached object, its lookup keys and its usage counter.
///
/// The element does no locking of its own. Every mutation happens under the lock of the map that owns it.
pub struct CacheElement<T: Keyed> {
    object: Option<Arc<T>>,
    keys: ElementKeys<T>,
    ref_counter: usize,

    /// Position in the free list while unused.
    free_token: Option<Token>,
    /// Stamp of the insertion that registered the element.
    epoch: u64,
}

impl<T: Keyed> Default for CacheElement<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed> Debug for CacheElement<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheElement")
            .field("keys", &self.keys)
            .field("usage", &self.ref_counter)
            .field("free", &self.free_token.is_some())
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl<T: Keyed> CacheElement<T> {
    /// Create an empty element wrapper.
    pub fn new() -> Self {
        Self {
            object: None,
            keys: ElementKeys::default(),
            ref_counter: 0,
            free_token: None,
            epoch: 0,
        }
    }

    /// Create an element wrapping the object with its keys generated.
    #[cfg(any(test, feature = "test_utils"))]
    pub fn with_object(object: Arc<T>) -> Self {
        let mut element = Self::new();
        element.set_object(Some(object));
        element.recreate_keys();
        element
    }

    /// The wrapped object.
    pub fn object(&self) -> Option<&Arc<T>> {
        self.object.as_ref()
    }

    /// Rebind the wrapped object and return the old one.
    ///
    /// Keys are left untouched, the caller must follow with [`CacheElement::recreate_keys`].
    pub fn set_object(&mut self, object: Option<Arc<T>>) -> Option<Arc<T>> {
        std::mem::replace(&mut self.object, object)
    }

    /// Increase the usage counter.
    pub fn acquire(&mut self) -> usize {
        self.ref_counter += 1;
        self.ref_counter
    }

    /// Decrease the usage counter.
    ///
    /// # Panics
    ///
    /// Panics if the element is not in use.
    pub fn release(&mut self) -> usize {
        assert!(self.ref_counter > 0, "release of an unused element: {self:?}");
        self.ref_counter -= 1;
        self.ref_counter
    }

    /// Current usage counter.
    pub fn usage(&self) -> usize {
        self.ref_counter
    }

    /// Id key generated for the wrapped object.
    pub fn id_key(&self) -> Option<&T::IdKey> {
        self.keys.id()
    }

    /// Name key generated for the wrapped object.
    pub fn name_key(&self) -> Option<&T::NameKey> {
        self.keys.name()
    }

    /// Auxiliary key generated for the wrapped object.
    pub fn aux_key(&self) -> Option<&T::AuxKey> {
        self.keys.aux()
    }

    /// All keys generated for the wrapped object.
    pub fn keys(&self) -> &ElementKeys<T> {
        &self.keys
    }

    /// Regenerate all keys from the wrapped object.
    pub fn recreate_keys(&mut self) {
        match self.object.as_deref() {
            Some(object) => self.keys = ElementKeys::from_object(object),
            None => self.keys.clear(),
        }
    }

    pub(crate) fn free_token(&self) -> Option<Token> {
        self.free_token
    }

    pub(crate) fn set_free_token(&mut self, token: Option<Token>) -> Option<Token> {
        std::mem::replace(&mut self.free_token, token)
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn set_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
    }

    /// Detach the object and clear all state so the wrapper can be reused.
    pub(crate) fn reset(&mut self) -> Option<Arc<T>> {
        self.keys.clear();
        self.ref_counter = 0;
        self.free_token = None;
        self.epoch = 0;
        self.object.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestObject;

    #[test]
    fn test_keys_follow_object() {
        let mut element = CacheElement::with_object(Arc::new(TestObject::new(1, "t1")));
        assert_eq!(element.id_key(), Some(&1));
        assert_eq!(element.name_key(), Some(&"t1".to_string()));
        assert_eq!(element.aux_key(), None);

        // Rebinding keeps the old keys until they are recreated.
        let old = element.set_object(Some(Arc::new(TestObject::new(1, "t2").with_aux(7))));
        assert_eq!(old.unwrap().name.as_deref(), Some("t1"));
        assert_eq!(element.name_key(), Some(&"t1".to_string()));
        element.recreate_keys();
        assert_eq!(element.name_key(), Some(&"t2".to_string()));
        assert_eq!(element.aux_key(), Some(&7));

        element.set_object(None);
        element.recreate_keys();
        assert!(element.keys().is_empty());
        assert!(element.object().is_none());
    }

    #[test]
    fn test_usage_counter() {
        let mut element = CacheElement::with_object(Arc::new(TestObject::new(1, "t1")));
        assert_eq!(element.usage(), 0);
        assert_eq!(element.acquire(), 1);
        assert_eq!(element.acquire(), 2);
        assert_eq!(element.release(), 1);
        assert_eq!(element.release(), 0);
    }

    #[test]
    #[should_panic(expected = "release of an unused element")]
    fn test_release_unused_element() {
        let mut element = CacheElement::with_object(Arc::new(TestObject::new(1, "t1")));
        element.release();
    }

    #[test]
    fn test_reset_detaches_object() {
        let object = Arc::new(TestObject::new(3, "t3"));
        let mut element = CacheElement::with_object(object.clone());
        element.acquire();
        element.set_epoch(9);
        let detached = element.reset().unwrap();
        assert!(Arc::ptr_eq(&detached, &object));
        assert_eq!(element.usage(), 0);
        assert_eq!(element.epoch(), 0);
        assert!(element.keys().is_empty());
    }

    #[test]
    fn test_cache_key_identity() {
        let keys = ElementKeys::from_object(&TestObject::new(5, "t5"));
        assert!(keys.contains(&CacheKey::Id(5)));
        assert!(keys.contains(&CacheKey::Name("t5".to_string())));
        assert!(!keys.contains(&CacheKey::Name("t6".to_string())));
        assert!(!keys.contains(&CacheKey::Aux(5)));
        assert_eq!(
            keys.to_vec(),
            vec![CacheKey::<TestObject>::Id(5), CacheKey::Name("t5".to_string())]
        );
        assert_eq!(CacheKey::<TestObject>::Name("t5".to_string()).to_string(), "Name(\"t5\")");
    }
}
