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

use dictcache_common::{
    code::Key,
    error::{Error, Result},
    slab::Token,
    strict_assert, strict_assert_eq,
};
use hashbrown::HashMap;

use crate::element::{CacheKey, ElementKeys, Keyed};

/// Lookup state of a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Absent,
    Present(Token),
    /// Some thread is loading the object for the key.
    Missed,
}

/// How the keys of a new object relate to what is already indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Presence {
    /// No key is indexed.
    Absent,
    /// Every key is indexed and all point to the same element.
    Present(Token),
    /// Some keys are indexed and some are not.
    Partial,
    /// Keys are indexed but point to different elements.
    Conflict,
}

/// Result of probing the index with the keys of a new object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Probe {
    pub presence: Presence,
    /// At least one key is marked missed.
    pub missed: bool,
}

/// Generation of a miss, owned by the thread that registered it.
pub(crate) type MissGeneration = u64;

/// Index of a single key dimension.
struct KeyMap<K> {
    present: HashMap<K, Token>,
    missed: HashMap<K, MissGeneration>,
}

impl<K> Default for KeyMap<K> {
    fn default() -> Self {
        Self {
            present: HashMap::new(),
            missed: HashMap::new(),
        }
    }
}

impl<K: Key> KeyMap<K> {
    fn slot(&self, key: &K) -> Slot {
        if let Some(token) = self.present.get(key) {
            strict_assert!(!self.missed.contains_key(key), "key {key:?} is both present and missed");
            return Slot::Present(*token);
        }
        if self.missed.contains_key(key) {
            return Slot::Missed;
        }
        Slot::Absent
    }

    fn set_missed(&mut self, key: K, generation: MissGeneration) -> Result<()> {
        strict_assert!(!self.present.contains_key(&key));
        self.missed
            .try_reserve(1)
            .map_err(|e| Error::resource_exhausted("missed keys", e))?;
        let old = self.missed.insert(key, generation);
        strict_assert!(old.is_none(), "key missed twice, old: {old:?}, new: {generation}");
        Ok(())
    }

    /// Clear the mark if `owner` is `None` or registered it.
    fn set_miss_handled(&mut self, key: &K, owner: Option<MissGeneration>) -> bool {
        match (self.missed.get(key), owner) {
            (None, _) => false,
            (Some(generation), Some(owner)) if *generation != owner => false,
            _ => self.missed.remove(key).is_some(),
        }
    }

    fn try_reserve(&mut self, additional: usize) -> Result<()> {
        self.present
            .try_reserve(additional)
            .map_err(|e| Error::resource_exhausted("key index", e))
    }

    fn insert(&mut self, key: K, token: Token) {
        let old = self.present.insert(key, token);
        strict_assert!(old.is_none(), "key registered twice, old: {old:?}, new: {token:?}");
    }

    fn remove(&mut self, key: &K, token: Token) {
        let old = self.present.remove(key);
        strict_assert_eq!(old, Some(token), "key {key:?} is not registered for element {token}");
    }
}

/// Per key type maps from key to element token, with the missed state of keys being loaded.
pub(crate) struct MultiKeyIndex<T: Keyed> {
    ids: KeyMap<T::IdKey>,
    names: KeyMap<T::NameKey>,
    auxs: KeyMap<T::AuxKey>,
}

impl<T: Keyed> Default for MultiKeyIndex<T> {
    fn default() -> Self {
        Self {
            ids: KeyMap::default(),
            names: KeyMap::default(),
            auxs: KeyMap::default(),
        }
    }
}

impl<T: Keyed> MultiKeyIndex<T> {
    pub fn slot(&self, key: &CacheKey<T>) -> Slot {
        match key {
            CacheKey::Id(k) => self.ids.slot(k),
            CacheKey::Name(k) => self.names.slot(k),
            CacheKey::Aux(k) => self.auxs.slot(k),
        }
    }

    pub fn get(&self, key: &CacheKey<T>) -> Option<Token> {
        match self.slot(key) {
            Slot::Present(token) => Some(token),
            _ => None,
        }
    }

    pub fn set_missed(&mut self, key: &CacheKey<T>, generation: MissGeneration) -> Result<()> {
        match key {
            CacheKey::Id(k) => self.ids.set_missed(k.clone(), generation),
            CacheKey::Name(k) => self.names.set_missed(k.clone(), generation),
            CacheKey::Aux(k) => self.auxs.set_missed(k.clone(), generation),
        }
    }

    /// Clear the missed mark of the key. Returns `true` if the mark was cleared.
    ///
    /// With `Some(owner)` only a mark registered with that generation is cleared, a newer miss of the key is kept.
    pub fn set_miss_handled(&mut self, key: &CacheKey<T>, owner: Option<MissGeneration>) -> bool {
        match key {
            CacheKey::Id(k) => self.ids.set_miss_handled(k, owner),
            CacheKey::Name(k) => self.names.set_miss_handled(k, owner),
            CacheKey::Aux(k) => self.auxs.set_miss_handled(k, owner),
        }
    }

    /// Clear the missed marks of keys that have just been registered. Returns `true` if any key was marked.
    pub fn resolve_misses(&mut self, keys: &ElementKeys<T>) -> bool {
        let mut handled = false;
        if let Some(k) = keys.id() {
            handled |= self.ids.set_miss_handled(k, None);
        }
        if let Some(k) = keys.name() {
            handled |= self.names.set_miss_handled(k, None);
        }
        if let Some(k) = keys.aux() {
            handled |= self.auxs.set_miss_handled(k, None);
        }
        handled
    }

    pub fn probe(&self, keys: &ElementKeys<T>) -> Probe {
        let slots = [
            keys.id().map(|k| self.ids.slot(k)),
            keys.name().map(|k| self.names.slot(k)),
            keys.aux().map(|k| self.auxs.slot(k)),
        ];

        let mut missed = false;
        let mut absent = 0;
        let mut present: Option<Token> = None;
        let mut conflict = false;

        for slot in slots.into_iter().flatten() {
            match slot {
                Slot::Absent => absent += 1,
                Slot::Missed => {
                    absent += 1;
                    missed = true;
                }
                Slot::Present(token) => match present {
                    None => present = Some(token),
                    Some(t) if t == token => {}
                    Some(_) => conflict = true,
                },
            }
        }

        let presence = match (present, absent, conflict) {
            (_, _, true) => Presence::Conflict,
            (None, _, false) => Presence::Absent,
            (Some(token), 0, false) => Presence::Present(token),
            (Some(_), _, false) => Presence::Partial,
        };

        Probe { presence, missed }
    }

    /// Check that none of the keys is indexed for an element other than `owner`.
    pub fn is_free_for(&self, keys: &ElementKeys<T>, owner: Token) -> bool {
        let free = |slot: Slot| !matches!(slot, Slot::Present(token) if token != owner);
        keys.id().is_none_or(|k| free(self.ids.slot(k)))
            && keys.name().is_none_or(|k| free(self.names.slot(k)))
            && keys.aux().is_none_or(|k| free(self.auxs.slot(k)))
    }

    /// Make sure registering the keys does not allocate.
    pub fn try_reserve(&mut self, keys: &ElementKeys<T>) -> Result<()> {
        if keys.id().is_some() {
            self.ids.try_reserve(1)?;
        }
        if keys.name().is_some() {
            self.names.try_reserve(1)?;
        }
        if keys.aux().is_some() {
            self.auxs.try_reserve(1)?;
        }
        Ok(())
    }

    pub fn register(&mut self, keys: &ElementKeys<T>, token: Token) {
        strict_assert!(!keys.is_empty());
        if let Some(k) = keys.id() {
            self.ids.insert(k.clone(), token);
        }
        if let Some(k) = keys.name() {
            self.names.insert(k.clone(), token);
        }
        if let Some(k) = keys.aux() {
            self.auxs.insert(k.clone(), token);
        }
    }

    pub fn unregister(&mut self, keys: &ElementKeys<T>, token: Token) {
        if let Some(k) = keys.id() {
            self.ids.remove(k, token);
        }
        if let Some(k) = keys.name() {
            self.names.remove(k, token);
        }
        if let Some(k) = keys.aux() {
            self.auxs.remove(k, token);
        }
    }

    /// Number of missed keys over all dimensions.
    pub fn missed(&self) -> usize {
        self.ids.missed.len() + self.names.missed.len() + self.auxs.missed.len()
    }

    pub fn missed_keys(&self) -> Vec<CacheKey<T>> {
        self.ids
            .missed
            .keys()
            .cloned()
            .map(CacheKey::Id)
            .chain(self.names.missed.keys().cloned().map(CacheKey::Name))
            .chain(self.auxs.missed.keys().cloned().map(CacheKey::Aux))
            .collect()
    }

    /// Every indexed key with the element it points to.
    pub fn entries(&self) -> Vec<(CacheKey<T>, Token)> {
        self.ids
            .present
            .iter()
            .map(|(k, t)| (CacheKey::Id(k.clone()), *t))
            .chain(self.names.present.iter().map(|(k, t)| (CacheKey::Name(k.clone()), *t)))
            .chain(self.auxs.present.iter().map(|(k, t)| (CacheKey::Aux(k.clone()), *t)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use dictcache_common::slab::Slab;

    use super::*;
    use crate::test_utils::TestObject;

    fn keys(object: TestObject) -> ElementKeys<TestObject> {
        ElementKeys::from_object(&object)
    }

    #[test]
    fn test_missed_then_present() {
        let mut index = MultiKeyIndex::<TestObject>::default();
        let mut slab = Slab::new();
        let token = slab.insert(());

        let key = CacheKey::Name("t1".to_string());
        assert_eq!(index.slot(&key), Slot::Absent);
        index.set_missed(&key, 1).unwrap();
        assert_eq!(index.slot(&key), Slot::Missed);
        assert_eq!(index.missed(), 1);

        let k = keys(TestObject::new(1, "t1"));
        assert_eq!(
            index.probe(&k),
            Probe {
                presence: Presence::Absent,
                missed: true
            }
        );
        index.try_reserve(&k).unwrap();
        index.register(&k, token);
        assert!(index.resolve_misses(&k));
        assert!(!index.resolve_misses(&k));

        assert_eq!(index.slot(&key), Slot::Present(token));
        assert_eq!(index.get(&CacheKey::Id(1)), Some(token));
        assert_eq!(index.missed(), 0);
        assert_eq!(index.entries().len(), 2);

        index.unregister(&k, token);
        assert_eq!(index.slot(&key), Slot::Absent);
        assert!(index.entries().is_empty());
    }

    #[test]
    fn test_probe_presence() {
        let mut index = MultiKeyIndex::<TestObject>::default();
        let mut slab = Slab::new();
        let t1 = slab.insert(());
        let t2 = slab.insert(());

        index.register(&keys(TestObject::new(1, "t1")), t1);
        index.register(&keys(TestObject::new(2, "t2")), t2);

        let probe = |o| index.probe(&keys(o)).presence;
        assert_eq!(probe(TestObject::new(1, "t1")), Presence::Present(t1));
        assert_eq!(probe(TestObject::new(1, "t1").with_version(2)), Presence::Present(t1));
        assert_eq!(probe(TestObject::new(3, "t3")), Presence::Absent);
        // same id, renamed
        assert_eq!(probe(TestObject::new(1, "t9")), Presence::Partial);
        // id of one element, name of another
        assert_eq!(probe(TestObject::new(1, "t2")), Presence::Conflict);
        // all present keys match even if the object has fewer keys
        assert_eq!(probe(TestObject::new(2, "x").without_name()), Presence::Present(t2));
    }

    #[test]
    fn test_is_free_for() {
        let mut index = MultiKeyIndex::<TestObject>::default();
        let mut slab = Slab::new();
        let t1 = slab.insert(());
        let t2 = slab.insert(());
        index.register(&keys(TestObject::new(1, "t1")), t1);
        index.register(&keys(TestObject::new(2, "t2")), t2);

        assert!(index.is_free_for(&keys(TestObject::new(1, "renamed")), t1));
        assert!(!index.is_free_for(&keys(TestObject::new(1, "t2")), t1));
        assert!(index.is_free_for(&keys(TestObject::new(5, "t5")), t2));
    }

    #[test]
    fn test_missed_keys_listing() {
        let mut index = MultiKeyIndex::<TestObject>::default();
        index.set_missed(&CacheKey::Id(4), 1).unwrap();
        index.set_missed(&CacheKey::Aux(8), 2).unwrap();
        let mut missed = index.missed_keys().into_iter().map(|k| k.to_string()).collect::<Vec<_>>();
        missed.sort();
        assert_eq!(missed, vec!["Aux(8)".to_string(), "Id(4)".to_string()]);
        assert!(index.set_miss_handled(&CacheKey::Id(4), None));
        assert!(!index.set_miss_handled(&CacheKey::Id(4), None));
        assert_eq!(index.missed(), 1);
    }

    #[test]
    fn test_miss_handled_by_owner_only() {
        let mut index = MultiKeyIndex::<TestObject>::default();
        let key = CacheKey::Name("t1".to_string());

        index.set_missed(&key, 3).unwrap();
        // A loader of an earlier miss of the key must not clear the current one.
        assert!(!index.set_miss_handled(&key, Some(2)));
        assert_eq!(index.slot(&key), Slot::Missed);

        assert!(index.set_miss_handled(&key, Some(3)));
        assert_eq!(index.slot(&key), Slot::Absent);
        assert!(!index.set_miss_handled(&key, Some(3)));
    }
}
