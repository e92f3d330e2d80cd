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

use std::sync::Arc;

use dictcache_common::error::Result;

use crate::{
    element::{CacheKey, Keyed},
    map::{CacheEntry, Lookup, SharedMultiMap},
};

/// Capability of loading objects from the backing storage on a cache miss.
pub trait Loader<T: Keyed> {
    /// Load the object of the key. Returns `None` if no such object exists.
    fn load(&self, key: &CacheKey<T>) -> Result<Option<T>>;
}

impl<T, F> Loader<T> for F
where
    T: Keyed,
    F: Fn(&CacheKey<T>) -> Result<Option<T>>,
{
    fn load(&self, key: &CacheKey<T>) -> Result<Option<T>> {
        self(key)
    }
}

impl<T: Keyed> SharedMultiMap<T> {
    /// Look up the object by the key and load it with the loader on a miss.
    ///
    /// Concurrent callers of the same key share a single load. The miss is always resolved, also when the loader
    /// finds nothing or fails, so waiters never block on a failed load.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "dictcache::loader::get_or_load"))]
    pub fn get_or_load<L>(&self, key: &CacheKey<T>, loader: &L) -> Result<Option<CacheEntry<T>>>
    where
        L: Loader<T> + ?Sized,
    {
        let ticket = match self.get(key)? {
            Lookup::Hit(entry) => return Ok(Some(entry)),
            Lookup::Miss(ticket) => ticket,
        };

        match loader.load(key) {
            Ok(Some(object)) => ticket.fulfil(Arc::new(object)).map(Some),
            Ok(None) => {
                tracing::trace!("[dictcache]: {} no object for {key}", self.name());
                ticket.abandon();
                Ok(None)
            }
            Err(e) => {
                tracing::debug!("[dictcache]: {} load of {key} failed: {e}", self.name());
                ticket.abandon();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dictcache_common::error::{Error, ErrorKind};

    use super::*;
    use crate::{map::KeyState, test_utils::TestObject};

    struct Storage {
        loads: AtomicUsize,
    }

    impl Loader<TestObject> for Storage {
        fn load(&self, key: &CacheKey<TestObject>) -> Result<Option<TestObject>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            match key {
                CacheKey::Id(id) if *id < 100 => Ok(Some(TestObject::new(*id, format!("t{id}")))),
                CacheKey::Name(name) if name == "broken" => Err(Error::external(anyhow::anyhow!("corrupted record"))),
                _ => Ok(None),
            }
        }
    }

    fn map() -> SharedMultiMap<TestObject> {
        SharedMultiMap::builder(16).build().unwrap()
    }

    #[test_log::test]
    fn test_get_or_load() {
        let map = map();
        let storage = Storage { loads: AtomicUsize::new(0) };

        let entry = map.get_or_load(&CacheKey::Id(7), &storage).unwrap().unwrap();
        assert_eq!(entry.name.as_deref(), Some("t7"));
        drop(entry);

        // Cached by every key of the loaded object.
        let entry = map.get_or_load(&CacheKey::Name("t7".to_string()), &storage).unwrap().unwrap();
        assert_eq!(entry.id, Some(7));
        assert_eq!(storage.loads.load(Ordering::SeqCst), 1);
        drop(entry);
        map.debug_validate_invariants();
    }

    #[test_log::test]
    fn test_get_or_load_resolves_miss_on_failure() {
        let map = map();
        let storage = Storage { loads: AtomicUsize::new(0) };

        assert!(map.get_or_load(&CacheKey::Id(200), &storage).unwrap().is_none());
        assert_eq!(map.key_state(&CacheKey::Id(200)), KeyState::Absent);

        let e = map
            .get_or_load(&CacheKey::Name("broken".to_string()), &storage)
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::External);
        assert_eq!(map.key_state(&CacheKey::Name("broken".to_string())), KeyState::Absent);
        assert_eq!(map.stats().missed, 0);
    }

    #[test]
    fn test_closure_loader() {
        let map = map();
        let loader = |key: &CacheKey<TestObject>| -> Result<Option<TestObject>> {
            match key {
                CacheKey::Aux(aux) => Ok(Some(TestObject::new(1, "t1").with_aux(*aux))),
                _ => Ok(None),
            }
        };
        let entry = map.get_or_load(&CacheKey::Aux(3), &loader).unwrap().unwrap();
        assert_eq!(entry.aux, Some(3));
    }
}
