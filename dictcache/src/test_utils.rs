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

//! Utilities for testing.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use dictcache_common::event::{Event, EventListener};
use parking_lot::{Mutex, MutexGuard};

use crate::element::{CacheKey, ElementKeys, Keyed};

/// A dictionary-like object with an id, a name and an optional auxiliary key.
#[derive(Debug, Default)]
pub struct TestObject {
    /// Id key.
    pub id: Option<u64>,
    /// Name key.
    pub name: Option<String>,
    /// Auxiliary key.
    pub aux: Option<u64>,
    /// Payload that does not take part in the keys, used to tell equivalent objects apart.
    pub version: u64,
    drops: Option<Arc<AtomicUsize>>,
}

impl TestObject {
    /// Create an object with an id and a name.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            aux: None,
            version: 0,
            drops: None,
        }
    }

    /// Create an object that yields no key at all.
    pub fn keyless() -> Self {
        Self::default()
    }

    /// Set the auxiliary key.
    pub fn with_aux(mut self, aux: u64) -> Self {
        self.aux = Some(aux);
        self
    }

    /// Drop the name key.
    pub fn without_name(mut self) -> Self {
        self.name = None;
        self
    }

    /// Set the payload version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Count the drop of the object in the given counter.
    pub fn with_drop_counter(mut self, drops: Arc<AtomicUsize>) -> Self {
        self.drops = Some(drops);
        self
    }
}

impl Drop for TestObject {
    fn drop(&mut self) {
        if let Some(drops) = self.drops.as_ref() {
            drops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Keyed for TestObject {
    type IdKey = u64;
    type NameKey = String;
    type AuxKey = u64;

    fn id_key(&self) -> Option<u64> {
        self.id
    }

    fn name_key(&self) -> Option<String> {
        self.name.clone()
    }

    fn aux_key(&self) -> Option<u64> {
        self.aux
    }
}

/// A listener that records the keys of every object leaving the cache.
pub struct RecordingListener<T: Keyed> {
    events: Arc<Mutex<Vec<(Event, Vec<CacheKey<T>>)>>>,
}

impl<T: Keyed> Clone for RecordingListener<T> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<T: Keyed> Default for RecordingListener<T> {
    fn default() -> Self {
        Self {
            events: Default::default(),
        }
    }
}

impl<T: Keyed> EventListener for RecordingListener<T> {
    type Object = T;

    fn on_leave(&self, reason: Event, object: &T) {
        let keys = ElementKeys::from_object(object).to_vec();
        self.events.lock().push((reason, keys));
    }
}

impl<T: Keyed> RecordingListener<T> {
    /// Get all recorded events.
    pub fn events(&self) -> MutexGuard<'_, Vec<(Event, Vec<CacheKey<T>>)>> {
        self.events.lock()
    }

    /// Number of recorded events with the given reason.
    pub fn count(&self, reason: Event) -> usize {
        self.events.lock().iter().filter(|(e, _)| *e == reason).count()
    }

    /// Check if an object carrying the key left the cache with the given reason.
    pub fn contains(&self, reason: Event, key: &CacheKey<T>) -> bool {
        self.events
            .lock()
            .iter()
            .any(|(e, keys)| *e == reason && keys.contains(key))
    }
}
