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
    ops::Deref,
    sync::Arc,
    time::{Duration, Instant},
};

use dictcache_common::{
    error::{Error, ErrorKind, Result},
    event::{Event, EventListener},
    metrics::model::Metrics,
    slab::{Slab, Token},
    strict_assert,
};
use itertools::Itertools;
use parking_lot::{Condvar, Mutex};

use crate::{
    autolocker::Autolocker,
    config::{CacheConfig, SharedMultiMapBuilder},
    element::{CacheElement, CacheKey, ElementKeys, Keyed},
    free_list::FreeList,
    index::{MissGeneration, MultiKeyIndex, Presence, Slot},
    pool::ElementPool,
};

/// Result of [`SharedMultiMap::get`].
pub enum Lookup<T: Keyed> {
    /// The object is cached.
    Hit(CacheEntry<T>),
    /// The object is not cached and the caller is responsible for loading it.
    Miss(MissTicket<T>),
}

impl<T: Keyed> Lookup<T> {
    /// Check if the lookup is a hit.
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }

    /// Check if the lookup is a miss.
    pub fn is_miss(&self) -> bool {
        matches!(self, Lookup::Miss(_))
    }
}

impl<T: Keyed> Debug for Lookup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit(entry) => f.debug_tuple("Hit").field(entry).finish(),
            Self::Miss(ticket) => f.debug_tuple("Miss").field(ticket).finish(),
        }
    }
}

/// Usage state of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// The key is neither cached nor being loaded.
    Absent,
    /// The key is cached.
    Present {
        /// Usage counter of the element.
        usage: usize,
    },
    /// Some thread is loading the object for the key.
    Missed,
}

/// Snapshot of the map occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Elements registered in the index.
    pub elements: usize,
    /// Unused elements in the free list.
    pub free: usize,
    /// Detached element wrappers in the pool.
    pub pooled: usize,
    /// Keys being loaded.
    pub missed: usize,
    /// Configured capacity.
    pub capacity: usize,
}

/// Handle of a cached object.
///
/// Every handle accounts for one usage of the element. Dropping the handle releases it; the element joins the free
/// list when its last handle is dropped.
#[must_use]
pub struct CacheEntry<T: Keyed> {
    inner: Arc<Inner<T>>,
    token: Token,
    epoch: u64,
    object: Arc<T>,
    armed: bool,
}

impl<T: Keyed> CacheEntry<T> {
    fn new(inner: Arc<Inner<T>>, token: Token, epoch: u64, object: Arc<T>) -> Self {
        Self {
            inner,
            token,
            epoch,
            object,
            armed: true,
        }
    }

    /// The cached object.
    pub fn object(&self) -> &Arc<T> {
        &self.object
    }

    /// Keys derived from the cached object.
    pub fn keys(&self) -> ElementKeys<T> {
        ElementKeys::from_object(&self.object)
    }

    fn disarm(mut self) -> (Token, u64) {
        self.armed = false;
        (self.token, self.epoch)
    }
}

impl<T: Keyed> Deref for CacheEntry<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.object
    }
}

impl<T: Keyed> Debug for CacheEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("map", &self.inner.name)
            .field("token", &self.token)
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl<T: Keyed> Drop for CacheEntry<T> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.release(self.token, self.epoch);
        }
    }
}

/// Responsibility of loading the object for a missed key.
///
/// Other lookups of the key block until the ticket is resolved with [`MissTicket::fulfil`] or
/// [`MissTicket::abandon`]. Dropping an unresolved ticket abandons it.
#[must_use]
pub struct MissTicket<T: Keyed> {
    inner: Arc<Inner<T>>,
    key: CacheKey<T>,
    generation: MissGeneration,
    resolved: bool,
}

impl<T: Keyed> MissTicket<T> {
    fn new(inner: Arc<Inner<T>>, key: CacheKey<T>, generation: MissGeneration) -> Self {
        Self {
            inner,
            key,
            generation,
            resolved: false,
        }
    }

    /// The missed key.
    pub fn key(&self) -> &CacheKey<T> {
        &self.key
    }

    /// Insert the loaded object and wake the waiters of the key.
    pub fn fulfil(mut self, object: Arc<T>) -> Result<CacheEntry<T>> {
        self.resolved = true;
        self.inner.insert(&self.key, Some(self.generation), object)
    }

    /// Report that no object exists for the key and wake the waiters of the key.
    pub fn abandon(mut self) {
        self.resolved = true;
        self.inner.resolve_miss(&self.key, Some(self.generation));
    }
}

impl<T: Keyed> Debug for MissTicket<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MissTicket")
            .field("map", &self.inner.name)
            .field("key", &self.key)
            .field("generation", &self.generation)
            .finish()
    }
}

impl<T: Keyed> Drop for MissTicket<T> {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::debug!("[dictcache]: {} abandon unresolved miss of {}", self.inner.name, self.key);
            self.inner.resolve_miss(&self.key, Some(self.generation));
        }
    }
}

struct State<T: Keyed> {
    elements: Slab<CacheElement<T>>,
    index: MultiKeyIndex<T>,
    free_list: FreeList,
    pool: ElementPool<T>,

    capacity: usize,
    epoch: u64,
    miss_generation: MissGeneration,

    #[cfg(test)]
    fail_reserve: bool,
}

type Locker<'a, T> = Autolocker<'a, State<T>, T>;

struct Inner<T: Keyed> {
    name: String,
    state: Mutex<State<T>>,
    condvar: Condvar,
    miss_wait_timeout: Option<Duration>,
    listener: Option<Arc<dyn EventListener<Object = T>>>,
    metrics: Arc<Metrics>,
}

fn dangling(token: Token) -> Error {
    Error::consistency("index points to a missing element").with_context("token", token)
}

impl<T: Keyed> Inner<T> {
    fn lock(&self) -> Locker<'_, T> {
        Autolocker::new(self.state.lock(), &self.condvar, self.listener.as_deref())
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "dictcache::map::get"))]
    fn get(self: &Arc<Self>, key: &CacheKey<T>) -> Result<Lookup<T>> {
        let deadline = self.miss_wait_timeout.map(|timeout| Instant::now() + timeout);
        let mut locker = self.lock();
        let mut waited = false;

        loop {
            match locker.index.slot(key) {
                Slot::Present(token) => {
                    let entry = self.use_element(&mut locker, token)?;
                    self.metrics.hit.increase(1);
                    return Ok(Lookup::Hit(entry));
                }
                Slot::Missed => {
                    if !waited {
                        waited = true;
                        self.metrics.wait.increase(1);
                        tracing::trace!("[dictcache]: {} wait for the miss of {key}", self.name);
                    }
                    match deadline {
                        None => locker.wait(),
                        Some(deadline) if Instant::now() >= deadline => {
                            tracing::warn!(
                                "[dictcache]: {} wait for the miss of {key} timed out after {:?}",
                                self.name,
                                self.miss_wait_timeout
                            );
                            return Err(Error::new(ErrorKind::Timeout, "wait for a missed key timed out")
                                .with_context("map", &self.name)
                                .with_context("key", key));
                        }
                        Some(deadline) => {
                            locker.wait_until(deadline);
                        }
                    }
                }
                Slot::Absent => {
                    let generation = locker.miss_generation + 1;
                    locker.index.set_missed(key, generation)?;
                    locker.miss_generation = generation;
                    self.metrics.miss.increase(1);
                    tracing::trace!("[dictcache]: {} miss {key}, generation: {generation}", self.name);
                    return Ok(Lookup::Miss(MissTicket::new(self.clone(), key.clone(), generation)));
                }
            }
        }
    }

    fn get_if_present(self: &Arc<Self>, key: &CacheKey<T>) -> Result<Option<CacheEntry<T>>> {
        let mut locker = self.lock();
        match locker.index.get(key) {
            Some(token) => {
                let entry = self.use_element(&mut locker, token)?;
                self.metrics.hit.increase(1);
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Increase the usage of a registered element and unlink it from the free list.
    fn use_element(self: &Arc<Self>, locker: &mut Locker<'_, T>, token: Token) -> Result<CacheEntry<T>> {
        let state = &mut **locker;
        let element = state.elements.get_mut(token).ok_or_else(|| dangling(token))?;
        let object = element
            .object()
            .cloned()
            .ok_or_else(|| Error::consistency("registered element has no object").with_context("token", token))?;

        if let Some(link) = element.set_free_token(None) {
            state.free_list.remove(link);
        }
        let usage = element.acquire();
        let epoch = element.epoch();

        tracing::trace!("[dictcache]: {} use {token}, usage: {usage}", self.name);
        self.update_gauges(state);
        Ok(CacheEntry::new(self.clone(), token, epoch, object))
    }

    fn resolve_miss(&self, key: &CacheKey<T>, owner: Option<MissGeneration>) {
        let mut locker = self.lock();
        if self.handle_miss(&mut locker, key, owner) {
            tracing::trace!("[dictcache]: {} miss of {key} handled without object", self.name);
        }
    }

    /// Clear the missed mark of the requested key if `owner` registered it, and schedule the broadcast.
    fn handle_miss(&self, locker: &mut Locker<'_, T>, key: &CacheKey<T>, owner: Option<MissGeneration>) -> bool {
        let handled = locker.index.set_miss_handled(key, owner);
        if handled {
            locker.notify_all();
        }
        handled
    }

    /// Clear the missed marks of the requested key and of all registered object keys, and schedule the broadcast.
    fn resolve_misses(
        &self,
        locker: &mut Locker<'_, T>,
        key: &CacheKey<T>,
        owner: Option<MissGeneration>,
        keys: &ElementKeys<T>,
    ) {
        let handled = locker.index.resolve_misses(keys) | locker.index.set_miss_handled(key, owner);
        if handled {
            locker.notify_all();
        }
    }

    fn recycle(&self, locker: &mut Locker<'_, T>, mut element: CacheElement<T>) {
        // The caller still holds the object, so this only drops a reference.
        element.reset();
        locker.pool.release(element);
    }

    /// Misses of the object keys other than the requested one belong to other loaders and stay marked.
    fn reject(
        &self,
        locker: &mut Locker<'_, T>,
        key: &CacheKey<T>,
        owner: Option<MissGeneration>,
        keys: &ElementKeys<T>,
        object: Arc<T>,
        message: &'static str,
    ) -> Error {
        self.handle_miss(locker, key, owner);
        locker.auto_delete(Event::Reject, object);
        self.metrics.reject.increase(1);
        tracing::warn!("[dictcache]: {} reject put for {key}: {message}, keys: {keys:?}", self.name);
        Error::consistency(message)
            .with_context("map", &self.name)
            .with_context("key", key)
            .with_context("keys", format!("{keys:?}"))
    }

    fn reserve(&self, locker: &mut Locker<'_, T>, keys: &ElementKeys<T>) -> Result<()> {
        #[cfg(test)]
        if locker.fail_reserve {
            return Err(Error::resource_exhausted("elements", "injected allocation failure"));
        }
        locker.index.try_reserve(keys)?;
        locker
            .elements
            .try_reserve(1)
            .map_err(|e| Error::resource_exhausted("elements", e))?;
        locker.free_list.try_reserve()
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "dictcache::map::insert"))]
    fn insert(
        self: &Arc<Self>,
        key: &CacheKey<T>,
        owner: Option<MissGeneration>,
        object: Arc<T>,
    ) -> Result<CacheEntry<T>> {
        let mut locker = self.lock();

        let mut element = locker.pool.acquire();
        element.set_object(Some(object.clone()));
        element.recreate_keys();
        let keys = element.keys().clone();

        if !keys.contains(key) {
            tracing::warn!(
                "[dictcache]: {} put for {key} with an object that does not carry the key, keys: {keys:?}",
                self.name
            );
        }

        if keys.is_empty() {
            self.recycle(&mut locker, element);
            return Err(self.reject(&mut locker, key, owner, &keys, object, "object has no key"));
        }

        match locker.index.probe(&keys).presence {
            Presence::Absent => {}
            Presence::Present(token) => {
                // Another thread inserted an equivalent object first.
                self.recycle(&mut locker, element);
                self.resolve_misses(&mut locker, key, owner, &keys);
                locker.auto_delete(Event::Duplicate, object);
                self.metrics.duplicate.increase(1);
                tracing::debug!("[dictcache]: {} duplicate put for {key}, keep {token}", self.name);
                return self.use_element(&mut locker, token);
            }
            Presence::Partial => {
                self.recycle(&mut locker, element);
                return Err(self.reject(
                    &mut locker,
                    key,
                    owner,
                    &keys,
                    object,
                    "some keys of the object are cached and some are not",
                ));
            }
            Presence::Conflict => {
                self.recycle(&mut locker, element);
                return Err(self.reject(
                    &mut locker,
                    key,
                    owner,
                    &keys,
                    object,
                    "keys of the object belong to different elements",
                ));
            }
        }

        if let Err(e) = self.reserve(&mut locker, &keys) {
            self.recycle(&mut locker, element);
            self.handle_miss(&mut locker, key, owner);
            locker.auto_delete(Event::Reject, object);
            self.metrics.reject.increase(1);
            tracing::warn!("[dictcache]: {} put for {key} failed: {e}", self.name);
            return Err(e);
        }

        locker.epoch += 1;
        let epoch = locker.epoch;
        element.set_epoch(epoch);
        element.acquire();
        let token = locker.elements.insert(element);
        locker.index.register(&keys, token);
        self.resolve_misses(&mut locker, key, owner, &keys);
        self.metrics.insert.increase(1);
        tracing::trace!("[dictcache]: {} insert {token} for {key}, keys: {keys:?}", self.name);

        // The new element is in use, so it is never evicted here.
        self.rectify_free_list(&mut locker);
        self.update_gauges(&locker);

        Ok(CacheEntry::new(self.clone(), token, epoch, object))
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "dictcache::map::release"))]
    fn release(&self, token: Token, epoch: u64) {
        let mut locker = self.lock();

        let usage = match locker.elements.get_mut(token) {
            Some(element) if element.epoch() == epoch => element.release(),
            _ => {
                tracing::trace!("[dictcache]: {} release of removed element {token}", self.name);
                return;
            }
        };
        tracing::trace!("[dictcache]: {} release {token}, usage: {usage}", self.name);
        if usage > 0 {
            return;
        }

        self.metrics.release.increase(1);
        match locker.free_list.try_reserve() {
            Ok(()) => {
                let link = locker.free_list.push(token);
                if let Some(element) = locker.elements.get_mut(token) {
                    element.set_free_token(Some(link));
                }
            }
            Err(e) => {
                tracing::warn!("[dictcache]: {} evict {token} that the free list cannot track: {e}", self.name);
                if let Some(element) = locker.elements.get_mut(token) {
                    element.acquire();
                }
                self.remove(&mut locker, token, Event::Evict);
            }
        }

        self.rectify_free_list(&mut locker);
        self.update_gauges(&locker);
    }

    /// Remove the element from the index and schedule its object for deletion.
    ///
    /// The element must be in use.
    fn remove(&self, locker: &mut Locker<'_, T>, token: Token, reason: Event) -> Option<ElementKeys<T>> {
        let state = &mut **locker;
        let mut element = state.elements.remove(token)?;
        strict_assert!(element.usage() > 0, "remove of unused element {token}");

        if let Some(link) = element.set_free_token(None) {
            state.free_list.remove(link);
        }
        let keys = element.keys().clone();
        state.index.unregister(&keys, token);
        let object = element.reset();
        state.pool.release(element);

        match reason {
            Event::Evict => self.metrics.evict.increase(1),
            Event::Remove => self.metrics.remove.increase(1),
            Event::Leak => self.metrics.leak.increase(1),
            _ => {}
        }
        tracing::debug!("[dictcache]: {} remove {token} for {reason:?}, keys: {keys:?}", self.name);

        if let Some(object) = object {
            locker.auto_delete(reason, object);
        }
        self.update_gauges(locker);
        Some(keys)
    }

    /// Evict the least recently used free element. Returns `false` if the free list is empty.
    fn evict_lru(&self, locker: &mut Locker<'_, T>) -> bool {
        let Some(token) = locker.free_list.pop_lru() else {
            return false;
        };
        match locker.elements.get_mut(token) {
            Some(element) => {
                element.set_free_token(None);
                element.acquire();
            }
            None => return true,
        }
        self.remove(locker, token, Event::Evict);
        true
    }

    fn rectify_free_list(&self, locker: &mut Locker<'_, T>) {
        while locker.elements.len() > locker.capacity {
            if !self.evict_lru(locker) {
                break;
            }
        }
    }

    fn evict_all_unused(&self, locker: &mut Locker<'_, T>) {
        while self.evict_lru(locker) {}
    }

    fn drop_element(&self, token: Token, epoch: u64) -> bool {
        let mut locker = self.lock();
        match locker.elements.get(token) {
            Some(element) if element.epoch() == epoch => {}
            _ => return false,
        }
        self.remove(&mut locker, token, Event::Remove).is_some()
    }

    fn drop_if_present(&self, key: &CacheKey<T>) -> bool {
        let mut locker = self.lock();
        let Some(token) = locker.index.get(key) else {
            return false;
        };
        match locker.elements.get_mut(token) {
            Some(element) => {
                element.acquire();
            }
            None => return false,
        }
        self.remove(&mut locker, token, Event::Remove).is_some()
    }

    fn reject_replace(&self, locker: &mut Locker<'_, T>, token: Token, object: Arc<T>, error: Error) -> Error {
        locker.auto_delete(Event::Reject, object);
        self.metrics.reject.increase(1);
        tracing::warn!("[dictcache]: {} reject replace of {token}: {error}", self.name);
        error.with_context("map", &self.name).with_context("token", token)
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "dictcache::map::replace"))]
    fn replace(&self, token: Token, epoch: u64, object: Arc<T>) -> Result<()> {
        let mut locker = self.lock();

        let (usage, old_keys) = match locker.elements.get(token) {
            Some(element) if element.epoch() == epoch => (element.usage(), element.keys().clone()),
            _ => {
                let e = Error::consistency("replace of an element that is no longer cached");
                return Err(self.reject_replace(&mut locker, token, object, e));
            }
        };
        if usage != 1 {
            let e = Error::consistency("replace requires sole ownership of the element").with_context("usage", usage);
            return Err(self.reject_replace(&mut locker, token, object, e));
        }

        let keys = ElementKeys::<T>::from_object(&object);
        if keys.is_empty() {
            return Err(self.reject_replace(&mut locker, token, object, Error::consistency("object has no key")));
        }
        if !locker.index.is_free_for(&keys, token) {
            let e = Error::consistency("keys of the object belong to another element")
                .with_context("keys", format!("{keys:?}"));
            return Err(self.reject_replace(&mut locker, token, object, e));
        }
        if let Err(e) = locker.index.try_reserve(&keys) {
            return Err(self.reject_replace(&mut locker, token, object, e));
        }

        let state = &mut *locker;
        state.index.unregister(&old_keys, token);
        let element = state.elements.get_mut(token).ok_or_else(|| dangling(token))?;
        let old = element.set_object(Some(object.clone()));
        element.recreate_keys();
        state.index.register(&keys, token);
        let handled = state.index.resolve_misses(&keys);

        if handled {
            locker.notify_all();
        }
        if let Some(old) = old.filter(|old| !Arc::ptr_eq(old, &object)) {
            locker.auto_delete(Event::Replace, old);
        }
        self.metrics.replace.increase(1);
        tracing::trace!(
            "[dictcache]: {} replace {token}, keys: {old_keys:?} -> {keys:?}",
            self.name
        );
        Ok(())
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "dictcache::map::shutdown"))]
    fn shutdown(&self) -> Result<()> {
        let mut locker = self.lock();

        locker.capacity = 0;
        self.evict_all_unused(&mut locker);

        let mut leaked = vec![];
        for token in locker.elements.tokens() {
            let usage = locker.elements.get(token).map(|e| e.usage()).unwrap_or_default();
            if let Some(keys) = self.remove(&mut locker, token, Event::Leak) {
                tracing::warn!(
                    "[dictcache]: {} element {token} is still referenced at shutdown, usage: {usage}, keys: {keys:?}",
                    self.name
                );
                leaked.extend(keys.to_vec());
            }
        }
        locker.pool.clear();
        self.update_gauges(&locker);

        if leaked.is_empty() {
            tracing::debug!("[dictcache]: {} shutdown", self.name);
            return Ok(());
        }
        Err(Error::leaked(leaked).with_context("map", &self.name))
    }

    fn set_capacity(&self, capacity: usize) {
        let mut locker = self.lock();
        locker.capacity = capacity;
        self.rectify_free_list(&mut locker);
        self.update_gauges(&locker);
    }

    fn update_gauges(&self, state: &State<T>) {
        self.metrics.elements.absolute(state.elements.len() as u64);
        self.metrics.free.absolute(state.free_list.len() as u64);
    }
}

struct Dump<'a, T: Keyed> {
    name: &'a str,
    state: &'a State<T>,
}

impl<T: Keyed> Display for Dump<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state;
        writeln!(
            f,
            "SharedMultiMap {:?}: elements: {}, free: {}, pooled: {}, missed: {}, capacity: {}",
            self.name,
            state.elements.len(),
            state.free_list.len(),
            state.pool.len(),
            state.index.missed(),
            state.capacity,
        )?;
        for (token, element) in state.elements.iter() {
            writeln!(
                f,
                "  {token} usage: {} free: {} keys: [{}]",
                element.usage(),
                element.free_token().is_some(),
                element.keys().to_vec().iter().join(", "),
            )?;
        }
        for key in state.index.missed_keys() {
            writeln!(f, "  missed {key}")?;
        }
        Ok(())
    }
}

impl<T: Keyed> Drop for Inner<T> {
    fn drop(&mut self) {
        // Every handle keeps the map alive, so all remaining elements are unused.
        let state = self.state.get_mut();
        let objects = state
            .elements
            .tokens()
            .into_iter()
            .filter_map(|token| state.elements.remove(token))
            .filter_map(|mut element| element.reset())
            .collect_vec();
        state.index = MultiKeyIndex::default();
        state.free_list = FreeList::default();
        state.pool.clear();

        if let Some(listener) = self.listener.as_ref() {
            for object in objects.iter() {
                listener.on_leave(Event::Clear, object);
            }
        }
    }
}

/// Shared multi-key reference-counted cache of objects of one type.
///
/// Objects are looked up by any of their keys. Concurrent lookups of the same missed key are coordinated so that
/// exactly one caller loads the object while the others wait for it. Unused objects are kept in an LRU free list
/// and evicted when the map exceeds its capacity.
///
/// The map is cheap to clone, clones share the same state.
pub struct SharedMultiMap<T: Keyed> {
    inner: Arc<Inner<T>>,
}

impl<T: Keyed> Clone for SharedMultiMap<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Keyed> Debug for SharedMultiMap<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMultiMap")
            .field("name", &self.inner.name)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T: Keyed> SharedMultiMap<T> {
    /// Create a builder of a map with the given capacity.
    pub fn builder(capacity: usize) -> SharedMultiMapBuilder<T> {
        SharedMultiMapBuilder::new(capacity)
    }

    pub(crate) fn new(
        config: CacheConfig,
        listener: Option<Arc<dyn EventListener<Object = T>>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let state = State {
            elements: Slab::new(),
            index: MultiKeyIndex::default(),
            free_list: FreeList::default(),
            pool: ElementPool::new(config.pool_capacity),
            capacity: config.capacity,
            epoch: 0,
            miss_generation: 0,
            #[cfg(test)]
            fail_reserve: false,
        };
        let inner = Inner {
            name: config.name,
            state: Mutex::new(state),
            condvar: Condvar::new(),
            miss_wait_timeout: config.miss_wait_timeout,
            listener,
            metrics,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Name of the map.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Look up the object by the key.
    ///
    /// On a miss the caller becomes responsible for loading the object and must resolve the returned ticket.
    /// If another caller is already loading the object, blocks until that load is resolved and looks up again.
    pub fn get(&self, key: &CacheKey<T>) -> Result<Lookup<T>> {
        self.inner.get(key)
    }

    /// Look up the object by the key without registering a miss or waiting for one.
    pub fn get_if_present(&self, key: &CacheKey<T>) -> Result<Option<CacheEntry<T>>> {
        self.inner.get_if_present(key)
    }

    /// Resolve the miss of the key.
    ///
    /// Unlike [`MissTicket`] this resolves whichever miss of the key is pending, so it is meant for callers that
    /// load without a ticket. With `None` the waiters of the key are woken to look up again. With an object it is inserted, or an
    /// equivalent object inserted concurrently is used instead, and a handle of the cached object is returned.
    pub fn put(&self, key: &CacheKey<T>, object: Option<Arc<T>>) -> Result<Option<CacheEntry<T>>> {
        match object {
            Some(object) => self.inner.insert(key, None, object).map(Some),
            None => {
                self.inner.resolve_miss(key, None);
                Ok(None)
            }
        }
    }

    /// Release the handle. Same as dropping it.
    pub fn release(&self, entry: CacheEntry<T>) {
        strict_assert!(Arc::ptr_eq(&self.inner, &entry.inner));
        drop(entry);
    }

    /// Remove the element of the handle regardless of its usage.
    ///
    /// Other handles of the element stay valid, their release becomes a no-op.
    pub fn drop_entry(&self, entry: CacheEntry<T>) {
        strict_assert!(Arc::ptr_eq(&self.inner, &entry.inner));
        let inner = entry.inner.clone();
        let (token, epoch) = entry.disarm();
        inner.drop_element(token, epoch);
    }

    /// Remove the element of the key regardless of its usage. Returns `true` if the key was cached.
    pub fn drop_if_present(&self, key: &CacheKey<T>) -> bool {
        self.inner.drop_if_present(key)
    }

    /// Rebind the element of the handle to a new object and reindex it by the new object's keys.
    ///
    /// The handle must be the only usage of the element. The old object is scheduled for deletion unless it is the
    /// same object.
    pub fn replace(&self, entry: &mut CacheEntry<T>, object: Arc<T>) -> Result<()> {
        strict_assert!(Arc::ptr_eq(&self.inner, &entry.inner));
        entry.inner.replace(entry.token, entry.epoch, object.clone())?;
        entry.object = object;
        Ok(())
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Change the capacity and evict unused elements beyond it.
    pub fn set_capacity(&self, capacity: usize) {
        self.inner.set_capacity(capacity);
    }

    /// Evict every unused element.
    pub fn evict_all_unused(&self) {
        let mut locker = self.inner.lock();
        self.inner.evict_all_unused(&mut locker);
        self.inner.update_gauges(&locker);
    }

    /// Evict every unused element and reset the capacity to zero.
    ///
    /// Elements still referenced are leaked handles. They are removed as well and reported with an
    /// [`ErrorKind::Leaked`] error that enumerates their keys.
    pub fn shutdown(&self) -> Result<()> {
        self.inner.shutdown()
    }

    /// Snapshot of the map occupancy.
    pub fn stats(&self) -> CacheStats {
        let locker = self.inner.lock();
        CacheStats {
            elements: locker.elements.len(),
            free: locker.free_list.len(),
            pooled: locker.pool.len(),
            missed: locker.index.missed(),
            capacity: locker.capacity,
        }
    }

    /// Usage state of the key.
    pub fn key_state(&self, key: &CacheKey<T>) -> KeyState {
        let locker = self.inner.lock();
        match locker.index.slot(key) {
            Slot::Absent => KeyState::Absent,
            Slot::Missed => KeyState::Missed,
            Slot::Present(token) => KeyState::Present {
                usage: locker.elements.get(token).map(|e| e.usage()).unwrap_or_default(),
            },
        }
    }

    /// Human readable listing of all elements and missed keys, for diagnostics only.
    pub fn dump(&self) -> String {
        let locker = self.inner.lock();
        Dump {
            name: &self.inner.name,
            state: &*locker,
        }
        .to_string()
    }

    /// Check the reference count, key and free list invariants.
    ///
    /// # Panics
    ///
    /// Panics if any invariant is violated.
    #[cfg(any(test, feature = "test_utils"))]
    pub fn debug_validate_invariants(&self) {
        use std::collections::HashSet;

        let locker = self.inner.lock();

        let free = locker.free_list.iter().collect::<HashSet<_>>();
        assert_eq!(free.len(), locker.free_list.len(), "element linked twice in the free list");

        let mut keys = 0;
        for (token, element) in locker.elements.iter() {
            assert!(element.object().is_some(), "{token} has no object");
            assert!(!element.keys().is_empty(), "{token} has no key");
            assert_eq!(
                element.usage() == 0,
                element.free_token().is_some(),
                "{token} usage {} does not match free list membership",
                element.usage()
            );
            assert_eq!(element.usage() == 0, free.contains(&token), "{token} free list mismatch");
            for key in element.keys().to_vec() {
                assert_eq!(locker.index.get(&key), Some(token), "{key} does not resolve to {token}");
            }
            keys += element.keys().to_vec().len();
        }

        for token in free.iter() {
            assert!(locker.elements.contains(*token), "free list holds removed element {token}");
        }

        let entries = locker.index.entries();
        assert_eq!(entries.len(), keys, "index holds keys of removed elements");
        for (key, token) in entries {
            let element = locker.elements.get(token).unwrap_or_else(|| panic!("{key} points to removed {token}"));
            assert!(element.keys().contains(&key), "{key} is not derived from {token}");
        }

        for key in locker.index.missed_keys() {
            assert_eq!(locker.index.slot(&key), Slot::Missed, "{key} is both present and missed");
        }

        assert!(
            locker.elements.len() <= locker.capacity || locker.free_list.is_empty(),
            "free elements beyond capacity: elements {}, free {}, capacity {}",
            locker.elements.len(),
            locker.free_list.len(),
            locker.capacity
        );
    }
}
