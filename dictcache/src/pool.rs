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

use dictcache_common::strict_assert;

use crate::element::{CacheElement, Keyed};

/// Bounded store of detached element wrappers for reuse.
///
/// Wrappers released beyond the capacity are dropped.
pub(crate) struct ElementPool<T: Keyed> {
    wrappers: Vec<CacheElement<T>>,
    capacity: usize,
}

impl<T: Keyed> ElementPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            wrappers: Vec::new(),
            capacity,
        }
    }

    /// Take a pooled wrapper, or create a new one if the pool is empty.
    pub fn acquire(&mut self) -> CacheElement<T> {
        self.wrappers.pop().unwrap_or_default()
    }

    /// Return a detached wrapper to the pool. Returns `false` if it was dropped instead.
    pub fn release(&mut self, element: CacheElement<T>) -> bool {
        strict_assert!(element.object().is_none() && element.usage() == 0 && element.keys().is_empty());
        if self.wrappers.len() >= self.capacity || self.wrappers.try_reserve(1).is_err() {
            return false;
        }
        self.wrappers.push(element);
        true
    }

    pub fn len(&self) -> usize {
        self.wrappers.len()
    }

    pub fn clear(&mut self) {
        self.wrappers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestObject;

    fn case(capacity: usize) {
        let mut pool = ElementPool::<TestObject>::new(capacity);

        for _ in 0..capacity * 2 {
            pool.release(CacheElement::new());
        }
        assert_eq!(pool.len(), capacity);

        for _ in 0..capacity * 2 {
            let element = pool.acquire();
            assert!(element.object().is_none());
        }
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_element_pool() {
        case(16);
    }

    #[test]
    fn test_element_pool_zero() {
        case(0);
    }

    #[test]
    fn test_element_pool_clear() {
        let mut pool = ElementPool::<TestObject>::new(4);
        assert!(pool.release(CacheElement::new()));
        pool.clear();
        assert_eq!(pool.len(), 0);
    }
}
