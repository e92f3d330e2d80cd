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
    error::{Error, Result},
    slab::{slab_linked_list::SlabLinkedList, Token},
};

/// LRU ordered list of unused elements, addressed by their slab tokens.
///
/// The least recently released element is at the head. Pushing returns a link token that the element keeps to be
/// unlinked in O(1) when it is used again.
#[derive(Default)]
pub(crate) struct FreeList {
    list: SlabLinkedList<Token>,

    #[cfg(test)]
    pub fail_reserve: bool,
}

impl FreeList {
    /// Make sure the next push does not allocate.
    pub fn try_reserve(&mut self) -> Result<()> {
        #[cfg(test)]
        if self.fail_reserve {
            return Err(Error::resource_exhausted("free list", "injected allocation failure"));
        }
        self.list
            .try_reserve(1)
            .map_err(|e| Error::resource_exhausted("free list", e))
    }

    /// Append the element at the most recently used end.
    pub fn push(&mut self, element: Token) -> Token {
        self.list.push_back(element)
    }

    /// Unlink the element by its link token.
    pub fn remove(&mut self, link: Token) -> Option<Token> {
        self.list.remove(link)
    }

    /// Take the least recently used element.
    pub fn pop_lru(&mut self) -> Option<Token> {
        self.list.pop_front()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Elements from the least to the most recently used.
    pub fn iter(&self) -> impl Iterator<Item = Token> + '_ {
        self.list.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use dictcache_common::slab::Slab;
    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_lru_order() {
        let mut slab = Slab::new();
        let tokens = (0..4).map(|i| slab.insert(i)).collect_vec();

        let mut list = FreeList::default();
        let links = tokens
            .iter()
            .map(|t| {
                list.try_reserve().unwrap();
                list.push(*t)
            })
            .collect_vec();
        assert_eq!(list.len(), 4);

        // Used again, then released again: moves to the tail.
        assert_eq!(list.remove(links[1]), Some(tokens[1]));
        list.push(tokens[1]);
        assert_eq!(list.iter().collect_vec(), vec![tokens[0], tokens[2], tokens[3], tokens[1]]);

        assert_eq!(list.pop_lru(), Some(tokens[0]));
        assert_eq!(list.pop_lru(), Some(tokens[2]));
        assert_eq!(list.pop_lru(), Some(tokens[3]));
        assert_eq!(list.pop_lru(), Some(tokens[1]));
        assert_eq!(list.pop_lru(), None);
        assert!(list.is_empty());
    }
}
