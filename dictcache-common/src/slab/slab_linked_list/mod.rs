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

use std::collections::TryReserveError;

use super::{Slab, Token};

/// Doubly linked list with O(1) push at the tail, pop at the head and removal by token.
///
/// Nodes are stored in a [`Slab`], the returned [`Token`] is the handle to unlink the node later.
pub struct SlabLinkedList<T> {
    slab: Slab<SlabLinkedListNode<T>>,
    head: Option<Token>,
    tail: Option<Token>,
}

impl<T> Default for SlabLinkedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct SlabLinkedListNode<T> {
    val: T,

    prev: Option<Token>,
    next: Option<Token>,
}

impl<T> SlabLinkedList<T> {
    /// Create an empty list.
    pub const fn new() -> Self {
        Self {
            slab: Slab::new(),
            head: None,
            tail: None,
        }
    }

    /// Make sure the next `additional` pushes do not allocate.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.slab.try_reserve(additional)
    }

    /// Link a value at the tail.
    pub fn push_back(&mut self, val: T) -> Token {
        let token = self.slab.insert(SlabLinkedListNode {
            val,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.node_mut(tail).next = Some(token),
            None => self.head = Some(token),
        }
        self.tail = Some(token);
        token
    }

    /// Unlink the value at the head.
    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        self.remove(head)
    }

    /// Unlink the node addressed by the token.
    ///
    /// Returns `None` if the token does not address a linked node.
    pub fn remove(&mut self, token: Token) -> Option<T> {
        let node = self.slab.remove(token)?;

        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }

        Some(node.val)
    }

    /// Iterate values from head to tail.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            token: self.head,
            list: self,
        }
    }

    /// Number of linked nodes.
    pub fn len(&self) -> usize {
        self.slab.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn node_mut(&mut self, token: Token) -> &mut SlabLinkedListNode<T> {
        match self.slab.get_mut(token) {
            Some(node) => node,
            None => unreachable!("linked token {token} must address a live node"),
        }
    }
}

/// Iterator from head to tail.
pub struct Iter<'a, T: 'a> {
    token: Option<Token>,
    list: &'a SlabLinkedList<T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.slab.get(self.token?)?;
        self.token = node.next;
        Some(&node.val)
    }
}
