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

/// Reason for an object leaving the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Evicted from the free list by capacity pressure.
    Evict,
    /// Dropped explicitly.
    Remove,
    /// Superseded by a new object of the same element.
    Replace,
    /// Discarded because an equivalent object was inserted concurrently.
    Duplicate,
    /// Rejected by a protocol check.
    Reject,
    /// Still referenced at shutdown and detached from the cache.
    Leak,
    /// Cleared when the cache is dropped.
    Clear,
}

/// Trait for the customized event listener.
///
/// The listener is the deferred deleter of the cache: it is always called after the cache lock is released, so it
/// may call back into the cache or take other locks.
pub trait EventListener: Send + Sync + 'static {
    /// Associated object type.
    type Object;

    /// Called when an object leaves the cache with the reason.
    #[expect(unused_variables)]
    fn on_leave(&self, reason: Event, object: &Self::Object) {}
}
