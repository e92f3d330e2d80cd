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

#![cfg_attr(docsrs, feature(doc_cfg))]

//! A shared multi-key reference-counted cache of dictionary objects.
//!
//! Each cached object can be looked up by up to three independent keys (id, name and an auxiliary key). Lookups
//! hand out reference-counted handles; objects no longer referenced stay cached in an LRU free list until capacity
//! pressure evicts them. Concurrent misses of the same key are coordinated so that exactly one caller loads the
//! object from the backing storage while the others wait for the result.
//!
//! ```
//! use std::sync::Arc;
//!
//! use dictcache::prelude::*;
//!
//! struct Schema {
//!     id: u64,
//!     name: String,
//! }
//!
//! impl Keyed for Schema {
//!     type IdKey = u64;
//!     type NameKey = String;
//!     type AuxKey = ();
//!
//!     fn id_key(&self) -> Option<u64> {
//!         Some(self.id)
//!     }
//!
//!     fn name_key(&self) -> Option<String> {
//!         Some(self.name.clone())
//!     }
//! }
//!
//! let schemas = SharedMultiMap::<Schema>::builder(64).with_name("schemas").build().unwrap();
//!
//! let key = CacheKey::Name("sales".to_string());
//! let entry = match schemas.get(&key).unwrap() {
//!     Lookup::Hit(entry) => entry,
//!     Lookup::Miss(ticket) => ticket
//!         .fulfil(Arc::new(Schema {
//!             id: 1,
//!             name: "sales".to_string(),
//!         }))
//!         .unwrap(),
//! };
//! assert_eq!(entry.id, 1);
//! drop(entry);
//!
//! assert!(schemas.get(&CacheKey::Id(1)).unwrap().is_hit());
//! ```

mod autolocker;
/// Cache configuration and the map builder.
pub mod config;
/// Cached object capability, keys and the element wrapper.
pub mod element;
mod free_list;
mod index;
/// The `Loader` capability and the load-through lookup.
pub mod loader;
/// The shared multi-map and its handles.
pub mod map;
mod pool;
/// Re-exports of the commonly used types.
pub mod prelude;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
