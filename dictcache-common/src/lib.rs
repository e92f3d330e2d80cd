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

//! Shared components and utils for dictcache.

pub mod assert;
/// The bound of lookup keys.
pub mod code;
/// Error and result types.
pub mod error;
/// Reasons and listeners for objects leaving the cache.
pub mod event;
/// Metrics model and registries.
pub mod metrics;
/// Token addressed arena and the linked list built on it.
pub mod slab;
