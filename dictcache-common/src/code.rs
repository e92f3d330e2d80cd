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

use std::{fmt::Debug, hash::Hash};

/// Key trait for a single lookup dimension of a cached object.
///
/// Keys are cloned into the index and into the cache element that owns them, so they should be cheap to clone or
/// at least cheap relative to loading the object they identify.
pub trait Key: Send + Sync + 'static + Hash + Eq + Clone + Debug {}
impl<T: Send + Sync + 'static + Hash + Eq + Clone + Debug> Key for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_key<K: Key>() {}

    #[test]
    fn test_common_key_types() {
        is_key::<u64>();
        is_key::<String>();
        is_key::<(u64, String)>();
        is_key::<()>();
    }
}
