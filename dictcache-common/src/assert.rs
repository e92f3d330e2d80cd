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

//! Assertions on cache invariants that can outlive debug builds.
//!
//! The `strict_assertions` feature is checked in the crate that expands the macro, so every crate using them
//! declares its own `strict_assertions` feature and forwards it here.

/// Assert an invariant in debug builds, or in every build with the "strict_assertions" feature.
///
/// ```
/// # use dictcache_common::strict_assert;
/// let usage = 1;
/// strict_assert!(usage > 0, "element in use has no usage");
/// ```
#[macro_export]
macro_rules! strict_assert {
    ($($arg:tt)*) => {
        if cfg!(feature = "strict_assertions") {
            assert!($($arg)*);
        } else {
            debug_assert!($($arg)*);
        }
    };
}

/// Equality form of [`strict_assert!`].
#[macro_export]
macro_rules! strict_assert_eq {
    ($($arg:tt)*) => {
        if cfg!(feature = "strict_assertions") {
            assert_eq!($($arg)*);
        } else {
            debug_assert_eq!($($arg)*);
        }
    };
}
