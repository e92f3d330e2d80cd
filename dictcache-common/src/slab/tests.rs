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

use super::*;

#[test]
fn test_slab_reuse_slots() {
    let mut slab = Slab::new();
    let t1 = slab.insert("schema");
    let t2 = slab.insert("table");
    let t3 = slab.insert("collation");
    assert_eq!(slab.len(), 3);

    assert_eq!(slab.remove(t2), Some("table"));
    assert_eq!(slab.remove(t2), None);
    assert!(!slab.contains(t2));

    // The vacant slot is reused first.
    let t4 = slab.insert("tablespace");
    assert_eq!(t4.index(), t2.index());
    assert_eq!(slab.get(t1), Some(&"schema"));
    assert_eq!(slab.get(t3), Some(&"collation"));
    assert_eq!(slab.get(t4), Some(&"tablespace"));
    assert_eq!(slab.len(), 3);
}

#[test]
fn test_slab_iter_skips_vacant() {
    let mut slab = Slab::new();
    let tokens = (0..4).map(|i| slab.insert(i)).collect::<Vec<_>>();
    slab.remove(tokens[1]);
    slab.remove(tokens[3]);

    let live = slab.iter().map(|(t, v)| (t, *v)).collect::<Vec<_>>();
    assert_eq!(live, vec![(tokens[0], 0), (tokens[2], 2)]);
    assert_eq!(slab.tokens(), vec![tokens[0], tokens[2]]);
}

#[test]
fn test_slab_get_mut() {
    let mut slab = Slab::new();
    let t = slab.insert(1u64);
    *slab.get_mut(t).unwrap() += 41;
    assert_eq!(slab.get(t), Some(&42));
}

#[test]
fn test_slab_try_reserve() {
    let mut slab: Slab<u64> = Slab::new();
    slab.try_reserve(16).unwrap();
    let t = slab.insert(1);
    slab.remove(t);
    // One vacant slot is already available.
    slab.try_reserve(1).unwrap();
    assert!(slab.try_reserve(usize::MAX).is_err());
}
