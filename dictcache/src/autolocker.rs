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
    ops::{Deref, DerefMut},
    sync::Arc,
    time::Instant,
};

use dictcache_common::event::{Event, EventListener};
use parking_lot::{Condvar, MutexGuard};

/// Scoped lock of a shared multi-map.
///
/// Besides guarding the state, the locker collects the side effects that must not run inside the critical section:
/// objects leaving the cache and the broadcast of handled misses. They are performed on drop, in this order:
///
/// 1. the lock is released,
/// 2. waiters are woken if any miss was handled,
/// 3. the event listener is called for every collected object, then the objects are dropped.
pub(crate) struct Autolocker<'a, S, T: 'static> {
    guard: Option<MutexGuard<'a, S>>,
    condvar: &'a Condvar,
    listener: Option<&'a dyn EventListener<Object = T>>,
    garbages: Vec<(Event, Arc<T>)>,
    notify: bool,
}

impl<'a, S, T: 'static> Autolocker<'a, S, T> {
    pub fn new(
        guard: MutexGuard<'a, S>,
        condvar: &'a Condvar,
        listener: Option<&'a dyn EventListener<Object = T>>,
    ) -> Self {
        Self {
            guard: Some(guard),
            condvar,
            listener,
            garbages: vec![],
            notify: false,
        }
    }

    /// Schedule the object for deletion after the lock is released.
    pub fn auto_delete(&mut self, reason: Event, object: Arc<T>) {
        self.garbages.push((reason, object));
    }

    /// Wake all waiters after the lock is released.
    pub fn notify_all(&mut self) {
        self.notify = true;
    }

    /// Block until woken by a broadcast. Pending broadcasts are sent before blocking.
    pub fn wait(&mut self) {
        self.flush_notify();
        if let Some(guard) = self.guard.as_mut() {
            self.condvar.wait(guard);
        }
    }

    /// Block until woken by a broadcast or until the deadline. Returns `true` if the deadline passed.
    pub fn wait_until(&mut self, deadline: Instant) -> bool {
        self.flush_notify();
        match self.guard.as_mut() {
            Some(guard) => self.condvar.wait_until(guard, deadline).timed_out(),
            None => true,
        }
    }

    fn flush_notify(&mut self) {
        if std::mem::take(&mut self.notify) {
            self.condvar.notify_all();
        }
    }
}

impl<S, T: 'static> Deref for Autolocker<'_, S, T> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        self.guard.as_deref().expect("autolocker is unlocked")
    }
}

impl<S, T: 'static> DerefMut for Autolocker<'_, S, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.as_deref_mut().expect("autolocker is unlocked")
    }
}

impl<S, T: 'static> Drop for Autolocker<'_, S, T> {
    fn drop(&mut self) {
        drop(self.guard.take());

        if self.notify {
            self.condvar.notify_all();
        }

        // Do not deallocate data within the lock section.
        for (reason, object) in self.garbages.drain(..) {
            if let Some(listener) = self.listener {
                listener.on_leave(reason, &object);
            }
            drop(object);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use parking_lot::Mutex;

    use super::*;

    struct Probe {
        lock: Arc<Mutex<usize>>,
        locked_on_leave: AtomicUsize,
        left: AtomicUsize,
    }

    impl EventListener for Probe {
        type Object = usize;

        fn on_leave(&self, reason: Event, object: &usize) {
            assert_eq!(reason, Event::Evict);
            assert_eq!(*object, 42);
            if self.lock.is_locked() {
                self.locked_on_leave.fetch_add(1, Ordering::SeqCst);
            }
            self.left.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_deferred_delete_after_unlock() {
        let lock = Arc::new(Mutex::new(0usize));
        let condvar = Condvar::new();
        let probe = Probe {
            lock: lock.clone(),
            locked_on_leave: AtomicUsize::new(0),
            left: AtomicUsize::new(0),
        };

        let object = Arc::new(42usize);
        {
            let mut locker = Autolocker::new(lock.lock(), &condvar, Some(&probe as &dyn EventListener<Object = usize>));
            *locker += 1;
            locker.auto_delete(Event::Evict, object.clone());
            assert_eq!(Arc::strong_count(&object), 2);
            assert_eq!(probe.left.load(Ordering::SeqCst), 0);
        }
        assert_eq!(Arc::strong_count(&object), 1);
        assert_eq!(probe.left.load(Ordering::SeqCst), 1);
        assert_eq!(probe.locked_on_leave.load(Ordering::SeqCst), 0);
        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    fn test_broadcast_after_unlock() {
        let lock = Arc::new(Mutex::new(false));
        let condvar = Arc::new(Condvar::new());

        let handle = {
            let lock = lock.clone();
            let condvar = condvar.clone();
            std::thread::spawn(move || {
                let mut locker: Autolocker<'_, bool, ()> = Autolocker::new(lock.lock(), &condvar, None);
                while !*locker {
                    locker.wait();
                }
            })
        };

        std::thread::sleep(Duration::from_millis(10));
        {
            let mut locker: Autolocker<'_, bool, ()> = Autolocker::new(lock.lock(), &condvar, None);
            *locker = true;
            locker.notify_all();
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_until_deadline() {
        let lock = Mutex::new(());
        let condvar = Condvar::new();
        let mut locker: Autolocker<'_, (), ()> = Autolocker::new(lock.lock(), &condvar, None);
        assert!(locker.wait_until(Instant::now() + Duration::from_millis(5)));
    }
}
