// Copyright 2024 Cloudflare, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The unordered store of idle connections

use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Key of an item in the overflow table, handed out when the item spills over.
pub(crate) type SlotId = u64;

// Keep the queue small, the overflow table takes the rest
const HOT_QUEUE_SIZE: usize = 16;

/// An unordered, thread safe bag of idle items.
///
/// Recently released items land in a small lock free queue, the rest overflow into a
/// mutex protected table. No ordering is kept between the two.
pub(crate) struct IdleCache<T> {
    cold: Mutex<HashMap<SlotId, T>>,
    hot_queue: ArrayQueue<T>,
    next_id: AtomicU64,
    // incremented before an item becomes visible, decremented after it is taken out
    len: AtomicUsize,
}

impl<T> IdleCache<T> {
    pub fn new() -> Self {
        IdleCache {
            cold: Mutex::new(HashMap::new()),
            hot_queue: ArrayQueue::new(HOT_QUEUE_SIZE),
            next_id: AtomicU64::new(0),
            len: AtomicUsize::new(0),
        }
    }

    /// Take any item out of the cache
    pub fn take_any(&self) -> Option<T> {
        if let Some(item) = self.hot_queue.pop() {
            self.len.fetch_sub(1, Ordering::Relaxed);
            return Some(item);
        }
        self.take_cold()
    }

    /// Take an item, preferring the ones that overflowed into the table
    ///
    /// The table holds whatever did not fit in the hot queue, so these are likely the ones
    /// idle for the longest time.
    pub fn take_cold(&self) -> Option<T> {
        let taken = {
            let mut cold = self.cold.lock();
            // any id will do
            let id = *cold.keys().next()?;
            cold.remove(&id)
        }; // cold.lock released here

        if taken.is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
            return taken;
        }
        None
    }

    /// Take an item for eviction: the table first, then the hot queue
    pub fn evict_one(&self) -> Option<T> {
        self.take_cold().or_else(|| {
            let item = self.hot_queue.pop()?;
            self.len.fetch_sub(1, Ordering::Relaxed);
            Some(item)
        })
    }

    /// Insert an item, returning the number of idle items right after the insertion
    pub fn insert(&self, item: T) -> usize {
        let len = self.len.fetch_add(1, Ordering::Relaxed) + 1;
        if let Err(item) = self.hot_queue.push(item) {
            // hot queue is full
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.cold.lock().insert(id, item);
        }
        len
    }

    /// Approximate number of idle items
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_take_any() {
        let cache = IdleCache::new();
        cache.insert("v1".to_string());
        cache.insert("v2".to_string());
        cache.insert("v3".to_string());
        assert_eq!(cache.len(), 3);

        let mut found = HashSet::new();
        while let Some(v) = cache.take_any() {
            found.insert(v);
        }
        assert_eq!(found.len(), 3);
        assert!(found.contains("v1") && found.contains("v2") && found.contains("v3"));
        assert_eq!(cache.len(), 0);
        assert!(cache.take_any().is_none());
    }

    #[test]
    fn test_overflow() {
        let cache = IdleCache::new();
        for i in 0..HOT_QUEUE_SIZE + 4 {
            assert_eq!(cache.insert(i), i + 1);
        }
        assert_eq!(cache.cold.lock().len(), 4);
        // only the items that spilled over got a table key
        assert_eq!(cache.next_id.load(Ordering::Relaxed), 4);

        let mut taken = Vec::new();
        while let Some(v) = cache.take_any() {
            taken.push(v);
        }
        taken.sort_unstable();
        assert_eq!(taken, (0..HOT_QUEUE_SIZE + 4).collect::<Vec<_>>());
    }

    #[test]
    fn test_evict_prefers_cold() {
        let cache = IdleCache::new();
        for i in 0..HOT_QUEUE_SIZE + 1 {
            cache.insert(i);
        }
        // the one that did not fit in the hot queue
        assert_eq!(cache.evict_one(), Some(HOT_QUEUE_SIZE));
        // then the hot queue, oldest first
        assert_eq!(cache.evict_one(), Some(0));
        assert_eq!(cache.len(), HOT_QUEUE_SIZE - 1);
    }

    #[test]
    fn test_concurrent_insert_take() {
        let cache = Arc::new(IdleCache::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    let mut taken = Vec::new();
                    for i in 0..100 {
                        cache.insert(t * 100 + i);
                        if let Some(v) = cache.take_any() {
                            taken.push(v);
                        }
                    }
                    taken
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for t in threads {
            for v in t.join().unwrap() {
                // no item is ever handed out twice
                assert!(seen.insert(v));
            }
        }
        while let Some(v) = cache.take_any() {
            assert!(seen.insert(v));
        }
        assert_eq!(seen.len(), 800);
        assert_eq!(cache.len(), 0);
    }
}
