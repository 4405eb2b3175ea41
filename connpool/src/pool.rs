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

//! Connection pool with fetch-or-create semantics

use log::debug;
use std::sync::Arc;
use std::time::Duration;

use crate::conf::PoolConf;
use crate::idle::IdleCache;
use crate::prune::Pruner;

/// The function a [ConnectionPool] calls to create a connection when no idle one is available
pub type Factory<C, E> = Box<dyn Fn() -> Result<C, E> + Send + Sync>;

/// Connection pool
///
/// [ConnectionPool] caches idle connections released to it and hands them out again on
/// [Self::acquire()]. When there is none, a new connection is made with the factory.
///
/// Any idle connection may be dropped from the pool at any time without notification, either
/// because the idle bound is reached or by a pruning pass. The pool never closes a connection
/// itself: a dropped connection is closed by its own `Drop`.
///
/// The pool is safe to share between threads and tasks, usually behind an [Arc].
pub struct ConnectionPool<C, E> {
    factory: Option<Factory<C, E>>,
    idle: IdleCache<C>,
    idle_capacity: Option<usize>,
    // (interval, batch)
    prune: Option<(Duration, usize)>,
}

impl<C, E> ConnectionPool<C, E> {
    /// Create a new [ConnectionPool] with no idle bound and no pruning.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<C, E> + Send + Sync + 'static,
    {
        Self::with_conf(factory, &PoolConf::default())
    }

    /// Create a new [ConnectionPool] whose idle bound and pruning follow the given [PoolConf].
    pub fn with_conf<F>(factory: F, conf: &PoolConf) -> Self
    where
        F: Fn() -> Result<C, E> + Send + Sync + 'static,
    {
        let mut pool = Self::without_factory();
        pool.factory = Some(Box::new(factory));
        pool.idle_capacity = conf.idle_capacity;
        pool.prune = conf.prune_interval().map(|i| (i, conf.prune_batch));
        pool
    }

    /// Create a [ConnectionPool] without a factory.
    ///
    /// Such a pool is misconfigured: [Self::acquire()] on it panics.
    pub fn without_factory() -> Self {
        ConnectionPool {
            factory: None,
            idle: IdleCache::new(),
            idle_capacity: None,
            prune: None,
        }
    }

    /// Get an idle connection, or create one with the factory if there is none.
    ///
    /// The error of the factory is returned as is.
    ///
    /// # Panics
    /// If the pool has no factory.
    pub fn acquire(&self) -> Result<C, E> {
        let Some(factory) = self.factory.as_ref() else {
            panic!("ConnectionPool::acquire called without a factory");
        };
        if let Some(connection) = self.idle.take_any() {
            return Ok(connection);
        }
        factory()
    }

    /// Release a connection to this pool for reuse.
    ///
    /// The connection is not checked. It is the caller's responsibility to only release
    /// connections that are still usable.
    pub fn release(&self, connection: C) {
        let len = self.idle.insert(connection);
        if let Some(capacity) = self.idle_capacity {
            if len > capacity {
                // a concurrent taker may have made room already
                let evicted = self.prune(len - capacity);
                if evicted > 0 {
                    debug!("idle bound {capacity} reached, dropped {evicted} idle connection(s)");
                }
            }
        }
    }

    /// Drop up to `max` arbitrary idle connections. Returns how many were dropped.
    pub fn prune(&self, max: usize) -> usize {
        let mut dropped = 0;
        while dropped < max {
            match self.idle.evict_one() {
                // not closed here, dropping it is all the pool does
                Some(connection) => drop(connection),
                None => break,
            }
            dropped += 1;
        }
        dropped
    }

    /// The approximate number of idle connections
    pub fn idle_len(&self) -> usize {
        self.idle.len()
    }

    /// The configured idle bound, if any
    pub fn idle_capacity(&self) -> Option<usize> {
        self.idle_capacity
    }

    /// Create the background [Pruner] of this pool, if pruning is configured.
    pub fn pruner(self: &Arc<Self>) -> Option<Pruner<C, E>> {
        self.prune
            .map(|(interval, batch)| Pruner::new(Arc::downgrade(self), interval, batch))
    }

    /// Spawn the background [Pruner] on the current tokio runtime, if pruning is configured.
    ///
    /// The task exits on its own once the pool is dropped.
    ///
    /// # Panics
    /// If called outside of a tokio runtime.
    pub fn spawn_pruner(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>>
    where
        C: Send + 'static,
        E: 'static,
    {
        self.pruner().map(|p| tokio::spawn(p.run()))
    }
}

impl<C, E> Default for ConnectionPool<C, E> {
    fn default() -> Self {
        Self::without_factory()
    }
}
