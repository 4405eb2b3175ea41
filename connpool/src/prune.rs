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

//! Best effort background pruning of idle connections

use log::debug;
use pingora_timeout::sleep;
use std::sync::Weak;
use std::time::Duration;

use crate::pool::ConnectionPool;

/// Periodically drops a few idle connections of a [ConnectionPool]
///
/// The pruner only holds a weak reference: it does not keep the pool alive and exits once the
/// pool is gone.
pub struct Pruner<C, E> {
    pool: Weak<ConnectionPool<C, E>>,
    interval: Duration,
    batch: usize,
}

impl<C, E> Pruner<C, E> {
    /// Create a [Pruner] that drops up to `batch` idle connections every `interval`
    pub fn new(pool: Weak<ConnectionPool<C, E>>, interval: Duration, batch: usize) -> Self {
        Pruner {
            pool,
            interval,
            batch,
        }
    }

    /// Run one pruning pass. Returns `None` when the pool is already dropped.
    pub fn prune_once(&self) -> Option<usize> {
        let pool = self.pool.upgrade()?;
        let dropped = pool.prune(self.batch);
        if dropped > 0 {
            debug!("pruned {dropped} idle connection(s)");
        }
        Some(dropped)
    }

    /// Prune forever until the pool is dropped
    pub async fn run(self) {
        loop {
            sleep(self.interval).await;
            if self.prune_once().is_none() {
                debug!("connection pool dropped, pruner exits");
                return;
            }
        }
    }
}
