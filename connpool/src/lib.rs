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

//! Lightweight pool of reusable connections
//!
//! [ConnectionPool] hands out an idle connection if it has one and creates a new one with its
//! factory otherwise. Connections are given back with [ConnectionPool::release()].
//!
//! Idle connections are kept in an unordered cache with a small lock free hot queue, so
//! connections that are reused and released very frequently do not contend on a lock. Any idle
//! connection may be dropped at any time, by the idle bound or by the background [Pruner].
//! The pool never closes connections itself.

#![warn(clippy::all)]
#![allow(clippy::type_complexity)]

mod conf;
mod idle;
mod pool;
mod prune;
pub mod tcp;

pub use conf::PoolConf;
pub use pool::{ConnectionPool, Factory};
pub use prune::Pruner;
