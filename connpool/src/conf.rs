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

//! Pool configurations
//!
//! The configuration controls how aggressively idle connections are dropped:
//! * the upper bound of the idle cache
//! * the period and the batch size of the background pruning pass

use log::{debug, trace};
use pingora_error::{Error, ErrorType::*, OrErr, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// The configuration of a [ConnectionPool](crate::ConnectionPool)
///
/// By default YAML is used. Unknown keys are ignored so the pool section can be embedded in a
/// larger configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConf {
    /// The maximum number of idle connections to keep. `None` means unbounded.
    ///
    /// When a release would exceed the bound, an arbitrary idle connection is dropped.
    pub idle_capacity: Option<usize>,
    /// How often, in milliseconds, the background pruner drops idle connections.
    /// `None` disables the pruner.
    pub prune_interval_ms: Option<u64>,
    /// The maximum number of idle connections dropped by one pruning pass.
    pub prune_batch: usize,
}

impl Default for PoolConf {
    fn default() -> Self {
        PoolConf {
            idle_capacity: None,
            prune_interval_ms: None,
            prune_batch: 1,
        }
    }
}

impl PoolConf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: PoolConf = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        trace!("Loaded conf: {conf:?}");
        conf.validate()
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).or_err(InternalError, "Unable to serialize conf to yaml")
    }

    pub fn validate(self) -> Result<Self> {
        if self.idle_capacity == Some(0) {
            return Error::e_explain(
                InternalError,
                "idle_capacity must be positive, leave it unset for an unbounded pool",
            );
        }
        if self.prune_interval_ms == Some(0) {
            return Error::e_explain(
                InternalError,
                "prune_interval_ms must be positive, leave it unset to disable pruning",
            );
        }
        if self.prune_interval_ms.is_some() && self.prune_batch == 0 {
            return Error::e_explain(InternalError, "prune_batch must be positive");
        }
        Ok(self)
    }

    /// The pruning period, if pruning is enabled
    pub fn prune_interval(&self) -> Option<Duration> {
        self.prune_interval_ms.map(Duration::from_millis)
    }
}
