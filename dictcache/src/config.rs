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

use std::{sync::Arc, time::Duration};

use dictcache_common::{
    error::{Error, ErrorKind, Result},
    event::EventListener,
    metrics::{model::Metrics, registry::noop::NoopMetricsRegistry, BoxedRegistry, RegistryOps},
};
use serde::{Deserialize, Serialize};

use crate::{element::Keyed, map::SharedMultiMap};

/// Configuration of a shared multi-map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the map, used in logs and as the metrics label.
    pub name: String,
    /// Maximum element count before unused elements are evicted.
    pub capacity: usize,
    /// Maximum count of detached element wrappers kept for reuse.
    pub pool_capacity: usize,
    /// Bound of a wait for a missed key loaded by another thread. Waits forever if not set.
    pub miss_wait_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "dictcache".to_string(),
            capacity: 1024,
            pool_capacity: 256,
            miss_wait_timeout: None,
        }
    }
}

impl CacheConfig {
    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::new(ErrorKind::Config, "map name must not be empty"));
        }
        if self.miss_wait_timeout == Some(Duration::ZERO) {
            return Err(Error::new(ErrorKind::Config, "miss wait timeout must be positive").with_context("map", &self.name));
        }
        Ok(())
    }
}

/// Builder of [`SharedMultiMap`].
pub struct SharedMultiMapBuilder<T: Keyed> {
    config: CacheConfig,
    event_listener: Option<Arc<dyn EventListener<Object = T>>>,
    registry: BoxedRegistry,
}

impl<T: Keyed> SharedMultiMapBuilder<T> {
    /// Create a builder of a map with the given capacity and default configuration.
    pub fn new(capacity: usize) -> Self {
        Self::from_config(CacheConfig {
            capacity,
            ..Default::default()
        })
    }

    /// Create a builder from a configuration.
    pub fn from_config(config: CacheConfig) -> Self {
        Self {
            config,
            event_listener: None,
            registry: Box::new(NoopMetricsRegistry),
        }
    }

    /// Set the name of the map.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the capacity of the element wrapper pool.
    pub fn with_pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.config.pool_capacity = pool_capacity;
        self
    }

    /// Bound the wait for a missed key loaded by another thread.
    pub fn with_miss_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.miss_wait_timeout = Some(timeout);
        self
    }

    /// Set the listener called, out of the map lock, for every object leaving the map.
    pub fn with_event_listener(mut self, event_listener: impl EventListener<Object = T>) -> Self {
        let event_listener: Arc<dyn EventListener<Object = T>> = Arc::new(event_listener);
        self.event_listener = Some(event_listener);
        self
    }

    /// Set the registry the map metrics are registered in.
    pub fn with_metrics_registry(mut self, registry: impl RegistryOps) -> Self {
        self.registry = Box::new(registry);
        self
    }

    /// Validate the configuration and build the map.
    pub fn build(self) -> Result<SharedMultiMap<T>> {
        self.config.validate()?;
        let metrics = Arc::new(Metrics::new(self.config.name.clone(), &*self.registry));
        Ok(SharedMultiMap::new(self.config, self.event_listener, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestObject;

    #[test]
    fn test_config_defaults() {
        let config: CacheConfig = serde_json::from_str(r#"{"name": "tables", "capacity": 16}"#).unwrap();
        assert_eq!(config.name, "tables");
        assert_eq!(config.capacity, 16);
        assert_eq!(config.pool_capacity, 256);
        assert_eq!(config.miss_wait_timeout, None);

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<CacheConfig>(&json).unwrap(), config);
    }

    #[test]
    fn test_config_validate() {
        assert!(CacheConfig::default().validate().is_ok());

        let e = SharedMultiMapBuilder::<TestObject>::new(8)
            .with_miss_wait_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);

        let e = SharedMultiMapBuilder::<TestObject>::new(8).with_name("").build().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_builder() {
        let map = SharedMultiMapBuilder::<TestObject>::new(8)
            .with_name("schemas")
            .with_pool_capacity(2)
            .with_miss_wait_timeout(Duration::from_secs(1))
            .with_metrics_registry(NoopMetricsRegistry)
            .build()
            .unwrap();
        assert_eq!(map.name(), "schemas");
        assert_eq!(map.capacity(), 8);
    }
}
