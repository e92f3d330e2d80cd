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

use std::borrow::Cow;

use super::{BoxedCounter, BoxedGauge, RegistryOps};

/// Metrics of one shared multi-map.
///
/// All maps share the metric vectors; the `name` label tells them apart.
#[derive(Debug)]
pub struct Metrics {
    /// Lookups served from the index.
    pub hit: BoxedCounter,
    /// Lookups that made the caller responsible for loading.
    pub miss: BoxedCounter,
    /// Lookups that blocked on a miss resolved by another thread.
    pub wait: BoxedCounter,
    /// New elements registered in the index.
    pub insert: BoxedCounter,
    /// Objects discarded in favor of an equivalent element inserted concurrently.
    pub duplicate: BoxedCounter,
    /// Objects rejected by a protocol check.
    pub reject: BoxedCounter,
    /// Elements evicted from the free list.
    pub evict: BoxedCounter,
    /// Elements dropped explicitly.
    pub remove: BoxedCounter,
    /// Objects replaced in place.
    pub replace: BoxedCounter,
    /// Elements whose last reference was released.
    pub release: BoxedCounter,
    /// Elements still referenced at shutdown.
    pub leak: BoxedCounter,

    /// Elements registered in the index.
    pub elements: BoxedGauge,
    /// Elements in the free list.
    pub free: BoxedGauge,
}

impl Metrics {
    /// Create a new metric with the given name.
    pub fn new<R>(name: impl Into<Cow<'static, str>>, registry: &R) -> Self
    where
        R: RegistryOps + ?Sized,
    {
        let name = name.into();

        let dictcache_op_total = registry.register_counter_vec(
            "dictcache_op_total".into(),
            "dictcache shared multi-map operations".into(),
            &["name", "op"],
        );
        let dictcache_elements = registry.register_gauge_vec(
            "dictcache_elements".into(),
            "dictcache elements registered in the index".into(),
            &["name"],
        );
        let dictcache_free = registry.register_gauge_vec(
            "dictcache_free".into(),
            "dictcache unused elements in the free list".into(),
            &["name"],
        );

        let op = |op: &'static str| dictcache_op_total.counter(&[name.clone(), op.into()]);

        Self {
            hit: op("hit"),
            miss: op("miss"),
            wait: op("wait"),
            insert: op("insert"),
            duplicate: op("duplicate"),
            reject: op("reject"),
            evict: op("evict"),
            remove: op("remove"),
            replace: op("replace"),
            release: op("release"),
            leak: op("leak"),
            elements: dictcache_elements.gauge(&[name.clone()]),
            free: dictcache_free.gauge(&[name]),
        }
    }

    /// Build noop metrics.
    ///
    /// Note: `noop` is only supposed to be called by tests and other dictcache components.
    #[doc(hidden)]
    pub fn noop() -> Self {
        use super::registry::noop::NoopMetricsRegistry;

        Self::new("test", &NoopMetricsRegistry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::registry::noop::NoopMetricsRegistry;

    fn case(registry: &impl RegistryOps) {
        let m = Metrics::new("tables", registry);
        m.hit.increase(1);
        m.elements.absolute(3);
        m.free.absolute(0);
    }

    #[test]
    fn test_metrics_noop() {
        case(&NoopMetricsRegistry);
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_metrics_prometheus() {
        use crate::metrics::registry::prometheus::PrometheusMetricsRegistry;

        let p8s = PrometheusMetricsRegistry::new(prometheus::Registry::new());
        case(&p8s);
        // A second map with another name shares the vectors.
        let _ = Metrics::new("schemas", &p8s);
        assert!(!p8s.registry().gather().is_empty());
    }
}
