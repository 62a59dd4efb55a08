use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{
    codec::ValueType,
    config::MetricConfig,
    error::{Error, Result},
    internal::InternalMethod,
    MetricKey, Time,
};

pub const INTERNAL_METHOD: &str = "internal";

/// A way of producing raw samples for a metric key.
///
/// A single call may return several values (one per CPU thread, say); the
/// collector stores them as a batch.
pub trait SamplingMethod: core::fmt::Debug + Sync + Send {
    fn sample(&self, key: &str) -> Result<Vec<Vec<u8>>>;
}

/// Maps configured method names to their implementations.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<dyn SamplingMethod>>,
}
impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    /// Registry with the `internal` method.
    pub fn with_builtin() -> Self {
        let mut methods = Self::new();
        methods.register(INTERNAL_METHOD, Arc::new(InternalMethod::new()));
        methods
    }

    pub fn register(&mut self, name: impl Into<String>, method: Arc<dyn SamplingMethod>) {
        self.methods.insert(name.into(), method);
    }
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn SamplingMethod>> {
        self.methods
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnsupportedMetricMethod {
                method: name.to_string(),
            })
    }
}

#[derive(Debug)]
pub struct MetricDefinition {
    key: MetricKey,
    value_type: ValueType,
    interval: Duration,
    last_check: Option<Time>,
    method: Arc<dyn SamplingMethod>,
}
impl MetricDefinition {
    pub fn new(
        key: MetricKey,
        value_type: ValueType,
        interval: Duration,
        method: Arc<dyn SamplingMethod>,
    ) -> Self {
        Self {
            key,
            value_type,
            interval,
            last_check: None,
            method,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
    pub fn interval(&self) -> Duration {
        self.interval
    }
    pub fn last_check(&self) -> Option<Time> {
        self.last_check
    }

    /// Never-checked metrics are always due.
    pub fn is_due(&self, now: Time) -> bool {
        let Some(last_check) = self.last_check else {
            return true;
        };
        match (now - last_check).to_std() {
            Ok(elapsed) => elapsed >= self.interval,
            // Clock went backwards.
            Err(_) => false,
        }
    }

    pub fn sample(&self) -> Result<Vec<Vec<u8>>> {
        self.method.sample(&self.key)
    }

    pub(crate) fn mark_checked(&mut self, now: Time) {
        self.last_check = Some(now);
    }
}

/// The static list of metrics, in configuration order.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    metrics: Vec<MetricDefinition>,
}
impl MetricRegistry {
    pub fn new(metrics: Vec<MetricDefinition>) -> Self {
        Self { metrics }
    }

    /// Fails on the first metric whose method is not registered.
    pub fn from_config(configs: &[MetricConfig], methods: &MethodRegistry) -> Result<Self> {
        let metrics = configs
            .iter()
            .map(|cfg| -> Result<MetricDefinition> {
                let method = methods.resolve(&cfg.method)?;
                Ok(MetricDefinition::new(
                    cfg.key.clone(),
                    cfg.value_type,
                    Duration::from_secs(cfg.interval),
                    method,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { metrics })
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.metrics.iter()
    }
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut MetricDefinition> {
        self.metrics.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[derive(Debug)]
    struct Constant(u8);
    impl SamplingMethod for Constant {
        fn sample(&self, _key: &str) -> Result<Vec<Vec<u8>>> {
            Ok(vec![vec![self.0]])
        }
    }

    fn metric_config(key: &str, method: &str) -> MetricConfig {
        MetricConfig {
            key: key.into(),
            method: method.into(),
            interval: 10,
            value_type: ValueType::Float,
        }
    }

    #[test]
    fn test_unsupported_method() {
        let methods = MethodRegistry::with_builtin();
        let configs = [
            metric_config("cpu.percent", "internal"),
            metric_config("if.octets", "snmp"),
        ];
        let err = MetricRegistry::from_config(&configs, &methods).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMetricMethod { method } if method == "snmp"));
    }

    #[test]
    fn test_registered_method_is_resolved() {
        let mut methods = MethodRegistry::with_builtin();
        methods.register("constant", Arc::new(Constant(9)));
        let configs = [
            metric_config("cpu.percent", "internal"),
            metric_config("fixed.nine", "constant"),
        ];
        let registry = MetricRegistry::from_config(&configs, &methods).unwrap();
        assert_eq!(registry.len(), 2);

        let keys: Vec<_> = registry.iter().map(|m| m.key()).collect();
        assert_eq!(keys, ["cpu.percent", "fixed.nine"]);

        let fixed = registry.iter().nth(1).unwrap();
        assert_eq!(fixed.sample().unwrap(), vec![vec![9]]);
        assert_eq!(fixed.interval(), Duration::from_secs(10));
        assert_eq!(fixed.last_check(), None);
    }

    #[test]
    fn test_is_due() {
        let mut metric = MetricDefinition::new(
            "fixed".into(),
            ValueType::Int,
            Duration::from_secs(12),
            Arc::new(Constant(0)),
        );
        let t0 = Utc.timestamp_opt(1_000, 0).unwrap();
        assert!(metric.is_due(t0));

        metric.mark_checked(t0);
        assert!(!metric.is_due(t0));
        assert!(!metric.is_due(t0 + chrono::Duration::seconds(11)));
        assert!(metric.is_due(t0 + chrono::Duration::seconds(12)));
        assert!(!metric.is_due(t0 - chrono::Duration::seconds(1)));
    }
}
