//! Tick-driven collection loop.
//!
//! Every tick the collector walks the registry in order and samples each
//! metric whose interval has elapsed. Due-ness is only re-evaluated on tick
//! boundaries, so a metric with interval `i` is sampled every
//! `ceil(i / tick) * tick`. Samplers run inline; a slow one delays the
//! whole tick.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    codec::ValueType,
    key::batch_key,
    registry::MetricRegistry,
    repo::Repository,
    Time,
};

#[derive(Debug)]
pub struct Collector {
    registry: MetricRegistry,
    repo: Arc<dyn Repository>,
    tick: Duration,
}
impl Collector {
    pub fn new(registry: MetricRegistry, repo: Arc<dyn Repository>, tick: Duration) -> Self {
        Self {
            registry,
            repo,
            tick,
        }
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Runs until `shutdown` is cancelled. The first tick fires immediately.
    ///
    /// Each tick is stamped with its scheduled time, not the time the loop
    /// woke up, so wake-up latency never pushes a metric past its tick.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let clock = TickClock::start();
        let mut ticker = tokio::time::interval_at(clock.origin, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick = ?self.tick, metrics = self.registry.len(), "monitoring started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("monitoring stopped");
                    return;
                }
                scheduled = ticker.tick() => {
                    debug!("collecting metrics");
                    self.collect_and_store(clock.wall_time(scheduled)).await;
                }
            }
        }
    }

    /// Samples and stores every metric due at `now`. Returns how many were sampled.
    ///
    /// Failures are logged, never returned: a metric that fails to sample is
    /// still marked checked, and a failed insert does not stop the rest of
    /// its batch.
    pub async fn collect_and_store(&mut self, now: Time) -> usize {
        let mut sampled = 0;
        for metric in self.registry.iter_mut() {
            if !metric.is_due(now) {
                continue;
            }
            debug!(key = metric.key(), "collect");
            sampled += 1;
            let result = metric.sample();
            metric.mark_checked(now);
            let values = match result {
                Ok(values) => values,
                Err(e) => {
                    error!(
                        metric = metric.key(),
                        value_type = %metric.value_type(),
                        error = %e,
                        "failed to collect metric"
                    );
                    continue;
                }
            };
            store_batch(
                self.repo.as_ref(),
                metric.key(),
                metric.value_type(),
                &values,
                now,
            )
            .await;
        }
        sampled
    }
}

/// Maps monotonic tick instants onto wall-clock time.
#[derive(Debug, Clone, Copy)]
struct TickClock {
    origin: Instant,
    wall_origin: Time,
}
impl TickClock {
    fn start() -> Self {
        Self {
            origin: Instant::now(),
            wall_origin: Utc::now(),
        }
    }

    fn wall_time(&self, at: Instant) -> Time {
        let elapsed = at.saturating_duration_since(self.origin);
        match chrono::Duration::from_std(elapsed) {
            Ok(elapsed) => self.wall_origin + elapsed,
            Err(_) => Utc::now(),
        }
    }
}

/// A single value goes under `key`; several go under `key.0`, `key.1`, ...
async fn store_batch(
    repo: &dyn Repository,
    key: &str,
    value_type: ValueType,
    values: &[Vec<u8>],
    now: Time,
) {
    if let [value] = values {
        store(repo, key, value_type, value, now).await;
        return;
    }
    for (i, value) in values.iter().enumerate() {
        store(repo, &batch_key(key, i), value_type, value, now).await;
    }
}

async fn store(
    repo: &dyn Repository,
    key: &str,
    value_type: ValueType,
    value: &[u8],
    now: Time,
) {
    if let Err(e) = repo.insert(key, value_type, value, now).await {
        error!(metric = key, value_type = %value_type, error = %e, "failed to store metric");
    }
}
