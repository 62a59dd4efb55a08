use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{codec::ValueType, error::Result, repo::Repository, StoredSample, Time};

/// Process-local repository. Nothing survives a restart.
#[derive(Debug)]
pub struct InMemRepository {
    rows: RwLock<Vec<StoredSample>>,
}
impl InMemRepository {
    pub fn new() -> Self {
        let rows = RwLock::new(vec![]);
        Self { rows }
    }
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    async fn select(&self, filter: impl Fn(&StoredSample) -> bool) -> Vec<StoredSample> {
        let rows = self.rows.read().await;
        let mut out: Vec<StoredSample> = rows.iter().filter(|s| filter(*s)).cloned().collect();
        // Stable: equal timestamps keep insertion order.
        out.sort_by_key(|s| s.time);
        out
    }
}
impl Default for InMemRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for InMemRepository {
    async fn insert(
        &self,
        key: &str,
        value_type: ValueType,
        value: &[u8],
        time: Time,
    ) -> Result<()> {
        let sample = StoredSample {
            key: key.to_string(),
            value_type: value_type.as_str().to_string(),
            value: value.to_vec(),
            time,
        };
        self.rows.write().await.push(sample);
        Ok(())
    }

    async fn query_by_prefix(
        &self,
        prefix: &str,
        min: Time,
        max: Time,
    ) -> Result<Vec<StoredSample>> {
        Ok(self
            .select(|s| s.key.starts_with(prefix) && min <= s.time && s.time <= max)
            .await)
    }

    async fn query_by_time_range(&self, min: Time, max: Time) -> Result<Vec<StoredSample>> {
        Ok(self.select(|s| min <= s.time && s.time <= max).await)
    }
}
