use std::sync::Arc;

use crate::{error::Result, key::is_same_or_batch_member, repo::Repository, Reading, Time};

/// Read side: fetches stored samples and decodes them.
#[derive(Debug, Clone)]
pub struct MetricService {
    repo: Arc<dyn Repository>,
}
impl MetricService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Readings whose key starts with `key`, or every key if `key` is empty.
    ///
    /// One undecodable row fails the whole query.
    pub async fn metric(&self, key: &str, min: Time, max: Time) -> Result<Vec<Reading>> {
        let samples = if key.is_empty() {
            self.repo.query_by_time_range(min, max).await?
        } else {
            self.repo.query_by_prefix(key, min, max).await?
        };
        samples.into_iter().map(Reading::decode).collect()
    }

    /// Like [`Self::metric`] but only `key` itself and its batch members
    /// (`key.0`, `key.1`, ...).
    pub async fn metric_strict(&self, key: &str, min: Time, max: Time) -> Result<Vec<Reading>> {
        let mut readings = self.metric(key, min, max).await?;
        if !key.is_empty() {
            readings.retain(|r| is_same_or_batch_member(&r.key, key));
        }
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        codec::{encode_float, encode_int, Value, ValueType},
        error::Error,
        in_mem::InMemRepository,
        sqlite::SqliteRepository,
    };

    fn at(secs: i64) -> Time {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    async fn seeded(repo: Arc<dyn Repository>) -> MetricService {
        repo.insert("cpu.cores", ValueType::Int, &encode_int(8).unwrap(), at(100))
            .await
            .unwrap();
        repo.insert("cpu.percent", ValueType::Float, &encode_float(12.5), at(100))
            .await
            .unwrap();
        for i in 0..2 {
            let key = format!("cpu.percent.{i}");
            repo.insert(&key, ValueType::Float, &encode_float(i as f64), at(110))
                .await
                .unwrap();
        }
        repo.insert("cpu.percent.thread.0", ValueType::Float, &encode_float(1.0), at(120))
            .await
            .unwrap();
        repo.insert("host.name", ValueType::String, b"box", at(130))
            .await
            .unwrap();
        MetricService::new(repo)
    }

    #[tokio::test]
    async fn test_metric_by_prefix_decodes() {
        let svc = seeded(Arc::new(InMemRepository::new())).await;
        let readings = svc.metric("cpu.c", at(0), at(1000)).await.unwrap();
        assert_eq!(
            readings,
            [Reading {
                key: "cpu.cores".into(),
                value: Value::Int(8),
                time: at(100),
            }]
        );
    }

    #[tokio::test]
    async fn test_empty_key_returns_all() {
        let svc = seeded(Arc::new(SqliteRepository::new_in_memory().await.unwrap())).await;
        let readings = svc.metric("", at(0), at(1000)).await.unwrap();
        assert_eq!(readings.len(), 6);
        assert_eq!(readings[5].value, Value::String("box".into()));

        let readings = svc.metric("", at(105), at(125)).await.unwrap();
        assert_eq!(readings.len(), 3);
    }

    #[tokio::test]
    async fn test_strict_keeps_batch_members_only() {
        let svc = seeded(Arc::new(InMemRepository::new())).await;
        let readings = svc.metric_strict("cpu.percent", at(0), at(1000)).await.unwrap();
        let keys: Vec<_> = readings.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["cpu.percent", "cpu.percent.0", "cpu.percent.1"]);

        let loose = svc.metric("cpu.percent", at(0), at(1000)).await.unwrap();
        assert_eq!(loose.len(), 4);
    }

    #[tokio::test]
    async fn test_undecodable_row_fails_query() {
        let repo = Arc::new(InMemRepository::new());
        let svc = seeded(repo.clone()).await;
        repo.insert("cpu.bad", ValueType::Int, &[1, 2, 3], at(100))
            .await
            .unwrap();
        assert!(matches!(
            svc.metric("cpu", at(0), at(1000)).await,
            Err(Error::InvalidValueLength { .. })
        ));
        assert!(svc.metric("host", at(0), at(1000)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_type_tag_fails_query() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO metrics (key, type, value, timestamp) \
             VALUES ('up', 'bool', x'01', 0)",
        )
        .execute(repo.pool())
        .await
        .unwrap();
        let svc = MetricService::new(Arc::new(repo));
        let err = svc.metric("up", at(0), at(1)).await.unwrap_err();
        assert!(matches!(err, Error::UnknownValueType { tag } if tag == "bool"));
    }
}
