//! Storage boundary for samples.

use async_trait::async_trait;

use crate::{codec::ValueType, error::Result, StoredSample, Time};

/// Append-only sample storage.
///
/// Both queries return rows ascending by time with bounds inclusive; rows
/// sharing a timestamp keep insertion order.
#[async_trait]
pub trait Repository: core::fmt::Debug + Sync + Send {
    async fn insert(&self, key: &str, value_type: ValueType, value: &[u8], time: Time)
        -> Result<()>;

    /// Plain string-prefix match on the key.
    async fn query_by_prefix(&self, prefix: &str, min: Time, max: Time)
        -> Result<Vec<StoredSample>>;

    async fn query_by_time_range(&self, min: Time, max: Time) -> Result<Vec<StoredSample>>;
}
