pub mod codec;
pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod in_mem;
pub mod internal;
pub mod key;
pub mod query;
pub mod registry;
pub mod repo;
pub mod sqlite;
pub mod view;

use chrono::{DateTime, Utc};

use crate::codec::Value;

pub type MetricKey = String;
pub type Time = DateTime<Utc>;

/// A persisted sample. `value_type` is the raw stored tag.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSample {
    pub key: MetricKey,
    pub value_type: String,
    pub value: Vec<u8>,
    pub time: Time,
}

/// A decoded sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub key: MetricKey,
    pub value: Value,
    pub time: Time,
}
impl Reading {
    pub fn decode(sample: StoredSample) -> error::Result<Self> {
        let value = Value::decode(&sample.value_type, &sample.value)?;
        Ok(Self {
            key: sample.key,
            value,
            time: sample.time,
        })
    }
}
