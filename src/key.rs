//! Metric key paths.
//!
//! A sampler that yields several values stores each under `key.<index>`.
//! Readers recover the batch by classifying path segments with
//! [`classify_segment`]; both directions go through this module.

use crate::MetricKey;

pub const SEPARATOR: char = '.';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Position inside a multi-value batch.
    Index(usize),
    Name(&'a str),
}

pub fn classify_segment(segment: &str) -> Segment<'_> {
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(index) = segment.parse() {
            return Segment::Index(index);
        }
    }
    Segment::Name(segment)
}

pub fn batch_key(key: &str, index: usize) -> MetricKey {
    format!("{key}{SEPARATOR}{index}")
}

/// `true` for `parent` itself and for `parent.<index>`.
pub fn is_same_or_batch_member(key: &str, parent: &str) -> bool {
    if key == parent {
        return true;
    }
    let Some(rest) = key
        .strip_prefix(parent)
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
    else {
        return false;
    };
    matches!(classify_segment(rest), Segment::Index(_))
}
