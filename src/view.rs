//! Reshaping readings for consumers.
//!
//! - [`tree_json`]: readings nested by key path.
//! - [`columnar_json`]: a shared timestamp axis plus one aligned row per
//!   series, the layout chart libraries such as uPlot expect.
//! - [`scatter_chart_html`]: a self-contained plotly chart.

use std::collections::{BTreeMap, BTreeSet};

use plotly::{
    layout::{Axis, AxisType},
    Layout, Plot, Scatter,
};
use serde::{ser::SerializeSeq, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::{
    codec::Value,
    error::Result,
    key::{classify_segment, Segment, SEPARATOR},
    MetricKey, Reading, Time,
};

const MAX_DISPLAY_DATA_POINTS: usize = 1024;

#[derive(Serialize)]
struct Record<'a> {
    value: &'a Value,
    time: Time,
}

/// Nests readings by splitting keys on `.`.
///
/// A trailing numeric segment appends `{value, time}` to a list held by the
/// parent segment, so batch members `k.0`, `k.1` land in `k: [..]` in result
/// order. Any other trailing segment holds a single `{value, time}`, and
/// later readings for the same key overwrite earlier ones: with more than
/// one row per key only the last row in result order survives.
///
/// A node that is a list under one key and a map under another is replaced
/// by whichever shape is needed last. A leaf record reached as a parent
/// keeps its fields and gains the child.
pub fn tree(readings: &[Reading]) -> Result<Map<String, JsonValue>> {
    let mut root = Map::new();
    for reading in readings {
        let parts: Vec<&str> = reading.key.split(SEPARATOR).collect();
        let record = serde_json::to_value(Record {
            value: &reading.value,
            time: reading.time,
        })?;
        match parts.as_slice() {
            [] => {}
            [path @ .., holder, last] if matches!(classify_segment(last), Segment::Index(_)) => {
                let list = descend(&mut root, path)
                    .entry(*holder)
                    .or_insert_with(|| JsonValue::Array(vec![]));
                match list {
                    JsonValue::Array(items) => items.push(record),
                    other => *other = JsonValue::Array(vec![record]),
                }
            }
            [path @ .., last] => {
                descend(&mut root, path).insert(last.to_string(), record);
            }
        }
    }
    Ok(root)
}

fn descend<'a>(
    mut current: &'a mut Map<String, JsonValue>,
    path: &[&str],
) -> &'a mut Map<String, JsonValue> {
    for part in path {
        let node = current
            .entry(*part)
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !node.is_object() {
            *node = JsonValue::Object(Map::new());
        }
        current = match node {
            JsonValue::Object(map) => map,
            _ => unreachable!("node was just made an object"),
        };
    }
    current
}

/// `{"metrics": <tree>}` as JSON bytes.
pub fn tree_json(readings: &[Reading]) -> Result<Vec<u8>> {
    let mut body = Map::new();
    body.insert("metrics".into(), JsonValue::Object(tree(readings)?));
    Ok(serde_json::to_vec(&body)?)
}

/// Readings aligned on a shared axis of epoch seconds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Columns {
    /// Ascending, deduplicated.
    pub timestamps: Vec<i64>,
    /// Sorted by key.
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key: MetricKey,
    /// One slot per timestamp; `None` where the series has no reading.
    pub values: Vec<Option<Value>>,
}

/// Serializes as `[[ts, ..], [v | null, ..], ..]`.
impl Serialize for Columns {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(1 + self.series.len()))?;
        seq.serialize_element(&self.timestamps)?;
        for series in &self.series {
            seq.serialize_element(&series.values)?;
        }
        seq.end()
    }
}

/// Two readings of one key within the same second collapse to the later one.
pub fn align(readings: &[Reading]) -> Columns {
    let mut axis = BTreeSet::new();
    let mut by_key: BTreeMap<&str, BTreeMap<i64, &Value>> = BTreeMap::new();
    for reading in readings {
        let ts = reading.time.timestamp();
        axis.insert(ts);
        by_key
            .entry(reading.key.as_str())
            .or_default()
            .insert(ts, &reading.value);
    }
    let timestamps: Vec<i64> = axis.into_iter().collect();
    let series = by_key
        .into_iter()
        .map(|(key, points)| Series {
            key: key.to_string(),
            values: timestamps
                .iter()
                .map(|ts| points.get(ts).map(|v| (*v).clone()))
                .collect(),
        })
        .collect();
    Columns { timestamps, series }
}

pub fn columnar_json(readings: &[Reading]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&align(readings))?)
}

/// Numeric series only; string readings are skipped. Long series keep the
/// last point of each chunk so the whole chart stays near
/// `MAX_DISPLAY_DATA_POINTS`.
pub fn scatter_chart_html(
    readings: &[Reading],
    value_range: Option<(f64, f64)>,
    div_id: Option<&str>,
) -> String {
    let mut data_sets = vec![];
    let mut data_point_count = 0;
    let mut by_key: BTreeMap<&str, Vec<(Time, f64)>> = BTreeMap::new();
    for reading in readings {
        if let Some(y) = reading.value.as_f64() {
            by_key
                .entry(reading.key.as_str())
                .or_default()
                .push((reading.time, y));
        }
    }
    for (key, points) in by_key {
        data_point_count += points.len();
        data_sets.push((key, points));
    }

    let chunk_size = data_point_count.div_ceil(MAX_DISPLAY_DATA_POINTS).max(1);
    let mut plot = Plot::new();
    for (key, points) in data_sets {
        let reduced = points.chunks(chunk_size).filter_map(|chunk| chunk.last());
        let (x, y): (Vec<String>, Vec<f64>) = reduced
            .map(|(time, y)| (time.to_rfc3339(), *y))
            .unzip();
        plot.add_trace(Scatter::new(x, y).name(key));
    }
    let y = Axis::default().title("value");
    let y = match value_range {
        Some(range) => y.range(vec![range.0, range.1]),
        None => y,
    };
    let layout = Layout::default()
        .x_axis(Axis::default().title("time").type_(AxisType::Date))
        .y_axis(y);
    plot.set_layout(layout);
    plot.to_inline_html(div_id)
}
