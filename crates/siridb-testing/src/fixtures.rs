//! Test fixture utilities.

use serde_json::{Map, Value, json};
use siridb_codec::Package;

/// A series fixture for building insert payloads.
pub struct TestSeries {
    /// Series name.
    pub name: String,
    /// `(timestamp, value)` points.
    pub points: Vec<(u64, f64)>,
}

impl TestSeries {
    /// Create an empty series fixture.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    /// Add `count` points one second apart, starting at `start`.
    #[must_use]
    pub fn with_points(mut self, start: u64, count: usize) -> Self {
        self.points.extend((0..count as u64).map(|i| (start + i, i as f64 * 0.5)));
        self
    }

    /// Insert payload for this series: `{name: [[ts, value], ...]}`.
    #[must_use]
    pub fn insert_data(&self) -> Value {
        let points = self.points.iter().map(|(ts, v)| json!([ts, v])).collect();
        let mut data = Map::new();
        data.insert(self.name.clone(), Value::Array(points));
        Value::Object(data)
    }
}

/// Concatenate package frames into one wire buffer.
#[must_use]
pub fn wire(packages: &[Package]) -> Vec<u8> {
    packages
        .iter()
        .flat_map(|package| package.frame().iter().copied())
        .collect()
}
