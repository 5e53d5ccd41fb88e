//! Reference map: symbolic key → time series

use crate::error::{Error, Result};
use crate::reference::ReferenceKey;
use crate::timeline::{Timeline, TIME_CONSTANTS};
use ahash::AHashMap;

/// Binds every symbolic reference to an array of exactly timeline length
///
/// The length invariant is enforced on insert: a mismatched array is a
/// configuration error, not a formula error.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMap {
    periods: usize,
    values: AHashMap<ReferenceKey, Vec<f64>>,
}

impl ReferenceMap {
    /// Create an empty map for a timeline of `periods` months
    pub fn new(periods: usize) -> Self {
        Self {
            periods,
            values: AHashMap::new(),
        }
    }

    /// Create a map for `timeline` with its `T.` constants already bound
    pub fn for_timeline(timeline: &Timeline) -> Self {
        let mut map = Self::new(timeline.len());
        map.bind_time_constants(timeline);
        map
    }

    /// Bind every `T.` constant derived from `timeline`
    ///
    /// Constants already bound are kept. Fails if the timeline length
    /// differs from the map's.
    pub fn with_time_constants(mut self, timeline: &Timeline) -> Result<Self> {
        if timeline.len() != self.periods {
            return Err(Error::LengthMismatch {
                key: "timeline".into(),
                expected: self.periods,
                actual: timeline.len(),
            });
        }
        self.bind_time_constants(timeline);
        Ok(self)
    }

    fn bind_time_constants(&mut self, timeline: &Timeline) {
        for name in TIME_CONSTANTS {
            if let Some(values) = timeline.time_constant(name) {
                self.values
                    .entry(ReferenceKey::time_constant(name))
                    .or_insert(values);
            }
        }
    }

    /// Number of periods every array must have
    pub fn periods(&self) -> usize {
        self.periods
    }

    /// Bind `key` to `values`, returning the previous binding
    pub fn insert(&mut self, key: ReferenceKey, values: Vec<f64>) -> Result<Option<Vec<f64>>> {
        if values.len() != self.periods {
            return Err(Error::LengthMismatch {
                key: key.to_string(),
                expected: self.periods,
                actual: values.len(),
            });
        }
        Ok(self.values.insert(key, values))
    }

    /// Parse `key` and bind it
    pub fn insert_str(&mut self, key: &str, values: Vec<f64>) -> Result<Option<Vec<f64>>> {
        self.insert(ReferenceKey::parse(key)?, values)
    }

    pub fn get(&self, key: &ReferenceKey) -> Option<&[f64]> {
        self.values.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &ReferenceKey) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &ReferenceKey) -> Option<Vec<f64>> {
        self.values.remove(key)
    }

    /// All bound keys, in sorted order
    pub fn keys(&self) -> Vec<&ReferenceKey> {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        keys
    }

    /// Number of bound keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
