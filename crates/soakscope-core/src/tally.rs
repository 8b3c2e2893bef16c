//! Label counting and safe ratios.
//!
//! Denial codes, breaker reasons and event kinds are open-ended string
//! labels. [`LabelCounter`] keeps them in first-seen order so that rankings
//! with equal counts break ties deterministically, independent of any hash
//! iteration order.
//!
//! # Bounded Collections
//!
//! A counter holds at most [`MAX_LABEL_ENTRIES`] distinct labels. Overflow is
//! aggregated into one extra [`OVERFLOW_LABEL`] bucket to keep totals
//! accurate.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Maximum distinct labels tracked by a single counter.
pub const MAX_LABEL_ENTRIES: usize = 256;

/// Bucket that absorbs labels seen after the counter is full.
pub const OVERFLOW_LABEL: &str = "other";

/// Count of occurrences per label, iterated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCounter {
    entries: Vec<(String, u64)>,
}

impl LabelCounter {
    /// Creates an empty counter.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Increments `label` by one.
    pub fn increment(&mut self, label: &str) {
        self.add(label, 1);
    }

    /// Adds `count` occurrences of `label`.
    pub fn add(&mut self, label: &str, count: u64) {
        if let Some(slot) = self.slot_mut(label) {
            *slot = slot.saturating_add(count);
            return;
        }

        if self.entries.len() < MAX_LABEL_ENTRIES {
            self.entries.push((label.to_string(), count));
        } else if let Some(slot) = self.slot_mut(OVERFLOW_LABEL) {
            *slot = slot.saturating_add(count);
        } else {
            self.entries.push((OVERFLOW_LABEL.to_string(), count));
        }
    }

    /// Returns the count for `label`, or zero if it was never seen.
    #[must_use]
    pub fn get(&self, label: &str) -> u64 {
        self.entries
            .iter()
            .find(|(name, _)| name == label)
            .map_or(0, |(_, count)| *count)
    }

    /// Sum of all counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, (_, count)| acc.saturating_add(*count))
    }

    /// Number of distinct labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates labels in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
    }

    /// Labels ordered by count, largest first.
    ///
    /// The sort is stable, so equal counts keep first-seen order.
    #[must_use]
    pub fn ranked(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    fn slot_mut(&mut self, label: &str) -> Option<&mut u64> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name == label)
            .map(|(_, count)| count)
    }
}

impl Serialize for LabelCounter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, count) in &self.entries {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}

impl<'a> FromIterator<&'a str> for LabelCounter {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut counter = Self::new();
        for label in iter {
            counter.increment(label);
        }
        counter
    }
}

/// Divides `numerator` by `denominator`, yielding `0.0` when the denominator
/// is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

/// Formats a ratio as a percentage with one decimal place (`0.4` → `40.0%`).
#[must_use]
pub fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}
