use crate::indicators::calculate_sma;
use crate::models::PriceObservation;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// What to do with a sample whose timestamp equals the newest one in the
/// window. CoinGecko only refreshes prices every so often, so back-to-back
/// polls regularly return the same `last_updated_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Store it as a new sample
    #[default]
    Keep,
    /// Drop it
    Skip,
}

/// Result of [`PriceWindow::push`]
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Added,
    /// Added, and the oldest sample was evicted
    Evicted(PriceObservation),
    /// Rejected by [`DuplicatePolicy::Skip`]
    SkippedDuplicate,
}

/// Current SMA of the window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmaValue {
    Ready(f64),
    /// Window not full yet; no average is reported
    Insufficient { have: usize, need: usize },
}

impl SmaValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            SmaValue::Ready(v) => Some(*v),
            SmaValue::Insufficient { .. } => None,
        }
    }
}

impl fmt::Display for SmaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmaValue::Ready(v) => write!(f, "{:.2}", v),
            SmaValue::Insufficient { have, need } => {
                write!(f, "insufficient data ({}/{})", have, need)
            }
        }
    }
}

/// Fixed-capacity rolling window of price observations
///
/// Memory stays O(capacity) no matter how long the monitor runs.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    data: VecDeque<PriceObservation>,
    capacity: usize,
    duplicates: DuplicatePolicy,
}

impl PriceWindow {
    /// Create a new price window
    ///
    /// # Arguments
    /// * `capacity` - Number of observations the SMA is computed over (> 0)
    /// * `duplicates` - Handling of repeated upstream timestamps
    pub fn new(capacity: usize, duplicates: DuplicatePolicy) -> Self {
        debug_assert!(capacity > 0, "window capacity must be positive");
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
            duplicates,
        }
    }

    /// Add an observation, evicting the oldest if the window is full
    pub fn push(&mut self, observation: PriceObservation) -> PushOutcome {
        if self.duplicates == DuplicatePolicy::Skip
            && self
                .latest()
                .is_some_and(|last| last.timestamp == observation.timestamp)
        {
            return PushOutcome::SkippedDuplicate;
        }

        self.data.push_back(observation);

        if self.data.len() > self.capacity {
            // len > capacity >= 1, so there is always a front element
            match self.data.pop_front() {
                Some(evicted) => PushOutcome::Evicted(evicted),
                None => PushOutcome::Added,
            }
        } else {
            PushOutcome::Added
        }
    }

    /// Arithmetic mean of the window, or `Insufficient` until it is full
    pub fn current_average(&self) -> SmaValue {
        let prices = self.prices();
        match calculate_sma(&prices, self.capacity) {
            Some(avg) => SmaValue::Ready(avg),
            None => SmaValue::Insufficient {
                have: self.data.len(),
                need: self.capacity,
            },
        }
    }

    /// Prices in insertion order, oldest first
    pub fn prices(&self) -> Vec<f64> {
        self.data.iter().map(|o| o.price).collect()
    }

    pub fn latest(&self) -> Option<&PriceObservation> {
        self.data.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceObservation> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicates
    }
}
