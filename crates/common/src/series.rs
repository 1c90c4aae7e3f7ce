use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped indicator value kept in an indicator's history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Fixed-capacity ring buffer: the oldest entry is evicted on overflow,
/// bounding memory under indefinite streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundedSeries<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedSeries<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "series capacity must be positive");
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(item);
    }

    pub fn latest(&self) -> Option<&T> {
        self.buf.back()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_grows_until_capacity() {
        let mut s = BoundedSeries::new(3);
        s.push(1);
        s.push(2);
        assert_eq!(s.len(), 2);
        assert_eq!(s.latest(), Some(&2));
    }

    #[test]
    fn series_evicts_oldest_on_overflow() {
        let mut s = BoundedSeries::new(3);
        for i in 0..10 {
            s.push(i);
        }
        assert_eq!(s.len(), 3);
        let items: Vec<i32> = s.iter().copied().collect();
        assert_eq!(items, vec![7, 8, 9]);
    }

    #[test]
    fn series_clear_resets_contents_not_capacity() {
        let mut s = BoundedSeries::new(2);
        s.push(1);
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.capacity(), 2);
    }
}
