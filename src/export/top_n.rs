//! Bounded selection of the N greatest elements

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

/// An element ordered by the selector's comparator
struct Ranked<T, F> {
    item: T,
    compare: Arc<F>,
}

impl<T, F> Ord for Ranked<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn cmp(&self, other: &Self) -> Ordering {
        (self.compare)(&self.item, &other.item)
    }
}

impl<T, F> PartialOrd for Ranked<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, F> PartialEq for Ranked<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T, F> Eq for Ranked<T, F> where F: Fn(&T, &T) -> Ordering {}

/// Keeps the `capacity` greatest elements seen under `compare`.
///
/// The smallest retained element sits at the top of a min-heap and is the one
/// evicted when a greater element arrives.
pub struct TopNSelector<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    capacity: usize,
    heap: BinaryHeap<Reverse<Ranked<T, F>>>,
    compare: Arc<F>,
}

impl<T, F> TopNSelector<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    pub fn new(capacity: usize, compare: F) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.min(1024)),
            compare: Arc::new(compare),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.heap.len() < self.capacity {
            let ranked = self.rank(item);
            self.heap.push(Reverse(ranked));
            return;
        }
        let greater = match self.heap.peek() {
            Some(Reverse(lowest)) => (self.compare)(&item, &lowest.item) == Ordering::Greater,
            None => false,
        };
        if greater {
            let ranked = self.rank(item);
            if let Some(mut lowest) = self.heap.peek_mut() {
                *lowest = Reverse(ranked);
            }
        }
    }

    fn rank(&self, item: T) -> Ranked<T, F> {
        Ranked {
            item,
            compare: Arc::clone(&self.compare),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Smallest retained element
    pub fn low(&self) -> Option<&T> {
        self.heap.peek().map(|Reverse(ranked)| &ranked.item)
    }

    /// Greatest retained element
    pub fn high(&self) -> Option<&T> {
        self.heap.iter().map(|Reverse(ranked)| ranked).max().map(|ranked| &ranked.item)
    }

    /// Retained elements in no particular order
    pub fn into_vec(self) -> Vec<T> {
        self.heap.into_iter().map(|Reverse(ranked)| ranked.item).collect()
    }

    /// Retained elements paired with their weight rescaled linearly into
    /// `range`. The smallest and largest retained weights are the bounds, so
    /// the heaviest element lands on the top of the range whichever order the
    /// comparator keeps. With equal bounds every element maps to the top.
    pub fn normalized<W>(self, range: (f64, f64), weight: W) -> Vec<(T, f64)>
    where
        W: Fn(&T) -> f64,
    {
        let items = self.into_vec();
        let weights: Vec<f64> = items.iter().map(&weight).collect();
        let low = weights.iter().copied().fold(f64::INFINITY, f64::min);
        let high = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (bottom, top) = range;

        items
            .into_iter()
            .zip(weights)
            .map(|(item, weight)| {
                let value = if high == low {
                    top
                } else {
                    bottom + (weight - low) / (high - low) * (top - bottom)
                };
                (item, value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_keeps_greatest() {
        let mut top = TopNSelector::new(3, |a: &i32, b: &i32| a.cmp(b));
        for value in [5, 1, 9, 3, 7, 2, 8] {
            top.push(value);
        }
        assert_eq!(top.len(), 3);
        assert_eq!(top.low(), Some(&7));
        assert_eq!(top.high(), Some(&9));
        let mut kept = top.into_vec();
        kept.sort_unstable();
        assert_eq!(kept, vec![7, 8, 9]);
    }

    #[test]
    fn test_reversed_comparator_keeps_smallest() {
        let mut top = TopNSelector::new(2, |a: &i32, b: &i32| b.cmp(a));
        for value in [5, 1, 9, 3] {
            top.push(value);
        }
        let mut kept = top.into_vec();
        kept.sort_unstable();
        assert_eq!(kept, vec![1, 3]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut top = TopNSelector::new(0, |a: &i32, b: &i32| a.cmp(b));
        top.push(1);
        assert!(top.is_empty());
        assert!(top.low().is_none());
        assert!(top.normalized((0.0, 1.0), |v| *v as f64).is_empty());
    }

    #[test]
    fn test_normalization() {
        let mut top = TopNSelector::new(3, |a: &i32, b: &i32| a.cmp(b));
        for value in [10, 20, 30, 0] {
            top.push(value);
        }
        let mut values = top.normalized((0.0, 1.0), |v| *v as f64);
        values.sort_by_key(|(item, _)| *item);
        assert_eq!(values, vec![(10, 0.0), (20, 0.5), (30, 1.0)]);
    }

    #[test]
    fn test_normalization_follows_weights_not_order() {
        let mut lightest = TopNSelector::new(2, |a: &i32, b: &i32| b.cmp(a));
        for value in [50, 10, 30, 40] {
            lightest.push(value);
        }
        assert_eq!(lightest.low(), Some(&30));
        assert_eq!(lightest.high(), Some(&10));

        let mut values = lightest.normalized((0.0, 1.0), |v| *v as f64);
        values.sort_by_key(|(item, _)| *item);
        assert_eq!(values, vec![(10, 0.0), (30, 1.0)]);
    }

    #[test]
    fn test_equal_bounds_map_to_top() {
        let mut top = TopNSelector::new(4, |a: &i32, b: &i32| a.cmp(b));
        top.push(4);
        top.push(4);
        let values = top.normalized((0.2, 0.8), |v| *v as f64);
        assert_eq!(values, vec![(4, 0.8), (4, 0.8)]);
    }

    proptest! {
        #[test]
        fn prop_retains_top_n(values in proptest::collection::vec(-1000i64..1000, 0..200), n in 0usize..50) {
            let mut top = TopNSelector::new(n, |a: &i64, b: &i64| a.cmp(b));
            for value in &values {
                top.push(*value);
            }
            prop_assert_eq!(top.len(), n.min(values.len()));

            let mut expected = values.clone();
            expected.sort_unstable_by(|a, b| b.cmp(a));
            expected.truncate(n);

            if let (Some(low), Some(high)) = (top.low().copied(), top.high().copied()) {
                prop_assert_eq!(Some(&low), expected.last());
                prop_assert_eq!(Some(&high), expected.first());
            }

            let mut kept = top.into_vec();
            kept.sort_unstable_by(|a, b| b.cmp(a));
            prop_assert_eq!(kept, expected);
        }

        #[test]
        fn prop_normalized_values_stay_in_range(values in proptest::collection::vec(0u32..10_000, 1..100), n in 1usize..20) {
            let mut top = TopNSelector::new(n, |a: &u32, b: &u32| a.cmp(b));
            for value in &values {
                top.push(*value);
            }
            for (_, value) in top.normalized((0.0, 1.0), |v| f64::from(*v)) {
                prop_assert!((0.0..=1.0).contains(&value));
            }
        }
    }
}
