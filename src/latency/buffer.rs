use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::Sample;

/// Count and summed latency for one route, not yet committed to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RouteTally {
    pub count: u64,
    pub total_ms: f64,
}

impl RouteTally {
    pub fn merge(&mut self, other: RouteTally) {
        self.count += other.count;
        self.total_ms += other.total_ms;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.total_ms == 0.0
    }
}

/// A batch taken out of the buffer for flushing.
#[derive(Debug, Default)]
pub struct StagedBatch {
    pub routes: HashMap<String, RouteTally>,
    /// Observation time of the oldest sample in the batch
    pub oldest: Option<DateTime<Utc>>,
}

impl StagedBatch {
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn sample_count(&self) -> u64 {
        self.routes.values().map(|t| t.count).sum()
    }
}

/// In-memory staging map between the request path and the flush task.
///
/// The map, its oldest-sample stamp and the `armed` flag share one lock, so
/// the empty→non-empty transition that arms the flush timer is observed by
/// exactly one caller, and [`take`](Self::take) swaps the map and disarms
/// in the same critical section.
#[derive(Default)]
pub struct StagingBuffer {
    inner: Mutex<Staging>,
}

#[derive(Default)]
struct Staging {
    batch: StagedBatch,
    armed: bool,
}

impl Staging {
    /// Returns true when this call is the one that arms the timer.
    fn arm(&mut self) -> bool {
        !std::mem::replace(&mut self.armed, true)
    }
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a sample into its route's tally.
    /// Returns true when the buffer was idle and the caller must arm the timer.
    pub fn stage(&self, sample: Sample) -> bool {
        let mut inner = self.inner.lock();
        let batch = &mut inner.batch;
        batch.routes.entry(sample.route).or_default().merge(RouteTally {
            count: 1,
            total_ms: sample.latency_ms,
        });
        batch.oldest = Some(match batch.oldest {
            Some(t) => t.min(sample.observed_at),
            None => sample.observed_at,
        });
        inner.arm()
    }

    /// Put back deltas that a flush failed to commit.
    /// Same return contract as [`stage`](Self::stage).
    pub fn restage(&self, route: String, tally: RouteTally) -> bool {
        if tally.is_empty() {
            return false;
        }
        let mut inner = self.inner.lock();
        inner.batch.routes.entry(route).or_default().merge(tally);
        inner.arm()
    }

    /// Swap the staging map for an empty one and disarm the timer.
    pub fn take(&self) -> StagedBatch {
        let mut inner = self.inner.lock();
        inner.armed = false;
        std::mem::take(&mut inner.batch)
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock().armed
    }

    /// Number of distinct routes currently staged.
    pub fn len(&self) -> usize {
        self.inner.lock().batch.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(route: &str, ms: f64) -> Sample {
        Sample::new(route, ms).unwrap()
    }

    #[test]
    fn only_first_sample_arms() {
        let buf = StagingBuffer::new();
        assert!(buf.stage(sample("/a", 1.0)));
        assert!(!buf.stage(sample("/a", 2.0)));
        assert!(!buf.stage(sample("/b", 3.0)));
        assert!(buf.is_armed());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn take_swaps_and_disarms() {
        let buf = StagingBuffer::new();
        buf.stage(sample("/a", 10.0));
        buf.stage(sample("/a", 30.0));

        let batch = buf.take();
        assert_eq!(
            batch.routes["/a"],
            RouteTally {
                count: 2,
                total_ms: 40.0
            }
        );
        assert_eq!(batch.sample_count(), 2);
        assert!(batch.oldest.is_some());
        assert!(buf.is_empty());
        assert!(!buf.is_armed());

        // A sample arriving after the swap lands in the fresh map and re-arms.
        assert!(buf.stage(sample("/a", 5.0)));
        assert_eq!(buf.take().sample_count(), 1);
    }

    #[test]
    fn restage_merges_and_arms_when_idle() {
        let buf = StagingBuffer::new();
        assert!(!buf.restage("/a".into(), RouteTally::default()));
        assert!(buf.restage(
            "/a".into(),
            RouteTally {
                count: 3,
                total_ms: 0.0
            }
        ));
        assert!(!buf.stage(sample("/a", 7.0)));

        let batch = buf.take();
        assert_eq!(
            batch.routes["/a"],
            RouteTally {
                count: 4,
                total_ms: 7.0
            }
        );
    }
}
