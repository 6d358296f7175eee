// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Publisher collaborator
//!
//! Engines hand every completed run to a [`Publisher`] and move on. Delivery
//! failures are the publisher's concern; nothing is retried.

use std::sync::Mutex;

use crate::result::TestRun;

/// Accepts completed test runs
pub trait Publisher: Send + Sync {
    /// Take ownership of a completed run
    fn publish(&self, run: TestRun);
}

impl<F> Publisher for F
where
    F: Fn(TestRun) + Send + Sync,
{
    fn publish(&self, run: TestRun) {
        self(run);
    }
}

/// Buffers published runs in memory
#[derive(Debug, Default)]
pub struct CollectingPublisher {
    runs: Mutex<Vec<TestRun>>,
}

impl CollectingPublisher {
    /// Create an empty publisher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runs published so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing was published
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the published runs
    #[must_use]
    pub fn runs(&self) -> Vec<TestRun> {
        self.lock().clone()
    }

    /// Remove and return the published runs
    #[must_use]
    pub fn take(&self) -> Vec<TestRun> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TestRun>> {
        self.runs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Publisher for CollectingPublisher {
    fn publish(&self, run: TestRun) {
        self.lock().push(run);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ParserUri;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_run(id: u32) -> TestRun {
        let uri = ParserUri::new("Mocha", "1.0").expect("valid uri");
        TestRun::new(uri, String::new(), id)
    }

    #[test]
    fn test_collecting_publisher_keeps_order() {
        let publisher = CollectingPublisher::new();
        publisher.publish(sample_run(1));
        publisher.publish(sample_run(2));

        let ids: Vec<u32> = publisher.runs().iter().map(|r| r.test_run_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(publisher.take().len(), 2);
        assert!(publisher.is_empty());
    }

    #[test]
    fn test_closures_are_publishers() {
        let seen = AtomicUsize::new(0);
        let publisher = |run: TestRun| {
            seen.fetch_add(run.test_run_id as usize, Ordering::SeqCst);
        };
        publisher.publish(sample_run(3));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
