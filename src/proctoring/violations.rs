use chrono::Utc;
use log::warn;
use parking_lot::Mutex;

use super::{ActivityKind, FlagCounts, Severity, SuspiciousActivity};

type ActivityObserver = Box<dyn Fn(&SuspiciousActivity) + Send + Sync>;

/// Session-scoped, append-only log of suspicious activities.
///
/// Entries are appended in detection order with non-decreasing timestamps;
/// a registered observer is invoked synchronously with each new record.
/// Recording never fails.
#[derive(Default)]
pub struct ViolationLog {
    entries: Mutex<Vec<SuspiciousActivity>>,
    observer: Mutex<Option<ActivityObserver>>,
}

impl ViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_observer<F>(&self, observer: F)
    where
        F: Fn(&SuspiciousActivity) + Send + Sync + 'static,
    {
        *self.observer.lock() = Some(Box::new(observer));
    }

    /// Timestamp, tag and append a new activity record.
    ///
    /// Kind and severity are caller-supplied; no domain validation happens
    /// here. A wall-clock step backwards is clamped to the previous entry's
    /// timestamp so the sequence stays monotonically non-decreasing.
    pub fn record(
        &self,
        kind: ActivityKind,
        severity: Severity,
        details: impl Into<String>,
    ) -> SuspiciousActivity {
        let details = details.into();
        let activity = {
            let mut entries = self.entries.lock();
            let mut timestamp = Utc::now();
            if let Some(last) = entries.last() {
                if timestamp < last.timestamp {
                    timestamp = last.timestamp;
                }
            }
            let activity = SuspiciousActivity {
                timestamp,
                kind,
                severity,
                details,
            };
            entries.push(activity.clone());
            activity
        };

        warn!(
            "🚨 Suspicious activity logged: {:?} ({:?}) - {}",
            activity.kind, activity.severity, activity.details
        );

        if let Some(observer) = &*self.observer.lock() {
            observer(&activity);
        }

        activity
    }

    pub fn snapshot(&self) -> Vec<SuspiciousActivity> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn counts(&self) -> FlagCounts {
        FlagCounts::tally(&self.entries.lock())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn records_are_appended_in_order() {
        let log = ViolationLog::new();
        log.record(ActivityKind::FaceNotDetected, Severity::High, "no face");
        log.record(ActivityKind::LookingDown, Severity::Medium, "down");

        let entries = log.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, ActivityKind::FaceNotDetected);
        assert_eq!(entries[1].kind, ActivityKind::LookingDown);
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn observer_is_invoked_synchronously_per_record() {
        let log = ViolationLog::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_observer = seen.clone();
        log.set_observer(move |activity| {
            assert_eq!(activity.kind, ActivityKind::MultipleFaces);
            seen_in_observer.fetch_add(1, Ordering::SeqCst);
        });

        log.record(ActivityKind::MultipleFaces, Severity::High, "2 faces detected");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn counts_are_split_by_severity() {
        let log = ViolationLog::new();
        log.record(ActivityKind::FaceNotDetected, Severity::High, "a");
        log.record(ActivityKind::MultipleFaces, Severity::High, "b");
        log.record(ActivityKind::LookingSideways, Severity::Medium, "c");

        let counts = log.counts();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.high, 2);
        assert_eq!(counts.medium, 1);
        assert_eq!(counts.low, 0);
    }

    #[test]
    fn record_returns_the_stored_entry() {
        let log = ViolationLog::new();
        let activity = log.record(ActivityKind::LookingAway, Severity::Low, "glance");
        assert_eq!(activity.details, "glance");
        assert_eq!(log.snapshot()[0].details, "glance");
    }
}
