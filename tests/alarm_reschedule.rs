// Tests for shifting alarms when recurrence moves a task's due date.
use anyhow::{Result, bail};
use cadence::alarm::{
    AlarmRescheduler, FixedClock, RescheduleEvent, RescheduleOutcome, SkipReason,
};
use cadence::store::{AlarmStore, MemoryStore};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Alarm store that records every call.
#[derive(Default)]
struct RecordingStore {
    alarms: Mutex<HashMap<i64, BTreeSet<i64>>>,
    reads: AtomicUsize,
    writes: Mutex<Vec<(i64, BTreeSet<i64>)>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl RecordingStore {
    fn with(task_id: i64, alarms: &[i64]) -> Self {
        let store = Self::default();
        store
            .alarms
            .lock()
            .unwrap()
            .insert(task_id, alarms.iter().copied().collect());
        store
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn writes(&self) -> Vec<(i64, BTreeSet<i64>)> {
        self.writes.lock().unwrap().clone()
    }
}

impl AlarmStore for RecordingStore {
    fn get_alarms(&self, task_id: i64) -> Result<BTreeSet<i64>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            bail!("alarm table locked by another process");
        }
        Ok(self
            .alarms
            .lock()
            .unwrap()
            .get(&task_id)
            .cloned()
            .unwrap_or_default())
    }

    fn synchronize_alarms(&self, task_id: i64, alarms: &BTreeSet<i64>) -> Result<()> {
        if self.fail_writes {
            bail!("disk full");
        }
        self.writes.lock().unwrap().push((task_id, alarms.clone()));
        self.alarms.lock().unwrap().insert(task_id, alarms.clone());
        Ok(())
    }
}

#[test]
fn test_basic_shift() {
    let rescheduler = AlarmRescheduler::new(RecordingStore::with(1, &[100, 200]));
    let outcome = rescheduler.reschedule(1, Some(1000), 1500).unwrap();

    assert_eq!(
        outcome,
        RescheduleOutcome::Shifted {
            delta: 500,
            alarms: BTreeSet::from([600, 700]),
        }
    );
    assert_eq!(
        rescheduler.store().writes(),
        vec![(1, BTreeSet::from([600, 700]))]
    );
}

#[test]
fn test_earlier_due_date_is_a_noop() {
    let rescheduler = AlarmRescheduler::new(RecordingStore::with(1, &[100, 200]));
    let outcome = rescheduler.reschedule(1, Some(1000), 900).unwrap();

    assert_eq!(outcome, RescheduleOutcome::Ignored(SkipReason::NotAdvanced));
    assert_eq!(rescheduler.store().reads(), 0);
    assert!(rescheduler.store().writes().is_empty());
}

#[test]
fn test_unchanged_due_date_is_a_noop() {
    let rescheduler = AlarmRescheduler::new(RecordingStore::with(1, &[100]));
    let outcome = rescheduler.reschedule(1, Some(1000), 1000).unwrap();
    assert_eq!(outcome, RescheduleOutcome::Ignored(SkipReason::NotAdvanced));
    assert_eq!(rescheduler.store().reads(), 0);
}

#[test]
fn test_cleared_due_date_is_a_noop() {
    let rescheduler = AlarmRescheduler::new(RecordingStore::with(1, &[100]));
    for new_due in [0, -5] {
        let outcome = rescheduler.reschedule(1, Some(1000), new_due).unwrap();
        assert_eq!(outcome, RescheduleOutcome::Ignored(SkipReason::NoNewDueDate));
    }
    assert_eq!(rescheduler.store().reads(), 0);
}

#[test]
fn test_empty_alarm_set_is_not_written() {
    let rescheduler = AlarmRescheduler::new(RecordingStore::default());
    let outcome = rescheduler.reschedule(9, Some(1000), 5000).unwrap();

    assert_eq!(outcome, RescheduleOutcome::NoAlarms);
    assert_eq!(rescheduler.store().reads(), 1);
    assert!(rescheduler.store().writes().is_empty());
}

#[test]
fn test_missing_old_due_date_uses_now() {
    let now = 1_750_000_000_000;
    let store = RecordingStore::with(3, &[now - 60_000, now + 120_000]);
    let rescheduler = AlarmRescheduler::with_clock(store, FixedClock(now));

    for old in [None, Some(0)] {
        let outcome = rescheduler.reschedule(3, old, now + 600).unwrap();
        let RescheduleOutcome::Shifted { delta, .. } = outcome else {
            panic!("expected a shift, got {:?}", outcome);
        };
        assert_eq!(delta, 600);
    }
    assert_eq!(
        rescheduler.store().writes()[0],
        (3, BTreeSet::from([now - 60_000 + 600, now + 120_000 + 600]))
    );
}

#[test]
fn test_missing_old_due_date_in_the_future_is_a_noop() {
    let now = 10_000;
    let rescheduler =
        AlarmRescheduler::with_clock(RecordingStore::with(3, &[1]), FixedClock(now));
    let outcome = rescheduler.reschedule(3, None, now - 1).unwrap();
    assert_eq!(outcome, RescheduleOutcome::Ignored(SkipReason::NotAdvanced));
}

#[test]
fn test_only_target_task_is_touched() {
    let store = MemoryStore::new()
        .with_alarms(1, [100, 200])
        .with_alarms(2, [100, 200]);
    let rescheduler = AlarmRescheduler::new(store);
    rescheduler.reschedule(1, Some(1000), 2000).unwrap();

    assert_eq!(
        rescheduler.store().get_alarms(1).unwrap(),
        BTreeSet::from([1100, 1200])
    );
    assert_eq!(
        rescheduler.store().get_alarms(2).unwrap(),
        BTreeSet::from([100, 200])
    );
}

#[test]
fn test_store_errors_surface() {
    let mut store = RecordingStore::with(1, &[100]);
    store.fail_writes = true;
    let rescheduler = AlarmRescheduler::new(store);

    let err = rescheduler.reschedule(1, Some(1000), 2000).unwrap_err();
    assert!(err.to_string().contains("disk full"));
    assert_eq!(
        rescheduler.store().get_alarms(1).unwrap(),
        BTreeSet::from([100])
    );
}

#[test]
fn test_read_errors_surface_without_a_write() {
    let mut store = RecordingStore::with(1, &[100]);
    store.fail_reads = true;
    let rescheduler = AlarmRescheduler::new(store);

    let err = rescheduler.reschedule(1, Some(1000), 2000).unwrap_err();
    assert_eq!(err.to_string(), "alarm table locked by another process");
    assert_eq!(rescheduler.store().reads(), 1);
    assert!(rescheduler.store().writes().is_empty());
}

#[test]
fn test_unrepresentable_delta_is_ignored() {
    let rescheduler = AlarmRescheduler::new(RecordingStore::with(1, &[100]));
    let outcome = rescheduler.reschedule(1, Some(-10), i64::MAX).unwrap();

    assert_eq!(outcome, RescheduleOutcome::Ignored(SkipReason::OutOfRange));
    assert_eq!(rescheduler.store().reads(), 0);
    assert!(rescheduler.store().writes().is_empty());
}

#[test]
fn test_pre_epoch_old_due_date_still_shifts() {
    let rescheduler = AlarmRescheduler::new(RecordingStore::with(1, &[-5_000]));
    let outcome = rescheduler.reschedule(1, Some(-1_000), 4_000).unwrap();
    assert_eq!(
        outcome,
        RescheduleOutcome::Shifted {
            delta: 5_000,
            alarms: BTreeSet::from([0]),
        }
    );
}

#[test]
fn test_overflowing_alarm_aborts_the_whole_shift() {
    let near_max = [i64::MAX - 20, i64::MAX - 10];
    let rescheduler = AlarmRescheduler::new(RecordingStore::with(1, &near_max));

    let err = rescheduler.reschedule(1, Some(1000), 1100).unwrap_err();
    assert!(err.to_string().contains("overflows"));
    assert!(rescheduler.store().writes().is_empty());
    assert_eq!(
        rescheduler.store().get_alarms(1).unwrap(),
        BTreeSet::from(near_max)
    );
}

#[test]
fn test_event_without_task_id_is_ignored() {
    let rescheduler = AlarmRescheduler::new(RecordingStore::with(1, &[100]));
    let event = RescheduleEvent {
        task_id: None,
        old_due_date: Some(1000),
        new_due_date: 2000,
    };
    assert_eq!(
        rescheduler.handle(&event).unwrap(),
        RescheduleOutcome::Ignored(SkipReason::MissingTaskId)
    );
    assert_eq!(rescheduler.store().reads(), 0);
}

#[test]
fn test_repeated_delivery_shifts_again() {
    // There is no "already processed" bookkeeping: a second delivery of the
    // same event shifts the alarms a second time.
    let rescheduler = AlarmRescheduler::new(MemoryStore::new().with_alarms(5, [100]));
    let event = RescheduleEvent::new(5, Some(1000), 1100);
    rescheduler.handle(&event).unwrap();
    rescheduler.handle(&event).unwrap();
    assert_eq!(
        rescheduler.store().get_alarms(5).unwrap(),
        BTreeSet::from([300])
    );
}
