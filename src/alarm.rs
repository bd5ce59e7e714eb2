// File: ./src/alarm.rs
// Keeps a task's alarms at the same offset from its due date when recurrence
// pushes the due date forward.
use crate::store::AlarmStore;
use anyhow::{Result, bail};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Source of "now" for events that don't carry the previous due date.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// "This task's due date was moved by recurrence."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleEvent {
    pub task_id: Option<i64>,
    /// Absent or 0 when the task had no due date before.
    #[serde(default)]
    pub old_due_date: Option<i64>,
    pub new_due_date: i64,
}

impl RescheduleEvent {
    pub fn new(task_id: i64, old_due_date: Option<i64>, new_due_date: i64) -> Self {
        Self {
            task_id: Some(task_id),
            old_due_date,
            new_due_date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingTaskId,
    NoNewDueDate,
    /// The due date stayed put or moved earlier. Alarms only ever move forward.
    NotAdvanced,
    /// The distance between the two due dates does not fit in an `i64`.
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescheduleOutcome {
    /// The event was filtered out before touching the store.
    Ignored(SkipReason),
    /// The task had no alarms; nothing was written.
    NoAlarms,
    Shifted { delta: i64, alarms: BTreeSet<i64> },
}

/// Every alarm moved by `delta`, or `None` if any of them would overflow.
pub fn shift_alarms(alarms: &BTreeSet<i64>, delta: i64) -> Option<BTreeSet<i64>> {
    alarms.iter().map(|t| t.checked_add(delta)).collect()
}

pub struct AlarmRescheduler<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: AlarmStore> AlarmRescheduler<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: SystemClock,
        }
    }
}

impl<S: AlarmStore, C: Clock> AlarmRescheduler<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Shifts the task's alarms by `new_due_date - old_due_date`.
    ///
    /// A missing or zero `old_due_date` is read as now. Events that don't move
    /// the due date forward are ignored without reading the store, and an
    /// empty alarm set is never written back. Store errors are returned as-is;
    /// there is no retry and no record of processed events. If any alarm would
    /// overflow, an error is returned and the stored set is left untouched.
    pub fn reschedule(
        &self,
        task_id: i64,
        old_due_date: Option<i64>,
        new_due_date: i64,
    ) -> Result<RescheduleOutcome> {
        let old_due_date = match old_due_date {
            Some(d) if d != 0 => d,
            _ => self.clock.now_millis(),
        };

        if new_due_date <= 0 {
            return Ok(RescheduleOutcome::Ignored(SkipReason::NoNewDueDate));
        }
        if new_due_date <= old_due_date {
            log::debug!(
                "Task {}: due date did not advance ({} -> {}), alarms left alone",
                task_id,
                old_due_date,
                new_due_date
            );
            return Ok(RescheduleOutcome::Ignored(SkipReason::NotAdvanced));
        }

        let Some(delta) = new_due_date.checked_sub(old_due_date) else {
            log::warn!(
                "Task {}: due date change {} -> {} is out of range",
                task_id,
                old_due_date,
                new_due_date
            );
            return Ok(RescheduleOutcome::Ignored(SkipReason::OutOfRange));
        };
        let current = self.store.get_alarms(task_id)?;
        if current.is_empty() {
            return Ok(RescheduleOutcome::NoAlarms);
        }
        let Some(shifted) = shift_alarms(&current, delta) else {
            bail!(
                "Task {}: shifting {} alarm(s) by {} ms overflows",
                task_id,
                current.len(),
                delta
            );
        };

        self.store.synchronize_alarms(task_id, &shifted)?;
        log::info!(
            "Task {}: shifted {} alarm(s) by {} ms",
            task_id,
            shifted.len(),
            delta
        );
        Ok(RescheduleOutcome::Shifted {
            delta,
            alarms: shifted,
        })
    }

    pub fn handle(&self, event: &RescheduleEvent) -> Result<RescheduleOutcome> {
        match event.task_id {
            Some(id) => self.reschedule(id, event.old_due_date, event.new_due_date),
            None => Ok(RescheduleOutcome::Ignored(SkipReason::MissingTaskId)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_keeps_every_alarm() {
        let alarms = BTreeSet::from([100, 200]);
        assert_eq!(shift_alarms(&alarms, 50), Some(BTreeSet::from([150, 250])));
        assert_eq!(shift_alarms(&BTreeSet::new(), 50), Some(BTreeSet::new()));
    }

    #[test]
    fn test_shift_refuses_to_overflow() {
        let near_max = BTreeSet::from([i64::MAX - 20, i64::MAX - 10]);
        assert_eq!(shift_alarms(&near_max, 100), None);
        assert_eq!(
            shift_alarms(&near_max, 10),
            Some(BTreeSet::from([i64::MAX - 10, i64::MAX]))
        );
    }

    #[test]
    fn test_event_serde_defaults_old_due_date() {
        let event: RescheduleEvent =
            serde_json::from_str(r#"{"task_id": 4, "new_due_date": 1500}"#).unwrap();
        assert_eq!(event, RescheduleEvent::new(4, None, 1500));
    }
}
