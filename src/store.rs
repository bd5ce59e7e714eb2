// File: src/store.rs
//! Store seams consumed by the rescheduler and the editing session.
//!
//! A task's alarm set is one unit of update: `synchronize_alarms` replaces
//! the whole set for that task and nothing else. Implementations must be
//! safe to call concurrently for different task ids.
use crate::model::Task;
use anyhow::{Result, anyhow};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub trait AlarmStore: Send + Sync {
    /// Absolute alarm timestamps (epoch ms) currently stored for the task.
    fn get_alarms(&self, task_id: i64) -> Result<BTreeSet<i64>>;

    /// Atomically replaces the task's alarm set with `alarms`.
    fn synchronize_alarms(&self, task_id: i64, alarms: &BTreeSet<i64>) -> Result<()>;
}

pub trait TaskStore: Send + Sync {
    fn get_task(&self, id: i64) -> Result<Option<Task>>;
    fn save_task(&self, task: &Task) -> Result<()>;
}

impl<T: AlarmStore + ?Sized> AlarmStore for Arc<T> {
    fn get_alarms(&self, task_id: i64) -> Result<BTreeSet<i64>> {
        (**self).get_alarms(task_id)
    }

    fn synchronize_alarms(&self, task_id: i64, alarms: &BTreeSet<i64>) -> Result<()> {
        (**self).synchronize_alarms(task_id, alarms)
    }
}

impl<T: TaskStore + ?Sized> TaskStore for Arc<T> {
    fn get_task(&self, id: i64) -> Result<Option<Task>> {
        (**self).get_task(id)
    }

    fn save_task(&self, task: &Task) -> Result<()> {
        (**self).save_task(task)
    }
}

/// In-process store keyed by task id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    alarms: Mutex<HashMap<i64, BTreeSet<i64>>>,
    tasks: Mutex<HashMap<i64, Task>>,
}

fn lock<'a, T>(m: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    m.lock().map_err(|_| anyhow!("{} lock poisoned", what))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alarms(mut self, task_id: i64, alarms: impl IntoIterator<Item = i64>) -> Self {
        self.alarms
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id, alarms.into_iter().collect());
        self
    }
}

impl AlarmStore for MemoryStore {
    fn get_alarms(&self, task_id: i64) -> Result<BTreeSet<i64>> {
        let table = lock(&self.alarms, "alarm table")?;
        Ok(table.get(&task_id).cloned().unwrap_or_default())
    }

    fn synchronize_alarms(&self, task_id: i64, alarms: &BTreeSet<i64>) -> Result<()> {
        let mut table = lock(&self.alarms, "alarm table")?;
        if alarms.is_empty() {
            table.remove(&task_id);
        } else {
            table.insert(task_id, alarms.clone());
        }
        Ok(())
    }
}

impl TaskStore for MemoryStore {
    fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let tasks = lock(&self.tasks, "task table")?;
        Ok(tasks.get(&id).cloned())
    }

    fn save_task(&self, task: &Task) -> Result<()> {
        let mut tasks = lock(&self.tasks, "task table")?;
        tasks.insert(task.id, task.clone());
        Ok(())
    }
}
