// Manages local JSON file storage for tasks and their alarm sets.
//
// ⚠️ VERSION BUMP REQUIRED:
// Changes to the Task struct or the on-disk alarm table require incrementing
// LOCAL_STORAGE_VERSION below.
use crate::context::AppContext;
use crate::model::Task;
use crate::store::{AlarmStore, TaskStore};
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

// Version history:
// - v1: tasks.json (list of tasks) and alarms.json (task id -> timestamps)
const LOCAL_STORAGE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Default)]
struct TaskFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    tasks: Vec<Task>,
}

#[derive(Serialize, Deserialize, Default)]
struct AlarmFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    alarms: BTreeMap<i64, BTreeSet<i64>>,
}

/// File-backed implementation of both store traits.
///
/// Every mutation is lock -> load -> modify -> atomic write -> unlock, so a
/// reader never sees a half-written alarm set. A file that exists but cannot
/// be parsed is reported as an error and never overwritten.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    tasks_path: PathBuf,
    alarms_path: PathBuf,
}

impl LocalStorage {
    pub fn new(ctx: &dyn AppContext) -> Result<Self> {
        Ok(Self {
            tasks_path: ctx.get_tasks_path()?,
            alarms_path: ctx.get_alarms_path()?,
        })
    }

    /// `alarms.json` locks through `alarms.json.lock` next to it.
    fn lock_path_for(file_path: &Path) -> PathBuf {
        let mut name = file_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Runs `f` while holding an exclusive lock on `file_path`'s lock file.
    /// Other processes using the same data directory block until `f` returns.
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::lock_path_for(file_path);
        let lock_file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Cannot open lock {:?}", lock_path))?;
        lock_file
            .lock_exclusive()
            .with_context(|| format!("Cannot acquire lock {:?}", lock_path))?;

        let outcome = f();
        FileExt::unlock(&lock_file)
            .with_context(|| format!("Cannot release lock {:?}", lock_path))?;
        outcome
    }

    /// Replaces `path` with `contents` via a sibling `<name>.tmp` and a rename,
    /// so readers see either the old file or the new one.
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        fs::write(&tmp_path, contents).with_context(|| format!("Cannot write {:?}", tmp_path))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Cannot move {:?} into place", tmp_path))
    }

    /// Reads a versioned file without locking. Missing files load as default.
    fn read_unlocked<D: DeserializeOwned + Default>(path: &Path) -> Result<D> {
        if !path.exists() {
            return Ok(D::default());
        }
        let json = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse {:?}", path))
    }

    fn read<D: DeserializeOwned + Default>(path: &Path) -> Result<D> {
        Self::with_lock(path, || Self::read_unlocked(path))
    }

    fn modify<D, F>(path: &Path, f: F) -> Result<()>
    where
        D: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut D),
    {
        Self::with_lock(path, || {
            let mut data: D = Self::read_unlocked(path)?;
            f(&mut data);
            let json = serde_json::to_string_pretty(&data)?;
            Self::atomic_write(path, json)
        })
    }

    pub fn load_tasks(&self) -> Result<Vec<Task>> {
        let file: TaskFile = Self::read(&self.tasks_path)?;
        Ok(file.tasks)
    }
}

impl TaskStore for LocalStorage {
    fn get_task(&self, id: i64) -> Result<Option<Task>> {
        Ok(self.load_tasks()?.into_iter().find(|t| t.id == id))
    }

    fn save_task(&self, task: &Task) -> Result<()> {
        Self::modify(&self.tasks_path, |file: &mut TaskFile| {
            file.version = LOCAL_STORAGE_VERSION;
            match file.tasks.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => *existing = task.clone(),
                None => file.tasks.push(task.clone()),
            }
        })
        .with_context(|| format!("Failed to save task {}", task.id))
    }
}

impl AlarmStore for LocalStorage {
    fn get_alarms(&self, task_id: i64) -> Result<BTreeSet<i64>> {
        let file: AlarmFile = Self::read(&self.alarms_path)
            .with_context(|| format!("Failed to load alarms for task {}", task_id))?;
        Ok(file.alarms.get(&task_id).cloned().unwrap_or_default())
    }

    fn synchronize_alarms(&self, task_id: i64, alarms: &BTreeSet<i64>) -> Result<()> {
        Self::modify(&self.alarms_path, |file: &mut AlarmFile| {
            file.version = LOCAL_STORAGE_VERSION;
            if alarms.is_empty() {
                file.alarms.remove(&task_id);
            } else {
                file.alarms.insert(task_id, alarms.clone());
            }
        })
        .with_context(|| format!("Failed to synchronize alarms for task {}", task_id))?;
        log::debug!("Stored {} alarm(s) for task {}", alarms.len(), task_id);
        Ok(())
    }
}
