// File: ./src/system.rs
use crate::alarm::{AlarmRescheduler, Clock, RescheduleEvent};
use crate::config::Config;
use crate::store::AlarmStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Installs a stderr logger at the configured level.
/// Returns false if a logger was already set.
pub fn init_logging(config: &Config) -> bool {
    simplelog::SimpleLogger::init(config.level_filter(), simplelog::Config::default()).is_ok()
}

/// Spawns the background reschedule actor.
/// returns: Sender for due-date change events, and the actor's handle, which
/// completes once every sender is dropped and the queue is drained.
///
/// Events are processed one at a time. Store failures are logged and the
/// event is dropped.
pub fn spawn_reschedule_actor<S, C>(
    rescheduler: AlarmRescheduler<S, C>,
    config: &Config,
) -> (mpsc::Sender<RescheduleEvent>, JoinHandle<()>)
where
    S: AlarmStore + 'static,
    C: Clock + 'static,
{
    let (tx, mut rx) = mpsc::channel::<RescheduleEvent>(32);
    let enabled = config.reschedule_alarms;
    let rescheduler = Arc::new(rescheduler);

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !enabled {
                log::debug!("Alarm rescheduling disabled, dropping {:?}", event);
                continue;
            }

            // Store IO is blocking; keep it off the runtime threads.
            let worker = rescheduler.clone();
            match tokio::task::spawn_blocking(move || worker.handle(&event)).await {
                Ok(Ok(outcome)) => log::debug!("{:?} -> {:?}", event, outcome),
                Ok(Err(e)) => log::warn!(
                    "Failed to reschedule alarms for task {:?}: {:#}",
                    event.task_id,
                    e
                ),
                Err(e) => log::error!("Reschedule worker panicked: {}", e),
            }
        }
    });

    (tx, handle)
}
