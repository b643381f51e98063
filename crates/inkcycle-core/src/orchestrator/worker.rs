//! The scheduling worker and its submission handle.
//!
//! One tokio task owns the [`Scheduler`]. Callers reach it only through
//! [`OrchestratorHandle`], which enqueues an action on an unbounded FIFO
//! channel and waits on a oneshot for that action's own outcome.

use super::action::RefreshAction;
use super::scheduler::{sleep_for, Plan, Scheduler, SchedulerState};
use crate::error::{InkError, Result};
use crate::types::WriteOutcome;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shortest sleep between two autonomous cycles.
const MIN_SLEEP: Duration = Duration::from_secs(1);

struct Submission {
    id: Uuid,
    action: RefreshAction,
    reply: oneshot::Sender<Result<WriteOutcome>>,
}

// ---------------------------------------------------------------------------
// OrchestratorHandle
// ---------------------------------------------------------------------------

/// Cheap to clone; every clone feeds the same worker. The worker stops once
/// the last handle is dropped.
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<Submission>,
    state: watch::Receiver<SchedulerState>,
}

impl OrchestratorHandle {
    /// Enqueue `action` ahead of autonomous work and wait for its outcome.
    pub async fn submit(&self, action: RefreshAction) -> Result<WriteOutcome> {
        let rx = self.enqueue(action)?;
        rx.await.map_err(|_| InkError::SchedulerStopped)?
    }

    /// [`submit`](Self::submit) for callers outside the async runtime.
    /// Panics if called from within an async context.
    pub fn submit_blocking(&self, action: RefreshAction) -> Result<WriteOutcome> {
        let rx = self.enqueue(action)?;
        rx.blocking_recv().map_err(|_| InkError::SchedulerStopped)?
    }

    fn enqueue(&self, action: RefreshAction) -> Result<oneshot::Receiver<Result<WriteOutcome>>> {
        let (reply, rx) = oneshot::channel();
        let id = Uuid::new_v4();
        debug!(%id, %action, "submitting refresh");
        self.tx
            .send(Submission { id, action, reply })
            .map_err(|_| InkError::SchedulerStopped)?;
        Ok(rx)
    }

    /// Latest published scheduler state.
    pub fn state(&self) -> SchedulerState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }
}

// ---------------------------------------------------------------------------
// RefreshOrchestrator
// ---------------------------------------------------------------------------

pub struct RefreshOrchestrator;

impl RefreshOrchestrator {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(scheduler: Scheduler) -> (OrchestratorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = OrchestratorHandle {
            tx,
            state: scheduler.subscribe(),
        };
        let task = tokio::spawn(run(scheduler, rx));
        (handle, task)
    }
}

async fn run(mut scheduler: Scheduler, mut rx: mpsc::UnboundedReceiver<Submission>) {
    info!("refresh scheduler started");
    loop {
        match rx.try_recv() {
            Ok(submission) => {
                handle_submission(&mut scheduler, submission).await;
                continue;
            }
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        let plan = scheduler.autonomous_cycle().await;
        let now = scheduler.now();
        let idle_recheck = scheduler.store().read(|c| c.scheduler.idle_recheck());
        let sleep = sleep_for(plan, now, idle_recheck, MIN_SLEEP);
        match plan {
            Plan::Idle => {
                debug!(recheck_secs = sleep.as_secs(), "no active playlist; idle");
                scheduler.set_state(SchedulerState::Idle);
            }
            Plan::WakeAt(wake_at) => {
                debug!(%wake_at, "scheduled");
                scheduler.set_state(SchedulerState::Scheduled { wake_at });
            }
        }

        tokio::select! {
            biased;
            next = rx.recv() => match next {
                Some(submission) => handle_submission(&mut scheduler, submission).await,
                None => break,
            },
            _ = tokio::time::sleep(sleep) => {}
        }
    }
    info!("refresh scheduler stopped");
}

async fn handle_submission(scheduler: &mut Scheduler, submission: Submission) {
    let Submission { id, action, reply } = submission;
    let result = scheduler.process_action(&action).await;
    match &result {
        Ok(outcome) => info!(
            %id,
            %action,
            applied = outcome.is_applied(),
            hash = %outcome.image_hash(),
            "submitted refresh done"
        ),
        Err(e) => warn!(
            %id,
            %action,
            kind = e.kind(),
            plugin_id = e.plugin_id().unwrap_or(action.plugin_id()),
            error = %e,
            "submitted refresh failed"
        ),
    }
    if reply.send(result).is_err() {
        debug!(%id, "submitter went away before the outcome was ready");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::display::{DisplayManager, DisplayProfile, MockDevice};
    use crate::orchestrator::scheduler::tests::{base_config, instance, morning, providers, shade};
    use crate::orchestrator::{Clock, RefreshKind, RefreshRecord};
    use crate::playlist::Playlist;
    use crate::store::ConfigStore;
    use crate::types::TimeOfDay;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Wall clock that follows tokio's (pausable) timer.
    struct TokioClock {
        base: DateTime<Utc>,
        start: tokio::time::Instant,
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = chrono::Duration::from_std(self.start.elapsed()).unwrap();
            self.base + elapsed
        }
    }

    fn start(config: Config, at: DateTime<Utc>) -> (TempDir, OrchestratorHandle, MockDevice, Arc<ConfigStore>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::new(dir.path().join("device.yaml"), config));
        let mock = MockDevice::new();
        let profile = store.read(DisplayProfile::from_config);
        let display = DisplayManager::new(Box::new(mock.clone()), profile);
        let clock = Arc::new(TokioClock {
            base: at,
            start: tokio::time::Instant::now(),
        });
        let scheduler = Scheduler::new(store.clone(), display, providers(), clock);
        let (handle, _task) = RefreshOrchestrator::spawn(scheduler);
        (dir, handle, mock, store)
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    async fn scheduled_after(handle: &OrchestratorHandle, after: DateTime<Utc>) -> DateTime<Utc> {
        let mut rx = handle.subscribe();
        let state = rx
            .wait_for(|s| matches!(s, SchedulerState::Scheduled { wake_at } if *wake_at > after))
            .await
            .unwrap()
            .clone();
        match state {
            SchedulerState::Scheduled { wake_at } => wake_at,
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_interrupts_sleep() {
        let (_dir, handle, mock, _store) = start(base_config(vec![morning()]), at(6, 5));

        // First cycle draws A, then the worker sleeps until 06:15.
        assert_eq!(scheduled_after(&handle, at(6, 5)).await, at(6, 15));
        assert_eq!(mock.write_count(), 1);

        let began = tokio::time::Instant::now();
        let outcome = handle
            .submit(RefreshAction::ManualRefresh {
                plugin_id: "clock".into(),
                settings: shade(200),
            })
            .await
            .unwrap();

        assert!(outcome.is_applied());
        assert!(began.elapsed() < Duration::from_secs(1));
        assert_eq!(mock.frames().last().map(String::as_str), Some(outcome.image_hash()));
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_continues_after_dwell() {
        let (_dir, handle, mock, store) = start(base_config(vec![morning()]), at(6, 5));
        scheduled_after(&handle, at(6, 5)).await;
        assert_eq!(mock.write_count(), 1);

        // The dwell expires at 06:15; B is drawn and A waits for 06:25.
        tokio::time::sleep(Duration::from_secs(601)).await;
        scheduled_after(&handle, at(6, 20)).await;

        let record = store.get_refresh_record().unwrap();
        assert_eq!(record.plugin_instance.as_deref(), Some("B"));
        assert_eq!(mock.write_count(), 2);
    }

    #[tokio::test]
    async fn concurrent_submissions_get_their_own_outcomes_in_order() {
        let (_dir, handle, mock, _store) = start(base_config(vec![]), at(12, 0));

        let mut tasks = Vec::new();
        for i in 0..5u64 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let plugin_id = if i == 2 { "weather" } else { "clock" };
                handle
                    .submit(RefreshAction::ManualRefresh {
                        plugin_id: plugin_id.into(),
                        settings: shade(i * 40),
                    })
                    .await
            }));
        }

        let mut applied = Vec::new();
        for (i, task) in tasks.into_iter().enumerate() {
            let result = task.await.unwrap();
            if i == 2 {
                assert!(result.unwrap_err().is_not_found());
            } else {
                applied.push(result.unwrap().image_hash().to_string());
            }
        }
        assert_eq!(mock.frames(), applied);
        assert_eq!(mock.max_concurrent(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_without_active_playlist() {
        let night = Playlist::new("Night", "22:00".parse().unwrap(), "06:00".parse().unwrap());
        let (_dir, handle, mock, _store) = start(base_config(vec![night]), at(12, 0));
        // Several idle re-checks pass without any write.
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(handle.state(), SchedulerState::Idle);
        assert_eq!(mock.write_count(), 0);
    }

    #[tokio::test]
    async fn huge_intervals_do_not_stop_the_worker() {
        const FOREVER: u64 = 10_000_000_000_000;
        let mut playlist = Playlist::new("All", TimeOfDay::MIDNIGHT, TimeOfDay::END_OF_DAY);
        let mut drawn = instance("shade", "A", 10, FOREVER);
        drawn.latest_refresh_time = Some(at(11, 0));
        playlist.plugins.push(drawn);
        let mut config = base_config(vec![playlist]);
        config.scheduler.plugin_cycle_interval_seconds = FOREVER;
        config.scheduler.max_sleep_seconds = FOREVER;
        config.refresh_info = Some(RefreshRecord {
            refresh_time: at(11, 0),
            image_hash: "old".into(),
            refresh_type: RefreshKind::Playlist,
            plugin_id: "shade".into(),
            playlist: Some("All".into()),
            plugin_instance: Some("A".into()),
        });
        let (_dir, handle, mock, _store) = start(config, at(12, 0));

        scheduled_after(&handle, at(12, 0)).await;
        for value in [1, 2] {
            let outcome = handle
                .submit(RefreshAction::ManualRefresh {
                    plugin_id: "clock".into(),
                    settings: shade(value),
                })
                .await
                .unwrap();
            assert!(outcome.is_applied());
        }
        assert_eq!(mock.write_count(), 2);
    }

    #[tokio::test]
    async fn worker_stops_when_handles_drop() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::new(
            dir.path().join("device.yaml"),
            base_config(vec![]),
        ));
        let display = DisplayManager::new(Box::new(MockDevice::new()), DisplayProfile::default());
        let scheduler = Scheduler::new(store, display, providers(), Arc::new(crate::orchestrator::SystemClock));
        let (handle, task) = RefreshOrchestrator::spawn(scheduler);
        drop(handle);
        task.await.unwrap();
    }

    #[test]
    fn blocking_submit_from_plain_thread() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (_dir, handle, _mock, _store) =
            runtime.block_on(async { start(base_config(vec![]), at(12, 0)) });
        let outcome = std::thread::spawn(move || {
            handle.submit_blocking(RefreshAction::ManualRefresh {
                plugin_id: "clock".into(),
                settings: shade(3),
            })
        })
        .join()
        .unwrap()
        .unwrap();
        assert!(outcome.is_applied());
    }
}
