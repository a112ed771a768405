// Run Monitor
// Dispatches the autobuild workflow and follows the resulting run
//
// State machine:
//   Idle -> Dispatched -> Located -> Polling -> Completed
//   any state -> Errored (dispatch rejected, run not found)
//
// State lives in a watch channel; every transition is a single replace, so
// observers never see a half-written record. The poll loop is one spawned
// task. Ticks never overlap: a tick that finds another in flight is skipped.
// Stopping, resetting, dispatching and attaching bump a generation counter; a
// tick only publishes its result if the generation it started under is still
// current.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{AutobuildError, AutobuildResult};
use crate::models::{ArtifactOutcome, DispatchPayload, DispatchRequest, RepoCredentials, WorkflowRun};
use crate::services::github::GithubApi;
use crate::utils::flag_guard::FlagGuard;

/// Wait between dispatch and looking up the new run
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Interval between status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Timing knobs for the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub settle_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Lifecycle of the current run
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorState {
    Idle,
    Dispatched {
        release_tag: String,
    },
    Located {
        run: WorkflowRun,
    },
    Polling {
        run: WorkflowRun,
    },
    Completed {
        run: WorkflowRun,
        artifacts: ArtifactOutcome,
    },
    Errored {
        message: String,
    },
}

impl MonitorState {
    pub fn name(&self) -> &'static str {
        match self {
            MonitorState::Idle => "idle",
            MonitorState::Dispatched { .. } => "dispatched",
            MonitorState::Located { .. } => "located",
            MonitorState::Polling { .. } => "polling",
            MonitorState::Completed { .. } => "completed",
            MonitorState::Errored { .. } => "errored",
        }
    }

    /// The run being followed, if one has been located
    pub fn run(&self) -> Option<&WorkflowRun> {
        match self {
            MonitorState::Located { run }
            | MonitorState::Polling { run }
            | MonitorState::Completed { run, .. } => Some(run),
            _ => None,
        }
    }

    /// No further transitions without a new dispatch
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MonitorState::Completed { .. } | MonitorState::Errored { .. }
        )
    }
}

/// What a single poll tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was in flight
    Skipped,
    /// No run located yet
    NoRun,
    /// Run fetched and still running
    Updated,
    /// Run completed and artifacts have been enumerated
    Completed,
    /// Status fetch failed; state untouched, polling continues
    TransientFailure,
    /// The monitor was stopped or redirected mid-tick; result discarded
    Superseded,
}

/// State shared between the monitor and its poll task
struct MonitorShared<A: GithubApi + ?Sized> {
    api: Arc<A>,
    repo: RepoCredentials,
    state_tx: watch::Sender<MonitorState>,
    tick_in_flight: AtomicBool,
    generation: AtomicU64,
}

impl<A: GithubApi + ?Sized> MonitorShared<A> {
    fn set_state(&self, state: MonitorState) {
        log::debug!("[run-monitor] -> {}", state.name());
        self.state_tx.send_replace(state);
    }

    /// Invalidate every tick started before this call
    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Publish `state` only if no stop or redirect happened since `generation`.
    ///
    /// The check runs under the channel's write lock, so a concurrent
    /// transition either lands after this write or makes it a no-op.
    fn set_state_if_current(&self, generation: u64, state: MonitorState) -> bool {
        let name = state.name();
        let published = self.state_tx.send_if_modified(|current| {
            if self.generation.load(Ordering::Acquire) != generation {
                return false;
            }
            *current = state;
            true
        });
        if published {
            log::debug!("[run-monitor] -> {}", name);
        } else {
            log::debug!("[run-monitor] Discarding stale tick result ({})", name);
        }
        published
    }

    fn fail(&self, err: AutobuildError) -> AutobuildError {
        log::error!("[run-monitor] {}", err);
        self.set_state(MonitorState::Errored {
            message: err.to_string(),
        });
        err
    }

    async fn tick(&self) -> TickOutcome {
        let Some(_guard) = FlagGuard::try_acquire(&self.tick_in_flight) else {
            log::debug!("[run-monitor] Previous tick still in flight, skipping");
            return TickOutcome::Skipped;
        };
        let generation = self.generation.load(Ordering::Acquire);

        let run_id = {
            let state = self.state_tx.borrow();
            if matches!(*state, MonitorState::Completed { .. }) {
                return TickOutcome::Completed;
            }
            match state.run() {
                Some(run) => run.id,
                None => return TickOutcome::NoRun,
            }
        };

        let run = match self.api.get_workflow_run(&self.repo, run_id).await {
            Ok(run) => run,
            Err(e) => {
                log::warn!("[run-monitor] Status check for run {} failed: {}", run_id, e);
                return TickOutcome::TransientFailure;
            }
        };

        if !run.is_completed() {
            log::debug!("[run-monitor] Run {} is {}", run.id, run.status.as_str());
            if !self.set_state_if_current(generation, MonitorState::Polling { run }) {
                return TickOutcome::Superseded;
            }
            return TickOutcome::Updated;
        }

        log::info!("[run-monitor] Run {} finished: {}", run.id, run.display_label());

        let artifacts = match self.api.list_artifacts(&self.repo, run.id).await {
            Ok(list) => ArtifactOutcome::from_list(list),
            Err(e) => {
                log::warn!("[run-monitor] Could not list artifacts for run {}: {}", run.id, e);
                ArtifactOutcome::Unavailable(e.to_string())
            }
        };

        if !self.set_state_if_current(generation, MonitorState::Completed { run, artifacts }) {
            return TickOutcome::Superseded;
        }
        TickOutcome::Completed
    }
}

/// Follows one workflow run at a time for one repository
pub struct RunMonitor<A: GithubApi + ?Sized> {
    shared: Arc<MonitorShared<A>>,
    config: MonitorConfig,
    git_ref: String,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl<A: GithubApi + ?Sized + 'static> RunMonitor<A> {
    pub fn new(
        api: Arc<A>,
        repo: RepoCredentials,
        git_ref: impl Into<String>,
        config: MonitorConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(MonitorState::Idle);
        Self {
            shared: Arc::new(MonitorShared {
                api,
                repo,
                state_tx,
                tick_in_flight: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
            config,
            git_ref: git_ref.into(),
            poll_task: Mutex::new(None),
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> MonitorState {
        self.shared.state_tx.borrow().clone()
    }

    /// Receive every state transition
    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.shared.state_tx.subscribe()
    }

    /// Trigger the workflow for `request` and locate the run it created.
    ///
    /// Any running poll loop is stopped first. After the settle delay the
    /// most recent run of the workflow is taken as ours; concurrent
    /// dispatches from elsewhere can make that the wrong run.
    pub async fn dispatch(&self, request: &DispatchRequest) -> AutobuildResult<WorkflowRun> {
        self.stop_polling();

        self.shared.set_state(MonitorState::Dispatched {
            release_tag: request.release_tag.clone(),
        });

        log::info!(
            "[run-monitor] Dispatching workflow on {} (mode={}, release_tag={}, keep_artifacts={})",
            self.shared.repo.slug(),
            request.mode,
            request.release_tag,
            request.keep_artifacts
        );

        let payload = DispatchPayload::new(&self.git_ref, request);
        if let Err(e) = self.shared.api.dispatch_workflow(&self.shared.repo, &payload).await {
            return Err(self.shared.fail(e));
        }

        tokio::time::sleep(self.config.settle_delay).await;

        match self.shared.api.latest_workflow_run(&self.shared.repo).await {
            Ok(Some(run)) => {
                log::info!("[run-monitor] Located run #{} ({})", run.run_number, run.id);
                self.shared
                    .set_state(MonitorState::Located { run: run.clone() });
                Ok(run)
            }
            Ok(None) => Err(self.shared.fail(AutobuildError::RunLookup {
                message: "No workflow run found".to_string(),
            })),
            Err(e) => Err(self.shared.fail(e)),
        }
    }

    /// Follow an existing run by id without dispatching
    pub async fn attach(&self, run_id: u64) -> AutobuildResult<WorkflowRun> {
        self.stop_polling();
        let run = self.shared.api.get_workflow_run(&self.shared.repo, run_id).await?;
        self.shared
            .set_state(MonitorState::Located { run: run.clone() });
        Ok(run)
    }

    /// Start the poll loop for the located run.
    ///
    /// The first tick runs immediately, then one every poll interval. The
    /// loop ends by itself once the run completes.
    pub fn start_polling(&self) -> AutobuildResult<()> {
        let run = match self.state() {
            MonitorState::Located { run } | MonitorState::Polling { run } => run,
            MonitorState::Completed { .. } => return Ok(()),
            other => {
                return Err(AutobuildError::RunLookup {
                    message: format!("No workflow run to poll (state: {})", other.name()),
                })
            }
        };

        self.stop_polling();
        self.shared.set_state(MonitorState::Polling { run });

        let shared = self.shared.clone();
        let period = self.config.poll_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                match shared.tick().await {
                    TickOutcome::Completed | TickOutcome::Superseded => break,
                    _ => {}
                }
            }

            log::debug!("[run-monitor] Poll loop finished");
        });

        *self.lock_task() = Some(handle);
        Ok(())
    }

    /// Cancel the poll loop. Safe to call at any time, any number of times.
    ///
    /// A tick already in flight, from the loop or from [`RunMonitor::poll_tick`],
    /// finishes without touching the state.
    pub fn stop_polling(&self) {
        self.shared.bump_generation();
        if let Some(handle) = self.lock_task().take() {
            if !handle.is_finished() {
                log::debug!("[run-monitor] Stopping poll loop");
            }
            handle.abort();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.lock_task()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Run one status check now, subject to the same overlap guard as the loop
    pub async fn poll_tick(&self) -> TickOutcome {
        self.shared.tick().await
    }

    /// Wait until the run completes or the monitor errors.
    ///
    /// Only resolves if something drives the state forward (the poll loop or
    /// manual ticks).
    pub async fn wait_for_completion(&self) -> MonitorState {
        let mut rx = self.subscribe();
        let result = rx.wait_for(MonitorState::is_terminal).await;
        match result {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Stop polling and forget the current run
    pub fn reset(&self) {
        self.stop_polling();
        self.shared.set_state(MonitorState::Idle);
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poll_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<A: GithubApi + ?Sized> Drop for RunMonitor<A> {
    fn drop(&mut self) {
        let slot = self
            .poll_task
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunConclusion, RunStatus};
    use crate::services::github::fake::{artifact, run, FakeGithub};
    use tokio::sync::Semaphore;

    fn monitor(api: Arc<FakeGithub>) -> RunMonitor<FakeGithub> {
        RunMonitor::new(
            api,
            RepoCredentials::new("o", "r", "ghp_x"),
            "main",
            MonitorConfig::default(),
        )
    }

    fn request() -> DispatchRequest {
        DispatchRequest {
            mode: "quick".to_string(),
            release_tag: "task-a-1".to_string(),
            keep_artifacts: true,
        }
    }

    fn three_tick_script() -> Vec<Result<WorkflowRun, String>> {
        vec![
            Ok(run(1, RunStatus::Pending, None)),
            Ok(run(1, RunStatus::InProgress, None)),
            Ok(run(1, RunStatus::Completed, Some(RunConclusion::Success))),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_locates_latest_run() {
        let api = Arc::new(FakeGithub::default());
        let monitor = monitor(api.clone());

        let located = monitor.dispatch(&request()).await.unwrap();
        assert_eq!(located.id, 1);
        assert!(matches!(monitor.state(), MonitorState::Located { .. }));

        let payloads = api.dispatches.lock().unwrap();
        assert_eq!(payloads[0].git_ref, "main");
        assert_eq!(payloads[0].inputs.keep_artifacts, "true");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_rejection_errors() {
        let api = Arc::new(FakeGithub::default());
        *api.dispatch_error.lock().unwrap() = Some("Not Found".to_string());
        let monitor = monitor(api.clone());

        let err = monitor.dispatch(&request()).await.unwrap_err();
        assert!(matches!(err, AutobuildError::Dispatch { .. }));
        assert_eq!(
            monitor.state(),
            MonitorState::Errored {
                message: "Failed to trigger workflow: Not Found".to_string()
            }
        );
        assert_eq!(api.count("latest_workflow_run"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_run_found_is_lookup_error() {
        let api = Arc::new(FakeGithub::default());
        *api.latest_run.lock().unwrap() = None;
        let monitor = monitor(api);

        let err = monitor.dispatch(&request()).await.unwrap_err();
        assert!(matches!(err, AutobuildError::RunLookup { .. }));
        assert!(monitor.state().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_artifacts_enumerated_once_after_completion() {
        let api = Arc::new(FakeGithub::default());
        api.script_runs(three_tick_script());
        *api.artifacts.lock().unwrap() = Ok(vec![artifact(9, "build-output")]);
        let monitor = monitor(api.clone());
        monitor.dispatch(&request()).await.unwrap();

        assert_eq!(monitor.poll_tick().await, TickOutcome::Updated);
        assert_eq!(monitor.poll_tick().await, TickOutcome::Updated);
        assert_eq!(api.count("list_artifacts"), 0);

        assert_eq!(monitor.poll_tick().await, TickOutcome::Completed);
        assert_eq!(api.count("list_artifacts"), 1);

        // Later ticks are no-ops
        assert_eq!(monitor.poll_tick().await, TickOutcome::Completed);
        assert_eq!(api.count("list_artifacts"), 1);
        assert_eq!(api.count("get_workflow_run"), 3);

        match monitor.state() {
            MonitorState::Completed { run, artifacts } => {
                assert_eq!(run.conclusion, Some(RunConclusion::Success));
                assert!(matches!(artifacts, ArtifactOutcome::Produced(list) if list.len() == 1));
            }
            other => panic!("Expected Completed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_runs_to_completion() {
        let api = Arc::new(FakeGithub::default());
        api.script_runs(three_tick_script());
        let monitor = monitor(api.clone());
        monitor.dispatch(&request()).await.unwrap();

        let mut rx = monitor.subscribe();
        monitor.start_polling().unwrap();
        assert!(matches!(*rx.borrow_and_update(), MonitorState::Polling { .. }));

        let finished = monitor.wait_for_completion().await;
        assert!(matches!(finished, MonitorState::Completed { .. }));
        assert_eq!(api.count("get_workflow_run"), 3);
        assert_eq!(api.count("list_artifacts"), 1);

        tokio::task::yield_now().await;
        assert!(!monitor.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_artifacts_is_empty_outcome() {
        let api = Arc::new(FakeGithub::default());
        api.script_runs(vec![Ok(run(1, RunStatus::Completed, Some(RunConclusion::Failure)))]);
        let monitor = monitor(api);
        monitor.dispatch(&request()).await.unwrap();

        assert_eq!(monitor.poll_tick().await, TickOutcome::Completed);
        match monitor.state() {
            MonitorState::Completed { artifacts, .. } => {
                assert_eq!(artifacts, ArtifactOutcome::Empty)
            }
            other => panic!("Expected Completed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_artifact_listing_failure_is_unavailable() {
        let api = Arc::new(FakeGithub::default());
        api.script_runs(vec![Ok(run(1, RunStatus::Completed, Some(RunConclusion::Success)))]);
        *api.artifacts.lock().unwrap() = Err("Server Error".to_string());
        let monitor = monitor(api);
        monitor.dispatch(&request()).await.unwrap();

        monitor.poll_tick().await;
        match monitor.state() {
            MonitorState::Completed { artifacts, .. } => {
                assert!(matches!(artifacts, ArtifactOutcome::Unavailable(_)))
            }
            other => panic!("Expected Completed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_keeps_polling() {
        let api = Arc::new(FakeGithub::default());
        api.script_runs(vec![
            Ok(run(1, RunStatus::InProgress, None)),
            Err("502 Bad Gateway".to_string()),
            Ok(run(1, RunStatus::Completed, Some(RunConclusion::Success))),
        ]);
        let monitor = monitor(api);
        monitor.dispatch(&request()).await.unwrap();

        assert_eq!(monitor.poll_tick().await, TickOutcome::Updated);
        assert_eq!(monitor.poll_tick().await, TickOutcome::TransientFailure);
        assert!(matches!(monitor.state(), MonitorState::Polling { .. }));
        assert_eq!(monitor.poll_tick().await, TickOutcome::Completed);
    }

    #[tokio::test]
    async fn test_stop_polling_while_idle_is_noop() {
        let monitor = monitor(Arc::new(FakeGithub::default()));
        monitor.stop_polling();
        monitor.stop_polling();
        assert!(!monitor.is_polling());
        assert_eq!(monitor.state(), MonitorState::Idle);
        assert_eq!(monitor.poll_tick().await, TickOutcome::NoRun);
    }

    #[tokio::test]
    async fn test_start_polling_requires_a_run() {
        let monitor = monitor(Arc::new(FakeGithub::default()));
        assert!(monitor.start_polling().is_err());
        assert!(!monitor.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_tick_is_skipped() {
        let api = Arc::new(FakeGithub::default());
        api.script_runs(vec![Ok(run(1, RunStatus::InProgress, None))]);
        let gate = Arc::new(Semaphore::new(0));
        let monitor = Arc::new(monitor(api.clone()));
        monitor.dispatch(&request()).await.unwrap();
        *api.run_gate.lock().unwrap() = Some(gate.clone());

        let first = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.poll_tick().await })
        };
        while api.count("get_workflow_run") == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(monitor.poll_tick().await, TickOutcome::Skipped);
        assert_eq!(api.count("get_workflow_run"), 1);

        gate.add_permits(1);
        assert_eq!(first.await.unwrap(), TickOutcome::Updated);

        // Flag released: the next tick goes through
        gate.add_permits(1);
        assert_eq!(monitor.poll_tick().await, TickOutcome::Updated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_tick_releases_guard() {
        let api = Arc::new(FakeGithub::default());
        api.script_runs(vec![Ok(run(1, RunStatus::InProgress, None))]);
        let gate = Arc::new(Semaphore::new(0));
        let monitor = monitor(api.clone());
        monitor.dispatch(&request()).await.unwrap();
        *api.run_gate.lock().unwrap() = Some(gate.clone());

        monitor.start_polling().unwrap();
        while api.count("get_workflow_run") == 0 {
            tokio::task::yield_now().await;
        }
        monitor.stop_polling();
        while monitor
            .shared
            .tick_in_flight
            .load(std::sync::atomic::Ordering::Acquire)
        {
            tokio::task::yield_now().await;
        }

        *api.run_gate.lock().unwrap() = None;
        assert_eq!(monitor.poll_tick().await, TickOutcome::Updated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_stops_existing_poller() {
        let api = Arc::new(FakeGithub::default());
        api.script_runs(vec![Ok(run(1, RunStatus::InProgress, None))]);
        let monitor = monitor(api.clone());
        monitor.dispatch(&request()).await.unwrap();
        monitor.start_polling().unwrap();
        assert!(monitor.is_polling());

        *api.latest_run.lock().unwrap() = Some(run(2, RunStatus::Queued, None));
        let second = monitor.dispatch(&request()).await.unwrap();

        assert_eq!(second.id, 2);
        assert!(!monitor.is_polling());
        assert_eq!(monitor.state().run().map(|r| r.id), Some(2));
    }

    /// Spawn a manual tick and wait until it is blocked inside the status fetch
    async fn gated_tick(
        api: &Arc<FakeGithub>,
        monitor: &Arc<RunMonitor<FakeGithub>>,
        gate: &Arc<Semaphore>,
    ) -> JoinHandle<TickOutcome> {
        *api.run_gate.lock().unwrap() = Some(gate.clone());
        let calls = api.count("get_workflow_run");
        let tick = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.poll_tick().await })
        };
        while api.count("get_workflow_run") == calls {
            tokio::task::yield_now().await;
        }
        tick
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_in_flight_during_reset_leaves_idle() {
        let api = Arc::new(FakeGithub::default());
        api.script_runs(vec![Ok(run(1, RunStatus::InProgress, None))]);
        let monitor = Arc::new(monitor(api.clone()));
        monitor.dispatch(&request()).await.unwrap();

        let gate = Arc::new(Semaphore::new(0));
        let tick = gated_tick(&api, &monitor, &gate).await;

        monitor.reset();
        gate.add_permits(1);

        assert_eq!(tick.await.unwrap(), TickOutcome::Superseded);
        assert_eq!(monitor.state(), MonitorState::Idle);
        assert!(!monitor.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_tick_after_redispatch_is_discarded() {
        let api = Arc::new(FakeGithub::default());
        api.script_runs(vec![Ok(run(1, RunStatus::Completed, Some(RunConclusion::Success)))]);
        let monitor = Arc::new(monitor(api.clone()));
        monitor.dispatch(&request()).await.unwrap();

        let gate = Arc::new(Semaphore::new(0));
        let tick = gated_tick(&api, &monitor, &gate).await;

        *api.latest_run.lock().unwrap() = Some(run(2, RunStatus::Queued, None));
        monitor.dispatch(&request()).await.unwrap();
        gate.add_permits(1);

        assert_eq!(tick.await.unwrap(), TickOutcome::Superseded);
        match monitor.state() {
            MonitorState::Located { run } => assert_eq!(run.id, 2),
            other => panic!("Expected Located run 2, got {:?}", other),
        }
    }
}
