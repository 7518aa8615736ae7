//! Polling job-worker runtime.
//!
//! A [`JobWorker`] runs one background poll loop against the engine for
//! jobs of its registered type. Each activated job is dispatched to the
//! handler on its own task; a [`Semaphore`] caps the number of
//! concurrently in-flight jobs at `max_jobs_active`. The poll loop never
//! blocks on handler completion.
//!
//! Lifecycle per worker: `Registered -> Polling -> Dispatching ->
//! Polling (loop) -> Closed`. Closing stops new polls; in-flight
//! handlers finish or hit the engine-side job timeout naturally -- there
//! is no local cancellation of handlers.

use std::sync::Arc;
use std::time::Duration;

use flowbridge_core::types::JobKey;
use flowbridge_core::variables::Variables;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::api::{EngineApiError, JobApi};
use crate::types::{ActivateJobsRequest, ActivatedJob};

/// Registration parameters binding a job type to a handler.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Job type to poll for.
    pub job_type: String,
    /// Worker name reported to the engine. Defaults to the job type.
    pub worker_name: String,
    /// Ceiling on concurrently in-flight (activated, unreported) jobs.
    pub max_jobs_active: usize,
    /// Delay between poll requests.
    pub poll_interval: Duration,
    /// How long one poll request may wait for the engine's answer.
    pub request_timeout: Duration,
    /// Engine-side timeout: how long the engine waits for an outcome
    /// report before redelivering the job. Never enforced locally.
    pub job_timeout: Duration,
}

impl WorkerConfig {
    /// Registration defaults: 5 concurrent jobs, 50 s poll interval and
    /// polling timeout, 10 s job timeout.
    pub fn new(job_type: impl Into<String>) -> Self {
        let job_type = job_type.into();
        Self {
            worker_name: job_type.clone(),
            job_type,
            max_jobs_active: 5,
            poll_interval: Duration::from_secs(50),
            request_timeout: Duration::from_secs(50),
            job_timeout: Duration::from_secs(10),
        }
    }

    pub fn max_jobs_active(mut self, max: usize) -> Self {
        self.max_jobs_active = max;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }
}

/// Outcome a handler reports for one job.
///
/// Exactly one report is sent per dispatched job. A handler that panics
/// is treated as [`JobOutcome::Fail`] with zero remaining retries.
#[derive(Debug)]
pub enum JobOutcome {
    /// The job succeeded; `variables` merge into the process scope.
    Complete { variables: Variables },
    /// Recoverable failure; the engine may redeliver while `retries`
    /// remain.
    Fail { retries: i32, error_message: String },
    /// Business-level failure the engine should route via an error
    /// boundary event.
    BpmnError {
        error_code: String,
        error_message: String,
    },
}

/// User-supplied job handler.
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: ActivatedJob) -> JobOutcome;
}

/// A failed outcome report. The job has usually timed out on the engine
/// side and been reassigned; the engine owns redelivery, so this is
/// logged rather than retried.
#[derive(Debug, thiserror::Error)]
#[error("Failed to report outcome for job {job_key}: {source}")]
pub struct JobReportError {
    pub job_key: JobKey,
    #[source]
    pub source: EngineApiError,
}

/// Handle to a running job worker.
///
/// Dropped handles leave the poll loop running; call
/// [`close`](Self::close) for an orderly stop.
#[derive(Debug)]
pub struct JobWorker {
    job_type: String,
    cancel: CancellationToken,
    poll_handle: tokio::task::JoinHandle<()>,
}

impl JobWorker {
    /// Register a worker and start its poll loop.
    pub fn open(api: Arc<dyn JobApi>, config: WorkerConfig, handler: Arc<dyn JobHandler>) -> Self {
        let cancel = CancellationToken::new();
        let job_type = config.job_type.clone();
        let loop_cancel = cancel.clone();

        let poll_handle = tokio::spawn(async move {
            tracing::info!(job_type = %config.job_type, "Job worker opened");
            poll_loop(api, config, handler, loop_cancel).await;
        });

        Self {
            job_type,
            cancel,
            poll_handle,
        }
    }

    /// Stop issuing new polls and wait for the poll loop to exit.
    ///
    /// In-flight jobs keep running on their own tasks and report their
    /// outcomes (or hit the engine-side job timeout) naturally.
    pub async fn close(self) {
        tracing::info!(job_type = %self.job_type, "Closing job worker");
        self.cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.poll_handle).await;
        tracing::info!(job_type = %self.job_type, "Job worker closed");
    }
}

/// Core poll loop: activate -> dispatch -> sleep, until cancelled.
async fn poll_loop(
    api: Arc<dyn JobApi>,
    config: WorkerConfig,
    handler: Arc<dyn JobHandler>,
    cancel: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(config.max_jobs_active));

    loop {
        if cancel.is_cancelled() {
            break;
        }

        // Only ask for as many jobs as there are free slots, so the
        // in-flight count can never exceed the ceiling.
        let free_slots = semaphore.available_permits();
        if free_slots > 0 {
            let request = ActivateJobsRequest {
                job_type: config.job_type.clone(),
                worker: config.worker_name.clone(),
                max_jobs_to_activate: free_slots,
                timeout_millis: config.job_timeout.as_millis() as u64,
                request_timeout_millis: config.request_timeout.as_millis() as u64,
            };

            let activation = tokio::select! {
                _ = cancel.cancelled() => break,
                result = api.activate_jobs(&request) => result,
            };

            match activation {
                Ok(jobs) => {
                    for job in jobs {
                        dispatch(&api, &handler, &semaphore, job);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        job_type = %config.job_type,
                        error = %e,
                        "Job activation failed",
                    );
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.poll_interval) => {}
        }
    }

    tracing::debug!(job_type = %config.job_type, "Poll loop exited");
}

/// Hand one activated job to the handler on its own task.
fn dispatch(
    api: &Arc<dyn JobApi>,
    handler: &Arc<dyn JobHandler>,
    semaphore: &Arc<Semaphore>,
    job: ActivatedJob,
) {
    // Permits were counted before the activation request, so this only
    // fails if the engine handed back more jobs than asked for.
    let permit = match Arc::clone(semaphore).try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!(
                job_key = job.key,
                "No free slot for activated job; leaving it to the engine-side timeout",
            );
            return;
        }
    };

    let api = Arc::clone(api);
    let handler = Arc::clone(handler);
    tokio::spawn(run_job(api, handler, job, permit));
}

/// Run the handler for one job and report its outcome.
async fn run_job(
    api: Arc<dyn JobApi>,
    handler: Arc<dyn JobHandler>,
    job: ActivatedJob,
    permit: OwnedSemaphorePermit,
) {
    let job_key = job.key;
    tracing::debug!(job_key, job_type = %job.job_type, "Dispatching job to handler");

    // The inner spawn isolates handler panics: a panic surfaces as a
    // JoinError here instead of killing this reporting task.
    let outcome = match tokio::spawn(async move { handler.handle(job).await }).await {
        Ok(outcome) => outcome,
        Err(join_error) => {
            tracing::error!(
                job_key,
                panicked = join_error.is_panic(),
                "Job handler faulted; reporting failure with no retries",
            );
            JobOutcome::Fail {
                retries: 0,
                error_message: "job handler faulted".to_string(),
            }
        }
    };

    if let Err(e) = report_outcome(api.as_ref(), job_key, outcome).await {
        tracing::warn!(job_key, error = %e, "Outcome report failed");
    }

    drop(permit);
}

/// Send exactly one outcome report for a job.
async fn report_outcome(
    api: &dyn JobApi,
    job_key: JobKey,
    outcome: JobOutcome,
) -> Result<(), JobReportError> {
    let result = match outcome {
        JobOutcome::Complete { variables } => api.complete_job(job_key, variables).await,
        JobOutcome::Fail {
            retries,
            error_message,
        } => api.fail_job(job_key, retries, &error_message).await,
        JobOutcome::BpmnError {
            error_code,
            error_message,
        } => api.throw_error(job_key, &error_code, &error_message).await,
    };

    result.map_err(|source| JobReportError { job_key, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use flowbridge_core::variables;
    use tokio::sync::watch;

    // -----------------------------------------------------------------
    // Fake engine double
    // -----------------------------------------------------------------

    #[derive(Default)]
    struct FakeState {
        in_flight: usize,
        max_in_flight: usize,
        max_requested: usize,
        polls: usize,
        completed: Vec<(JobKey, Variables)>,
        failed: Vec<(JobKey, i32, String)>,
        bpmn_errors: Vec<(JobKey, String, String)>,
        report_failures: usize,
    }

    /// In-memory engine double: hands out queued jobs on activation and
    /// records every outcome report.
    struct FakeEngine {
        queue: Mutex<VecDeque<ActivatedJob>>,
        state: Mutex<FakeState>,
        /// When set, every outcome report fails as if the job had
        /// already timed out and been reassigned.
        reject_reports: bool,
    }

    impl FakeEngine {
        fn with_jobs(count: usize) -> Arc<Self> {
            let queue = (1..=count as i64).map(synthetic_job).collect();
            Arc::new(Self {
                queue: Mutex::new(queue),
                state: Mutex::new(FakeState::default()),
                reject_reports: false,
            })
        }

        fn rejecting_reports(count: usize) -> Arc<Self> {
            let queue = (1..=count as i64).map(synthetic_job).collect();
            Arc::new(Self {
                queue: Mutex::new(queue),
                state: Mutex::new(FakeState::default()),
                reject_reports: true,
            })
        }

        fn snapshot<T>(&self, read: impl Fn(&FakeState) -> T) -> T {
            read(&self.state.lock().unwrap())
        }

        fn settle_report(&self, job_key: JobKey) -> Result<(), EngineApiError> {
            let mut state = self.state.lock().unwrap();
            state.in_flight -= 1;
            if self.reject_reports {
                state.report_failures += 1;
                return Err(EngineApiError::Gateway {
                    status: 404,
                    body: format!("job {job_key} not found"),
                });
            }
            Ok(())
        }
    }

    fn synthetic_job(key: JobKey) -> ActivatedJob {
        ActivatedJob {
            key,
            job_type: "test-type".to_string(),
            process_instance_key: 1000 + key,
            retries: 3,
            variables: variables::empty(),
        }
    }

    #[async_trait::async_trait]
    impl JobApi for FakeEngine {
        async fn activate_jobs(
            &self,
            request: &ActivateJobsRequest,
        ) -> Result<Vec<ActivatedJob>, EngineApiError> {
            let mut queue = self.queue.lock().unwrap();
            let mut state = self.state.lock().unwrap();
            state.polls += 1;
            state.max_requested = state.max_requested.max(request.max_jobs_to_activate);

            let count = request.max_jobs_to_activate.min(queue.len());
            let jobs: Vec<ActivatedJob> = queue.drain(..count).collect();
            state.in_flight += jobs.len();
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            Ok(jobs)
        }

        async fn complete_job(
            &self,
            job_key: JobKey,
            vars: Variables,
        ) -> Result<(), EngineApiError> {
            self.settle_report(job_key)?;
            self.state.lock().unwrap().completed.push((job_key, vars));
            Ok(())
        }

        async fn fail_job(
            &self,
            job_key: JobKey,
            retries: i32,
            error_message: &str,
        ) -> Result<(), EngineApiError> {
            self.settle_report(job_key)?;
            self.state
                .lock()
                .unwrap()
                .failed
                .push((job_key, retries, error_message.to_string()));
            Ok(())
        }

        async fn throw_error(
            &self,
            job_key: JobKey,
            error_code: &str,
            error_message: &str,
        ) -> Result<(), EngineApiError> {
            self.settle_report(job_key)?;
            self.state.lock().unwrap().bpmn_errors.push((
                job_key,
                error_code.to_string(),
                error_message.to_string(),
            ));
            Ok(())
        }
    }

    // -----------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------

    /// Completes immediately with no output variables.
    struct CompletingHandler;

    #[async_trait::async_trait]
    impl JobHandler for CompletingHandler {
        async fn handle(&self, _job: ActivatedJob) -> JobOutcome {
            JobOutcome::Complete {
                variables: variables::empty(),
            }
        }
    }

    /// Blocks until the watch channel flips to `true`, then completes.
    struct BlockingHandler {
        release: watch::Receiver<bool>,
    }

    #[async_trait::async_trait]
    impl JobHandler for BlockingHandler {
        async fn handle(&self, _job: ActivatedJob) -> JobOutcome {
            let mut release = self.release.clone();
            while !*release.borrow() {
                if release.changed().await.is_err() {
                    break;
                }
            }
            JobOutcome::Complete {
                variables: variables::empty(),
            }
        }
    }

    /// Panics on one specific job key, completes every other job.
    struct PanickyHandler {
        panic_on: JobKey,
    }

    #[async_trait::async_trait]
    impl JobHandler for PanickyHandler {
        async fn handle(&self, job: ActivatedJob) -> JobOutcome {
            if job.key == self.panic_on {
                panic!("synthetic handler fault");
            }
            JobOutcome::Complete {
                variables: variables::empty(),
            }
        }
    }

    /// Routes each job to a different outcome by key.
    struct RoutingHandler;

    #[async_trait::async_trait]
    impl JobHandler for RoutingHandler {
        async fn handle(&self, job: ActivatedJob) -> JobOutcome {
            match job.key {
                1 => JobOutcome::Complete {
                    variables: variables::from_pairs([(
                        "done".to_string(),
                        serde_json::json!(true),
                    )]),
                },
                2 => JobOutcome::Fail {
                    retries: 2,
                    error_message: "transient".to_string(),
                },
                _ => JobOutcome::BpmnError {
                    error_code: "ORDER_REJECTED".to_string(),
                    error_message: "no stock".to_string(),
                },
            }
        }
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    fn fast_config(max_jobs: usize) -> WorkerConfig {
        WorkerConfig::new("test-type")
            .max_jobs_active(max_jobs)
            .poll_interval(Duration::from_millis(10))
            .request_timeout(Duration::from_millis(100))
            .job_timeout(Duration::from_secs(10))
    }

    /// Poll `condition` until it holds or a 5 s deadline passes.
    async fn wait_until(condition: impl Fn() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !condition() {
            if tokio::time::Instant::now() > deadline {
                panic!("condition not reached within deadline");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    // -----------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------

    #[tokio::test]
    async fn worker_never_exceeds_max_jobs_active() {
        let fake = FakeEngine::with_jobs(20);
        let (release_tx, release_rx) = watch::channel(false);
        let handler = Arc::new(BlockingHandler {
            release: release_rx,
        });

        let worker = JobWorker::open(
            Arc::clone(&fake) as Arc<dyn JobApi>,
            fast_config(5),
            handler,
        );

        // All five slots fill while the handler blocks.
        wait_until(|| fake.snapshot(|s| s.in_flight) == 5).await;
        assert_eq!(fake.queue.lock().unwrap().len(), 15);

        // Let the blocked handlers drain everything.
        release_tx.send(true).unwrap();
        wait_until(|| fake.snapshot(|s| s.completed.len()) == 20).await;

        assert_eq!(fake.snapshot(|s| s.max_in_flight), 5);
        // Activation requests never asked for more than the free slots.
        assert!(fake.snapshot(|s| s.max_requested) <= 5);

        worker.close().await;
    }

    #[tokio::test]
    async fn panicking_handler_reports_one_failure_and_loop_survives() {
        let fake = FakeEngine::with_jobs(3);
        let handler = Arc::new(PanickyHandler { panic_on: 2 });

        let worker = JobWorker::open(
            Arc::clone(&fake) as Arc<dyn JobApi>,
            fast_config(5),
            handler,
        );

        wait_until(|| fake.snapshot(|s| s.completed.len() == 2 && s.failed.len() == 1)).await;

        let failed = fake.snapshot(|s| s.failed.clone());
        assert_eq!(failed.len(), 1);
        let (job_key, retries, _message) = &failed[0];
        assert_eq!(*job_key, 2);
        assert_eq!(*retries, 0);

        worker.close().await;
    }

    #[tokio::test]
    async fn close_stops_polling_but_in_flight_job_finishes() {
        let fake = FakeEngine::with_jobs(1);
        let (release_tx, release_rx) = watch::channel(false);
        let handler = Arc::new(BlockingHandler {
            release: release_rx,
        });

        let worker = JobWorker::open(
            Arc::clone(&fake) as Arc<dyn JobApi>,
            fast_config(5),
            handler,
        );

        wait_until(|| fake.snapshot(|s| s.in_flight) == 1).await;

        // After close returns the poll loop has exited; the counter must
        // not move again.
        worker.close().await;
        let polls_after_close = fake.snapshot(|s| s.polls);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fake.snapshot(|s| s.polls), polls_after_close);

        // The dispatched handler was not preempted.
        release_tx.send(true).unwrap();
        wait_until(|| fake.snapshot(|s| s.completed.len()) == 1).await;
    }

    #[tokio::test]
    async fn outcomes_route_to_matching_reports() {
        let fake = FakeEngine::with_jobs(3);
        let worker = JobWorker::open(
            Arc::clone(&fake) as Arc<dyn JobApi>,
            fast_config(5),
            Arc::new(RoutingHandler),
        );

        wait_until(|| {
            fake.snapshot(|s| {
                s.completed.len() == 1 && s.failed.len() == 1 && s.bpmn_errors.len() == 1
            })
        })
        .await;

        let completed = fake.snapshot(|s| s.completed.clone());
        assert_eq!(completed[0].0, 1);
        assert_eq!(completed[0].1["done"], serde_json::json!(true));

        let failed = fake.snapshot(|s| s.failed.clone());
        assert_eq!(failed[0], (2, 2, "transient".to_string()));

        let errors = fake.snapshot(|s| s.bpmn_errors.clone());
        assert_eq!(
            errors[0],
            (3, "ORDER_REJECTED".to_string(), "no stock".to_string())
        );

        worker.close().await;
    }

    #[tokio::test]
    async fn failed_outcome_report_does_not_kill_the_loop() {
        let fake = FakeEngine::rejecting_reports(2);
        let worker = JobWorker::open(
            Arc::clone(&fake) as Arc<dyn JobApi>,
            fast_config(5),
            Arc::new(CompletingHandler),
        );

        // Both reports are rejected, yet both jobs were dispatched and
        // the loop keeps polling afterwards.
        wait_until(|| fake.snapshot(|s| s.report_failures) == 2).await;
        let polls_seen = fake.snapshot(|s| s.polls);
        wait_until(|| fake.snapshot(|s| s.polls) > polls_seen).await;

        worker.close().await;
    }

    #[tokio::test]
    async fn default_config_matches_registration_tuning() {
        let config = WorkerConfig::new("get-time");
        assert_eq!(config.worker_name, "get-time");
        assert_eq!(config.max_jobs_active, 5);
        assert_eq!(config.poll_interval, Duration::from_secs(50));
        assert_eq!(config.request_timeout, Duration::from_secs(50));
        assert_eq!(config.job_timeout, Duration::from_secs(10));
    }
}
