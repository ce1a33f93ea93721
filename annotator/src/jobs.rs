/// Job orchestrator - single-flight background jobs per operation kind
///
/// Each `JobKind` owns a persistent slot with a running gate:
/// - A launch acquires the gate with `compare_exchange`; a second launch
///   while the first is still running is a no-op
/// - The gate is released when the job completes, fails or panics, before
///   the `JobFinished` event is published
/// - Jobs run on the blocking pool of a private tokio runtime, so no job
///   ever blocks the foreground loop or another kind of job
use crate::error::{AnnotatorError, Result};
use crate::events::{EventPublisher, JobKind, JobOutcome};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

/// Result of a launch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Started,
    /// An instance of the same kind is still running; nothing was launched
    AlreadyRunning,
}

#[derive(Default)]
struct JobSlot {
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Releases a slot's gate when dropped
struct RunningGuard {
    slot: Arc<JobSlot>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.slot.running.store(false, Ordering::Release);
    }
}

pub struct JobOrchestrator {
    runtime: Runtime,
    slots: [Arc<JobSlot>; 4],
    events: EventPublisher,
}

impl JobOrchestrator {
    /// Create an orchestrator with its own runtime
    pub fn new(events: EventPublisher) -> Result<Self> {
        // One blocking thread per job kind is all single-flight can ever use
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(JobKind::ALL.len())
            .thread_name("annotator-job")
            .build()?;

        Ok(Self {
            runtime,
            slots: Default::default(),
            events,
        })
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    pub fn is_running(&self, kind: JobKind) -> bool {
        self.slots[kind.slot()].running.load(Ordering::Acquire)
    }

    /// Launch `task` as the running instance of `kind`.
    ///
    /// An `Err` from the task is published as a status line and a failed
    /// `JobFinished`; a panic is reported the same way.
    pub fn launch<F>(&self, kind: JobKind, task: F) -> LaunchOutcome
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let slot = &self.slots[kind.slot()];
        if slot
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Job {} already running, launch ignored", kind);
            return LaunchOutcome::AlreadyRunning;
        }

        let guard = RunningGuard {
            slot: Arc::clone(slot),
        };
        let events = self.events.clone();

        // Held across the spawn so a fast job cannot be relaunched and
        // stored before this handle lands
        let mut handle_slot = slot.handle.lock().unwrap_or_else(PoisonError::into_inner);

        log::info!("Job {} started", kind);
        let handle = self.runtime.spawn_blocking(move || {
            let start = Instant::now();
            let outcome = match catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(())) => JobOutcome::Succeeded,
                Ok(Err(e)) => JobOutcome::Failed(e.to_string()),
                Err(_) => JobOutcome::Failed(format!("{} job panicked", kind)),
            };
            drop(guard);

            match &outcome {
                JobOutcome::Succeeded => {
                    log::info!(
                        "Job {} finished in {:.2}s",
                        kind,
                        start.elapsed().as_secs_f64()
                    );
                }
                JobOutcome::Failed(reason) => {
                    log::error!("Job {} failed: {}", kind, reason);
                    events.status(reason.clone());
                }
            }
            events.finished(kind, outcome);
        });

        *handle_slot = Some(handle);
        LaunchOutcome::Started
    }

    /// Block until the last launched instance of `kind` has finished.
    ///
    /// For headless drivers and tests only; must not be called from inside
    /// a job.
    pub fn wait(&self, kind: JobKind) -> Result<()> {
        let handle = self.slots[kind.slot()]
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match handle {
            Some(handle) => self
                .runtime
                .block_on(handle)
                .map_err(|e| AnnotatorError::other(format!("Job {} join failed: {}", kind, e))),
            None => Ok(()),
        }
    }

    /// Wait for every kind in turn
    pub fn wait_all(&self) -> Result<()> {
        for kind in JobKind::ALL {
            self.wait(kind)?;
        }
        Ok(())
    }

    /// Stop the runtime, giving running jobs up to `timeout` to return
    pub fn shutdown(self, timeout: Duration) {
        log::info!("Shutting down job orchestrator");
        self.runtime.shutdown_timeout(timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AppEvent;
    use crossbeam::channel::bounded;
    use std::sync::atomic::AtomicUsize;

    fn orchestrator() -> (JobOrchestrator, crossbeam::channel::Receiver<AppEvent>) {
        let (events, rx) = EventPublisher::channel((8, 8));
        (JobOrchestrator::new(events).unwrap(), rx)
    }

    #[test]
    fn test_single_flight_per_kind() {
        let (jobs, _rx) = orchestrator();
        let runs = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = bounded::<()>(0);

        let first = {
            let runs = Arc::clone(&runs);
            jobs.launch(JobKind::ExportVideo, move || {
                runs.fetch_add(1, Ordering::SeqCst);
                let _ = release_rx.recv();
                Ok(())
            })
        };
        assert_eq!(first, LaunchOutcome::Started);
        assert!(jobs.is_running(JobKind::ExportVideo));

        for _ in 0..5 {
            let runs = Arc::clone(&runs);
            let outcome = jobs.launch(JobKind::ExportVideo, move || {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            assert_eq!(outcome, LaunchOutcome::AlreadyRunning);
        }

        // Another kind is independent
        assert_eq!(
            jobs.launch(JobKind::Browse, || Ok(())),
            LaunchOutcome::Started
        );

        release_tx.send(()).unwrap();
        jobs.wait_all().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!jobs.is_running(JobKind::ExportVideo));
    }

    #[test]
    fn test_failure_returns_to_idle_and_reports() {
        let (jobs, rx) = orchestrator();

        jobs.launch(JobKind::ExportReport, || Err(AnnotatorError::NoDetections));
        jobs.wait(JobKind::ExportReport).unwrap();
        assert!(!jobs.is_running(JobKind::ExportReport));

        let events: Vec<AppEvent> = rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::Status(s) if s == "No detections to export")));
        assert!(events.iter().any(|e| matches!(
            e,
            AppEvent::JobFinished {
                kind: JobKind::ExportReport,
                outcome: JobOutcome::Failed(_)
            }
        )));

        // Relaunch after failure
        assert_eq!(
            jobs.launch(JobKind::ExportReport, || Ok(())),
            LaunchOutcome::Started
        );
        jobs.wait(JobKind::ExportReport).unwrap();
    }

    #[test]
    fn test_panicking_job_releases_gate() {
        let (jobs, rx) = orchestrator();

        jobs.launch(JobKind::LoadAnnotate, || panic!("detector blew up"));
        jobs.wait(JobKind::LoadAnnotate).unwrap();

        assert!(!jobs.is_running(JobKind::LoadAnnotate));
        assert!(rx.try_iter().any(|e| matches!(
            e,
            AppEvent::JobFinished {
                outcome: JobOutcome::Failed(_),
                ..
            }
        )));
    }

    #[test]
    fn test_gate_released_before_finished_event() {
        let (jobs, rx) = orchestrator();
        jobs.launch(JobKind::Browse, || Ok(()));

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            AppEvent::JobFinished { kind, outcome } => {
                assert_eq!(kind, JobKind::Browse);
                assert_eq!(outcome, JobOutcome::Succeeded);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(jobs.launch(JobKind::Browse, || Ok(())), LaunchOutcome::Started);
        jobs.wait(JobKind::Browse).unwrap();
    }
}
