//! Job arena, admission control and progress subscriptions

use crate::pipeline;
use crate::record::JobRecord;
use dashmap::DashMap;
use ipaforge_config::Config;
use ipaforge_errors::{Error, JobError};
use ipaforge_events::{AppEvent, EventEmitter, EventSender, JobEvent};
use ipaforge_publish::ObjectStore;
use ipaforge_types::{
    Credentials, JobFailure, JobId, JobPhase, JobResult, JobSnapshot, JobStatus, PackageRequest,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything needed to run one job.
#[derive(Clone)]
pub struct JobRequest {
    pub credentials: Credentials,
    pub package: PackageRequest,
}

/// Owns the job arena and the global active-job ceiling, runs one
/// pipeline task per admitted job, and serves progress subscriptions.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub config: Config,
    pub store: Arc<dyn ObjectStore>,
    pub tx: Option<EventSender>,
    jobs: DashMap<JobId, JobRecord>,
    active: AtomicUsize,
}

impl JobManager {
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn ObjectStore>, tx: Option<EventSender>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                tx,
                jobs: DashMap::new(),
                active: AtomicUsize::new(0),
            }),
        }
    }

    /// Admit and start a job.
    ///
    /// Admission is checked before anything is created: a rejected
    /// request leaves no record behind and does not touch the counter.
    ///
    /// # Errors
    ///
    /// Returns `JobError::TooBusy` when the active ceiling is reached.
    pub fn start(&self, request: JobRequest) -> Result<JobId, Error> {
        let limit = self.inner.config.jobs.max_active;
        self.inner
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < limit).then_some(n + 1)
            })
            .map_err(|active| JobError::TooBusy { active, limit })?;

        let id = JobId::new();
        let token = CancellationToken::new();
        self.inner.jobs.insert(id, JobRecord::new(token.clone()));
        self.inner
            .tx
            .emit(AppEvent::Job(JobEvent::Started { id }));

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = pipeline::run(&inner, id, request, &token).await;
            inner.finish(id, outcome);
        });

        Ok(id)
    }

    /// Point-in-time snapshot of a job.
    ///
    /// # Errors
    ///
    /// Returns `JobError::NotFound` for unknown or already-delivered
    /// jobs.
    pub fn status(&self, id: JobId) -> Result<JobSnapshot, Error> {
        self.inner
            .jobs
            .get(&id)
            .map(|record| record.snapshot(id))
            .ok_or_else(|| JobError::NotFound { id: id.to_string() }.into())
    }

    /// Request cooperative cancellation. The job observes the token at
    /// its next phase boundary or chunk step; already-terminal jobs are
    /// left alone.
    ///
    /// # Errors
    ///
    /// Returns `JobError::NotFound` for unknown jobs.
    pub fn cancel(&self, id: JobId) -> Result<(), Error> {
        let record = self
            .inner
            .jobs
            .get(&id)
            .ok_or_else(|| JobError::NotFound { id: id.to_string() })?;
        if !record.status.is_terminal() {
            record.token.cancel();
        }
        Ok(())
    }

    /// Subscribe to a job's progress.
    ///
    /// The returned receiver yields a snapshot every poll interval,
    /// with heartbeat re-sends of the latest snapshot in between. The
    /// stream ends after the first terminal snapshot, at which point
    /// the record is removed. Dropping the receiver cancels the job.
    ///
    /// # Errors
    ///
    /// Returns `JobError::NotFound` for unknown jobs.
    pub fn subscribe(&self, id: JobId) -> Result<mpsc::UnboundedReceiver<JobSnapshot>, Error> {
        if !self.inner.jobs.contains_key(&id) {
            return Err(JobError::NotFound { id: id.to_string() }.into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::clone(&self.inner);
        let poll = inner.config.jobs.poll_interval();
        let heartbeat = inner.config.jobs.heartbeat_interval();

        tokio::spawn(async move {
            let mut poll_tick = tokio::time::interval(poll);
            let mut beat_tick = tokio::time::interval(heartbeat);
            poll_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            beat_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = poll_tick.tick() => {}
                    _ = beat_tick.tick() => {}
                }

                let Some(snapshot) = inner.jobs.get(&id).map(|r| r.snapshot(id)) else {
                    break;
                };
                let terminal = snapshot.status.is_terminal();
                if tx.send(snapshot).is_err() {
                    // subscriber went away, stop the job
                    if let Some(record) = inner.jobs.get(&id) {
                        record.token.cancel();
                    }
                    break;
                }
                if terminal {
                    inner.jobs.remove(&id);
                    break;
                }
            }
        });

        Ok(rx)
    }

    /// Run one sweep pass over the arena.
    pub fn sweep_now(&self) {
        self.inner.sweep();
    }

    /// Spawn the periodic stale-record sweeper.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let interval = inner.config.jobs.sweep_interval();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                inner.sweep();
            }
        })
    }
}

impl Inner {
    /// Record a phase transition and publish it.
    pub(crate) fn advance(&self, id: JobId, phase: JobPhase) {
        if let Some(mut record) = self.jobs.get_mut(&id) {
            record.advance(phase);
        }
        self.tx
            .emit(AppEvent::Job(JobEvent::PhaseChanged { id, phase }));
    }

    /// Move a job to its terminal state. The active counter is
    /// decremented exactly once, on the first terminal transition; a
    /// job already reaped by the sweeper is left untouched.
    fn finish(&self, id: JobId, outcome: Result<JobResult, Error>) {
        let event = {
            let Some(mut record) = self.jobs.get_mut(&id) else {
                return;
            };
            if record.status.is_terminal() {
                return;
            }
            record.touched = std::time::Instant::now();
            match outcome {
                Ok(result) => {
                    record.phase = JobPhase::Complete;
                    record.status = JobStatus::Complete;
                    record.result = Some(result);
                    JobEvent::Completed { id }
                }
                Err(error) => {
                    let code = error.code().to_string();
                    record.status = JobStatus::Error;
                    record.error = Some(JobFailure {
                        code: code.clone(),
                        detail: error.to_string(),
                    });
                    if matches!(error, Error::Cancelled) {
                        JobEvent::Cancelled { id }
                    } else {
                        JobEvent::Failed { id, code }
                    }
                }
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.tx.emit(AppEvent::Job(event));
    }

    /// Reap records untouched past the TTL. Live jobs are cancelled
    /// and their slot released here, since their pipeline can no
    /// longer reach the record.
    fn sweep(&self) {
        let ttl = self.config.jobs.job_ttl();
        let mut reaped = Vec::new();
        self.jobs.retain(|id, record| {
            if record.touched.elapsed() <= ttl {
                return true;
            }
            let live = !record.status.is_terminal();
            if live {
                record.token.cancel();
            }
            reaped.push((*id, live));
            false
        });

        for (id, live) in reaped {
            if live {
                self.active.fetch_sub(1, Ordering::SeqCst);
            }
            tracing::debug!(job = %id, "swept stale job record");
            self.tx.emit(AppEvent::Job(JobEvent::Swept { id }));
        }
    }
}
