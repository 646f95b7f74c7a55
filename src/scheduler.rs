//! Background diff worker.
//!
//! The interaction context writes submissions into a single-slot
//! latest-wins channel. The worker drains that slot one submission at a time
//! and runs each diff on the blocking pool. It publishes finished scripts to
//! a second single-slot channel. A submission whose token was cancelled
//! before its diff finished never reaches the result slot. A diff that
//! panics is published as a failed outcome so the owner stops waiting.
use crate::diff_engine::DiffEngine;
use crate::errors::DiffAborted;
use crate::identity::Reconcilable;
use crate::types::EditScript;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One accepted `submit` call, paired with the baseline it must be diffed against.
#[derive(Debug)]
pub(crate) struct Submission<T> {
    pub generation: u64,
    pub base_revision: u64,
    pub base: Arc<[T]>,
    pub next: Arc<[T]>,
    pub cancel: CancellationToken,
}

/// A finished diff waiting to be applied on the interaction context.
#[derive(Debug)]
pub(crate) struct Completed<T> {
    pub generation: u64,
    pub base_revision: u64,
    pub next: Arc<[T]>,
    /// The edit script, or the reason the diff task died.
    pub script: Result<EditScript<T>, String>,
}

pub(crate) type SubmissionSlot<T> = Option<Arc<Submission<T>>>;
pub(crate) type CompletedSlot<T> = Option<Arc<Completed<T>>>;

/// Handles owned by the interaction side.
pub(crate) struct WorkerChannels<T> {
    pub submissions: watch::Sender<SubmissionSlot<T>>,
    pub completed: watch::Receiver<CompletedSlot<T>>,
    pub task: JoinHandle<()>,
}

pub(crate) fn spawn_worker<T>(handle: &Handle, label: String) -> WorkerChannels<T>
where
    T: Reconcilable + Send + Sync + 'static,
{
    let (submissions, submission_rx) = watch::channel::<SubmissionSlot<T>>(None);
    let (completed_tx, completed) = watch::channel::<CompletedSlot<T>>(None);
    let blocking = handle.clone();
    let task = handle.spawn(run_worker(submission_rx, completed_tx, blocking, label));
    WorkerChannels {
        submissions,
        completed,
        task,
    }
}

async fn run_worker<T>(
    mut submissions: watch::Receiver<SubmissionSlot<T>>,
    completed: watch::Sender<CompletedSlot<T>>,
    handle: Handle,
    label: String,
) where
    T: Reconcilable + Send + Sync + 'static,
{
    log::debug!("{label}: diff worker started");
    while submissions.changed().await.is_ok() {
        let slot = submissions.borrow_and_update().clone();
        let Some(job) = slot else {
            continue;
        };
        if job.cancel.is_cancelled() {
            log::debug!("{label}: generation {} superseded before start", job.generation);
            continue;
        }

        let work = Arc::clone(&job);
        let outcome = handle
            .spawn_blocking(move || {
                DiffEngine::new(&work.base, &work.next)
                    .with_cancellation(&work.cancel)
                    .compute()
            })
            .await;

        let script = match outcome {
            Ok(Ok(script)) => Ok(script),
            Ok(Err(DiffAborted)) => {
                log::debug!("{label}: generation {} abandoned", job.generation);
                continue;
            }
            Err(join_err) => {
                log::error!("{label}: diff for generation {} failed: {join_err}", job.generation);
                Err(join_err.to_string())
            }
        };
        if job.cancel.is_cancelled() {
            log::debug!("{label}: generation {} superseded while diffing", job.generation);
            continue;
        }
        if let Ok(script) = &script {
            log::debug!(
                "{label}: generation {} diffed into {} ops",
                job.generation,
                script.len()
            );
        }

        let result = Completed {
            generation: job.generation,
            base_revision: job.base_revision,
            next: Arc::clone(&job.next),
            script,
        };
        if completed.send(Some(Arc::new(result))).is_err() {
            break;
        }
    }
    log::debug!("{label}: diff worker stopped");
}
