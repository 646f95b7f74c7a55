//! Interaction-side owner of the baseline list.
//!
//! `ListReconciler` accepts snapshots, hands them to the diff worker, and applies
//! finished scripts to its presentation surface. Only the newest submission's
//! script is ever applied, and only against the baseline it was diffed from.
use crate::errors::ReconcilerError;
use crate::identity::Reconcilable;
use crate::scheduler::{Completed, CompletedSlot, Submission, SubmissionSlot, spawn_worker};
use crate::surface::PresentationSurface;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Summary of one applied edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub generation: u64,
    pub revision: u64,
    pub ops: usize,
    pub rows: usize,
}

pub struct ListReconciler<T: Reconcilable, S> {
    label: String,
    surface: S,
    baseline: Arc<[T]>,
    revision: u64,
    latest_generation: u64,
    settled_generation: u64,
    in_flight: Option<CancellationToken>,
    submissions: watch::Sender<SubmissionSlot<T>>,
    completed: watch::Receiver<CompletedSlot<T>>,
    worker: JoinHandle<()>,
}

impl<T, S> ListReconciler<T, S>
where
    T: Reconcilable + Send + Sync + 'static,
    S: PresentationSurface<T>,
{
    /// Starts the diff worker on the current tokio runtime.
    pub fn spawn(surface: S) -> Result<Self, ReconcilerError> {
        let handle = Handle::try_current()?;
        Ok(Self::spawn_on(surface, &handle))
    }

    pub fn spawn_on(surface: S, handle: &Handle) -> Self {
        let label = format!("ListReconciler[{}]", Uuid::new_v4().simple());
        let channels = spawn_worker::<T>(handle, label.clone());
        log::info!("{label}: initialized");
        ListReconciler {
            label,
            surface,
            baseline: Arc::from(Vec::new()),
            revision: 0,
            latest_generation: 0,
            settled_generation: 0,
            in_flight: None,
            submissions: channels.submissions,
            completed: channels.completed,
            worker: channels.task,
        }
    }

    /// Queues `records` as the next list state and returns its generation.
    /// Never blocks. Any earlier submission still being diffed is abandoned.
    pub fn submit(&mut self, records: impl Into<Arc<[T]>>) -> u64 {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }
        self.latest_generation += 1;
        let cancel = CancellationToken::new();
        let submission = Submission {
            generation: self.latest_generation,
            base_revision: self.revision,
            base: Arc::clone(&self.baseline),
            next: records.into(),
            cancel: cancel.clone(),
        };
        log::debug!(
            "{}: generation {} submitted ({} -> {} rows)",
            self.label,
            submission.generation,
            submission.base.len(),
            submission.next.len()
        );
        self.in_flight = Some(cancel);
        self.submissions.send_replace(Some(Arc::new(submission)));
        self.latest_generation
    }

    /// Applies the latest finished script if one is waiting. Call from the
    /// interaction context. Fails with `DiffFailed` when the newest
    /// submission's diff died; the baseline is then left as it was.
    pub fn try_apply(&mut self) -> Result<Option<Applied>, ReconcilerError> {
        if !matches!(self.completed.has_changed(), Ok(true)) {
            return Ok(None);
        }
        let slot = self.completed.borrow_and_update().clone();
        match slot {
            Some(completed) => self.commit(&completed),
            None => Ok(None),
        }
    }

    /// Waits for the next script that actually gets applied. Stale results
    /// arriving in the meantime are skipped. Pending forever if nothing was
    /// submitted since the last apply.
    pub async fn next_applied(&mut self) -> Result<Applied, ReconcilerError> {
        if let Some(applied) = self.try_apply()? {
            return Ok(applied);
        }
        loop {
            self.completed
                .changed()
                .await
                .map_err(|_| ReconcilerError::WorkerClosed)?;
            let slot = self.completed.borrow_and_update().clone();
            if let Some(completed) = slot {
                if let Some(applied) = self.commit(&completed)? {
                    return Ok(applied);
                }
            }
        }
    }

    /// Waits until the newest submission is reflected on the surface.
    pub async fn settle(&mut self) -> Result<Option<Applied>, ReconcilerError> {
        let mut last = None;
        while !self.is_settled() {
            last = Some(self.next_applied().await?);
        }
        Ok(last)
    }

    fn commit(&mut self, completed: &Completed<T>) -> Result<Option<Applied>, ReconcilerError> {
        if completed.generation != self.latest_generation {
            log::debug!(
                "{}: dropping generation {} (latest is {})",
                self.label,
                completed.generation,
                self.latest_generation
            );
            return Ok(None);
        }
        let script = match &completed.script {
            Ok(script) => script,
            Err(reason) => {
                // Settled without a new baseline; the next submit starts over.
                self.settled_generation = completed.generation;
                self.in_flight = None;
                return Err(ReconcilerError::DiffFailed {
                    generation: completed.generation,
                    reason: reason.clone(),
                });
            }
        };
        if completed.base_revision != self.revision {
            // Diffed against a baseline that is no longer current; diff the
            // same snapshot again against the one that is.
            log::warn!(
                "{}: generation {} was diffed against revision {}, baseline is at {}; resubmitting",
                self.label,
                completed.generation,
                completed.base_revision,
                self.revision
            );
            self.submit(Arc::clone(&completed.next));
            return Ok(None);
        }

        if !script.is_empty() {
            self.surface.apply_edit_script(script);
        }
        self.baseline = Arc::clone(&completed.next);
        self.revision += 1;
        self.settled_generation = completed.generation;
        self.in_flight = None;

        let applied = Applied {
            generation: completed.generation,
            revision: self.revision,
            ops: script.len(),
            rows: self.baseline.len(),
        };
        log::debug!("{}: applied {:?}", self.label, applied);
        Ok(Some(applied))
    }

    /// Rows in the committed baseline.
    pub fn current_count(&self) -> usize {
        self.baseline.len()
    }

    pub fn record_at(&self, position: usize) -> Option<&T> {
        self.baseline.get(position)
    }

    pub fn baseline(&self) -> &Arc<[T]> {
        &self.baseline
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest_generation
    }

    /// True when the newest submission has been applied or has failed, or
    /// nothing was submitted.
    pub fn is_settled(&self) -> bool {
        self.settled_generation == self.latest_generation
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

impl<T: Reconcilable, S> Drop for ListReconciler<T, S> {
    fn drop(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        self.worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::VecSurface;
    use crate::types::{EditScript, GameRecord};
    use std::time::Duration;

    fn games(ids: &[u64]) -> Vec<GameRecord> {
        ids.iter()
            .map(|&id| GameRecord::new(id, format!("Game {id}"), format!("/roms/{id}.3ds")))
            .collect()
    }

    fn reconciler() -> ListReconciler<GameRecord, VecSurface<GameRecord>> {
        ListReconciler::spawn(VecSurface::new()).unwrap()
    }

    #[tokio::test]
    async fn first_snapshot_populates_surface() {
        let mut list = reconciler();
        assert!(list.is_settled());
        assert!(matches!(list.try_apply(), Ok(None)));

        let generation = list.submit(games(&[1, 2, 3]));
        assert!(!list.is_settled());
        assert_eq!(list.current_count(), 0);

        let applied = list.next_applied().await.unwrap();
        assert_eq!(applied.generation, generation);
        assert_eq!(applied.ops, 3);
        assert_eq!(list.current_count(), 3);
        assert_eq!(list.record_at(1).map(|g| g.title_id.0), Some(2));
        assert_eq!(list.record_at(3), None);
        assert_eq!(list.surface().rows(), &games(&[1, 2, 3])[..]);
        assert!(list.is_settled());
    }

    #[tokio::test]
    async fn later_snapshots_are_reconciled_incrementally() {
        let mut list = reconciler();
        list.submit(games(&[1, 2, 3, 4]));
        list.settle().await.unwrap();

        list.submit(games(&[4, 1, 3, 5]));
        let applied = list.settle().await.unwrap().unwrap();
        assert_eq!(applied.revision, 2);
        assert_eq!(list.surface().rows(), &games(&[4, 1, 3, 5])[..]);
        assert_eq!(&list.baseline()[..], list.surface().rows());
        assert!(!list.surface().is_desynced());
    }

    #[tokio::test]
    async fn back_to_back_submissions_coalesce() {
        let mut list = reconciler();
        list.submit(games(&[1, 2, 3]));
        let latest = list.submit(games(&[3, 9]));

        let applied = list.settle().await.unwrap().unwrap();
        assert_eq!(applied.generation, latest);
        assert_eq!(list.surface().scripts_applied(), 1);
        assert_eq!(list.surface().rows(), &games(&[3, 9])[..]);
        assert!(matches!(list.try_apply(), Ok(None)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn superseded_diff_never_lands_after_newer_one() {
        let mut list = reconciler();
        let big: Vec<u64> = (0..50_000).rev().collect();
        list.submit(games(&big));
        tokio::time::sleep(Duration::from_millis(1)).await;
        list.submit(games(&[7, 8]));

        list.settle().await.unwrap();
        assert_eq!(list.surface().rows(), &games(&[7, 8])[..]);
        assert_eq!(list.current_count(), 2);
        assert!(matches!(list.try_apply(), Ok(None)));
        assert_eq!(list.surface().rows(), &games(&[7, 8])[..]);
    }

    #[tokio::test]
    async fn stale_generation_is_discarded() {
        let mut list = reconciler();
        list.submit(games(&[1]));
        list.submit(games(&[2]));

        let stale = Completed {
            generation: 1,
            base_revision: 0,
            next: Arc::from(games(&[1])),
            script: Ok(crate::diff_engine::diff(&[], &games(&[1]))),
        };
        assert!(matches!(list.commit(&stale), Ok(None)));
        assert_eq!(list.current_count(), 0);
        assert_eq!(list.surface().scripts_applied(), 0);
    }

    #[tokio::test]
    async fn result_for_wrong_baseline_is_resubmitted() {
        let mut list = reconciler();
        list.submit(games(&[1, 2]));
        list.settle().await.unwrap();

        let generation = list.submit(games(&[2]));
        let wrong_base = Completed {
            generation,
            base_revision: 0,
            next: Arc::from(games(&[2])),
            script: Ok(EditScript::new()),
        };
        assert!(matches!(list.commit(&wrong_base), Ok(None)));
        assert_eq!(list.latest_generation(), generation + 1);

        list.settle().await.unwrap();
        assert_eq!(list.surface().rows(), &games(&[2])[..]);
    }

    #[tokio::test]
    async fn identical_snapshot_commits_without_touching_surface() {
        let mut list = reconciler();
        list.submit(games(&[1, 2]));
        list.settle().await.unwrap();

        list.submit(games(&[1, 2]));
        let applied = list.settle().await.unwrap().unwrap();
        assert_eq!(applied.ops, 0);
        assert_eq!(list.revision(), 2);
        assert_eq!(list.surface().scripts_applied(), 1);
    }

    /// Row whose identity cannot be computed when `id` is zero.
    #[derive(Debug, Clone, PartialEq)]
    struct Brittle(u32);

    impl Reconcilable for Brittle {
        type Key = u32;

        fn identity_key(&self) -> u32 {
            assert!(self.0 != 0, "row without identity");
            self.0
        }

        fn same_content(&self, other: &Self) -> bool {
            self == other
        }
    }

    #[tokio::test]
    async fn panicking_diff_fails_its_generation_instead_of_hanging() {
        let mut list = ListReconciler::spawn(VecSurface::<Brittle>::new()).unwrap();
        let generation = list.submit(vec![Brittle(1), Brittle(0)]);

        let err = tokio::time::timeout(Duration::from_secs(5), list.settle())
            .await
            .expect("settle returned")
            .unwrap_err();
        assert!(matches!(err, ReconcilerError::DiffFailed { generation: g, .. } if g == generation));
        assert!(list.is_settled());
        assert_eq!(list.current_count(), 0);
        assert_eq!(list.surface().scripts_applied(), 0);

        list.submit(vec![Brittle(1), Brittle(2)]);
        list.settle().await.unwrap();
        assert_eq!(list.surface().rows(), &[Brittle(1), Brittle(2)][..]);
    }

    #[test]
    fn spawn_outside_runtime_is_an_error() {
        let result = ListReconciler::<GameRecord, _>::spawn(VecSurface::new());
        assert!(matches!(result, Err(ReconcilerError::NoRuntime(_))));
    }
}
