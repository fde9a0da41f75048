use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, Sender, bounded};
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crate::action::BulkAction;

use super::breaker::FailureBreaker;
use super::cancel::CancelToken;
use super::outcome::{Failed, RunReport, Succeeded};
use super::policy::{Backoff, ErrorClass};

/// Tuning for one pool run.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Worker threads (0 = one per CPU core)
    pub workers: usize,
    /// Retries per item after the first attempt
    pub max_retries: usize,
    /// Permanent failures tolerated before remaining items are discarded
    pub max_failures: usize,
    /// Delay policy between attempts on the same item
    pub backoff: Backoff,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            max_retries: 3,
            max_failures: 1,
            backoff: Backoff::default(),
        }
    }
}

type Classifier = dyn Fn(&anyhow::Error) -> ErrorClass + Send + Sync;

/// Fans one action out over many items with bounded concurrency.
///
/// Each item gets up to `max_retries + 1` attempts with backoff between
/// them. Permanent failures feed a shared [`FailureBreaker`]; once open,
/// workers discard items they have not started yet while in-flight items
/// finish. The run returns a [`RunReport`] placing every input item in
/// exactly one of succeeded, failed, or discarded.
pub struct WorkerPool {
    config: PoolConfig,
    classifier: Option<Box<Classifier>>,
    cancel: CancelToken,
}

/// Per-thread bundle so worker spawns stay readable.
struct WorkerContext<'a, T, A: BulkAction<T>, P> {
    worker_id: usize,
    state: A::Worker,
    work_rx: Receiver<(usize, T)>,
    verdict_tx: Sender<(usize, Verdict<T>)>,
    breaker: &'a FailureBreaker,
    progress_counter: Arc<AtomicUsize>,
    progress: Option<Arc<P>>,
    total: usize,
}

enum Verdict<T> {
    Succeeded(Succeeded<T>),
    Failed(Failed<T>),
    Discarded(T),
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            classifier: None,
            cancel: CancelToken::new(),
        }
    }

    /// Decide per error whether another attempt is worth it. Without a
    /// classifier every error is treated as transient and retried.
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&anyhow::Error) -> ErrorClass + Send + Sync + 'static,
    {
        self.classifier = Some(Box::new(classifier));
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Worker threads this pool would use for `work_count` items.
    pub fn resolve_workers(&self, work_count: usize) -> usize {
        let configured = if self.config.workers > 0 {
            self.config.workers
        } else {
            num_cpus::get()
        };
        // Never more workers than items
        configured.min(work_count.max(1))
    }

    /// Run `action` over every item and collect the three-way outcome.
    ///
    /// Per-worker state is built up front on the calling thread; an error
    /// there aborts the run before anything is attempted. The optional
    /// `progress` callback sees (done, total) every few completions.
    pub fn run<T, A, P>(&self, items: Vec<T>, action: &A, progress: Option<P>) -> Result<RunReport<T>>
    where
        T: Send + Display,
        A: BulkAction<T>,
        A::Worker: Send,
        P: Fn(usize, usize) + Send + Sync,
    {
        let started = Instant::now();
        let total = items.len();
        if total == 0 {
            return Ok(RunReport::empty(started.elapsed()));
        }

        let workers = self.resolve_workers(total);
        let mut states = Vec::with_capacity(workers);
        for slot in 0..workers {
            states.push(
                action
                    .init_worker(slot)
                    .with_context(|| format!("initializing worker {slot}"))?,
            );
        }

        let breaker = FailureBreaker::new(self.config.max_failures);
        let (work_tx, work_rx) = bounded::<(usize, T)>(workers * 2);
        let (verdict_tx, verdict_rx) = bounded::<(usize, Verdict<T>)>(workers * 4);
        let progress_counter = Arc::new(AtomicUsize::new(0));
        let progress = progress.map(Arc::new);

        let mut verdicts = crossbeam::thread::scope(|s| {
            for (worker_id, state) in states.into_iter().enumerate() {
                let ctx = WorkerContext {
                    worker_id,
                    state,
                    work_rx: work_rx.clone(),
                    verdict_tx: verdict_tx.clone(),
                    breaker: &breaker,
                    progress_counter: progress_counter.clone(),
                    progress: progress.clone(),
                    total,
                };
                s.spawn(move |_| self.worker_thread(ctx, action));
            }

            // Producer: feed items in input order
            let work_tx_clone = work_tx.clone();
            s.spawn(move |_| {
                for indexed in items.into_iter().enumerate() {
                    if work_tx_clone.send(indexed).is_err() {
                        break; // Workers dropped
                    }
                }
            });

            // Drop the original senders so receivers know when work is done
            drop(work_tx);
            drop(verdict_tx);

            Self::collect_verdicts(verdict_rx, total)
        })
        .map_err(|_| anyhow::anyhow!("a worker thread panicked"))?;

        verdicts.sort_by_key(|(index, _)| *index);

        let mut report = RunReport::empty(started.elapsed());
        for (_, verdict) in verdicts {
            match verdict {
                Verdict::Succeeded(done) => report.succeeded.push(done),
                Verdict::Failed(failed) => report.failed.push(failed),
                Verdict::Discarded(item) => report.discarded.push(item),
            }
        }
        Ok(report)
    }

    fn worker_thread<T, A, P>(&self, mut ctx: WorkerContext<'_, T, A, P>, action: &A)
    where
        T: Display,
        A: BulkAction<T>,
        P: Fn(usize, usize),
    {
        while let Ok((index, item)) = ctx.work_rx.recv() {
            let verdict = if self.cancel.is_cancelled() {
                tracing::info!("discarding {item}: run cancelled");
                Verdict::Discarded(item)
            } else if ctx.breaker.is_open() {
                tracing::info!(
                    "discarding {item}: failure ceiling of {} exceeded",
                    self.config.max_failures
                );
                Verdict::Discarded(item)
            } else {
                self.drive_item(&mut ctx.state, action, item, ctx.breaker)
            };

            if ctx.verdict_tx.send((index, verdict)).is_err() {
                break; // Collector dropped
            }

            let done = ctx.progress_counter.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref reporter) = ctx.progress
                && (done % 5 == 0 || done == ctx.total)
            {
                reporter(done, ctx.total);
            }
        }
        tracing::trace!("worker {} finished", ctx.worker_id);
    }

    /// Attempt one item until it succeeds, runs out of attempts, hits a
    /// fatal error, or the run is cancelled between attempts.
    fn drive_item<T, A>(
        &self,
        state: &mut A::Worker,
        action: &A,
        item: T,
        breaker: &FailureBreaker,
    ) -> Verdict<T>
    where
        T: Display,
        A: BulkAction<T>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let error = match action.apply(state, &item) {
                Ok(disposition) => {
                    tracing::debug!("{item}: done in {attempts} attempt(s)");
                    return Verdict::Succeeded(Succeeded {
                        item,
                        attempts,
                        disposition,
                    });
                }
                Err(error) => error,
            };

            let class = match &self.classifier {
                Some(classify) => classify(&error),
                None => ErrorClass::Transient,
            };
            if class == ErrorClass::Fatal {
                tracing::error!("{item}: fatal on attempt {attempts}: {error:#}");
                breaker.record_failure();
                return Verdict::Failed(Failed {
                    item,
                    attempts,
                    error,
                });
            }
            if attempts > self.config.max_retries {
                tracing::error!("{item}: giving up after {attempts} attempt(s): {error:#}");
                breaker.record_failure();
                return Verdict::Failed(Failed {
                    item,
                    attempts,
                    error,
                });
            }

            let delay = self.config.backoff.delay_for(attempts as u32);
            tracing::warn!(
                "{item}: attempt {attempts} failed, retrying in {:.1}s: {error:#}",
                delay.as_secs_f64()
            );
            if !self.cancel.sleep_unless_cancelled(delay) {
                tracing::warn!("{item}: run cancelled while waiting to retry");
                breaker.record_failure();
                return Verdict::Failed(Failed {
                    item,
                    attempts,
                    error,
                });
            }
        }
    }

    fn collect_verdicts<T>(
        verdict_rx: Receiver<(usize, Verdict<T>)>,
        total: usize,
    ) -> Vec<(usize, Verdict<T>)> {
        let mut verdicts = Vec::with_capacity(total);
        while let Ok(verdict) = verdict_rx.recv() {
            verdicts.push(verdict);
            if verdicts.len() >= total {
                break;
            }
        }
        verdicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Disposition;
    use anyhow::bail;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    type NoProgress = fn(usize, usize);

    fn pool(workers: usize, max_retries: usize, max_failures: usize) -> WorkerPool {
        WorkerPool::new(PoolConfig {
            workers,
            max_retries,
            max_failures,
            backoff: Backoff::Fixed {
                delay: Duration::ZERO,
            },
        })
    }

    #[test]
    fn every_item_lands_in_exactly_one_set() {
        let items: Vec<i32> = (0..50).collect();
        let report = pool(4, 1, usize::MAX)
            .run(
                items.clone(),
                &|item: &i32| {
                    if item % 7 == 0 {
                        bail!("refused {item}")
                    }
                    Ok(Disposition::Applied)
                },
                None::<NoProgress>,
            )
            .unwrap();

        assert_eq!(report.total(), items.len());
        let mut seen: Vec<i32> = report
            .succeeded
            .iter()
            .map(|done| done.item)
            .chain(report.failed.iter().map(|failed| failed.item))
            .chain(report.discarded.iter().copied())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, items);
    }

    #[test]
    fn success_on_attempt_k_invokes_exactly_k_times() {
        let calls = Mutex::new(0usize);
        let report = pool(1, 5, usize::MAX)
            .run(
                vec![7],
                &|_: &i32| {
                    let mut calls = calls.lock().unwrap();
                    *calls += 1;
                    if *calls < 3 {
                        bail!("not yet")
                    }
                    Ok(Disposition::Applied)
                },
                None::<NoProgress>,
            )
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].attempts, 3);
    }

    #[test]
    fn permanent_failure_uses_retry_budget_plus_one() {
        let calls = Mutex::new(0usize);
        let report = pool(1, 3, usize::MAX)
            .run(
                vec![1],
                &|_: &i32| -> Result<Disposition> {
                    *calls.lock().unwrap() += 1;
                    bail!("always down")
                },
                None::<NoProgress>,
            )
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), 4);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].attempts, 4);
        assert!(report.failed[0].error.to_string().contains("always down"));
    }

    #[test]
    fn ceiling_discards_unstarted_items() {
        // One worker makes the order deterministic: the first item burns
        // the whole failure budget, so the rest never start.
        let report = pool(1, 0, 0)
            .run(
                vec![1, 2, 3],
                &|item: &i32| {
                    if *item == 1 {
                        bail!("boom")
                    }
                    Ok(Disposition::Applied)
                },
                None::<NoProgress>,
            )
            .unwrap();

        assert_eq!(report.succeeded.len(), 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].item, 1);
        assert_eq!(report.discarded, vec![2, 3]);
    }

    #[test]
    fn one_failure_is_tolerated_and_the_second_stops_the_run() {
        // Single worker, items in order: 3 and 7 always fail. The first
        // permanent failure sits at the ceiling without tripping it, the
        // second trips it, and the tail is never attempted.
        let attempts = Mutex::new(HashMap::<i32, usize>::new());
        let report = pool(1, 2, 1)
            .run(
                (1..=10).collect::<Vec<i32>>(),
                &|item: &i32| {
                    *attempts.lock().unwrap().entry(*item).or_insert(0) += 1;
                    if *item == 3 || *item == 7 {
                        bail!("target {item} keeps refusing")
                    }
                    Ok(Disposition::Applied)
                },
                None::<NoProgress>,
            )
            .unwrap();

        let ok: Vec<i32> = report.succeeded.iter().map(|done| done.item).collect();
        assert_eq!(ok, vec![1, 2, 4, 5, 6]);
        assert!(report.succeeded.iter().all(|done| done.attempts == 1));

        let bad: Vec<i32> = report.failed.iter().map(|failed| failed.item).collect();
        assert_eq!(bad, vec![3, 7]);
        assert!(report.failed.iter().all(|failed| failed.attempts == 3));

        assert_eq!(report.discarded, vec![8, 9, 10]);
        let attempts = attempts.lock().unwrap();
        assert!([8, 9, 10].iter().all(|item| !attempts.contains_key(item)));
    }

    #[test]
    fn concurrency_never_exceeds_worker_count() {
        let in_flight = AtomicUsize::new(0);
        let high_water = AtomicUsize::new(0);
        let report = pool(3, 0, usize::MAX)
            .run(
                (0..20).collect::<Vec<i32>>(),
                &|_: &i32| {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    high_water.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(5));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(Disposition::Applied)
                },
                None::<NoProgress>,
            )
            .unwrap();

        assert_eq!(report.succeeded.len(), 20);
        assert!(high_water.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn idempotent_action_partitions_identically_on_rerun() {
        let action = |item: &i32| {
            if item % 2 == 0 {
                bail!("even items are broken")
            }
            Ok(Disposition::Applied)
        };
        let items: Vec<i32> = (0..10).collect();

        let first = pool(2, 1, usize::MAX)
            .run(items.clone(), &action, None::<NoProgress>)
            .unwrap();
        let second = pool(2, 1, usize::MAX)
            .run(items, &action, None::<NoProgress>)
            .unwrap();

        let ok = |report: &RunReport<i32>| report.succeeded.iter().map(|done| done.item).collect::<Vec<_>>();
        let bad = |report: &RunReport<i32>| report.failed.iter().map(|failed| failed.item).collect::<Vec<_>>();
        assert_eq!(ok(&first), ok(&second));
        assert_eq!(bad(&first), bad(&second));
        assert!(first.discarded.is_empty() && second.discarded.is_empty());
    }

    #[test]
    fn unchanged_dispositions_are_counted_separately() {
        let report = pool(2, 0, usize::MAX)
            .run(
                (0..6).collect::<Vec<i32>>(),
                &|item: &i32| {
                    if item % 2 == 0 {
                        Ok(Disposition::Unchanged)
                    } else {
                        Ok(Disposition::Applied)
                    }
                },
                None::<NoProgress>,
            )
            .unwrap();

        assert_eq!(report.applied(), 3);
        assert_eq!(report.unchanged(), 3);
        assert!(report.is_clean());
    }

    #[test]
    fn fatal_classification_skips_the_retry_budget() {
        let calls = Mutex::new(0usize);
        let report = pool(1, 5, usize::MAX)
            .with_classifier(|_| ErrorClass::Fatal)
            .run(
                vec![1],
                &|_: &i32| {
                    *calls.lock().unwrap() += 1;
                    bail!("unrecoverable")
                },
                None::<NoProgress>,
            )
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].attempts, 1);
    }

    #[test]
    fn cancelled_token_discards_everything_unstarted() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = pool(2, 3, usize::MAX)
            .with_cancel_token(cancel)
            .run(
                vec![1, 2, 3],
                &|_: &i32| Ok(Disposition::Applied),
                None::<NoProgress>,
            )
            .unwrap();

        assert_eq!(report.discarded.len(), 3);
        assert!(report.succeeded.is_empty());
    }

    #[test]
    fn cancel_between_attempts_fails_the_dispatched_item() {
        let cancel = CancelToken::new();
        let trip = cancel.clone();
        let report = pool(1, 100, usize::MAX)
            .with_cancel_token(cancel)
            .run(
                vec![1],
                &move |_: &i32| -> Result<Disposition> {
                    // First failure also cancels the run, so the retry
                    // wait is cut short and the item settles as failed.
                    trip.cancel();
                    bail!("down")
                },
                None::<NoProgress>,
            )
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].attempts, 1);
        assert!(report.discarded.is_empty());
    }

    struct SlotTracker {
        init_calls: AtomicUsize,
    }

    impl BulkAction<i32> for SlotTracker {
        type Worker = usize;

        fn init_worker(&self, _slot: usize) -> Result<usize> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }

        fn apply(&self, handled: &mut usize, _item: &i32) -> Result<Disposition> {
            // State is private to one thread, so no locking
            *handled += 1;
            Ok(Disposition::Applied)
        }
    }

    #[test]
    fn worker_state_is_built_once_per_worker() {
        let action = SlotTracker {
            init_calls: AtomicUsize::new(0),
        };
        let report = pool(3, 0, usize::MAX)
            .run((0..9).collect::<Vec<i32>>(), &action, None::<NoProgress>)
            .unwrap();

        assert_eq!(report.succeeded.len(), 9);
        assert_eq!(action.init_calls.load(Ordering::SeqCst), 3);
    }

    struct BrokenInit;

    impl BulkAction<i32> for BrokenInit {
        type Worker = ();

        fn init_worker(&self, slot: usize) -> Result<()> {
            bail!("no connection for worker {slot}")
        }

        fn apply(&self, _worker: &mut (), _item: &i32) -> Result<Disposition> {
            Ok(Disposition::Applied)
        }
    }

    #[test]
    fn init_failure_aborts_before_any_attempt() {
        let error = pool(2, 3, usize::MAX)
            .run(vec![1, 2, 3], &BrokenInit, None::<NoProgress>)
            .unwrap_err();
        assert!(error.to_string().contains("initializing worker"));
    }

    #[test]
    fn empty_input_returns_an_empty_report() {
        let report = pool(4, 3, 1)
            .run(
                Vec::<i32>::new(),
                &|_: &i32| Ok(Disposition::Applied),
                None::<NoProgress>,
            )
            .unwrap();
        assert_eq!(report.total(), 0);
        assert!(report.is_clean());
    }

    #[test]
    fn worker_count_never_exceeds_item_count() {
        let pool = pool(8, 0, 0);
        assert!(pool.resolve_workers(2) <= 2);
        assert!(pool.resolve_workers(0) >= 1);
    }

    #[test]
    fn attempts_per_item_stay_independent() {
        let per_item: Mutex<HashMap<i32, usize>> = Mutex::new(HashMap::new());
        pool(2, 2, usize::MAX)
            .run(
                vec![1, 2, 3, 4],
                &|item: &i32| {
                    let mut seen = per_item.lock().unwrap();
                    let calls = seen.entry(*item).or_insert(0);
                    *calls += 1;
                    if *item == 2 && *calls < 3 {
                        bail!("slow start")
                    }
                    Ok(Disposition::Applied)
                },
                None::<NoProgress>,
            )
            .unwrap();

        let seen = per_item.lock().unwrap();
        assert_eq!(seen[&2], 3);
        for other in [1, 3, 4] {
            assert_eq!(seen[&other], 1);
        }
    }
}
