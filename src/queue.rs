//! The bucket registry and per-bucket executor tasks.
//!
//! A [`JobQueue`] maps bucket keys to queues of pending jobs. The first
//! submission for an idle key inserts a queue and spawns an executor
//! task bound to it; later submissions append to the live queue. The
//! executor drains in strict FIFO order, including jobs appended after
//! it started, then removes the queue from the registry and exits.
//!
//! All bookkeeping happens under one mutex that is never held across an
//! await, so queue creation, append, and the executor's empty-check +
//! teardown are each atomic with respect to every other task. In
//! particular, a submission racing the teardown either lands in the
//! queue before the executor's final length check, or finds the key
//! absent and starts a fresh executor. Never both, never neither.
//!
//! Consumed jobs are not removed from storage one by one. The executor
//! walks the queue with an offset cursor and only compacts the
//! processed prefix after a full `gc_limit`-sized batch, amortizing the
//! removal cost over long bursts; each batch boundary also serves as a
//! natural yield point so one hot bucket cannot monopolize the drain
//! loop's bookkeeping.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{Instrument, debug, debug_span, warn};

use crate::bucket::BucketKey;
use crate::config::QueueConfig;
use crate::error::Result;
use crate::job::{Job, JobHandle};

/// Pending jobs for one bucket, plus its diagnostic label.
///
/// A consumed job leaves a `None` slot behind until compaction reclaims
/// the prefix; live jobs only ever sit at or past the executor's
/// cursor.
struct BucketState {
    jobs: Vec<Option<Job>>,
    label: Option<Arc<str>>,
}

/// Registry of per-key serial queues.
///
/// Cheap to clone; all clones share one registry. A key is present in
/// the registry iff exactly one executor task is responsible for
/// draining it.
pub struct JobQueue<K: BucketKey> {
    inner: Arc<Inner<K>>,
}

struct Inner<K> {
    buckets: Mutex<HashMap<K, BucketState>>,
    gc_limit: usize,
}

impl<K: BucketKey> Clone for JobQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: BucketKey> Default for JobQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: BucketKey> JobQueue<K> {
    /// Create a registry with default tuning.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                buckets: Mutex::new(HashMap::new()),
                gc_limit: QueueConfig::default().gc_limit,
            }),
        }
    }

    /// Create a registry with explicit tuning.
    pub fn with_config(config: QueueConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                buckets: Mutex::new(HashMap::new()),
                gc_limit: config.gc_limit,
            }),
        })
    }

    /// Submit `operation` under `bucket`.
    ///
    /// The operation runs once every operation previously submitted
    /// under the same bucket has resolved or failed, never concurrently
    /// with any of them. The returned handle resolves with the
    /// operation's own result; `submit` itself never fails and never
    /// waits on the bucket's backlog.
    ///
    /// Must be called from within a tokio runtime (the executor task is
    /// spawned onto it).
    pub fn submit<F, Fut, T, E>(&self, bucket: K, operation: F) -> JobHandle<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (job, handle) = Job::new(operation);

        // Lookup + append/insert is one critical section: two racing
        // submissions for an idle key can never both spawn an executor.
        let spawn_with_label = {
            let mut buckets = self.inner.lock();
            match buckets.get_mut(&bucket) {
                Some(state) => {
                    state.jobs.push(Some(job));
                    debug!(pending = state.jobs.len(), "job appended to live bucket");
                    None
                }
                None => {
                    let label: Option<Arc<str>> = bucket.label().map(Arc::from);
                    if label.is_none() {
                        warn!(
                            key_type = std::any::type_name::<K>(),
                            "bucket key has no printable label, executor span will be unnamed"
                        );
                    }
                    buckets.insert(
                        bucket.clone(),
                        BucketState {
                            jobs: vec![Some(job)],
                            label: label.clone(),
                        },
                    );
                    Some(label)
                }
            }
        };

        if let Some(label) = spawn_with_label {
            let span = match label {
                Some(name) => debug_span!("bucket_drain", bucket = %name),
                None => debug_span!("bucket_drain"),
            };
            tokio::spawn(Arc::clone(&self.inner).drain(bucket).instrument(span));
        }

        handle
    }

    /// Whether an executor task is currently responsible for `bucket`.
    pub fn is_active(&self, bucket: &K) -> bool {
        self.inner.lock().contains_key(bucket)
    }

    /// Number of buckets with a live executor.
    pub fn active_buckets(&self) -> usize {
        self.inner.lock().len()
    }

    /// Jobs submitted under `bucket` that have not started running.
    /// Zero for idle buckets.
    pub fn pending_jobs(&self, bucket: &K) -> usize {
        self.inner
            .lock()
            .get(bucket)
            .map_or(0, |state| state.jobs.iter().flatten().count())
    }
}

impl<K: BucketKey> Inner<K> {
    fn lock(&self) -> MutexGuard<'_, HashMap<K, BucketState>> {
        // No job runs while the lock is held, so the map is consistent
        // even if a holder panicked.
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drain one bucket to empty, then deregister it and exit.
    ///
    /// Jobs run strictly one at a time; job N+1 never starts before job
    /// N's handle has been resolved or failed. The registry lock is
    /// released while a job runs, so submissions (including re-entrant
    /// ones from inside a job) land freely and are observed either by
    /// the current batch's follow-up pass or by the final length check.
    async fn drain(self: Arc<Self>, bucket: K) {
        let mut offset = 0;
        loop {
            let limit = {
                let buckets = self.lock();
                let Some(state) = buckets.get(&bucket) else {
                    // Only this task removes the entry.
                    warn!("bucket vanished from registry mid-drain");
                    return;
                };
                state.jobs.len().min(self.gc_limit)
            };

            for index in offset..limit {
                let job = {
                    let mut buckets = self.lock();
                    buckets
                        .get_mut(&bucket)
                        .and_then(|state| state.jobs.get_mut(index))
                        .and_then(Option::take)
                };
                let Some(job) = job else {
                    warn!(index, "consumed job slot inside current batch");
                    continue;
                };
                // Failure and panic handling live inside the job; this
                // await cannot take the executor down.
                job.execute().await;
            }

            let mut buckets = self.lock();
            let Some(state) = buckets.get_mut(&bucket) else {
                warn!("bucket vanished from registry mid-drain");
                return;
            };
            if limit < state.jobs.len() {
                // More work arrived while this batch ran.
                if limit >= self.gc_limit {
                    // A full batch was consumed: reclaim the prefix so
                    // index scans stay cheap on long backlogs.
                    state.jobs.drain(..limit);
                    offset = 0;
                    debug!(remaining = state.jobs.len(), "compacted drained prefix");
                } else {
                    // Too little consumed to be worth compacting yet.
                    offset = limit;
                }
            } else {
                // Empty-check and removal under one guard: a submission
                // racing this teardown either got into the batch above
                // or will re-create the bucket from scratch.
                buckets.remove(&bucket);
                debug!(processed = limit, "bucket drained, executor retiring");
                return;
            }
        }
    }
}
