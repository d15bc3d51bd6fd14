//! # serialq
//!
//! Keyed serialization of async work. Jobs submitted under the same
//! bucket key run strictly one at a time, in submission order; distinct
//! buckets drain independently and concurrently.
//!
//! Built to guard a per-key resource (a session store, a connection's
//! backing state) without the caller managing locks: submit a
//! zero-argument async operation tagged with the key, await the handle.
//! The first submission for an idle key spawns a drain task; jobs
//! appended while it runs are picked up before it retires.

pub mod bucket;
pub mod config;
pub mod error;
pub mod job;
pub mod queue;

pub use bucket::BucketKey;
pub use config::{DEFAULT_GC_LIMIT, QueueConfig};
pub use error::{Error, Result};
pub use job::JobHandle;
pub use queue::JobQueue;

use std::future::Future;
use std::sync::OnceLock;

static GLOBAL: OnceLock<JobQueue<String>> = OnceLock::new();

/// Submit `operation` to the process-wide queue under `bucket`.
///
/// Convenience over a lazily-created global [`JobQueue<String>`], tuned
/// from the environment (see [`QueueConfig::from_env`]) the first time
/// it is touched. Programs that want non-string keys or their own
/// tuning construct a [`JobQueue`] directly.
///
/// Must be called from within a tokio runtime.
pub fn submit<F, Fut, T, E>(bucket: impl Into<String>, operation: F) -> JobHandle<T, E>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    global().submit(bucket.into(), operation)
}

fn global() -> &'static JobQueue<String> {
    GLOBAL.get_or_init(
        || match QueueConfig::from_env().and_then(JobQueue::with_config) {
            Ok(queue) => queue,
            Err(e) => {
                tracing::warn!("invalid queue config in environment, using defaults: {e}");
                JobQueue::new()
            }
        },
    )
}
