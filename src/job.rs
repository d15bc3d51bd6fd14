//! Jobs and their caller-side completion handles.
//!
//! A job is one submitted operation, type-erased so heterogeneous
//! result types can share a bucket's queue. The caller keeps a
//! [`JobHandle`], the receiving half of a oneshot channel the executor
//! resolves exactly once.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt as _;
use futures::future::BoxFuture;
use tokio::sync::oneshot;

/// What the executor sends back for one job: the operation's own
/// result, or the panic payload if it panicked mid-flight.
type Completion<T, E> = std::thread::Result<Result<T, E>>;

/// One queued unit of work.
///
/// Owns the caller's operation and the sender half of its completion
/// channel. Executing a job cannot fail from the executor's point of
/// view: errors and panics are routed into the channel, which the
/// executor never inspects.
pub(crate) struct Job {
    run: Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>,
}

impl Job {
    /// Wrap `operation` into an erased job and its caller-side handle.
    pub(crate) fn new<F, Fut, T, E>(operation: F) -> (Self, JobHandle<T, E>)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let run = Box::new(move || {
            async move {
                // The operation is invoked inside the guarded future so
                // a panic during construction is caught as well.
                let completion: Completion<T, E> =
                    AssertUnwindSafe(async move { operation().await })
                        .catch_unwind()
                        .await;
                // The caller may have dropped the handle; the job still
                // counts as executed.
                let _ = tx.send(completion);
            }
            .boxed()
        });

        (Self { run }, JobHandle { rx })
    }

    /// Run the operation to completion and resolve the handle.
    pub(crate) async fn execute(self) {
        (self.run)().await;
    }
}

/// Caller-side future for one submitted job.
///
/// Resolves with the operation's own `Result` once the job has run.
/// Every submission gets a distinct handle, even under the same bucket.
/// If the operation panicked, the panic payload is resumed here on the
/// awaiting task (the `RemoteHandle` convention) rather than taking the
/// bucket's executor down with it.
pub struct JobHandle<T, E> {
    rx: oneshot::Receiver<Completion<T, E>>,
}

impl<T, E> std::fmt::Debug for JobHandle<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle").finish_non_exhaustive()
    }
}

impl<T, E> Future for JobHandle<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(Ok(result))) => Poll::Ready(result),
            Poll::Ready(Ok(Err(panic))) => std::panic::resume_unwind(panic),
            // Unreachable while an executor owns the job; possible only
            // if the runtime is torn down mid-drain.
            Poll::Ready(Err(_)) => panic!("bucket executor dropped a job without resolving it"),
            Poll::Pending => Poll::Pending,
        }
    }
}
