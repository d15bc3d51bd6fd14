//! Ordering, independence, and lifecycle tests for the bucket registry.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use serialq::{BucketKey, JobQueue};

/// Poll until `bucket` has retired from the registry. The handle for a
/// job resolves moments before its executor's teardown, so tests that
/// assert absence give the executor a beat to finish.
async fn wait_until_inactive<K: BucketKey>(queue: &JobQueue<K>, bucket: &K) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.is_active(bucket) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("bucket never retired");
}

// ---------------------------------------------------------------------------
// FIFO within a bucket
// ---------------------------------------------------------------------------

#[tokio::test]
async fn jobs_under_one_bucket_run_in_submission_order() {
    let queue = JobQueue::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..50u64 {
        let log = Arc::clone(&log);
        handles.push(queue.submit("fifo".to_string(), move || async move {
            // Later jobs would finish faster if they ran concurrently;
            // order must hold regardless of per-job latency.
            tokio::time::sleep(Duration::from_millis((50 - i) / 10)).await;
            log.lock().unwrap().push(i);
            Ok::<_, Infallible>(i)
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), i as u64);
    }
    assert_eq!(*log.lock().unwrap(), (0..50).collect::<Vec<_>>());
}

#[tokio::test]
async fn each_submission_gets_a_distinct_handle() {
    let queue = JobQueue::new();

    let first = queue.submit("pair", || async { Ok::<_, Infallible>(1) });
    let second = queue.submit("pair", || async { Ok::<_, Infallible>(2) });

    assert_eq!(first.await.unwrap(), 1);
    assert_eq!(second.await.unwrap(), 2);
}

// ---------------------------------------------------------------------------
// Independence across buckets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn a_blocked_bucket_does_not_delay_others() {
    let queue = JobQueue::new();
    let gate = Arc::new(Notify::new());

    let blocked = {
        let gate = Arc::clone(&gate);
        queue.submit("slow", move || async move {
            gate.notified().await;
            Ok::<_, Infallible>("slow done")
        })
    };

    // The fast bucket completes while the slow one is still wedged.
    let fast = queue.submit("fast", || async { Ok::<_, Infallible>("fast done") });
    assert_eq!(fast.await.unwrap(), "fast done");
    assert!(queue.is_active(&"slow"));

    gate.notify_one();
    assert_eq!(blocked.await.unwrap(), "slow done");
}

// ---------------------------------------------------------------------------
// Exactly one executor per bucket
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_executor_per_bucket_under_a_submission_burst() {
    let queue = JobQueue::new();
    let running = Arc::new(AtomicUsize::new(0));
    let overlap = Arc::new(AtomicBool::new(false));

    let mut submitters = Vec::new();
    for _ in 0..16 {
        let queue = queue.clone();
        let running = Arc::clone(&running);
        let overlap = Arc::clone(&overlap);
        submitters.push(tokio::spawn(async move {
            let mut handles = Vec::new();
            for _ in 0..25 {
                let running = Arc::clone(&running);
                let overlap = Arc::clone(&overlap);
                handles.push(queue.submit("contended", move || async move {
                    if running.fetch_add(1, Ordering::SeqCst) != 0 {
                        overlap.store(true, Ordering::SeqCst);
                    }
                    tokio::task::yield_now().await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(())
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }
        }));
    }
    for submitter in submitters {
        submitter.await.unwrap();
    }

    assert!(
        !overlap.load(Ordering::SeqCst),
        "two jobs under one bucket ran concurrently"
    );
}

// ---------------------------------------------------------------------------
// Retirement
// ---------------------------------------------------------------------------

#[tokio::test]
async fn drained_bucket_leaves_the_registry() {
    let queue = JobQueue::new();

    let handle = queue.submit("ephemeral", || async { Ok::<_, Infallible>(42) });
    assert_eq!(handle.await.unwrap(), 42);

    wait_until_inactive(&queue, &"ephemeral").await;
    assert_eq!(queue.active_buckets(), 0);
    assert_eq!(queue.pending_jobs(&"ephemeral"), 0);
}

#[tokio::test]
async fn resubmission_after_retirement_starts_fresh() {
    let queue = JobQueue::new();

    let first = queue.submit("revenant", || async { Ok::<_, Infallible>("first") });
    assert_eq!(first.await.unwrap(), "first");
    wait_until_inactive(&queue, &"revenant").await;

    // Same key again: a brand-new queue and executor, same guarantees.
    let second = queue.submit("revenant", || async { Ok::<_, Infallible>("second") });
    assert_eq!(second.await.unwrap(), "second");
    wait_until_inactive(&queue, &"revenant").await;
}

// ---------------------------------------------------------------------------
// Process-wide entry point
// ---------------------------------------------------------------------------

#[tokio::test]
async fn process_wide_submit_serializes_per_bucket() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..10u32 {
        let log = Arc::clone(&log);
        handles.push(serialq::submit("global-bucket", move || async move {
            log.lock().unwrap().push(i);
            Ok::<_, Infallible>(i)
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), i as u32);
    }
    assert_eq!(*log.lock().unwrap(), (0..10).collect::<Vec<_>>());
}
