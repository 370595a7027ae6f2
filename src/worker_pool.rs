//! Bounded worker pool
//!
//! Jobs are queued on a channel and drained by a fixed number of scoped OS
//! threads. Results are handed back to the calling thread in completion order,
//! not submission order.

use crossbeam_channel as channel;
use std::thread;

/// Runs `job` for every item on at most `workers` threads
///
/// `on_result` is called on the calling thread as soon as each result arrives.
/// The function returns once every item has been processed. Workers never wait
/// on each other, the pool size is the only admission limit.
pub(crate) fn run_bounded<T, R, J, C>(items: Vec<T>, workers: usize, job: J, mut on_result: C)
where
    T: Send,
    R: Send,
    J: Fn(T) -> R + Sync,
    C: FnMut(R),
{
    if items.is_empty() {
        return;
    }

    let workers = workers.clamp(1, items.len());
    let (job_tx, job_rx) = channel::unbounded::<T>();
    let (result_tx, result_rx) = channel::unbounded::<R>();

    for item in items {
        // The receiver is alive until the scope below ends
        let _ = job_tx.send(item);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let job = &job;

            scope.spawn(move || {
                for item in job_rx.iter() {
                    if result_tx.send(job(item)).is_err() {
                        return;
                    }
                }
            });
        }
        drop(result_tx);

        for result in result_rx.iter() {
            on_result(result);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_every_item_is_processed_once() {
        let mut results = Vec::new();
        run_bounded((0..20).collect(), 3, |n: u32| n * 2, |r| results.push(r));

        results.sort_unstable();
        assert_eq!(results, (0..20).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrency_never_exceeds_pool_size() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        run_bounded(
            (0..12).collect::<Vec<u32>>(),
            3,
            |_| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                active.fetch_sub(1, Ordering::SeqCst);
            },
            |_| {},
        );

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_empty_input_and_zero_workers() {
        let mut calls = 0;
        run_bounded(Vec::<u32>::new(), 4, |n| n, |_| calls += 1);
        assert_eq!(calls, 0);

        run_bounded(vec![1, 2, 3], 0, |n: u32| n, |_| calls += 1);
        assert_eq!(calls, 3);
    }
}
