//! Bounded worker pool: a shared task queue in, a result channel out.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::error::BatchError;
use crate::cancel::CancelToken;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run `work` over `tasks` on up to `workers` threads.
///
/// Outputs are tagged with the task's index and returned in completion order.
/// On cancellation the call returns [`BatchError::Cancelled`] without waiting
/// for in-flight tasks; workers are detached and stop on their own. A task
/// whose worker panicked is simply absent from the output.
pub(crate) fn run<T, O, F>(
    tasks: Vec<(usize, T)>,
    workers: usize,
    cancel: &CancelToken,
    work: F,
) -> Result<Vec<(usize, O)>, BatchError>
where
    T: Send + 'static,
    O: Send + 'static,
    F: Fn(T) -> O + Send + Sync + 'static,
{
    let total = tasks.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let (task_tx, task_rx) = mpsc::channel::<(usize, T)>();
    for task in tasks {
        // the receiver is alive until the workers finish
        let _ = task_tx.send(task);
    }
    drop(task_tx);

    let task_rx = Arc::new(Mutex::new(task_rx));
    let (result_tx, result_rx) = mpsc::channel::<(usize, O)>();
    let work = Arc::new(work);

    let spawned = workers.clamp(1, total);
    for id in 0..spawned {
        let queue = Arc::clone(&task_rx);
        let result_tx = result_tx.clone();
        let work = Arc::clone(&work);
        let cancel = cancel.clone();
        let spawn = thread::Builder::new()
            .name(format!("mailprobe-worker-{id}"))
            .spawn(move || {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let next = queue.lock().recv();
                    let Ok((index, task)) = next else {
                        break;
                    };
                    let output = work(task);
                    if result_tx.send((index, output)).is_err() {
                        break;
                    }
                }
            });
        if let Err(source) = spawn {
            // empty the queue so the workers already running wind down
            while task_rx.lock().try_recv().is_ok() {}
            return Err(BatchError::WorkerSpawn { source });
        }
    }
    drop(result_tx);
    tracing::debug!(target: "mailprobe::pipeline", "{total} task(s) on {spawned} worker(s)");

    let mut outputs = Vec::with_capacity(total);
    while outputs.len() < total {
        if cancel.is_cancelled() {
            return Err(BatchError::Cancelled);
        }
        match result_rx.recv_timeout(POLL_INTERVAL) {
            Ok(output) => outputs.push(output),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    if cancel.is_cancelled() {
        return Err(BatchError::Cancelled);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Instant;

    #[test]
    fn every_task_is_answered_once() {
        let tasks: Vec<(usize, u64)> = (0..100).map(|i| (i, i as u64)).collect();
        let outputs = run(tasks, 7, &CancelToken::new(), |n: u64| n * 2).expect("pool run");
        assert_eq!(outputs.len(), 100);
        let indices: HashSet<usize> = outputs.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices.len(), 100);
        assert!(outputs.iter().all(|(i, out)| *out == (*i as u64) * 2));
    }

    #[test]
    fn workers_are_bounded() {
        let live = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let peak = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let (l, p) = (Arc::clone(&live), Arc::clone(&peak));
        let tasks: Vec<(usize, ())> = (0..24).map(|i| (i, ())).collect();
        run(tasks, 3, &CancelToken::new(), move |_| {
            use std::sync::atomic::Ordering::SeqCst;
            let now = l.fetch_add(1, SeqCst) + 1;
            p.fetch_max(now, SeqCst);
            thread::sleep(Duration::from_millis(5));
            l.fetch_sub(1, SeqCst);
        })
        .expect("pool run");
        assert!(peak.load(std::sync::atomic::Ordering::SeqCst) <= 3);
    }

    #[test]
    fn empty_input_spawns_nothing() {
        let outputs = run(Vec::<(usize, ())>::new(), 4, &CancelToken::new(), |_| ()).expect("pool run");
        assert!(outputs.is_empty());
    }

    #[test]
    fn panicking_task_is_absent_not_fatal() {
        let tasks: Vec<(usize, usize)> = (0..10).map(|i| (i, i)).collect();
        let outputs = run(tasks, 2, &CancelToken::new(), |n: usize| {
            if n == 4 {
                panic!("boom");
            }
            n
        })
        .expect("pool run");
        assert_eq!(outputs.len(), 9);
        assert!(outputs.iter().all(|(i, _)| *i != 4));
    }

    #[test]
    fn cancellation_returns_without_waiting() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let tasks: Vec<(usize, ())> = (0..4).map(|i| (i, ())).collect();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            trigger.cancel();
        });
        let started = Instant::now();
        let result = run(tasks, 4, &cancel, |_| thread::sleep(Duration::from_secs(3)));
        assert!(matches!(result, Err(BatchError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
