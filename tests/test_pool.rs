use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

use warden::pool::{Admission, PoolError, Task, ThreadPool};

#[test]
fn test_pool_runs_every_job() {
    let done = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&done);
    let pool = ThreadPool::new(4, 1000, move |n: usize| {
        counter.fetch_add(n, Ordering::SeqCst);
    })
    .unwrap();

    for _ in 0..100 {
        assert!(pool.add(1).unwrap().is_accepted());
    }
    pool.shutdown();

    assert_eq!(done.load(Ordering::SeqCst), 100);
}

#[test]
fn test_pool_zero_threads_uses_available_parallelism() {
    let pool = ThreadPool::for_tasks(0, 10).unwrap();
    assert!(pool.threads() >= 1);
}

#[test]
fn test_pool_rejects_when_queue_exceeds_max_load() {
    let gate = Arc::new(Barrier::new(2));
    let (started_tx, started_rx) = mpsc::channel();
    let worker_gate = Arc::clone(&gate);
    let started_tx = Mutex::new(started_tx);

    let pool = ThreadPool::new(1, 2, move |job: u32| {
        if job == 0 {
            let _ = started_tx.lock().unwrap().send(());
            worker_gate.wait();
        }
    })
    .unwrap();

    // Occupy the only worker.
    assert!(pool.add(0).unwrap().is_accepted());
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // The queue may hold max_load + 1 jobs before rejecting.
    for job in 1..=3 {
        assert!(pool.add(job).unwrap().is_accepted());
    }
    assert_eq!(pool.pending(), 3);

    match pool.add(99).unwrap() {
        Admission::Saturated(job) => assert_eq!(job, 99),
        Admission::Accepted => panic!("queue should be saturated"),
    }

    gate.wait();
    pool.shutdown();
    assert_eq!(pool.pending(), 0);
}

#[test]
fn test_pool_add_after_shutdown_is_an_error() {
    let pool = ThreadPool::for_tasks(2, 10).unwrap();
    pool.shutdown();

    let result = pool.add(Box::new(|| {}) as Task);
    assert!(matches!(result, Err(PoolError::Stopped)));
}

#[test]
fn test_pool_survives_panicking_job() {
    let (tx, rx) = mpsc::channel::<u32>();
    let tx = Mutex::new(tx);
    let pool = ThreadPool::new(1, 10, move |job: u32| {
        if job == 0 {
            panic!("job failed");
        }
        tx.lock().unwrap().send(job).unwrap();
    })
    .unwrap();

    pool.add(0).unwrap();
    pool.add(7).unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
}

#[test]
fn test_pool_executes_tasks_fifo_on_single_worker() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let pool = ThreadPool::for_tasks(1, 100).unwrap();

    for i in 0..10 {
        let order = Arc::clone(&order);
        pool.add(Box::new(move || order.lock().unwrap().push(i)) as Task)
            .unwrap();
    }
    pool.shutdown();

    assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
}
