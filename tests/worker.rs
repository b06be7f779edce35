use solus::{CancellationToken, Error, WorkerBuilder, WorkerThread};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[test]
fn test_async_action_resolves_after_running() {
    let worker = WorkerBuilder::new().queue_capacity(32).build();
    let token = CancellationToken::new();
    let run = worker.start(token.clone());

    let result = worker.run_in_thread_async(|| 1 + 1).wait();
    assert_eq!(result.unwrap(), 2);

    token.cancel();
    assert!(run.join().is_ok());
}

#[test]
fn test_actions_run_on_the_dedicated_thread() {
    let worker = WorkerThread::new();
    let token = CancellationToken::new();
    let run = worker.start(token.clone());

    let caller = thread::current().id();
    let executed_on = worker
        .run_in_thread_async(|| thread::current().id())
        .wait()
        .unwrap();

    assert_ne!(executed_on, caller);

    token.cancel();
    run.join().unwrap();
}

#[test]
fn test_same_thread_posts_execute_in_order() {
    let worker = WorkerBuilder::new().queue_capacity(4).build();
    let token = CancellationToken::new();
    let run = worker.start(token.clone());

    let log = Arc::new(Mutex::new(Vec::new()));
    for value in 0..100 {
        let log = log.clone();
        worker.run_in_thread(move || log.lock().unwrap().push(value));
    }

    // The queue is FIFO, so a final awaitable post fences all of the above.
    worker.run_in_thread_async(|| ()).wait().unwrap();
    assert_eq!(*log.lock().unwrap(), (0..100).collect::<Vec<_>>());

    token.cancel();
    run.join().unwrap();
}

#[test]
fn test_concurrent_posts_linearize_per_producer() {
    const PRODUCERS: usize = 3;
    const PER_PRODUCER: usize = 100;

    let worker = Arc::new(WorkerBuilder::new().queue_capacity(4).build());
    let token = CancellationToken::new();
    let run = worker.start(token.clone());

    let log = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let worker = worker.clone();
            let log = log.clone();
            thread::spawn(move || {
                for sequence in 0..PER_PRODUCER {
                    let log = log.clone();
                    worker.run_in_thread(move || {
                        log.lock().unwrap().push((producer, sequence));
                    });
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    worker.run_in_thread_async(|| ()).wait().unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), PRODUCERS * PER_PRODUCER);
    for producer in 0..PRODUCERS {
        let sequence: Vec<_> = log
            .iter()
            .filter(|(owner, _)| *owner == producer)
            .map(|(_, sequence)| *sequence)
            .collect();
        assert_eq!(sequence, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
    drop(log);

    token.cancel();
    run.join().unwrap();
}

#[test]
fn test_async_failure_leaves_worker_alive() {
    let worker = WorkerThread::new();
    let token = CancellationToken::new();
    let run = worker.start(token.clone());

    let failure = worker
        .run_in_thread_async(|| -> i32 { panic!("boom") })
        .wait();
    assert!(matches!(failure, Err(Error::ActionFailed(message)) if message == "boom"));

    // The worker keeps processing items after a reported failure.
    let result = worker.run_in_thread_async(|| 41 + 1).wait();
    assert_eq!(result.unwrap(), 42);

    token.cancel();
    assert!(run.join().is_ok());
}

#[test]
fn test_fire_and_forget_failure_is_fatal() {
    let worker = WorkerBuilder::new().queue_capacity(32).build();
    let token = CancellationToken::new();
    let run = worker.start(token.clone());

    let survivor_ran = Arc::new(AtomicBool::new(false));

    worker.run_in_thread(|| panic!("boom"));
    let survivor = survivor_ran.clone();
    worker.run_in_thread(move || survivor.store(true, Ordering::SeqCst));

    let outcome = run.join();
    assert!(matches!(outcome, Err(Error::ActionFailed(message)) if message == "boom"));

    // Items still queued behind the failure are never invoked.
    thread::sleep(Duration::from_millis(20));
    assert!(!survivor_ran.load(Ordering::SeqCst));
}

#[test]
fn test_cancel_wakes_an_idle_worker() {
    let worker = WorkerThread::new();
    let token = CancellationToken::new();
    let run = worker.start(token.clone());

    // The worker is parked on its empty queue; cancellation must end the
    // loop without any further posts.
    token.cancel();
    assert!(run.join().is_ok());
}

#[test]
fn test_cancel_does_not_run_pending_items() {
    let worker = WorkerThread::new();
    let token = CancellationToken::new();
    let run = worker.start(token.clone());

    let pending_ran = Arc::new(AtomicBool::new(false));

    let gate = token.clone();
    worker.run_in_thread(move || {
        gate.cancel();
        thread::sleep(Duration::from_millis(10));
    });
    let pending = pending_ran.clone();
    worker.run_in_thread(move || pending.store(true, Ordering::SeqCst));

    run.join().unwrap();
    assert!(!pending_ran.load(Ordering::SeqCst));
}

#[test]
fn test_start_in_current_thread_blocks_until_cancelled() {
    let worker = Arc::new(WorkerThread::new());
    let token = CancellationToken::new();

    let executed_on = Arc::new(Mutex::new(None));

    let observed = executed_on.clone();
    let gate = token.clone();
    worker.run_in_thread(move || {
        *observed.lock().unwrap() = Some(thread::current().id());
        gate.cancel();
    });

    let bound = worker.clone();
    let host = thread::spawn(move || {
        let host_id = thread::current().id();
        (host_id, bound.start_in_current_thread(token))
    });

    let (host_id, outcome) = host.join().unwrap();
    assert!(outcome.is_ok());
    assert_eq!(*executed_on.lock().unwrap(), Some(host_id));
}

#[test]
fn test_nested_bind_is_rejected() {
    let outer = WorkerThread::new();
    let token = CancellationToken::new();
    let run = outer.start(token.clone());

    let nested = outer
        .run_in_thread_async(|| {
            let inner = WorkerThread::new();
            inner.start_in_current_thread(CancellationToken::new())
        })
        .wait()
        .unwrap();
    assert!(matches!(nested, Err(Error::AlreadyBound)));

    token.cancel();
    run.join().unwrap();
}

#[test]
fn test_send_is_unsupported() {
    let worker = WorkerThread::new();

    let refused = worker.context().send(|| {});
    assert!(matches!(refused, Err(Error::Unsupported)));
}

#[test]
fn test_posts_before_start_run_after_start() {
    let worker = WorkerThread::new();
    let token = CancellationToken::new();

    let log = Arc::new(Mutex::new(Vec::new()));
    for value in 0..3 {
        let log = log.clone();
        worker.run_in_thread(move || log.lock().unwrap().push(value));
    }

    let run = worker.start(token.clone());

    assert!(wait_until(Duration::from_secs(1), || {
        log.lock().unwrap().len() == 3
    }));
    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);

    token.cancel();
    run.join().unwrap();
}

#[test]
#[should_panic(expected = "queue_capacity must be >= 2")]
fn test_queue_capacity_below_two_panics() {
    let _ = WorkerBuilder::new().queue_capacity(1).build();
}

#[test]
#[should_panic(expected = "worker thread already started")]
fn test_second_start_panics() {
    let worker = WorkerThread::new();
    let token = CancellationToken::new();

    let run = worker.start(token.clone());
    token.cancel();
    run.join().unwrap();

    let _ = worker.start(CancellationToken::new());
}
