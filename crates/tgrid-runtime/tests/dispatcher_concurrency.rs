//! Concurrency bound and exactly-once execution of the dispatcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tgrid_runtime::{Dispatcher, DispatcherConfig, ScheduleError};
use web_time::Duration;

#[test]
fn eight_workers_twenty_sleeping_tasks() {
    let dispatcher = Dispatcher::new(
        DispatcherConfig::default()
            .with_workers(8)
            .with_queue_capacity(64)
            .with_identity("bound"),
    )
    .unwrap();

    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(Mutex::new(vec![0u32; 20]));

    for id in 0..20 {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        let runs = Arc::clone(&runs);
        dispatcher
            .submit(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(15));
                running.fetch_sub(1, Ordering::SeqCst);
                runs.lock().unwrap()[id] += 1;
            })
            .unwrap();
    }

    assert!(dispatcher.wait_idle(Duration::from_secs(10)));
    assert!(peak.load(Ordering::SeqCst) <= 8);
    assert!(runs.lock().unwrap().iter().all(|&n| n == 1));

    let stats = dispatcher.stats();
    assert_eq!(stats.completed, 20);
    assert_eq!(stats.panicked, 0);
    assert!(stats.peak_active <= 8);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.active, 0);
}

#[test]
fn blocking_submit_waits_for_room() {
    let dispatcher = Arc::new(
        Dispatcher::new(
            DispatcherConfig::default()
                .with_workers(1)
                .with_queue_capacity(1)
                .with_idle_interval(Duration::from_millis(5)),
        )
        .unwrap(),
    );
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    dispatcher
        .submit(move || {
            let _ = release_rx.recv();
        })
        .unwrap();
    // Wait until the worker holds the first task so the queue slot is free.
    let deadline = web_time::Instant::now() + Duration::from_secs(2);
    while dispatcher.stats().active == 0 && web_time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    dispatcher.submit(|| {}).unwrap();
    assert!(matches!(
        dispatcher.try_submit(|| {}),
        Err(ScheduleError::QueueFull)
    ));

    let submitted = Arc::new(AtomicUsize::new(0));
    let blocked = {
        let dispatcher = Arc::clone(&dispatcher);
        let submitted = Arc::clone(&submitted);
        thread::spawn(move || {
            dispatcher.submit(|| {}).unwrap();
            submitted.store(1, Ordering::SeqCst);
        })
    };
    thread::sleep(Duration::from_millis(30));
    assert_eq!(submitted.load(Ordering::SeqCst), 0, "submit should block");

    release_tx.send(()).unwrap();
    blocked.join().unwrap();
    assert_eq!(submitted.load(Ordering::SeqCst), 1);
    assert!(dispatcher.wait_idle(Duration::from_secs(2)));
    assert_eq!(dispatcher.stats().completed, 3);
}

#[test]
fn drop_drains_queue() {
    let count = Arc::new(AtomicUsize::new(0));
    {
        let dispatcher = Dispatcher::new(DispatcherConfig::default().with_workers(2)).unwrap();
        for _ in 0..30 {
            let count = Arc::clone(&count);
            dispatcher
                .submit(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
    }
    assert_eq!(count.load(Ordering::SeqCst), 30);
}
