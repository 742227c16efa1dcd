//! Timing contract of the debouncer.

use std::sync::mpsc::channel;
use std::thread;

use tgrid_runtime::{Debouncer, FireMode};
use web_time::{Duration, Instant};

#[test]
fn second_call_wins_and_first_deadline_holds() {
    let debouncer = Debouncer::new(FireMode::Inline).unwrap();
    let (tx, rx) = channel();

    let start = Instant::now();
    let f1 = tx.clone();
    debouncer
        .call("k", Duration::from_millis(10), move || {
            f1.send(("f1", Instant::now())).unwrap();
        })
        .unwrap();
    thread::sleep(Duration::from_millis(2));
    debouncer
        .call("k", Duration::from_millis(10), move || {
            tx.send(("f2", Instant::now())).unwrap();
        })
        .unwrap();

    let (which, fired_at) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(which, "f2");
    assert!(fired_at.duration_since(start) >= Duration::from_millis(10));
    // Loose upper bound; scheduler jitter on shared CI runners is large.
    assert!(fired_at.duration_since(start) < Duration::from_millis(500));
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn sustained_burst_fires_once_per_window() {
    let debouncer = Debouncer::new(FireMode::Inline).unwrap();
    let (tx, rx) = channel();
    for i in 0..10 {
        let tx = tx.clone();
        debouncer
            .call("burst", Duration::from_millis(40), move || tx.send(i).unwrap())
            .unwrap();
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 9);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn key_can_rearm_after_firing() {
    let debouncer = Debouncer::new(FireMode::Inline).unwrap();
    let (tx, rx) = channel();
    for round in 0..3 {
        let tx = tx.clone();
        debouncer
            .call("k", Duration::from_millis(5), move || tx.send(round).unwrap())
            .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), round);
    }
    assert_eq!(debouncer.stats().fired, 3);
}
