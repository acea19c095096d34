use tether::testing::TestHarness;
use tether::time::sleep;

use std::time::{Duration, Instant};

#[tether::test]
fn test_sleep_basic(harness: &TestHarness) {
    let elapsed = harness
        .runtime()
        .block_on(async {
            let start = Instant::now();
            sleep(Duration::from_millis(50)).await;
            start.elapsed()
        })
        .unwrap();

    assert!(
        elapsed >= Duration::from_millis(50),
        "Sleep should wait at least the specified duration"
    );
}

#[tether::test]
fn test_sleep_zero_duration(harness: &TestHarness) {
    let elapsed = harness
        .runtime()
        .block_on(async {
            let start = Instant::now();
            sleep(Duration::ZERO).await;
            start.elapsed()
        })
        .unwrap();

    assert!(
        elapsed < Duration::from_millis(50),
        "Zero duration sleep should be fast"
    );
}

#[tether::test(worker_threads = 2)]
fn test_sleeps_on_many_contexts_overlap(harness: &TestHarness) {
    let handle = harness.handle().clone();
    let start = Instant::now();

    harness
        .runtime()
        .block_on(async move {
            let sleepers: Vec<_> = (0..10)
                .map(|_| {
                    handle
                        .new_context()
                        .spawn(sleep(Duration::from_millis(100)))
                })
                .collect();

            for sleeper in sleepers {
                sleeper.await.unwrap();
            }
        })
        .unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(1), "sleeps ran one after another");
}

#[tether::test]
fn test_dropped_sleep_does_not_wake(harness: &TestHarness) {
    let outcome = harness
        .runtime()
        .block_on(async {
            drop(sleep(Duration::from_millis(10)));
            sleep(Duration::from_millis(30)).await;
            "done"
        })
        .unwrap();

    assert_eq!(outcome, "done");
}

#[test]
#[should_panic(expected = "outside of an event loop")]
fn test_sleep_outside_a_runtime_panics() {
    let waker = std::task::Waker::noop();
    let mut cx = std::task::Context::from_waker(waker);
    let mut timer = std::pin::pin!(sleep(Duration::from_secs(1)));

    let _ = std::future::Future::poll(timer.as_mut(), &mut cx);
}
