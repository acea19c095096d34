use tether::{CompletionLatch, Failure, FailureAggregator, FailureSink, RuntimeBuilder, verify};

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn failures_from_several_threads_drain_in_arrival_order() {
    let failures = FailureAggregator::new();

    for name in ["A", "B", "C"] {
        let sink = failures.sink();
        thread::spawn(move || sink.record(Failure::new(name)))
            .join()
            .unwrap();
    }

    assert_eq!(failures.len(), 3);

    for expected in ["A", "B", "C"] {
        let failure = failures.drain_and_raise().unwrap_err();
        assert_eq!(failure.message(), expected);
    }

    assert!(failures.drain_and_raise().is_ok());
    assert!(failures.is_empty());
}

#[test]
fn loop_callbacks_drain_in_dispatch_order() {
    let failures = FailureAggregator::new();
    let rt = RuntimeBuilder::new()
        .worker_threads(1)
        .failure_sink(failures.sink())
        .build()
        .unwrap();

    let context = rt.new_context();
    for name in ["A", "B", "C"] {
        context.execute(move || Err(Failure::new(name))).unwrap();
    }

    let done = CompletionLatch::new();
    let signal = done.clone();
    context
        .execute(move || {
            signal.complete();
            Ok(())
        })
        .unwrap();
    assert!(done.wait(WAIT));

    for expected in ["A", "B", "C"] {
        assert_eq!(failures.drain_and_raise().unwrap_err().message(), expected);
    }
    assert!(failures.drain_and_raise().is_ok());
}

fn check_reply(sink: &FailureSink, bytes: usize) -> Result<(), Failure> {
    verify!(sink, bytes == 5, "expected 5 bytes, got {}", bytes);
    Ok(())
}

#[test]
fn assertion_in_a_callback_surfaces_after_the_wait() {
    let failures = FailureAggregator::new();
    let rt = RuntimeBuilder::new()
        .worker_threads(2)
        .failure_sink(failures.sink())
        .build()
        .unwrap();

    let latch = CompletionLatch::new();
    let settler = latch.clone();
    let sink = failures.sink();

    rt.new_context()
        .execute(move || {
            let outcome = check_reply(&sink, 4);
            settler.complete();
            outcome
        })
        .unwrap();

    // the awaited operation itself succeeds
    assert!(latch.wait(WAIT));

    let failure = failures.drain_and_raise().unwrap_err();
    assert_eq!(failure.message(), "expected 5 bytes, got 4");
    assert!(failure.is_recorded());
    assert!(failure.location().file().ends_with("failures.rs"));

    drop(rt);
    assert!(failures.drain_and_raise().is_ok());
}

#[test]
fn panicking_callback_is_recorded_and_the_loop_survives() {
    let failures = FailureAggregator::new();
    let rt = RuntimeBuilder::new()
        .worker_threads(1)
        .failure_sink(failures.sink())
        .thread_name("panicky")
        .build()
        .unwrap();

    let context = rt.new_context();
    context.execute(|| panic!("boom")).unwrap();

    let (tx, rx) = mpsc::channel();
    context
        .execute(move || {
            tx.send(thread::current().name().map(str::to_owned)).unwrap();
            Ok(())
        })
        .unwrap();

    let name = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(name.as_deref(), Some("panicky-0"));

    let failure = failures.drain_and_raise().unwrap_err();
    assert_eq!(failure.message(), "panicked: boom");
    assert_eq!(failure.thread_name(), Some("panicky-0"));
}

#[test]
fn records_after_the_aggregator_is_gone_are_dropped() {
    let failures = FailureAggregator::new();
    let sink = failures.sink();
    drop(failures);

    sink.record(Failure::new("nobody listens"));
    let _ = sink.record_and_propagate(Failure::new("still fine"));
}
