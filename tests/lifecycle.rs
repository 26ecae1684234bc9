//! Integration tests for session and bar lifecycle.
//!
//! Covers:
//! - `Progress::wait` returning once every bar's final frame is flushed
//! - interleaved increments from many producers completing a bar once
//! - the task counter holding the display open for producers
//! - abort with and without drop, and the retained-line region
//! - parking a bar under another and visually replacing it
//! - cancellation releasing all waiters and notifying decorators
//! - bar registration after shutdown

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, watch};

use multibar::{
    decor, BarOptions, DecorError, Decorator, Progress, Statistics, TaskCounter,
};

// ============================================================================
// Helpers
// ============================================================================

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn contents(&self) -> String {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn last_frame(out: &str) -> Vec<String> {
    let tail = out.rsplit("\x1b[J").next().unwrap_or(out);
    tail.lines().map(str::to_string).collect()
}

fn session(sink: &SharedSink, width: usize) -> Progress {
    Progress::builder().output(sink.clone()).width(width).build()
}

/// Route engine logs through the test harness for failure diagnosis.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("multibar=debug")
        .with_test_writer()
        .try_init();
}

/// Decorator that records the shutdown notification.
struct ShutdownProbe(Arc<AtomicBool>);

impl Decorator for ShutdownProbe {
    fn decor(&mut self, _stats: &Statistics) -> Result<String, DecorError> {
        Ok("p".to_string())
    }

    fn on_shutdown(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

// ============================================================================
// Completion and wait
// ============================================================================

#[tokio::test(start_paused = true)]
async fn bar_wait_returns_after_the_terminal_frame() {
    let sink = SharedSink::default();
    let progress = session(&sink, 20);
    let bar = progress.add_bar(3, BarOptions::default());
    bar.incr();
    bar.incr_by(2);
    bar.wait().await;

    assert!(bar.is_completed());
    assert_eq!(bar.current(), 3);
    // the terminal frame reached the sink before the waiter woke
    assert!(sink.contents().contains("[===="), "got {:?}", sink.contents());
}

#[tokio::test(start_paused = true)]
async fn increments_past_the_total_are_ignored() {
    let sink = SharedSink::default();
    let progress = session(&sink, 20);
    let bar = progress.add_bar(5, BarOptions::default());
    bar.incr_by(5);
    bar.incr_by(100);
    bar.wait().await;
    assert_eq!(bar.current(), 5);
}

#[tokio::test(start_paused = true)]
async fn unknown_total_completes_only_by_abort() {
    let sink = SharedSink::default();
    let progress = session(&sink, 20);
    let bar = progress.add_bar(0, BarOptions::default());
    bar.incr_by(500);
    assert!(!bar.is_completed());
    bar.abort(false);
    bar.wait().await;
    assert!(bar.is_completed());
    progress.wait().await;
}

#[tokio::test(start_paused = true)]
async fn interleaved_producers_complete_the_bar_exactly_once() {
    let sink = SharedSink::default();
    let progress = session(&sink, 30);
    let bar = progress.add_bar(80, BarOptions::default());

    let producers: Vec<_> = (0..8)
        .map(|_| {
            let bar = bar.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    bar.incr();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for producer in producers {
        assert!(producer.await.is_ok());
    }

    bar.wait().await;
    assert_eq!(bar.current(), 80, "every increment must land exactly once");
    assert!(bar.is_completed());
    progress.wait().await;
    // one terminal frame: the retained region holds a single full-bar line
    let frame = last_frame(&sink.contents());
    assert_eq!(frame.len(), 1, "got {frame:?}");
    assert!(frame[0].contains("[============"), "got {frame:?}");
}

#[tokio::test(start_paused = true)]
async fn task_counter_holds_the_session_open() {
    init_tracing();
    let sink = SharedSink::default();
    let counter = TaskCounter::new(1);
    let progress = Progress::builder()
        .output(sink.clone())
        .width(20)
        .task_counter(counter.clone())
        .build();
    let bar = progress.add_bar(2, BarOptions::default());

    let producer = {
        let counter = counter.clone();
        let bar = bar.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            bar.incr_by(2);
            counter.done();
        })
    };

    progress.wait().await;
    assert!(producer.is_finished());
    assert!(bar.is_completed());
}

// ============================================================================
// Abort and the retained region
// ============================================================================

#[tokio::test(start_paused = true)]
async fn abort_without_drop_keeps_the_final_line() {
    let sink = SharedSink::default();
    let progress = session(&sink, 30);
    let kept = progress.add_bar(10, BarOptions::default().prepend(decor::Name::new("kept:")));
    let live = progress.add_bar(10, BarOptions::default().prepend(decor::Name::new("live:")));
    kept.incr_by(4);
    kept.abort(false);
    kept.wait().await;

    live.incr();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let frame = last_frame(&sink.contents());
    assert!(frame[0].starts_with("kept:"), "got {frame:?}");
    assert!(frame[1].starts_with("live:"), "got {frame:?}");
}

#[tokio::test(start_paused = true)]
async fn abort_with_drop_removes_the_line() {
    let sink = SharedSink::default();
    let progress = session(&sink, 30);
    let dropped = progress.add_bar(10, BarOptions::default().prepend(decor::Name::new("gone:")));
    let live = progress.add_bar(10, BarOptions::default().prepend(decor::Name::new("live:")));
    dropped.abort(true);
    dropped.wait().await;
    assert!(dropped.is_completed());

    live.incr();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let frame = last_frame(&sink.contents());
    assert_eq!(frame.len(), 1, "got {frame:?}");
    assert!(frame[0].starts_with("live:"), "got {frame:?}");
}

#[tokio::test(start_paused = true)]
async fn bar_count_drops_as_bars_finish() {
    let sink = SharedSink::default();
    let progress = session(&sink, 20);
    let a = progress.add_bar(1, BarOptions::default());
    let b = progress.add_bar(1, BarOptions::default());
    a.incr();
    a.wait().await;
    assert_eq!(progress.bar_count(), 1);
    b.incr();
    b.wait().await;
    assert_eq!(progress.bar_count(), 0);
}

// ============================================================================
// Parking
// ============================================================================

#[tokio::test(start_paused = true)]
async fn parked_bars_stay_out_of_the_drawn_count() {
    let sink = SharedSink::default();
    let progress = session(&sink, 20);
    let target = progress.add_bar(1, BarOptions::default());
    let parked = progress.add_bar(1, BarOptions::default().park_under(&target));
    for _ in 0..10 {
        if progress.bar_count() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(progress.bar_count(), 1, "parked bar is not drawn yet");

    target.incr();
    target.wait().await;
    assert_eq!(progress.bar_count(), 1, "promoted bar has joined the drawn set");

    parked.abort(true);
    parked.wait().await;
    assert_eq!(progress.bar_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn parked_bar_replaces_a_removed_target() {
    let sink = SharedSink::default();
    let progress = session(&sink, 30);
    let first = progress.add_bar(
        2,
        BarOptions::default()
            .remove_on_complete()
            .prepend(decor::Name::new("first:")),
    );
    let second = progress.add_bar(
        2,
        BarOptions::default()
            .park_under(&first)
            .prepend(decor::Name::new("second:")),
    );
    second.incr_by(2);
    first.incr_by(2);
    progress.wait().await;

    let frame = last_frame(&sink.contents());
    assert_eq!(frame.len(), 1, "got {frame:?}");
    assert!(frame[0].starts_with("second:"), "got {frame:?}");
}

// ============================================================================
// Cancellation and shutdown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn cancellation_releases_waiters_and_notifies_decorators() {
    init_tracing();
    let sink = SharedSink::default();
    let notified = Arc::new(AtomicBool::new(false));
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (notice_tx, notice_rx) = oneshot::channel();
    let progress = Progress::builder()
        .output(sink.clone())
        .width(20)
        .cancel(cancel_rx)
        .shutdown_notice(notice_tx)
        .build();
    let bar = progress.add_bar(
        100,
        BarOptions::default().prepend(ShutdownProbe(Arc::clone(&notified))),
    );
    bar.incr_by(10);
    tokio::time::sleep(Duration::from_millis(150)).await;

    let _ = cancel_tx.send(true);
    bar.wait().await;
    progress.wait().await;
    assert!(notice_rx.await.is_ok(), "shutdown notice must fire");
    assert!(notified.load(Ordering::Acquire));
    assert!(!bar.is_completed(), "cancellation is not completion");
}

#[tokio::test(start_paused = true)]
async fn incr_after_shutdown_is_a_quiet_no_op() {
    let sink = SharedSink::default();
    let progress = session(&sink, 20);
    let bar = progress.add_bar(2, BarOptions::default());
    bar.incr_by(2);
    progress.wait().await;
    bar.incr();
    bar.abort(true);
    assert_eq!(bar.current(), 2);
}
