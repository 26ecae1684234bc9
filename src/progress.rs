//! The orchestrator: owns the display and drives the render loop.
//!
//! A single task per [`Progress`] instance ticks on the refresh interval and
//! runs each frame in two rounds. Round one scatters a measure request to
//! every visible bar and gathers the natural widths of sync-enrolled
//! decorator columns; round two publishes the per-group maxima and asks each
//! bar to finalize its line against them. The finished frame replaces the
//! previous one with a single buffered write.
//!
//! Bars that reach a terminal state render one final frame, are removed from
//! the live set, and their lines are retained above the live region so the
//! terminal keeps a record of finished work. Parked bars stay invisible
//! until their park target finishes, then join the queue with the target's
//! priority unless one was set explicitly.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::bar::{self, Bar, BarOp, MeasureReply, RenderReply};
use crate::counter::TaskCounter;
use crate::options::BarOptions;
use crate::queue::PriorityQueue;
use crate::sync::SyncGather;
use crate::writer::FrameWriter;
use crate::MultibarError;

/// Default terminal width when none is configured.
const DEFAULT_WIDTH: usize = 80;
/// Default refresh interval.
const DEFAULT_REFRESH: Duration = Duration::from_millis(120);

// ── Orchestrator inbox ─────────────────────────────────────────────────────

/// Operations accepted by the render loop.
pub(crate) enum ProgressOp {
    /// Register a freshly spawned bar actor.
    Add {
        id: u64,
        ops: mpsc::UnboundedSender<BarOp>,
        priority: Option<i64>,
        park_under: Option<u64>,
    },
    /// Reprice a bar's draw priority, effective next tick.
    SetPriority { id: u64, priority: i64 },
    /// Finish all remaining bars, flush the final frame, then reply.
    Drain { reply: oneshot::Sender<()> },
}

// ── Public surface ─────────────────────────────────────────────────────────

/// A progress session: a set of bars multiplexed onto one output sink.
///
/// Cheap to clone; all clones drive the same display. Construction spawns
/// the render loop onto the current Tokio runtime, so a `Progress` must be
/// created inside one.
#[derive(Clone)]
pub struct Progress {
    inner: Arc<ProgressInner>,
}

struct ProgressInner {
    ops: mpsc::UnboundedSender<ProgressOp>,
    next_id: AtomicU64,
    bar_count: Arc<AtomicUsize>,
    width: usize,
    counter: Option<TaskCounter>,
}

impl Progress {
    /// Session with default settings: stdout, 80 columns, 120ms refresh.
    pub fn new() -> Self {
        ProgressBuilder::default().build()
    }

    /// Start configuring a session.
    pub fn builder() -> ProgressBuilder {
        ProgressBuilder::default()
    }

    /// Add a bar with `total` units of work and hand back its handle.
    ///
    /// Never fails: after shutdown the returned handle is inert. Use
    /// [`try_add_bar`](Self::try_add_bar) to observe shutdown instead.
    pub fn add_bar(&self, total: u64, opts: BarOptions) -> Bar {
        self.add_bar_inner(total, opts).0
    }

    /// Like [`add_bar`](Self::add_bar), but reports
    /// [`MultibarError::Terminated`] when the session has already shut down.
    pub fn try_add_bar(&self, total: u64, opts: BarOptions) -> Result<Bar, MultibarError> {
        let (bar, live) = self.add_bar_inner(total, opts);
        if live {
            Ok(bar)
        } else {
            Err(MultibarError::Terminated)
        }
    }

    fn add_bar_inner(&self, total: u64, opts: BarOptions) -> (Bar, bool) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let priority = opts.priority;
        let park_under = opts.park_under;
        let channels = bar::spawn(id, total, self.inner.width, opts);
        let bar = Bar::new(id, &channels, self.inner.ops.clone());
        let add = ProgressOp::Add {
            id,
            ops: channels.ops.clone(),
            priority,
            park_under,
        };
        if self.inner.ops.send(add).is_err() {
            // orphaned actor: release its waiters right away
            let _ = channels.ops.send(BarOp::Shutdown);
            return (bar, false);
        }
        (bar, true)
    }

    /// Number of bars in the drawn set as of the latest bookkeeping pass.
    /// Parked bars join the count when their target finishes; finished bars
    /// leave it. Eventually consistent with respect to in-flight operations.
    pub fn bar_count(&self) -> usize {
        self.inner.bar_count.load(Ordering::Acquire)
    }

    /// Wait for the session to finish: every producer task checked out of
    /// the [`TaskCounter`] (when one is configured), every bar terminal and
    /// its final frame flushed. Returns immediately if the session was
    /// cancelled or has already shut down.
    pub async fn wait(&self) {
        if let Some(counter) = &self.inner.counter {
            counter.wait_idle().await;
        }
        let (tx, rx) = oneshot::channel();
        if self.inner.ops.send(ProgressOp::Drain { reply: tx }).is_err() {
            return;
        }
        let _ = rx.await;
    }
}

impl Default for Progress {
    fn default() -> Self {
        Progress::new()
    }
}

/// Builder for [`Progress`].
pub struct ProgressBuilder {
    out: Box<dyn Write + Send>,
    diag: Option<Box<dyn Write + Send>>,
    width: usize,
    refresh: Duration,
    cancel: Option<watch::Receiver<bool>>,
    counter: Option<TaskCounter>,
    shutdown_notice: Option<oneshot::Sender<()>>,
}

impl Default for ProgressBuilder {
    fn default() -> Self {
        ProgressBuilder {
            out: Box::new(io::stdout()),
            diag: None,
            width: DEFAULT_WIDTH,
            refresh: DEFAULT_REFRESH,
            cancel: None,
            counter: None,
            shutdown_notice: None,
        }
    }
}

impl ProgressBuilder {
    /// Redirect frames to `out` instead of stdout.
    pub fn output(mut self, out: impl Write + Send + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    /// Sink for decorator and filler error reports, kept separate from the
    /// live display so a broken decorator stays discoverable. Reports also
    /// go to `tracing` either way.
    pub fn diagnostic_output(mut self, out: impl Write + Send + 'static) -> Self {
        self.diag = Some(Box::new(out));
        self
    }

    /// Channel fired exactly once when the render loop exits, whether by
    /// natural convergence or cancellation.
    pub fn shutdown_notice(mut self, notice: oneshot::Sender<()>) -> Self {
        self.shutdown_notice = Some(notice);
        self
    }

    /// Total display width in columns. Defaults to 80.
    pub fn width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Refresh interval between frames. Defaults to 120ms.
    pub fn refresh_interval(mut self, refresh: Duration) -> Self {
        self.refresh = refresh;
        self
    }

    /// Cancellation signal: when it flips to `true` the render loop stops,
    /// shuts every bar down, and releases all waiters without finishing the
    /// remaining work.
    pub fn cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Counter of outstanding producer tasks;
    /// [`Progress::wait`] holds the display open until it reaches zero.
    pub fn task_counter(mut self, counter: TaskCounter) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Spawn the render loop and return the session handle. Must be called
    /// within a Tokio runtime.
    pub fn build(self) -> Progress {
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let bar_count = Arc::new(AtomicUsize::new(0));
        let render = RenderLoop {
            writer: FrameWriter::new(self.out),
            diag: self.diag,
            refresh: self.refresh,
            bars: HashMap::new(),
            queue: PriorityQueue::default(),
            priorities: HashMap::new(),
            parked: HashMap::new(),
            frozen: Vec::new(),
            bar_count: Arc::clone(&bar_count),
            drain_replies: Vec::new(),
            shutdown_notice: self.shutdown_notice,
            drain: false,
            ops_open: true,
        };
        tokio::spawn(render.run(ops_rx, self.cancel));
        Progress {
            inner: Arc::new(ProgressInner {
                ops: ops_tx,
                next_id: AtomicU64::new(0),
                bar_count,
                width: self.width,
                counter: self.counter,
            }),
        }
    }
}

// ── Render loop ────────────────────────────────────────────────────────────

struct Parked {
    id: u64,
    explicit: Option<i64>,
}

struct RenderLoop {
    writer: FrameWriter<Box<dyn Write + Send>>,
    diag: Option<Box<dyn Write + Send>>,
    refresh: Duration,
    /// Every unfinished bar actor, parked ones included.
    bars: HashMap<u64, mpsc::UnboundedSender<BarOp>>,
    /// Visible bars in draw order.
    queue: PriorityQueue,
    priorities: HashMap<u64, i64>,
    /// Bars waiting for their park target, keyed by the target id.
    parked: HashMap<u64, Vec<Parked>>,
    /// Retained lines of finished bars, shown above the live region.
    frozen: Vec<String>,
    bar_count: Arc<AtomicUsize>,
    drain_replies: Vec<oneshot::Sender<()>>,
    shutdown_notice: Option<oneshot::Sender<()>>,
    drain: bool,
    ops_open: bool,
}

impl RenderLoop {
    async fn run(
        mut self,
        mut ops: mpsc::UnboundedReceiver<ProgressOp>,
        mut cancel: Option<watch::Receiver<bool>>,
    ) {
        let mut ticker = tokio::time::interval(self.refresh);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::debug!(target: "multibar::render", refresh_ms = self.refresh.as_millis() as u64, "render loop started");
        loop {
            tokio::select! {
                biased;
                op = ops.recv(), if self.ops_open => match op {
                    Some(op) => {
                        self.handle_op(op);
                        if self.drain && self.converged() {
                            break;
                        }
                    }
                    None => {
                        // every session handle dropped: finish and exit
                        self.ops_open = false;
                        self.drain = true;
                        if self.converged() {
                            break;
                        }
                    }
                },
                _ = cancelled(&mut cancel) => {
                    tracing::debug!(target: "multibar::render", "cancelled, shutting down");
                    self.shutdown_all();
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                    if self.drain && self.converged() {
                        break;
                    }
                }
            }
        }
        let _ = self.writer.flush();
        for reply in self.drain_replies.drain(..) {
            let _ = reply.send(());
        }
        if let Some(notice) = self.shutdown_notice.take() {
            let _ = notice.send(());
        }
        tracing::debug!(target: "multibar::render", "render loop stopped");
    }

    fn converged(&self) -> bool {
        self.bars.is_empty()
    }

    fn handle_op(&mut self, op: ProgressOp) {
        match op {
            ProgressOp::Add {
                id,
                ops,
                priority,
                park_under,
            } => {
                self.bars.insert(id, ops);
                match park_under.filter(|t| *t != id && self.bars.contains_key(t)) {
                    Some(target) => {
                        self.parked
                            .entry(target)
                            .or_default()
                            .push(Parked { id, explicit: priority });
                    }
                    None => {
                        let priority = priority.unwrap_or(0);
                        self.queue.insert(id, priority);
                        self.priorities.insert(id, priority);
                    }
                }
                self.publish_count();
            }
            ProgressOp::SetPriority { id, priority } => {
                if self.queue.update(id, priority) {
                    self.priorities.insert(id, priority);
                } else {
                    for list in self.parked.values_mut() {
                        if let Some(p) = list.iter_mut().find(|p| p.id == id) {
                            p.explicit = Some(priority);
                        }
                    }
                }
            }
            ProgressOp::Drain { reply } => {
                self.drain = true;
                self.drain_replies.push(reply);
            }
        }
    }

    /// Parked bars sit outside the drawn set until promoted.
    fn publish_count(&self) {
        self.bar_count.store(self.queue.len(), Ordering::Release);
    }

    /// One frame: measure round, width gather, render round, flush,
    /// post-frame bookkeeping for bars that just finished.
    async fn tick(&mut self) {
        let order = self.queue.sorted_ids();
        if order.is_empty() {
            // the retained region is already on screen
            return;
        }

        // round one: scatter measure requests, gather column widths
        let mut gather = SyncGather::default();
        let mut live: Vec<u64> = Vec::with_capacity(order.len());
        let mut dropped: Vec<u64> = Vec::new();
        for id in order {
            match self.request_measure(id).await {
                Some(MeasureReply::Draft { widths }) => {
                    gather.absorb(&widths);
                    live.push(id);
                }
                Some(MeasureReply::Dropped) | None => dropped.push(id),
            }
        }
        let published = gather.publish();

        // round two: finalize every line against the published widths
        let mut rendered: Vec<(u64, RenderReply)> = Vec::with_capacity(live.len());
        for id in live {
            match self.request_render(id, &published).await {
                Some(reply) => rendered.push((id, reply)),
                None => dropped.push(id),
            }
        }

        let mut frame: Vec<String> = self.frozen.clone();
        for (id, reply) in &rendered {
            for err in &reply.errors {
                tracing::warn!(target: "multibar::render", bar = id, "decorator disabled: {err}");
                if let Some(diag) = self.diag.as_mut() {
                    let _ = writeln!(diag, "bar {id}: {err}");
                }
            }
            frame.extend(reply.lines.iter().cloned());
        }
        if let Err(err) = self.writer.write_frame(&frame) {
            let err = MultibarError::Io(err);
            tracing::error!(target: "multibar::render", error = %err, "frame write failed");
        }

        for id in dropped {
            self.finish_bar(id, true);
        }
        for (id, reply) in rendered {
            if reply.terminal {
                if !reply.reap {
                    self.frozen.extend(reply.lines);
                }
                self.finish_bar(id, false);
            }
        }
    }

    async fn request_measure(&mut self, id: u64) -> Option<MeasureReply> {
        let ops = self.bars.get(&id)?;
        let (tx, rx) = oneshot::channel();
        ops.send(BarOp::Measure { reply: tx }).ok()?;
        rx.await.ok()
    }

    async fn request_render(
        &mut self,
        id: u64,
        widths: &HashMap<crate::sync::SyncKey, usize>,
    ) -> Option<RenderReply> {
        let ops = self.bars.get(&id)?;
        let (tx, rx) = oneshot::channel();
        ops.send(BarOp::Render {
            widths: widths.clone(),
            reply: tx,
        })
        .ok()?;
        rx.await.ok()
    }

    /// Retire a bar after its last frame (or immediately when `silent`),
    /// promote anything parked under it, and release its waiters.
    fn finish_bar(&mut self, id: u64, silent: bool) {
        self.queue.remove(id);
        let inherited = self.priorities.remove(&id).unwrap_or(0);
        if let Some(children) = self.parked.remove(&id) {
            for child in children {
                let priority = child.explicit.unwrap_or(inherited);
                self.queue.insert(child.id, priority);
                self.priorities.insert(child.id, priority);
            }
        }
        let ops = self.bars.remove(&id);
        self.publish_count();
        if let Some(ops) = ops {
            let op = if silent {
                BarOp::Shutdown
            } else {
                BarOp::FrameFlushed
            };
            let _ = ops.send(op);
        }
        tracing::debug!(target: "multibar::render", bar = id, "bar finished");
    }

    /// Cancellation path: stop every actor without finishing the work.
    fn shutdown_all(&mut self) {
        for (_, ops) in self.bars.drain() {
            let _ = ops.send(BarOp::Shutdown);
        }
        self.parked.clear();
        self.priorities.clear();
        for id in self.queue.sorted_ids() {
            self.queue.remove(id);
        }
        self.publish_count();
    }
}

/// Resolves when the cancel signal flips to true; pends forever otherwise.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        Some(rx) => loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        },
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_bar_after_shutdown_reports_terminated() {
        let progress = Progress::builder().output(Vec::new()).build();
        progress.wait().await;
        let err = progress.try_add_bar(10, BarOptions::default());
        assert!(matches!(err, Err(MultibarError::Terminated)));
    }

    #[tokio::test]
    async fn bar_count_tracks_registration() {
        let progress = Progress::builder().output(Vec::new()).build();
        let _a = progress.add_bar(10, BarOptions::default());
        let _b = progress.add_bar(10, BarOptions::default());
        // registration is asynchronous; yield until the loop absorbs both
        for _ in 0..10 {
            if progress.bar_count() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(progress.bar_count(), 2);
    }
}
