//! The per-bar actor and its public handle.
//!
//! A bar's mutable state lives inside a dedicated task and is reachable only
//! through its inbox of tagged operations. Producer-facing methods on [`Bar`] translate to non-blocking
//! inbox sends; render requests arrive from the orchestrator as two message
//! rounds per tick (measure, then render) carrying oneshot reply channels.
//!
//! Guarantees:
//! - Producer calls never block and never fail; sends after shutdown are
//!   no-ops.
//! - Increments from one producer apply in issue order; increments from many
//!   producers are unordered but commutatively correct.
//! - A failing decorator or filler is disabled permanently and replaced by a
//!   fixed-width marker; the rest of the line and every other bar render
//!   unaffected.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::decor::{Decorator, Statistics, WC};
use crate::filler::{BarFiller, Filler};
use crate::options::BarOptions;
use crate::progress::ProgressOp;
use crate::sync::{Column, SyncKey};

/// Fixed-width cell substituted for a disabled decorator.
pub(crate) const ERROR_MARKER: &str = "<err>";

// ── Inbox protocol ─────────────────────────────────────────────────────────

/// Tagged operations accepted by a bar actor.
pub(crate) enum BarOp {
    /// Add to the progress counter, optionally carrying a work-duration
    /// sample for estimator decorators.
    IncrBy {
        amount: u64,
        elapsed: Option<Duration>,
    },
    /// Mark the first `n` units as carried over from a prior run.
    SetRefill(u64),
    /// Force the Aborted terminal state.
    Abort { drop_bar: bool },
    /// Tick round one: render decorator cells at natural width and report
    /// the widths of sync-enrolled columns.
    Measure {
        reply: oneshot::Sender<MeasureReply>,
    },
    /// Tick round two: finalize the line using the published group widths.
    Render {
        widths: HashMap<SyncKey, usize>,
        reply: oneshot::Sender<RenderReply>,
    },
    /// The frame containing this bar's terminal line reached the sink.
    FrameFlushed,
    /// Orchestrator is shutting down; release waiters and exit.
    Shutdown,
}

/// Reply to [`BarOp::Measure`].
pub(crate) enum MeasureReply {
    /// Natural widths of this bar's sync-enrolled columns for this tick.
    Draft { widths: Vec<(SyncKey, usize)> },
    /// The bar was aborted with `drop`: remove it without a final frame.
    Dropped,
}

/// Reply to [`BarOp::Render`].
pub(crate) struct RenderReply {
    /// The finished bar line plus any extender lines.
    pub(crate) lines: Vec<String>,
    /// This was the bar's terminal frame.
    pub(crate) terminal: bool,
    /// Remove the line from the display once this frame is flushed.
    pub(crate) reap: bool,
    /// Diagnostics for decorators/fillers disabled during this tick.
    pub(crate) errors: Vec<String>,
}

// ── Public handle ──────────────────────────────────────────────────────────

/// Lock-free mirrors of the counter state for non-blocking reads.
///
/// Eventually consistent with respect to in-flight inbox operations: there is
/// no read-your-writes guarantee across tasks.
#[derive(Debug, Default)]
pub(crate) struct BarAtomics {
    current: AtomicU64,
    terminal: AtomicBool,
}

/// Handle to one progress bar.
///
/// Cheap to clone and share; every method is non-blocking except
/// [`wait`](Bar::wait). All mutations are inbox sends into the bar's actor
/// and become no-ops once the session has shut down.
#[derive(Clone)]
pub struct Bar {
    inner: Arc<BarInner>,
}

struct BarInner {
    id: u64,
    ops: mpsc::UnboundedSender<BarOp>,
    progress_ops: mpsc::UnboundedSender<ProgressOp>,
    atomics: Arc<BarAtomics>,
    done: watch::Receiver<bool>,
}

impl Bar {
    pub(crate) fn new(
        id: u64,
        channels: &BarChannels,
        progress_ops: mpsc::UnboundedSender<ProgressOp>,
    ) -> Self {
        Bar {
            inner: Arc::new(BarInner {
                id,
                ops: channels.ops.clone(),
                progress_ops,
                atomics: Arc::clone(&channels.atomics),
                done: channels.done.clone(),
            }),
        }
    }

    /// This bar's identifier.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Add one unit of progress.
    pub fn incr(&self) {
        self.incr_by(1);
    }

    /// Add `amount` units of progress.
    pub fn incr_by(&self, amount: u64) {
        let _ = self.inner.ops.send(BarOp::IncrBy {
            amount,
            elapsed: None,
        });
    }

    /// Add `amount` units of progress together with the wall time the work
    /// took, feeding rate/ETA estimator decorators.
    pub fn incr_by_with(&self, amount: u64, elapsed: Duration) {
        let _ = self.inner.ops.send(BarOp::IncrBy {
            amount,
            elapsed: Some(elapsed),
        });
    }

    /// Change the draw priority, effective from the next tick. Lower values
    /// draw first. Not atomic with respect to concurrent increments.
    pub fn set_priority(&self, priority: i64) {
        let _ = self.inner.progress_ops.send(ProgressOp::SetPriority {
            id: self.inner.id,
            priority,
        });
    }

    /// Mark the first `amount` units as already done in a prior run, so
    /// fillers can draw them distinctly.
    pub fn set_refill(&self, amount: u64) {
        let _ = self.inner.ops.send(BarOp::SetRefill(amount));
    }

    /// Force the Aborted terminal state. With `drop_bar`, the bar is removed
    /// before its next frame; otherwise one last frame is rendered first.
    /// A no-op if the bar is already terminal.
    pub fn abort(&self, drop_bar: bool) {
        let _ = self.inner.ops.send(BarOp::Abort { drop_bar });
    }

    /// Current counter value. Eventually consistent with writes from other
    /// tasks.
    pub fn current(&self) -> u64 {
        self.inner.atomics.current.load(Ordering::Acquire)
    }

    /// Whether the bar has reached a terminal state (completed or aborted).
    /// Eventually consistent with writes from other tasks.
    pub fn is_completed(&self) -> bool {
        self.inner.atomics.terminal.load(Ordering::Acquire)
    }

    /// Wait until this bar's terminal frame has been flushed to the sink, or
    /// the session shuts down, whichever comes first.
    pub async fn wait(&self) {
        let mut done = self.inner.done.clone();
        while !*done.borrow_and_update() {
            if done.changed().await.is_err() {
                return;
            }
        }
    }
}

// ── Actor ──────────────────────────────────────────────────────────────────

/// Channel set produced by [`spawn`], consumed by the orchestrator and the
/// public handle.
pub(crate) struct BarChannels {
    pub(crate) ops: mpsc::UnboundedSender<BarOp>,
    pub(crate) atomics: Arc<BarAtomics>,
    pub(crate) done: watch::Receiver<bool>,
}

/// Spawn a bar actor. Must be called within a Tokio runtime.
pub(crate) fn spawn(id: u64, total: u64, display_width: usize, opts: BarOptions) -> BarChannels {
    let (ops_tx, ops_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = watch::channel(false);
    let atomics = Arc::new(BarAtomics::default());

    let filler: Box<dyn Filler> = match opts.filler {
        Some(filler) => filler,
        None => {
            let mut filler = BarFiller::new();
            if let Some(style) = &opts.style {
                filler.set_style(style);
            }
            filler.set_reverse(opts.reverse);
            Box::new(filler)
        }
    };

    let state = BarState {
        id,
        total,
        current: 0,
        refill: 0,
        status: Status::Active,
        drop_on_abort: false,
        final_rendered: false,
        prepend: opts.prepend.into_iter().map(DecorSlot::new).collect(),
        append: opts.append.into_iter().map(DecorSlot::new).collect(),
        filler,
        filler_disabled: false,
        extender: opts.extender,
        extender_disabled: false,
        fixed_width: opts.fixed_width,
        remove_on_complete: opts.remove_on_complete,
        clear_on_complete: opts.clear_on_complete,
        trim_space: opts.trim_space,
        display_width,
        draft: None,
        atomics: Arc::clone(&atomics),
    };
    tokio::spawn(state.run(ops_rx, done_tx));

    BarChannels {
        ops: ops_tx,
        atomics,
        done: done_rx,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Active,
    /// Reached its total; the terminal frame has not rendered yet.
    Completing,
    Completed,
    Aborted,
}

struct DecorSlot {
    dec: Box<dyn Decorator>,
    disabled: bool,
}

impl DecorSlot {
    fn new(dec: Box<dyn Decorator>) -> Self {
        DecorSlot {
            dec,
            disabled: false,
        }
    }
}

/// One decorator cell rendered during the measure round, finalized during
/// the render round.
struct Cell {
    text: String,
    wc: WC,
    key: Option<SyncKey>,
}

impl Cell {
    fn format(&self, published: &HashMap<SyncKey, usize>) -> String {
        let width = self
            .key
            .and_then(|key| published.get(&key).copied())
            .unwrap_or(0);
        self.wc.format(&self.text, width)
    }
}

#[derive(Default)]
struct TickDraft {
    prepend: Vec<Cell>,
    append: Vec<Cell>,
    errors: Vec<String>,
}

struct BarState {
    id: u64,
    total: u64,
    current: u64,
    refill: u64,
    status: Status,
    drop_on_abort: bool,
    final_rendered: bool,
    prepend: Vec<DecorSlot>,
    append: Vec<DecorSlot>,
    filler: Box<dyn Filler>,
    filler_disabled: bool,
    extender: Option<Box<dyn Filler>>,
    extender_disabled: bool,
    fixed_width: Option<usize>,
    remove_on_complete: bool,
    clear_on_complete: bool,
    trim_space: bool,
    display_width: usize,
    draft: Option<TickDraft>,
    atomics: Arc<BarAtomics>,
}

impl BarState {
    async fn run(
        mut self,
        mut ops: mpsc::UnboundedReceiver<BarOp>,
        done: watch::Sender<bool>,
    ) {
        while let Some(op) = ops.recv().await {
            match op {
                BarOp::IncrBy { amount, elapsed } => self.handle_incr(amount, elapsed),
                BarOp::SetRefill(amount) => {
                    if !self.terminal() {
                        self.refill = amount;
                    }
                }
                BarOp::Abort { drop_bar } => self.handle_abort(drop_bar),
                BarOp::Measure { reply } => {
                    let _ = reply.send(self.measure());
                }
                BarOp::Render { widths, reply } => {
                    let _ = reply.send(self.render(&widths));
                }
                BarOp::FrameFlushed | BarOp::Shutdown => break,
            }
        }
        for slot in self.prepend.iter_mut().chain(self.append.iter_mut()) {
            slot.dec.on_shutdown();
        }
        let _ = done.send(true);
    }

    fn terminal(&self) -> bool {
        self.status != Status::Active
    }

    fn handle_incr(&mut self, amount: u64, elapsed: Option<Duration>) {
        if self.terminal() {
            return;
        }
        self.current = self.current.saturating_add(amount);
        self.atomics.current.store(self.current, Ordering::Release);
        for slot in self.prepend.iter_mut().chain(self.append.iter_mut()) {
            if !slot.disabled {
                slot.dec.on_progress(amount, elapsed);
            }
        }
        if self.total > 0 && self.current >= self.total {
            self.status = Status::Completing;
            self.atomics.terminal.store(true, Ordering::Release);
        }
    }

    fn handle_abort(&mut self, drop_bar: bool) {
        if self.terminal() {
            return;
        }
        self.status = Status::Aborted;
        self.drop_on_abort = drop_bar;
        self.atomics.terminal.store(true, Ordering::Release);
    }

    fn statistics(&self) -> Statistics {
        Statistics {
            id: self.id,
            total: self.total,
            current: self.current,
            refill: self.refill,
            completed: matches!(self.status, Status::Completing | Status::Completed),
            aborted: self.status == Status::Aborted,
        }
    }

    fn measure(&mut self) -> MeasureReply {
        if self.status == Status::Aborted && self.drop_on_abort {
            return MeasureReply::Dropped;
        }
        let draft = self.build_draft();
        let widths = draft
            .prepend
            .iter()
            .chain(draft.append.iter())
            .filter_map(|cell| cell.key.map(|key| (key, cell.text.chars().count())))
            .collect();
        self.draft = Some(draft);
        MeasureReply::Draft { widths }
    }

    fn build_draft(&mut self) -> TickDraft {
        let stats = self.statistics();
        let mut draft = TickDraft::default();
        for (index, slot) in self.prepend.iter_mut().enumerate() {
            draft
                .prepend
                .push(render_cell(slot, &stats, Column::Prepend, index, &mut draft.errors));
        }
        for (index, slot) in self.append.iter_mut().enumerate() {
            draft
                .append
                .push(render_cell(slot, &stats, Column::Append, index, &mut draft.errors));
        }
        draft
    }

    fn render(&mut self, widths: &HashMap<SyncKey, usize>) -> RenderReply {
        let mut draft = match self.draft.take() {
            Some(draft) => draft,
            None => self.build_draft(),
        };
        if self.status == Status::Completing {
            self.status = Status::Completed;
        }
        let stats = self.statistics();

        let prepend: String = draft.prepend.iter().map(|cell| cell.format(widths)).collect();
        let append: String = draft.append.iter().map(|cell| cell.format(widths)).collect();
        let sep = if self.trim_space { "" } else { " " };
        let used = prepend.chars().count() + append.chars().count() + 2 * sep.len();
        let bar_width = self
            .fixed_width
            .unwrap_or_else(|| self.display_width.saturating_sub(used));

        let body = self.render_body(bar_width, &stats, &mut draft.errors);

        let mut line =
            String::with_capacity(prepend.len() + append.len() + body.len() + 2 * sep.len());
        line.push_str(&prepend);
        line.push_str(sep);
        line.push_str(&body);
        line.push_str(sep);
        line.push_str(&append);
        if self.fixed_width.is_none() && line.chars().count() > self.display_width {
            line = line.chars().take(self.display_width).collect();
        }

        let mut lines = vec![line];
        self.render_extender(&mut lines, &stats, &mut draft.errors);

        let terminal = self.terminal() && !self.final_rendered;
        if terminal {
            self.final_rendered = true;
        }
        let reap = terminal
            && match self.status {
                Status::Completed => self.remove_on_complete,
                Status::Aborted => self.drop_on_abort,
                Status::Active | Status::Completing => false,
            };

        RenderReply {
            lines,
            terminal,
            reap,
            errors: draft.errors,
        }
    }

    fn render_body(&mut self, width: usize, stats: &Statistics, errors: &mut Vec<String>) -> String {
        if stats.completed && self.clear_on_complete {
            return " ".repeat(width);
        }
        if self.filler_disabled {
            return marker_cell(width);
        }
        let mut body = String::new();
        match self.filler.fill(&mut body, width, stats) {
            Ok(()) => body,
            Err(err) => {
                self.filler_disabled = true;
                errors.push(format!("filler: {err}"));
                marker_cell(width)
            }
        }
    }

    fn render_extender(
        &mut self,
        lines: &mut Vec<String>,
        stats: &Statistics,
        errors: &mut Vec<String>,
    ) {
        let Some(extender) = self.extender.as_mut() else {
            return;
        };
        if self.extender_disabled {
            lines.push(ERROR_MARKER.to_string());
            return;
        }
        let mut out = String::new();
        match extender.fill(&mut out, self.display_width, stats) {
            Ok(()) => lines.extend(out.lines().map(String::from)),
            Err(err) => {
                self.extender_disabled = true;
                errors.push(format!("extender: {err}"));
                lines.push(ERROR_MARKER.to_string());
            }
        }
    }
}

fn render_cell(
    slot: &mut DecorSlot,
    stats: &Statistics,
    column: Column,
    index: usize,
    errors: &mut Vec<String>,
) -> Cell {
    let wc = slot.dec.wc();
    let text = if slot.disabled {
        ERROR_MARKER.to_string()
    } else {
        match slot.dec.decor(stats) {
            Ok(text) => text,
            Err(err) => {
                slot.disabled = true;
                errors.push(format!("{column:?}[{index}]: {err}"));
                ERROR_MARKER.to_string()
            }
        }
    };
    let key = if wc.sync {
        Some(SyncKey { column, index })
    } else {
        None
    };
    Cell { text, wc, key }
}

/// Fixed marker padded or cut to `width`, substituted for a disabled filler.
fn marker_cell(width: usize) -> String {
    let mut cell: String = ERROR_MARKER.chars().take(width).collect();
    let len = cell.chars().count();
    cell.extend(std::iter::repeat(' ').take(width.saturating_sub(len)));
    cell
}

impl std::fmt::Debug for Bar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bar")
            .field("id", &self.inner.id)
            .field("current", &self.current())
            .field("terminal", &self.is_completed())
            .finish()
    }
}
