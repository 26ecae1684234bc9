//! Decorator contract and the stock decorators.
//!
//! A decorator produces one column of text per render tick from a
//! [`Statistics`] snapshot; that snapshot is the *entire* input surface.
//! Optional capabilities are declared on the trait itself rather than in a
//! central registry:
//!
//! - [`Decorator::wc`]: width configuration; its `sync` flag enrolls the
//!   column in cross-bar width synchronization.
//! - [`Decorator::on_progress`]: receives increment amounts and optional
//!   work-duration samples, for rate/ETA estimators.
//! - [`Decorator::on_shutdown`]: notified once when the bar is released.

use std::time::Duration;

use thiserror::Error;

mod counters;
mod elapsed;
mod eta;
mod percentage;

pub use counters::Counters;
pub use elapsed::Elapsed;
pub use eta::EwmaEta;
pub use percentage::Percentage;

/// Immutable per-tick snapshot of one bar's state.
///
/// The only input decorators and fillers ever receive. `current` is never
/// clamped here: it may exceed `total`, and display code is expected to clamp
/// for presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    /// Identifier of the bar being rendered.
    pub id: u64,
    /// Total units of work. Zero means the total is unknown.
    pub total: u64,
    /// Units completed so far. May exceed `total`.
    pub current: u64,
    /// Units attributed to a prior run, rendered with a distinct glyph.
    pub refill: u64,
    /// Whether the bar has reached its total.
    pub completed: bool,
    /// Whether the bar was aborted before reaching its total.
    pub aborted: bool,
}

/// Error returned by a decorator or filler render call.
///
/// Returning an error permanently disables the decorator: the render wrapper
/// substitutes a fixed-width marker for this and all future ticks and forwards
/// the error text to the diagnostic sink. The frame, and every other bar,
/// render unaffected.
#[derive(Error, Debug)]
pub enum DecorError {
    /// The decorator could not produce output for this tick.
    #[error("{0}")]
    Render(String),
}

/// One column of a bar line.
pub trait Decorator: Send {
    /// Produce this column's text for the given snapshot.
    ///
    /// # Errors
    ///
    /// Returning [`DecorError`] disables this decorator permanently; see the
    /// type-level docs.
    fn decor(&mut self, stats: &Statistics) -> Result<String, DecorError>;

    /// Width configuration for this column.
    ///
    /// The default is unsynchronized, zero minimum width, left aligned.
    fn wc(&self) -> WC {
        WC::default()
    }

    /// Called for every increment applied to the owning bar, with the
    /// optional duration sample the producer attached. Estimators override
    /// this; everything else inherits the no-op.
    fn on_progress(&mut self, _amount: u64, _elapsed: Option<Duration>) {}

    /// Called exactly once when the owning bar is released, either after its
    /// terminal frame has been flushed or on orchestrator shutdown.
    fn on_shutdown(&mut self) {}
}

/// Width and alignment configuration for a decorator column.
///
/// `min_width` is a floor: the rendered text is padded with spaces up to at
/// least that many characters. When `sync` is set, the column additionally
/// participates in cross-bar width synchronization and is padded to the
/// maximum natural width among all enrolled columns for that tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WC {
    /// Minimum column width in characters.
    pub min_width: usize,
    /// Pad on the left instead of the right.
    pub right_align: bool,
    /// Enroll in cross-bar width synchronization.
    pub sync: bool,
    /// Emit one extra leading space in front of the padded column.
    pub extra_space: bool,
}

impl WC {
    /// Configuration with the given minimum width.
    pub fn width(min_width: usize) -> Self {
        WC {
            min_width,
            ..WC::default()
        }
    }

    /// Enroll this column in width synchronization.
    pub fn synced(mut self) -> Self {
        self.sync = true;
        self
    }

    /// Right-align the column text.
    pub fn right_aligned(mut self) -> Self {
        self.right_align = true;
        self
    }

    /// Emit one extra leading space in front of the column.
    pub fn spaced(mut self) -> Self {
        self.extra_space = true;
        self
    }

    /// Pad `msg` to `max(min_width, published)` characters.
    pub(crate) fn format(&self, msg: &str, published: usize) -> String {
        let target = self.min_width.max(published);
        let len = msg.chars().count();
        let pad = target.saturating_sub(len);
        let mut out = String::with_capacity(msg.len() + pad + 1);
        if self.extra_space {
            out.push(' ');
        }
        if self.right_align {
            out.extend(std::iter::repeat(' ').take(pad));
            out.push_str(msg);
        } else {
            out.push_str(msg);
            out.extend(std::iter::repeat(' ').take(pad));
        }
        out
    }
}

/// Static text column, typically a bar name or label.
#[derive(Debug, Clone)]
pub struct Name {
    message: String,
    wc: WC,
}

impl Name {
    /// New name decorator with default width configuration.
    pub fn new(message: impl Into<String>) -> Self {
        Name {
            message: message.into(),
            wc: WC::default(),
        }
    }

    /// Replace the width configuration.
    pub fn with_wc(mut self, wc: WC) -> Self {
        self.wc = wc;
        self
    }
}

impl Decorator for Name {
    fn decor(&mut self, _stats: &Statistics) -> Result<String, DecorError> {
        Ok(self.message.clone())
    }

    fn wc(&self) -> WC {
        self.wc
    }
}

/// Wrapper that swaps a decorator's output for a fixed message once the
/// owning bar completes.
#[derive(Debug)]
pub struct OnComplete<D> {
    inner: D,
    message: String,
}

impl<D: Decorator> OnComplete<D> {
    /// Wrap `inner`, showing `message` from the completion frame onwards.
    pub fn new(inner: D, message: impl Into<String>) -> Self {
        OnComplete {
            inner,
            message: message.into(),
        }
    }
}

impl<D: Decorator> Decorator for OnComplete<D> {
    fn decor(&mut self, stats: &Statistics) -> Result<String, DecorError> {
        if stats.completed {
            Ok(self.message.clone())
        } else {
            self.inner.decor(stats)
        }
    }

    fn wc(&self) -> WC {
        self.inner.wc()
    }

    fn on_progress(&mut self, amount: u64, elapsed: Option<Duration>) {
        self.inner.on_progress(amount, elapsed);
    }

    fn on_shutdown(&mut self) {
        self.inner.on_shutdown();
    }
}

/// Fraction of `width` covered by `current` out of `total`, unrounded.
///
/// Zero when the total is unknown.
pub(crate) fn percentage(total: u64, current: u64, width: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    width as f64 * current as f64 / total as f64
}

/// Like [`percentage`], rounded half-up and clamped to `width`.
pub(crate) fn percentage_round(total: u64, current: u64, width: usize) -> usize {
    (percentage(total, current, width).round() as usize).min(width)
}

/// Rendering style for time-based decorators ([`Elapsed`], [`EwmaEta`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeStyle {
    /// Go duration style truncated to seconds: `"42s"`, `"4m11s"`, `"1h2m3s"`.
    #[default]
    Go,
    /// Clock style with hours: `"01:02:03"`.
    HhMmSs,
    /// Clock style without seconds: `"01:02"`.
    HhMm,
    /// Minutes and seconds: `"02:03"`; falls back to `"01:02:03"` once an
    /// hour is exceeded.
    MmSs,
}

/// Format a duration truncated to seconds in the given [`TimeStyle`].
pub fn format_duration_with(d: Duration, style: TimeStyle) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match style {
        TimeStyle::Go => {
            if h > 0 {
                format!("{h}h{m}m{s}s")
            } else if m > 0 {
                format!("{m}m{s}s")
            } else {
                format!("{s}s")
            }
        }
        TimeStyle::HhMmSs => format!("{h:02}:{m:02}:{s:02}"),
        TimeStyle::HhMm => format!("{h:02}:{m:02}"),
        TimeStyle::MmSs => {
            if h > 0 {
                format!("{h:02}:{m:02}:{s:02}")
            } else {
                format!("{m:02}:{s:02}")
            }
        }
    }
}

/// [`format_duration_with`] in the default Go style.
pub fn format_duration(d: Duration) -> String {
    format_duration_with(d, TimeStyle::Go)
}
