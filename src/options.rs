//! Bar-level configuration.

use crate::bar::Bar;
use crate::decor::Decorator;
use crate::filler::Filler;

/// Configuration accepted by [`Progress::add_bar`](crate::Progress::add_bar).
///
/// All options default to off. Builder methods consume and return `self` so
/// options chain at the call site.
#[derive(Default)]
pub struct BarOptions {
    pub(crate) priority: Option<i64>,
    pub(crate) fixed_width: Option<usize>,
    pub(crate) remove_on_complete: bool,
    pub(crate) clear_on_complete: bool,
    pub(crate) trim_space: bool,
    pub(crate) style: Option<String>,
    pub(crate) reverse: bool,
    pub(crate) filler: Option<Box<dyn Filler>>,
    pub(crate) extender: Option<Box<dyn Filler>>,
    pub(crate) park_under: Option<u64>,
    pub(crate) prepend: Vec<Box<dyn Decorator>>,
    pub(crate) append: Vec<Box<dyn Decorator>>,
}

impl BarOptions {
    /// Initial draw priority. Lower priorities are drawn first (on top);
    /// ties break by insertion order. Defaults to zero.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Fix the filler section width instead of deriving it from the display
    /// width minus decorator columns.
    pub fn with_width(mut self, width: usize) -> Self {
        self.fixed_width = Some(width);
        self
    }

    /// Remove the whole bar line right after its completion frame.
    pub fn remove_on_complete(mut self) -> Self {
        self.remove_on_complete = true;
        self
    }

    /// Blank the filler section on the completion frame, keeping decorators.
    pub fn clear_on_complete(mut self) -> Self {
        self.clear_on_complete = true;
        self
    }

    /// Drop the single spaces surrounding the filler section.
    pub fn trim_space(mut self) -> Self {
        self.trim_space = true;
        self
    }

    /// Custom glyph style for the default filler, e.g. `"╢▌▌░╟"`.
    ///
    /// At least five glyphs are required (left bracket, fill, tip, empty,
    /// right bracket); a sixth and seventh override the reverse-tip and
    /// refill glyphs. Invalid input is silently ignored and the prior style
    /// retained. No effect when a custom filler is supplied.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Progress from right to left. No effect when a custom filler is
    /// supplied.
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Replace the default glyph filler.
    pub fn with_filler(mut self, filler: impl Filler + 'static) -> Self {
        self.filler = Some(Box::new(filler));
        self
    }

    /// Extender whose output is appended as extra line(s) below the bar.
    pub fn with_extender(mut self, extender: impl Filler + 'static) -> Self {
        self.extender = Some(Box::new(extender));
        self
    }

    /// Park this bar under `target`: it stays invisible until `target`
    /// reaches a terminal state, then joins the display, inheriting the
    /// target's priority unless one was set explicitly. Combined with
    /// [`remove_on_complete`](Self::remove_on_complete) on the target, the
    /// parked bar visually replaces it.
    pub fn park_under(mut self, target: &Bar) -> Self {
        self.park_under = Some(target.id());
        self
    }

    /// Add a decorator to the left of the filler section. Order of calls is
    /// column order.
    pub fn prepend(mut self, decorator: impl Decorator + 'static) -> Self {
        self.prepend.push(Box::new(decorator));
        self
    }

    /// Add a decorator to the right of the filler section. Order of calls is
    /// column order.
    pub fn append(mut self, decorator: impl Decorator + 'static) -> Self {
        self.append.push(Box::new(decorator));
        self
    }
}
