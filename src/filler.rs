//! Bar-body fillers.
//!
//! A filler paints the glyph section of a bar line into a target width. It is
//! invoked once per bar per tick with the tick's final synchronized width and
//! the same [`Statistics`] snapshot decorators receive.

use crate::decor::{percentage_round, DecorError, Statistics};

/// Default glyph set: left bracket, fill, tip, empty, right bracket,
/// reverse tip, refill.
pub const DEFAULT_BAR_STYLE: &str = "[=>-]<+";

const STYLE_LEFT: usize = 0;
const STYLE_FILL: usize = 1;
const STYLE_TIP: usize = 2;
const STYLE_EMPTY: usize = 3;
const STYLE_RIGHT: usize = 4;
const STYLE_REV_TIP: usize = 5;
const STYLE_REFILL: usize = 6;
const STYLE_LEN: usize = 7;

/// Produces the visual body of a bar.
pub trait Filler: Send {
    /// Append the body rendering at exactly `width` characters to `buf`.
    ///
    /// # Errors
    ///
    /// Returning [`DecorError`] permanently disables the filler; the bar
    /// renders a fixed marker in its place from then on.
    fn fill(&mut self, buf: &mut String, width: usize, stats: &Statistics) -> Result<(), DecorError>;
}

/// The default glyph-based filler.
///
/// Renders `[===>---]` style bars. The first `refill` units (capped at
/// `current`) are drawn with the refill glyph so progress carried over from a
/// prior run is visually distinct. Brackets do not count as progress width.
#[derive(Debug, Clone)]
pub struct BarFiller {
    glyphs: [char; STYLE_LEN],
    reverse: bool,
}

impl BarFiller {
    /// Filler with the default `"[=>-]<+"` style.
    pub fn new() -> Self {
        let mut glyphs = [' '; STYLE_LEN];
        for (slot, ch) in glyphs.iter_mut().zip(DEFAULT_BAR_STYLE.chars()) {
            *slot = ch;
        }
        BarFiller {
            glyphs,
            reverse: false,
        }
    }

    /// Apply a custom style.
    ///
    /// A style supplies at least the first five glyphs (left bracket, fill,
    /// tip, empty, right bracket) and optionally the reverse-tip and refill
    /// glyphs. Anything shorter is silently ignored and the prior style
    /// retained.
    pub fn set_style(&mut self, style: &str) {
        if style.chars().count() < STYLE_RIGHT + 1 {
            return;
        }
        for (slot, ch) in self.glyphs.iter_mut().zip(style.chars()) {
            *slot = ch;
        }
    }

    /// Progress from right to left, using the reverse-tip glyph.
    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }
}

impl Default for BarFiller {
    fn default() -> Self {
        BarFiller::new()
    }
}

impl Filler for BarFiller {
    fn fill(&mut self, buf: &mut String, width: usize, stats: &Statistics) -> Result<(), DecorError> {
        // brackets don't count as progress
        let Some(inner) = width.checked_sub(2).filter(|w| *w >= 2) else {
            return Ok(());
        };

        let cwidth = percentage_round(stats.total, stats.current, inner);
        let rwidth = if stats.refill > 0 {
            if stats.refill >= stats.current {
                cwidth
            } else {
                percentage_round(stats.total, stats.refill, inner)
            }
        } else {
            0
        };

        let mut cells = Vec::with_capacity(inner);
        for i in 0..inner {
            if i < rwidth {
                cells.push(self.glyphs[STYLE_REFILL]);
            } else if i < cwidth {
                cells.push(self.glyphs[STYLE_FILL]);
            } else {
                cells.push(self.glyphs[STYLE_EMPTY]);
            }
        }
        if cwidth > 0 && cwidth < inner {
            cells[cwidth - 1] = if self.reverse {
                self.glyphs[STYLE_REV_TIP]
            } else {
                self.glyphs[STYLE_TIP]
            };
        }

        buf.push(self.glyphs[STYLE_LEFT]);
        if self.reverse {
            buf.extend(cells.iter().rev());
        } else {
            buf.extend(cells.iter());
        }
        buf.push(self.glyphs[STYLE_RIGHT]);
        Ok(())
    }
}
