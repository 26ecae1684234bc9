//! Elapsed time decorator.

use std::time::Instant;

use super::{format_duration_with, DecorError, Decorator, Statistics, TimeStyle, WC};

/// Renders time elapsed since the decorator was constructed, in any
/// [`TimeStyle`] (Go duration style by default: `"42s"`, `"4m11s"`).
///
/// The reading freezes on the tick the bar reaches a terminal state, so the
/// final frame shows the actual run time instead of advancing forever.
#[derive(Debug, Clone)]
pub struct Elapsed {
    wc: WC,
    style: TimeStyle,
    start: Instant,
    frozen: Option<String>,
}

impl Elapsed {
    /// New elapsed decorator; the clock starts now.
    pub fn new() -> Self {
        Elapsed {
            wc: WC::default(),
            style: TimeStyle::default(),
            start: Instant::now(),
            frozen: None,
        }
    }

    /// Replace the width configuration.
    pub fn with_wc(mut self, wc: WC) -> Self {
        self.wc = wc;
        self
    }

    /// Replace the rendering style.
    pub fn with_style(mut self, style: TimeStyle) -> Self {
        self.style = style;
        self
    }
}

impl Default for Elapsed {
    fn default() -> Self {
        Elapsed::new()
    }
}

impl Decorator for Elapsed {
    fn decor(&mut self, stats: &Statistics) -> Result<String, DecorError> {
        if stats.completed || stats.aborted {
            let msg = self
                .frozen
                .get_or_insert_with(|| format_duration_with(self.start.elapsed(), self.style));
            return Ok(msg.clone());
        }
        Ok(format_duration_with(self.start.elapsed(), self.style))
    }

    fn wc(&self) -> WC {
        self.wc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_state_freezes_the_reading() {
        let mut d = Elapsed::new();
        let done = Statistics {
            id: 0,
            total: 10,
            current: 10,
            refill: 0,
            completed: true,
            aborted: false,
        };
        let first = d.decor(&done).ok();
        let second = d.decor(&done).ok();
        assert_eq!(first, second);
    }

    #[test]
    fn clock_style_renders_colon_separated_fields() {
        let mut d = Elapsed::new().with_style(TimeStyle::HhMmSs);
        let running = Statistics {
            id: 0,
            total: 10,
            current: 1,
            refill: 0,
            completed: false,
            aborted: false,
        };
        let msg = d.decor(&running).ok();
        assert_eq!(msg, Some("00:00:00".to_string()));
    }
}
