//! Raw counter decorator.

use super::{DecorError, Decorator, Statistics, WC};

/// Renders the raw counters as `"30/100"`.
///
/// Neither value is clamped: a counter that overshoots its total reads, for
/// example, `"120/100"`.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    wc: WC,
}

impl Counters {
    /// New counters decorator with default width configuration.
    pub fn new() -> Self {
        Counters::default()
    }

    /// Replace the width configuration.
    pub fn with_wc(mut self, wc: WC) -> Self {
        self.wc = wc;
        self
    }
}

impl Decorator for Counters {
    fn decor(&mut self, stats: &Statistics) -> Result<String, DecorError> {
        Ok(format!("{}/{}", stats.current, stats.total))
    }

    fn wc(&self) -> WC {
        self.wc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_clamps_the_counter() {
        let mut d = Counters::new();
        let stats = Statistics {
            id: 0,
            total: 100,
            current: 120,
            refill: 0,
            completed: true,
            aborted: false,
        };
        assert_eq!(d.decor(&stats).ok(), Some("120/100".to_string()));
    }
}
