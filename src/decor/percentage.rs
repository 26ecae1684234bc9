//! Percentage decorator.

use super::{percentage_round, DecorError, Decorator, Statistics, WC};

/// Renders completion as `"42 %"`.
///
/// The displayed value is clamped to 100 even when the underlying counter
/// overshoots its total; the counter itself is never clamped.
#[derive(Debug, Clone, Default)]
pub struct Percentage {
    wc: WC,
}

impl Percentage {
    /// New percentage decorator with default width configuration.
    pub fn new() -> Self {
        Percentage::default()
    }

    /// Replace the width configuration.
    pub fn with_wc(mut self, wc: WC) -> Self {
        self.wc = wc;
        self
    }
}

impl Decorator for Percentage {
    fn decor(&mut self, stats: &Statistics) -> Result<String, DecorError> {
        let shown = stats.current.min(stats.total);
        let p = percentage_round(stats.total, shown, 100);
        Ok(format!("{p} %"))
    }

    fn wc(&self) -> WC {
        self.wc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(total: u64, current: u64) -> Statistics {
        Statistics {
            id: 0,
            total,
            current,
            refill: 0,
            completed: total > 0 && current >= total,
            aborted: false,
        }
    }

    #[test]
    fn renders_rounded_percentage() {
        let mut d = Percentage::new();
        assert_eq!(d.decor(&stats(200, 85)).ok(), Some("43 %".to_string()));
    }

    #[test]
    fn clamps_display_at_one_hundred() {
        let mut d = Percentage::new();
        assert_eq!(d.decor(&stats(100, 250)).ok(), Some("100 %".to_string()));
    }

    #[test]
    fn unknown_total_reads_zero() {
        let mut d = Percentage::new();
        assert_eq!(d.decor(&stats(0, 50)).ok(), Some("0 %".to_string()));
    }
}
