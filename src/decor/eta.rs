//! EWMA-based ETA decorator.

use std::time::Duration;

use super::{format_duration_with, DecorError, Decorator, Statistics, TimeStyle, WC};

/// Estimates time to completion from an exponentially-weighted moving
/// average of per-unit work durations.
///
/// Requires producers to attach duration samples via
/// [`Bar::incr_by_with`](crate::Bar::incr_by_with); increments without a
/// sample do not move the estimate. Until the first sample arrives the
/// decorator renders `"0s"`.
#[derive(Debug, Clone)]
pub struct EwmaEta {
    wc: WC,
    style: TimeStyle,
    alpha: f64,
    avg_secs_per_unit: f64,
    primed: bool,
}

impl EwmaEta {
    /// New ETA decorator. `age` controls the smoothing window: the weight of
    /// each new sample is `2 / (age + 1)`, so a larger age reacts more slowly.
    pub fn new(age: f64) -> Self {
        EwmaEta {
            wc: WC::default(),
            style: TimeStyle::default(),
            alpha: 2.0 / (age.max(1.0) + 1.0),
            avg_secs_per_unit: 0.0,
            primed: false,
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

impl Decorator for EwmaEta {
    fn decor(&mut self, stats: &Statistics) -> Result<String, DecorError> {
        if stats.completed || stats.aborted || !self.primed {
            return Ok(format_duration_with(Duration::ZERO, self.style));
        }
        let remaining = stats.total.saturating_sub(stats.current);
        let eta = self.avg_secs_per_unit * remaining as f64;
        // the extrapolation can escape Duration's range for huge totals
        let eta = Duration::try_from_secs_f64(eta.max(0.0))
            .map_err(|err| DecorError::Render(format!("estimate out of range: {err}")))?;
        Ok(format_duration_with(eta, self.style))
    }

    fn wc(&self) -> WC {
        self.wc
    }

    fn on_progress(&mut self, amount: u64, elapsed: Option<Duration>) {
        let Some(elapsed) = elapsed else { return };
        if amount == 0 {
            return;
        }
        let per_unit = elapsed.as_secs_f64() / amount as f64;
        if self.primed {
            self.avg_secs_per_unit =
                self.alpha * per_unit + (1.0 - self.alpha) * self.avg_secs_per_unit;
        } else {
            self.avg_secs_per_unit = per_unit;
            self.primed = true;
        }
    }
}
