//! Cross-bar column width synchronization.
//!
//! Per tick, the orchestrator runs two explicit passes separated by a
//! barrier: a scatter round where every bar measures the natural width of
//! each sync-enrolled column, and a gather step that folds those
//! measurements into one published width per group, the maximum natural
//! width for that tick. The published map is handed to every participant
//! before any of them finalizes its line, and the whole structure is
//! discarded after the frame.

use std::collections::HashMap;

/// Which side of the filler a decorator column sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Column {
    Prepend,
    Append,
}

/// Identity of a width-sync group: the same column slot across bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SyncKey {
    pub(crate) column: Column,
    pub(crate) index: usize,
}

/// One tick's gather state.
#[derive(Debug, Default)]
pub(crate) struct SyncGather {
    widths: HashMap<SyncKey, usize>,
}

impl SyncGather {
    /// Fold one bar's measurements into the running maxima.
    pub(crate) fn absorb(&mut self, measured: &[(SyncKey, usize)]) {
        for &(key, width) in measured {
            let slot = self.widths.entry(key).or_insert(0);
            *slot = (*slot).max(width);
        }
    }

    /// Finish the gather step and publish the per-group widths.
    pub(crate) fn publish(self) -> HashMap<SyncKey, usize> {
        self.widths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: SyncKey = SyncKey {
        column: Column::Prepend,
        index: 0,
    };

    #[test]
    fn publishes_the_maximum_natural_width() {
        let mut g = SyncGather::default();
        g.absorb(&[(KEY, 4)]);
        g.absorb(&[(KEY, 7)]);
        let widths = g.publish();
        assert_eq!(widths.get(&KEY).copied(), Some(7));
    }

    #[test]
    fn groups_are_independent() {
        let other = SyncKey {
            column: Column::Append,
            index: 0,
        };
        let mut g = SyncGather::default();
        g.absorb(&[(KEY, 4), (other, 9)]);
        g.absorb(&[(KEY, 6)]);
        let widths = g.publish();
        assert_eq!(widths.get(&KEY).copied(), Some(6));
        assert_eq!(widths.get(&other).copied(), Some(9));
    }
}
