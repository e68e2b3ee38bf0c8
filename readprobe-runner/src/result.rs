use crate::stats::StatsAccumulator;

/// The outcome of a completed run.
///
/// Only successful reads contribute samples, so [`StatsAccumulator::count`] may be lower than
/// the number of iterations if reads failed.
#[derive(Debug)]
pub struct OperationResult {
    stats: StatsAccumulator,
}

impl OperationResult {
    pub(crate) fn new(stats: StatsAccumulator) -> Self {
        Self { stats }
    }

    /// The statistics of all recorded reads.
    pub fn stats(&self) -> &StatsAccumulator {
        &self.stats
    }

    /// Consumes the result and returns its statistics.
    pub fn into_stats(self) -> StatsAccumulator {
        self.stats
    }
}
