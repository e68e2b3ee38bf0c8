//! Accumulation of per-read latency samples.

use std::fmt;
use std::time::Duration;

use sketches_ddsketch::DDSketch;

/// Collects the duration of every completed read of a run.
///
/// Samples are kept verbatim, so count, sum, min, max and mean are exact. Percentiles are
/// estimated with a [`DDSketch`] (relative error of about 1%) and clamped into the observed
/// `[min, max]` range.
#[derive(Default)]
pub struct StatsAccumulator {
    samples: Vec<Duration>,
    sketch: DDSketch,
    sum: Duration,
    min: Option<Duration>,
    max: Option<Duration>,
}

impl StatsAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample.
    pub fn record(&mut self, duration: Duration) {
        self.samples.push(duration);
        self.sketch.add(duration.as_secs_f64());
        self.sum += duration;
        self.min = Some(self.min.map_or(duration, |min| min.min(duration)));
        self.max = Some(self.max.map_or(duration, |max| max.max(duration)));
    }

    /// Appends all samples of `other`.
    ///
    /// Used to combine accumulators filled by independent workers.
    pub fn merge(&mut self, other: &StatsAccumulator) {
        for &sample in &other.samples {
            self.record(sample);
        }
    }

    /// All recorded samples, in recording order.
    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    /// The number of recorded samples.
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The total of all samples.
    pub fn sum(&self) -> Duration {
        self.sum
    }

    /// The shortest sample.
    pub fn min(&self) -> Option<Duration> {
        self.min
    }

    /// The longest sample.
    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// The arithmetic mean of all samples.
    pub fn mean(&self) -> Option<Duration> {
        let count = self.samples.len();
        if count == 0 {
            return None;
        }

        Some(match u32::try_from(count) {
            Ok(count) => self.sum / count,
            Err(_) => self.sum.div_f64(count as f64),
        })
    }

    /// Estimates the `q`-quantile, for `q` in `[0, 1]`.
    ///
    /// The extremes `0` and `1` return the exact minimum and maximum. Returns `None` if no samples
    /// were recorded or `q` is out of range.
    pub fn percentile(&self, q: f64) -> Option<Duration> {
        let (min, max) = (self.min?, self.max?);
        if !(0.0..=1.0).contains(&q) {
            return None;
        } else if q == 0.0 {
            return Some(min);
        } else if q == 1.0 {
            return Some(max);
        }

        let estimate = self.sketch.quantile(q).ok().flatten()?;
        if !estimate.is_finite() {
            return None;
        }

        Some(Duration::from_secs_f64(estimate.max(0.0)).clamp(min, max))
    }
}

impl fmt::Debug for StatsAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsAccumulator")
            .field("count", &self.count())
            .field("sum", &self.sum)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}
