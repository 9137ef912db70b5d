use std::time::Duration;

/// Number of buckets in each latency histogram. The last bucket is a
/// catch-all for anything at or above its threshold.
pub const NUM_BINS: usize = 64;

/// Width in nanoseconds of each bucket below the final one.
const DEFAULT_BIN_NS: u64 = 50_000; // 50us

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Write,
}

/// Fixed-size latency histograms for read and write completions.
///
/// Mutated only by the thread that drains async-I/O completions; readers
/// (periodic stats reporting) are advisory.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    bin_ns: u64,
    read_bins: [u32; NUM_BINS],
    write_bins: [u32; NUM_BINS],
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new(DEFAULT_BIN_NS)
    }
}

impl LatencyHistogram {
    #[must_use]
    pub fn new(bin_ns: u64) -> Self {
        Self {
            bin_ns: bin_ns.max(1),
            read_bins: [0; NUM_BINS],
            write_bins: [0; NUM_BINS],
        }
    }

    pub fn record(&mut self, kind: OpKind, latency: Duration) {
        let bin = ((latency.as_nanos() as u64 / self.bin_ns) as usize).min(NUM_BINS - 1);
        match kind {
            OpKind::Read => self.read_bins[bin] += 1,
            OpKind::Write => self.write_bins[bin] += 1,
        }
    }

    #[must_use]
    pub fn bins(&self, kind: OpKind) -> &[u32; NUM_BINS] {
        match kind {
            OpKind::Read => &self.read_bins,
            OpKind::Write => &self.write_bins,
        }
    }

    /// Highest non-empty bucket's upper bound, in nanoseconds.
    #[must_use]
    pub fn latency_max_ns(&self, kind: OpKind) -> u64 {
        let bins = self.bins(kind);
        bins.iter()
            .rposition(|&count| count > 0)
            .map_or(0, |bin| (bin as u64 + 1) * self.bin_ns)
    }

    /// Approximate median latency in nanoseconds, derived from bucket
    /// midpoints (the appliance's original implementation used the same
    /// coarse approximation rather than retaining raw samples).
    #[must_use]
    pub fn latency_mid_ns(&self, kind: OpKind) -> u64 {
        let bins = self.bins(kind);
        let total: u64 = bins.iter().map(|&c| u64::from(c)).sum();
        if total == 0 {
            return 0;
        }
        let half = total / 2;
        let mut seen = 0u64;
        for (bin, &count) in bins.iter().enumerate() {
            seen += u64::from(count);
            if seen > half {
                return bin as u64 * self.bin_ns + self.bin_ns / 2;
            }
        }
        0
    }

    pub fn reset(&mut self) {
        self.read_bins = [0; NUM_BINS];
        self.write_bins = [0; NUM_BINS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_into_the_clamped_last_bin_for_large_latencies() {
        let mut histogram = LatencyHistogram::new(1_000);
        histogram.record(OpKind::Write, Duration::from_secs(10));
        assert_eq!(histogram.bins(OpKind::Write)[NUM_BINS - 1], 1);
    }

    #[test]
    fn latency_max_tracks_the_highest_populated_bucket() {
        let mut histogram = LatencyHistogram::new(1_000);
        histogram.record(OpKind::Read, Duration::from_nanos(500));
        histogram.record(OpKind::Read, Duration::from_nanos(5_500));
        assert_eq!(histogram.latency_max_ns(OpKind::Read), 6_000);
    }

    #[test]
    fn reset_clears_both_channels() {
        let mut histogram = LatencyHistogram::new(1_000);
        histogram.record(OpKind::Read, Duration::from_nanos(1));
        histogram.record(OpKind::Write, Duration::from_nanos(1));
        histogram.reset();
        assert_eq!(histogram.bins(OpKind::Read).iter().sum::<u32>(), 0);
        assert_eq!(histogram.bins(OpKind::Write).iter().sum::<u32>(), 0);
    }
}
