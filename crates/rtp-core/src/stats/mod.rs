//! RTP reception statistics
//!
//! Burst/gap loss metrics per RFC 3611 and a per-SSRC aggregation facade
//! feeding RTCP extended-report consumers.

pub mod burst;

pub use burst::{BurstMetrics, BurstMetricsSnapshot, GMIN};

use std::collections::HashMap;

use crate::RtpSsrc;

/// Per-SSRC reception statistics keyed by synchronization source
pub struct RtpStats {
    metrics: HashMap<RtpSsrc, BurstMetrics>,
}

impl RtpStats {
    /// Create an empty statistics table
    pub fn new() -> Self {
        Self {
            metrics: HashMap::new(),
        }
    }

    /// Record a received packet for a source
    pub fn packet_received(&mut self, ssrc: RtpSsrc) {
        self.metrics.entry(ssrc).or_default().packet_received();
    }

    /// Record a lost packet for a source
    pub fn packet_lost(&mut self, ssrc: RtpSsrc) {
        self.metrics.entry(ssrc).or_default().packet_lost();
    }

    /// Record a discarded packet (late/overflow) for a source
    pub fn packet_discarded(&mut self, ssrc: RtpSsrc) {
        self.metrics.entry(ssrc).or_default().packet_discarded();
    }

    /// Burst metrics for a source, if any events were recorded for it
    pub fn burst_metrics(&mut self, ssrc: RtpSsrc) -> Option<u64> {
        self.metrics.get_mut(&ssrc).map(BurstMetrics::metrics)
    }

    /// Sources with recorded events
    pub fn sources(&self) -> impl Iterator<Item = RtpSsrc> + '_ {
        self.metrics.keys().copied()
    }
}

impl Default for RtpStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_ssrc_isolation() {
        let mut stats = RtpStats::new();
        stats.packet_received(1);
        stats.packet_lost(1);
        stats.packet_received(2);

        assert!(stats.burst_metrics(1).is_some());
        assert!(stats.burst_metrics(2).is_some());
        assert!(stats.burst_metrics(3).is_none());
        assert_ne!(stats.burst_metrics(1), stats.burst_metrics(2));
    }
}
