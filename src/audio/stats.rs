//! Compressed packet size statistics.
//!
//! The "average" is a damped fold, `(avg + size) / 2`,
//! not an arithmetic mean.

use std::sync::atomic::{AtomicU64, Ordering};

/// Written by the capture thread only, read by the session on exit.
#[derive(Debug, Default)]
pub struct PacketStats {
    min: AtomicU64,
    max: AtomicU64,
    average: AtomicU64,
    packets: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Bytes. 0 until the first packet.
    pub min: u64,
    pub max: u64,
    pub average: u64,
    pub packets: u64,
}

impl PacketStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one encoded packet size in. Zero means "unset" for min/average.
    pub fn record(&self, size: u64) {
        let max = self.max.load(Ordering::Relaxed).max(size);
        self.max.store(max, Ordering::Relaxed);

        let min = match self.min.load(Ordering::Relaxed) {
            0 => size,
            prev => prev.min(size),
        };
        self.min.store(min, Ordering::Relaxed);

        let average = match self.average.load(Ordering::Relaxed) {
            0 => size,
            prev => (prev + size) / 2,
        };
        self.average.store(average, Ordering::Relaxed);

        self.packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            min: self.min.load(Ordering::Relaxed),
            max: self.max.load(Ordering::Relaxed),
            average: self.average.load(Ordering::Relaxed),
            packets: self.packets.load(Ordering::Relaxed),
        }
    }
}

/// Display conversion used in the final report: `bytes * 2 / 1024`.
pub fn to_kbit(bytes: u64) -> f32 {
    (bytes * 2) as f32 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_fold() {
        let stats = PacketStats::new();
        for size in [40, 55, 30, 62] {
            stats.record(size);
        }
        let s = stats.snapshot();
        assert_eq!(s.min, 30);
        assert_eq!(s.max, 62);
        assert_eq!(s.average, 50);
        assert_eq!(s.packets, 4);
    }

    #[test]
    fn test_average_steps() {
        let stats = PacketStats::new();
        let mut seen = Vec::new();
        for size in [40, 55, 30, 62] {
            stats.record(size);
            seen.push(stats.snapshot().average);
        }
        assert_eq!(seen, vec![40, 47, 38, 50]);
    }

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(PacketStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_to_kbit() {
        assert!((to_kbit(62) - 0.121_093_75).abs() < 1e-6);
        assert_eq!(to_kbit(960), 1.875);
        assert_eq!(to_kbit(0), 0.0);
    }
}
