use std::fmt;

use crate::audio::{StatsSnapshot, to_kbit};

/// Final numbers printed when the session ends.
#[derive(Debug, Clone, Copy)]
pub struct StatsReport {
    pub stats: StatsSnapshot,
    /// Samples per period, reported through the same conversion as packets
    pub buffer_size: u64,
    pub queue_high_water: usize,
    pub queue_dropped: u64,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stats: ")?;
        writeln!(f, "encoded min: \t\t\t{} Kbit ", to_kbit(self.stats.min))?;
        writeln!(f, "encoded max: \t\t\t{} Kbit ", to_kbit(self.stats.max))?;
        writeln!(f, "encoded average: \t\t{} Kbit ", to_kbit(self.stats.average))?;
        write!(f, "buffer: \t\t\t{} Kbit", to_kbit(self.buffer_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lines() {
        let report = StatsReport {
            stats: StatsSnapshot {
                min: 30,
                max: 62,
                average: 50,
                packets: 4,
            },
            buffer_size: 960,
            queue_high_water: 3,
            queue_dropped: 0,
        };
        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0].trim(), "Stats:");
        assert!(lines[1].starts_with("encoded min:"));
        assert!(lines[2].ends_with("0.12109375 Kbit "));
        assert!(lines[3].contains("0.09765625 Kbit"));
        assert_eq!(lines[4], "buffer: \t\t\t1.875 Kbit");
    }
}
