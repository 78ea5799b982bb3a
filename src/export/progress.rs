use std::fmt;
use std::time::{Duration, Instant};

/// A point-in-time progress snapshot for one collection
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub percent: u64,
    pub processed: u64,
    pub total: u64,
    /// Linear estimate from the average time per document so far
    pub remaining: Option<Duration>,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% ({}/{})", self.percent, self.processed, self.total)?;
        if let Some(remaining) = self.remaining {
            write!(f, ", about {} remaining", format_duration(remaining))?;
        }
        Ok(())
    }
}

/// Decides when a progress report is due.
///
/// Reports are rate limited to one per `interval`, and only produced when
/// the whole-number percentage has moved since the last one.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: u64,
    interval: Duration,
    started: Instant,
    last_report: Instant,
    last_percent: u64,
}

impl ProgressTracker {
    pub fn new(total: u64, interval: Duration, now: Instant) -> Self {
        ProgressTracker {
            total,
            interval,
            started: now,
            last_report: now,
            last_percent: 0,
        }
    }

    pub fn observe(&mut self, processed: u64, now: Instant) -> Option<ProgressReport> {
        if self.total == 0 || now.duration_since(self.last_report) < self.interval {
            return None;
        }

        let percent = (processed.min(self.total) * 100) / self.total;
        if percent <= self.last_percent {
            return None;
        }

        self.last_report = now;
        self.last_percent = percent;

        let elapsed = now.duration_since(self.started);
        let remaining = if processed > 0 {
            let left = self.total.saturating_sub(processed);
            Some(elapsed.mul_f64(left as f64 / processed as f64))
        } else {
            None
        };

        Some(ProgressReport {
            percent,
            processed,
            total: self.total,
            remaining,
        })
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}
