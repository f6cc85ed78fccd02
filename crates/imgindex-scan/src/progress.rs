//! Build progress reporting.

use std::time::Duration;

use compact_str::CompactString;

/// Progress information emitted once per scanned category.
///
/// Events arrive in completion order, which varies from run to run.
#[derive(Debug, Clone)]
pub struct BuildProgress {
    /// Number of categories completed so far, including this one.
    pub completed: usize,
    /// Total number of categories in the build.
    pub total: usize,
    /// Category that just finished.
    pub category: CompactString,
    /// Items found in that category.
    pub item_count: usize,
    /// Items found across all completed categories.
    pub running_total: usize,
    /// Time elapsed since the build started.
    pub elapsed: Duration,
}

impl BuildProgress {
    /// Fraction of categories completed (0.0 to 1.0).
    pub fn fraction(&self) -> f64 {
        if self.total > 0 {
            self.completed as f64 / self.total as f64
        } else {
            1.0
        }
    }

    /// Calculate scan rate in categories per second.
    pub fn categories_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.completed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Check if this was the last category.
    pub fn is_last(&self) -> bool {
        self.completed == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(completed: usize, total: usize) -> BuildProgress {
        BuildProgress {
            completed,
            total,
            category: "n001".into(),
            item_count: 3,
            running_total: 3,
            elapsed: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_fraction() {
        assert_eq!(progress(1, 4).fraction(), 0.25);
        assert_eq!(progress(0, 0).fraction(), 1.0);
    }

    #[test]
    fn test_rate_and_last() {
        let p = progress(4, 4);
        assert_eq!(p.categories_per_second(), 2.0);
        assert!(p.is_last());
        assert!(!progress(3, 4).is_last());
    }
}
