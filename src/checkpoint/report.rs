//! Progress reporting over a checkpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Checkpoint;

/// Derived progress figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub percent: f64,
    pub elapsed_secs: u64,
    /// Seconds left at the observed rate; `None` before any throughput.
    pub eta_secs: Option<u64>,
    pub success_rate: f64,
}

impl ProgressSummary {
    pub fn compute(checkpoint: &Checkpoint, now: DateTime<Utc>) -> Self {
        let elapsed_secs = (now - checkpoint.start_time).num_seconds().max(0) as u64;

        let percent = if checkpoint.estimated_total > 0 {
            checkpoint.total_processed as f64 / checkpoint.estimated_total as f64 * 100.0
        } else {
            0.0
        };

        let eta_secs = if checkpoint.total_processed > 0
            && checkpoint.estimated_total > 0
            && elapsed_secs > 0
        {
            let rate = checkpoint.total_processed as f64 / elapsed_secs as f64;
            let remaining = checkpoint
                .estimated_total
                .saturating_sub(checkpoint.total_processed);
            Some((remaining as f64 / rate).round() as u64)
        } else {
            None
        };

        let attempts = checkpoint.success_count + checkpoint.error_count;
        let success_rate = if attempts == 0 {
            100.0
        } else {
            checkpoint.success_count as f64 / attempts as f64 * 100.0
        };

        Self {
            percent,
            elapsed_secs,
            eta_secs,
            success_rate,
        }
    }

    pub fn eta_display(&self) -> String {
        match self.eta_secs {
            Some(secs) => format_duration(round_to_minute(secs)),
            None => "calculating...".to_string(),
        }
    }
}

fn round_to_minute(secs: u64) -> u64 {
    (secs + 30) / 60 * 60
}

/// Format seconds as `1h 2m 3s`, omitting leading zero units.
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Render the progress report for `checkpoint` as of `now`.
pub fn report_at(checkpoint: &Checkpoint, now: DateTime<Utc>) -> String {
    let summary = ProgressSummary::compute(checkpoint, now);
    format!(
        "Crawl progress report\n\
         ---------------------\n\
         Phase:         {}\n\
         Current page:  {}\n\
         Processed:     {}/{} ({:.1}%)\n\
         Elapsed:       {}\n\
         ETA:           {}\n\
         Success:       {}\n\
         Errors:        {}\n\
         Success rate:  {:.1}%\n\
         Last update:   {}\n",
        checkpoint.phase.as_str(),
        checkpoint.current_page,
        checkpoint.total_processed,
        checkpoint.estimated_total,
        summary.percent,
        format_duration(summary.elapsed_secs),
        summary.eta_display(),
        checkpoint.success_count,
        checkpoint.error_count,
        summary.success_rate,
        checkpoint.last_update.format("%Y-%m-%d %H:%M:%S"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phase;
    use chrono::Duration;

    #[test]
    fn test_zero_processed_is_calculating() {
        let now = Utc::now();
        let mut checkpoint = Checkpoint::new(Phase::Manga, now - Duration::minutes(3));
        checkpoint.estimated_total = 100;

        let report = report_at(&checkpoint, now);
        assert!(report.contains("ETA:           calculating..."));
        assert!(report.contains("Success rate:  100.0%"));
        assert!(report.contains("0/100 (0.0%)"));
    }

    #[test]
    fn test_unknown_total_does_not_divide_by_zero() {
        let now = Utc::now();
        let mut checkpoint = Checkpoint::new(Phase::Chapters, now - Duration::minutes(1));
        checkpoint.total_processed = 5;

        let summary = ProgressSummary::compute(&checkpoint, now);
        assert_eq!(summary.percent, 0.0);
        assert_eq!(summary.eta_secs, None);
    }

    #[test]
    fn test_linear_eta() {
        let now = Utc::now();
        let mut checkpoint = Checkpoint::new(Phase::Pages, now - Duration::seconds(600));
        checkpoint.total_processed = 100;
        checkpoint.estimated_total = 400;
        checkpoint.success_count = 90;
        checkpoint.error_count = 10;

        let summary = ProgressSummary::compute(&checkpoint, now);
        assert_eq!(summary.percent, 25.0);
        assert_eq!(summary.elapsed_secs, 600);
        assert_eq!(summary.eta_secs, Some(1800));
        assert_eq!(summary.success_rate, 90.0);
        assert_eq!(summary.eta_display(), "30m 0s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5), "5s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3725), "1h 2m 5s");
    }
}
