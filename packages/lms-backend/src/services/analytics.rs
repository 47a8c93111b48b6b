use serde::Serialize;

use crate::models::ActivityType;

pub const STRUGGLING_THRESHOLD: f64 = 50.0;
pub const MINUTES_PER_ACTIVITY: i32 = 10;
pub const ACTIVITIES_PER_PAGE: i64 = 25;
pub const DEFAULT_ENGAGEMENT_DAYS: i64 = 30;
pub const MAX_ENGAGEMENT_DAYS: i64 = 365;

pub fn completion_percentage(done: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (done as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

pub fn rate(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn is_struggling(completion: f64) -> bool {
    completion < STRUGGLING_THRESHOLD
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressDistribution {
    #[serde(rename = "0-25%")]
    pub quarter: i64,
    #[serde(rename = "25-50%")]
    pub half: i64,
    #[serde(rename = "50-75%")]
    pub three_quarters: i64,
    #[serde(rename = "75-100%")]
    pub full: i64,
}

impl ProgressDistribution {
    pub fn from_completions(completions: impl IntoIterator<Item = f64>) -> Self {
        let mut dist = Self::default();
        for value in completions {
            dist.add(value);
        }
        dist
    }

    pub fn add(&mut self, completion: f64) {
        if completion < 25.0 {
            self.quarter += 1;
        } else if completion < 50.0 {
            self.half += 1;
        } else if completion < 75.0 {
            self.three_quarters += 1;
        } else {
            self.full += 1;
        }
    }
}

/// Progress counters after a student opens a material. Only the first view of a
/// material completes it; every view adds [`MINUTES_PER_ACTIVITY`] of study time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewProgress {
    pub materials_completed: i32,
    pub completion_percentage: f64,
    pub minutes_added: i32,
}

impl ViewProgress {
    pub fn after_view(completed: i32, total: i32, first_view: bool) -> Self {
        let materials_completed = if first_view {
            completed.saturating_add(1).min(total)
        } else {
            completed
        };
        Self {
            materials_completed,
            completion_percentage: completion_percentage(
                i64::from(materials_completed),
                i64::from(total),
            ),
            minutes_added: MINUTES_PER_ACTIVITY,
        }
    }
}

/// One student's activity totals for a single day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyEngagement {
    pub total_time_minutes: i32,
    pub materials_viewed: i32,
    pub ai_interactions: i32,
    pub assignments_submitted: i32,
}

impl DailyEngagement {
    /// Builds the day from per-type activity counts, as grouped by the database.
    pub fn from_counts(counts: impl IntoIterator<Item = (ActivityType, i64)>) -> Self {
        let mut day = Self::default();
        let mut total: i32 = 0;
        for (activity, count) in counts {
            let count = i32::try_from(count.max(0)).unwrap_or(i32::MAX);
            total = total.saturating_add(count);
            let counter = match activity {
                ActivityType::MaterialView => &mut day.materials_viewed,
                ActivityType::AiInteraction => &mut day.ai_interactions,
                ActivityType::AssignmentSubmit => &mut day.assignments_submitted,
                ActivityType::GoalSet | ActivityType::GoalComplete => continue,
            };
            *counter = counter.saturating_add(count);
        }
        day.total_time_minutes = total.saturating_mul(MINUTES_PER_ACTIVITY);
        day
    }
}

pub fn total_pages(count: i64, per_page: i64) -> i64 {
    if count <= 0 || per_page <= 0 {
        return 0;
    }
    (count + per_page - 1) / per_page
}

/// Pages are 1-based; anything below 1 is the first page. Pages past the
/// largest representable offset are pinned to it, which reads as an empty page.
pub fn page_offset(page: Option<i64>, per_page: i64) -> (i64, i64) {
    let per_page = per_page.max(1);
    let page = page.unwrap_or(1).clamp(1, i64::MAX / per_page);
    (page, (page - 1) * per_page)
}

pub fn clamp_engagement_days(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_ENGAGEMENT_DAYS)
        .clamp(1, MAX_ENGAGEMENT_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_handles_zero_total() {
        assert_eq!(completion_percentage(3, 0), 0.0);
        assert_eq!(completion_percentage(1, 4), 25.0);
    }

    #[test]
    fn completion_is_clamped() {
        assert_eq!(completion_percentage(5, 4), 100.0);
        assert_eq!(completion_percentage(-1, 4), 0.0);
    }

    #[test]
    fn rate_is_not_clamped() {
        assert_eq!(rate(0, 0), 0.0);
        assert_eq!(rate(3, 2), 150.0);
    }

    #[test]
    fn round1_rounds_half_away() {
        assert_eq!(round1(66.666), 66.7);
        assert_eq!(round1(12.25), 12.3);
        assert_eq!(round1(0.0), 0.0);
    }

    #[test]
    fn average_of_empty_is_zero() {
        assert_eq!(average(&[]), 0.0);
        assert_eq!(average(&[50.0, 100.0]), 75.0);
    }

    #[test]
    fn distribution_bucket_edges() {
        let dist = ProgressDistribution::from_completions([0.0, 24.9, 25.0, 49.9, 50.0, 74.9, 75.0, 100.0]);
        assert_eq!(
            dist,
            ProgressDistribution {
                quarter: 2,
                half: 2,
                three_quarters: 2,
                full: 2
            }
        );
    }

    #[test]
    fn distribution_serializes_with_bucket_labels() {
        let json = serde_json::to_value(ProgressDistribution::from_completions([10.0])).unwrap();
        assert_eq!(json["0-25%"], 1);
        assert_eq!(json["75-100%"], 0);
    }

    #[test]
    fn struggling_is_strictly_below_fifty() {
        assert!(is_struggling(49.9));
        assert!(!is_struggling(50.0));
    }

    #[test]
    fn daily_engagement_counts_every_activity_as_ten_minutes() {
        let day = DailyEngagement::from_counts([
            (ActivityType::MaterialView, 2),
            (ActivityType::AiInteraction, 1),
            (ActivityType::AssignmentSubmit, 1),
            (ActivityType::GoalSet, 1),
        ]);
        assert_eq!(day.total_time_minutes, 50);
        assert_eq!(day.materials_viewed, 2);
        assert_eq!(day.ai_interactions, 1);
        assert_eq!(day.assignments_submitted, 1);
    }

    #[test]
    fn pagination() {
        assert_eq!(total_pages(0, 25), 0);
        assert_eq!(total_pages(25, 25), 1);
        assert_eq!(total_pages(26, 25), 2);
        assert_eq!(page_offset(None, 25), (1, 0));
        assert_eq!(page_offset(Some(3), 25), (3, 50));
        assert_eq!(page_offset(Some(-2), 25), (1, 0));
    }

    #[test]
    fn only_first_view_completes_but_every_view_adds_time() {
        let first = ViewProgress::after_view(1, 4, true);
        assert_eq!(first.materials_completed, 2);
        assert_eq!(first.completion_percentage, 50.0);
        assert_eq!(first.minutes_added, 10);

        let repeat = ViewProgress::after_view(2, 4, false);
        assert_eq!(repeat.materials_completed, 2);
        assert_eq!(repeat.minutes_added, 10);

        let capped = ViewProgress::after_view(4, 4, true);
        assert_eq!(capped.materials_completed, 4);
        assert_eq!(capped.completion_percentage, 100.0);
    }

    #[test]
    fn huge_page_does_not_overflow() {
        let (page, offset) = page_offset(Some(i64::MAX), ACTIVITIES_PER_PAGE);
        assert_eq!(page, i64::MAX / ACTIVITIES_PER_PAGE);
        assert!(offset >= 0);
        assert_eq!(offset, (page - 1) * ACTIVITIES_PER_PAGE);
    }

    #[test]
    fn daily_engagement_saturates_instead_of_overflowing() {
        let day = DailyEngagement::from_counts([(ActivityType::MaterialView, i64::MAX)]);
        assert_eq!(day.materials_viewed, i32::MAX);
        assert_eq!(day.total_time_minutes, i32::MAX);
    }

    #[test]
    fn engagement_days_are_bounded() {
        assert_eq!(clamp_engagement_days(None), 30);
        assert_eq!(clamp_engagement_days(Some(1000)), 365);
        assert_eq!(clamp_engagement_days(Some(0)), 1);
    }
}
