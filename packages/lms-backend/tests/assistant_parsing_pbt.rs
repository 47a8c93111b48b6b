//! Property-based tests for the pure helpers behind AI feedback and progress analytics.
//!
//! - Feedback parsing never loses a labelled section and never panics
//! - Completion percentage stays within 0..=100
//! - Progress distribution buckets account for every student exactly once
//! - Conversation titles respect the character cap on any UTF-8 input

use proptest::prelude::*;

use lms_backend::services::analytics::{completion_percentage, total_pages, ProgressDistribution};
use lms_backend::services::assistant::{conversation_title, parse_feedback, TITLE_MAX_CHARS};

fn arb_section() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,]{1,80}".prop_map(|s| s.trim().to_string())
}

proptest! {
    #[test]
    fn parse_feedback_never_panics(text in ".*") {
        let _ = parse_feedback(&text);
    }

    #[test]
    fn unlabelled_text_is_kept_as_strengths(text in "[a-z ]{0,200}") {
        let parsed = parse_feedback(&text);
        prop_assert_eq!(parsed.strengths, text);
        prop_assert!(parsed.improvements.is_empty());
        prop_assert!(parsed.suggestions.is_empty());
    }

    #[test]
    fn labelled_sections_are_recovered(
        strengths in arb_section(),
        improvements in arb_section(),
        suggestions in arb_section(),
    ) {
        let text = format!(
            "STRENGTHS: {strengths}\nIMPROVEMENTS: {improvements}\nSUGGESTIONS: {suggestions}"
        );
        let parsed = parse_feedback(&text);
        prop_assert_eq!(parsed.strengths, strengths);
        prop_assert_eq!(parsed.improvements, improvements);
        prop_assert_eq!(parsed.suggestions, suggestions);
    }

    #[test]
    fn completion_is_a_percentage(done in 0i64..10_000, total in -10i64..10_000) {
        let pct = completion_percentage(done, total);
        prop_assert!((0.0..=100.0).contains(&pct));
        if total <= 0 {
            prop_assert_eq!(pct, 0.0);
        }
    }

    #[test]
    fn distribution_counts_every_student(values in prop::collection::vec(0.0f64..=100.0, 0..200)) {
        let dist = ProgressDistribution::from_completions(values.iter().copied());
        let total = dist.quarter + dist.half + dist.three_quarters + dist.full;
        prop_assert_eq!(total, values.len() as i64);
    }

    #[test]
    fn pages_cover_all_items(count in 0i64..5_000, per_page in 1i64..100) {
        let pages = total_pages(count, per_page);
        prop_assert!(pages * per_page >= count);
        if count > 0 {
            prop_assert!((pages - 1) * per_page < count);
        }
    }

    #[test]
    fn titles_respect_char_cap(message in "\\PC{0,200}") {
        let title = conversation_title(&message);
        prop_assert!(title.chars().count() <= TITLE_MAX_CHARS + 3);
    }
}
