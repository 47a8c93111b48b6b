pub mod analytics;
pub mod assessments;
pub mod assistant;
pub mod content;
pub mod feedback;
pub mod user;

use chrono::NaiveDateTime;

use crate::auth::format_naive_datetime_iso_millis;

pub(crate) fn iso(value: NaiveDateTime) -> String {
    format_naive_datetime_iso_millis(value)
}

pub(crate) fn iso_opt(value: Option<NaiveDateTime>) -> Option<String> {
    value.map(format_naive_datetime_iso_millis)
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `%term%` for an `ILIKE` match, with the wildcard characters escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
