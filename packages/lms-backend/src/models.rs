//! Enumerations shared by the persistence layer and the HTTP handlers.
//!
//! Every enum is stored as its SCREAMING_SNAKE_CASE text form and parsed back
//! strictly: an unknown value is a validation failure, never a silent default.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Teacher => "TEACHER",
            Self::Student => "STUDENT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Self::Admin),
            "TEACHER" => Some(Self::Teacher),
            "STUDENT" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    pub fn is_teacher(&self) -> bool {
        matches!(self, Self::Teacher)
    }

    pub fn is_student(&self) -> bool {
        matches!(self, Self::Student)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialType {
    Pdf,
    Video,
    Text,
    Link,
}

impl MaterialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Video => "VIDEO",
            Self::Text => "TEXT",
            Self::Link => "LINK",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PDF" => Some(Self::Pdf),
            "VIDEO" => Some(Self::Video),
            "TEXT" => Some(Self::Text),
            "LINK" => Some(Self::Link),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Draft,
    Published,
    Closed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Published => "PUBLISHED",
            Self::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Some(Self::Draft),
            "PUBLISHED" => Some(Self::Published),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn accepts_submissions(&self) -> bool {
        matches!(self, Self::Published)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Submitted,
    Graded,
    Returned,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::Graded => "GRADED",
            Self::Returned => "RETURNED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SUBMITTED" => Some(Self::Submitted),
            "GRADED" => Some(Self::Graded),
            "RETURNED" => Some(Self::Returned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    User,
    Ai,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Ai => "AI",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USER" => Some(Self::User),
            "AI" => Some(Self::Ai),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeneratedContentType {
    Summary,
    Explanation,
    Practice,
    ConceptMap,
}

impl GeneratedContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "SUMMARY",
            Self::Explanation => "EXPLANATION",
            Self::Practice => "PRACTICE",
            Self::ConceptMap => "CONCEPT_MAP",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SUMMARY" => Some(Self::Summary),
            "EXPLANATION" => Some(Self::Explanation),
            "PRACTICE" => Some(Self::Practice),
            "CONCEPT_MAP" => Some(Self::ConceptMap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    MaterialView,
    AssignmentSubmit,
    AiInteraction,
    GoalSet,
    GoalComplete,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaterialView => "MATERIAL_VIEW",
            Self::AssignmentSubmit => "ASSIGNMENT_SUBMIT",
            Self::AiInteraction => "AI_INTERACTION",
            Self::GoalSet => "GOAL_SET",
            Self::GoalComplete => "GOAL_COMPLETE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "MATERIAL_VIEW" => Some(Self::MaterialView),
            "ASSIGNMENT_SUBMIT" => Some(Self::AssignmentSubmit),
            "AI_INTERACTION" => Some(Self::AiInteraction),
            "GOAL_SET" => Some(Self::GoalSet),
            "GOAL_COMPLETE" => Some(Self::GoalComplete),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MaterialView => "Viewed Material",
            Self::AssignmentSubmit => "Submitted Assignment",
            Self::AiInteraction => "AI Interaction",
            Self::GoalSet => "Set Goal",
            Self::GoalComplete => "Completed Goal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackType {
    Bug,
    Feature,
    General,
    AiQuality,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bug => "BUG",
            Self::Feature => "FEATURE",
            Self::General => "GENERAL",
            Self::AiQuality => "AI_QUALITY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BUG" => Some(Self::Bug),
            "FEATURE" => Some(Self::Feature),
            "GENERAL" => Some(Self::General),
            "AI_QUALITY" => Some(Self::AiQuality),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackStatus {
    Pending,
    Reviewed,
    Resolved,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Reviewed => "REVIEWED",
            Self::Resolved => "RESOLVED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "REVIEWED" => Some(Self::Reviewed),
            "RESOLVED" => Some(Self::Resolved),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("teacher"), Some(Role::Teacher));
        assert_eq!(Role::parse(" ADMIN "), Some(Role::Admin));
        assert_eq!(Role::parse("USER"), None);
    }

    #[test]
    fn role_serializes_as_stored_text() {
        let json = serde_json::to_string(&Role::Student).unwrap();
        assert_eq!(json, "\"STUDENT\"");
    }

    #[test]
    fn activity_type_matches_stored_text() {
        for activity in [
            ActivityType::MaterialView,
            ActivityType::AssignmentSubmit,
            ActivityType::AiInteraction,
            ActivityType::GoalSet,
            ActivityType::GoalComplete,
        ] {
            assert_eq!(ActivityType::parse(activity.as_str()), Some(activity));
            let json = serde_json::to_string(&activity).unwrap();
            assert_eq!(json, format!("\"{}\"", activity.as_str()));
        }
    }

    #[test]
    fn generated_content_concept_map_uses_underscore() {
        assert_eq!(GeneratedContentType::ConceptMap.as_str(), "CONCEPT_MAP");
        let json = serde_json::to_string(&GeneratedContentType::ConceptMap).unwrap();
        assert_eq!(json, "\"CONCEPT_MAP\"");
    }

    #[test]
    fn only_published_assignments_accept_submissions() {
        assert!(AssignmentStatus::Published.accepts_submissions());
        assert!(!AssignmentStatus::Draft.accepts_submissions());
        assert!(!AssignmentStatus::Closed.accepts_submissions());
    }

    #[test]
    fn feedback_type_rejects_unknown() {
        assert_eq!(FeedbackType::parse("ai_quality"), Some(FeedbackType::AiQuality));
        assert_eq!(FeedbackType::parse("praise"), None);
    }
}
