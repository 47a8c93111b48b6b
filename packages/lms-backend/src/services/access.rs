//! Role and ownership checks shared by the route handlers.

use crate::auth::AuthUser;
use crate::models::Role;
use crate::response::AppError;

pub fn require_role(user: &AuthUser, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::forbidden("You do not have permission to perform this action"))
    }
}

pub fn require_admin(user: &AuthUser) -> Result<(), AppError> {
    require_role(user, &[Role::Admin])
}

pub fn require_teacher(user: &AuthUser) -> Result<(), AppError> {
    require_role(user, &[Role::Teacher])
}

pub fn require_student(user: &AuthUser) -> Result<(), AppError> {
    require_role(user, &[Role::Student])
}

pub fn teaches(user: &AuthUser, course_teacher_id: Option<&str>) -> bool {
    user.is_teacher() && course_teacher_id == Some(user.id.as_str())
}

/// Admins and the teacher assigned to the course.
pub fn can_manage_course(user: &AuthUser, course_teacher_id: Option<&str>) -> bool {
    user.is_admin() || teaches(user, course_teacher_id)
}

pub fn ensure_course_manager(
    user: &AuthUser,
    course_teacher_id: Option<&str>,
) -> Result<(), AppError> {
    if can_manage_course(user, course_teacher_id) {
        Ok(())
    } else {
        Err(AppError::forbidden("Only the course teacher or an admin can do this"))
    }
}

pub fn can_view_submission(
    user: &AuthUser,
    submission_student_id: &str,
    course_teacher_id: Option<&str>,
) -> bool {
    user.id == submission_student_id || can_manage_course(user, course_teacher_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: Role) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            username: id.to_string(),
            role,
            first_name: String::new(),
            last_name: String::new(),
            created_at: String::new(),
        }
    }

    #[test]
    fn admin_manages_any_course() {
        let admin = user("a1", Role::Admin);
        assert!(can_manage_course(&admin, None));
        assert!(can_manage_course(&admin, Some("t1")));
    }

    #[test]
    fn only_assigned_teacher_manages_course() {
        let teacher = user("t1", Role::Teacher);
        assert!(can_manage_course(&teacher, Some("t1")));
        assert!(!can_manage_course(&teacher, Some("t2")));
        assert!(!can_manage_course(&teacher, None));
    }

    #[test]
    fn student_never_manages_course() {
        let student = user("t1", Role::Student);
        assert!(!can_manage_course(&student, Some("t1")));
    }

    #[test]
    fn submission_visible_to_owner_and_course_staff() {
        let owner = user("s1", Role::Student);
        let other = user("s2", Role::Student);
        let teacher = user("t1", Role::Teacher);
        assert!(can_view_submission(&owner, "s1", Some("t1")));
        assert!(!can_view_submission(&other, "s1", Some("t1")));
        assert!(can_view_submission(&teacher, "s1", Some("t1")));
        assert!(!can_view_submission(&teacher, "s1", Some("t9")));
    }

    #[test]
    fn role_guard_returns_forbidden() {
        let student = user("s1", Role::Student);
        let err = require_admin(&student).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
        assert!(require_student(&student).is_ok());
    }
}
