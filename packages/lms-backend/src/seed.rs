use chrono::{Duration, Utc};

use crate::auth::{hash_password, AuthError};
use crate::db::operations::assessments::{self, NewAssignment};
use crate::db::operations::content::{self, NewCourse, NewMaterial};
use crate::db::operations::user::{self, NewUser, User};
use crate::db::DatabaseProxy;
use crate::models::{AssignmentStatus, MaterialType, Role};

const DEMO_PASSWORD: &str = "Password123";

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hash(#[from] AuthError),
}

struct DemoUser {
    email: &'static str,
    username: &'static str,
    role: Role,
    first_name: &'static str,
    last_name: &'static str,
}

const DEMO_TEACHER: DemoUser = DemoUser {
    email: "teacher@lms.local",
    username: "demo_teacher",
    role: Role::Teacher,
    first_name: "Grace",
    last_name: "Hopper",
};

const DEMO_STUDENTS: &[DemoUser] = &[
    DemoUser {
        email: "student1@lms.local",
        username: "demo_student1",
        role: Role::Student,
        first_name: "Ada",
        last_name: "Lovelace",
    },
    DemoUser {
        email: "student2@lms.local",
        username: "demo_student2",
        role: Role::Student,
        first_name: "Alan",
        last_name: "Turing",
    },
];

const DEMO_MATERIALS: &[(&str, MaterialType, &str)] = &[
    (
        "Welcome to the course",
        MaterialType::Text,
        "This course introduces variables, control flow and functions.",
    ),
    (
        "Control flow notes",
        MaterialType::Text,
        "Branches pick one path; loops repeat a block until a condition fails.",
    ),
    (
        "Further reading",
        MaterialType::Link,
        "https://doc.rust-lang.org/book/",
    ),
];

/// Creates the administrator named by `ADMIN_EMAIL`/`ADMIN_USERNAME`/`ADMIN_PASSWORD`
/// unless an account with that email or username already exists.
pub async fn bootstrap_admin(proxy: &DatabaseProxy) -> Result<(), SeedError> {
    let (Ok(email), Ok(password)) = (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD"))
    else {
        tracing::debug!("ADMIN_EMAIL/ADMIN_PASSWORD not set, skipping admin bootstrap");
        return Ok(());
    };
    let username = std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());

    if user::email_or_username_taken(proxy, &email, &username).await? {
        tracing::debug!(%email, "admin account already exists");
        return Ok(());
    }

    let password_hash = hash_password(&password)?;
    let admin = user::create_user_with_profile(
        proxy,
        NewUser {
            email: &email,
            username: &username,
            password_hash: &password_hash,
            role: Role::Admin,
            first_name: "System",
            last_name: "Administrator",
        },
    )
    .await?;
    tracing::info!(user_id = %admin.id, %email, "bootstrapped admin account");
    Ok(())
}

async fn create_demo_user(
    proxy: &DatabaseProxy,
    demo: &DemoUser,
    password_hash: &str,
) -> Result<User, SeedError> {
    Ok(user::create_user_with_profile(
        proxy,
        NewUser {
            email: demo.email,
            username: demo.username,
            password_hash,
            role: demo.role,
            first_name: demo.first_name,
            last_name: demo.last_name,
        },
    )
    .await?)
}

/// Demo teacher, two enrolled students, one course with materials and a published assignment.
/// Does nothing once the demo teacher exists.
pub async fn seed_sample_data(proxy: &DatabaseProxy) -> Result<(), SeedError> {
    if user::find_user_for_login(proxy, DEMO_TEACHER.email).await?.is_some() {
        tracing::debug!("sample data already present");
        return Ok(());
    }

    let password_hash = hash_password(DEMO_PASSWORD)?;
    let teacher = create_demo_user(proxy, &DEMO_TEACHER, &password_hash).await?;

    let mut students = Vec::with_capacity(DEMO_STUDENTS.len());
    for demo in DEMO_STUDENTS {
        students.push(create_demo_user(proxy, demo, &password_hash).await?);
    }

    let subject = content::create_subject(
        proxy,
        "Computer Science",
        "CS-DEMO",
        "Programming and computing fundamentals",
        &teacher.id,
    )
    .await?;

    let course_id = content::create_course(
        proxy,
        &NewCourse {
            title: "Introduction to Programming".to_string(),
            subject_id: subject.id.clone(),
            description: "First steps in writing programs.".to_string(),
            teacher_id: Some(teacher.id.clone()),
            thumbnail_url: None,
            is_active: true,
        },
    )
    .await?;

    for (order, (title, material_type, body)) in DEMO_MATERIALS.iter().enumerate() {
        let (text, link) = match material_type {
            MaterialType::Link => (None, Some(body.to_string())),
            _ => (Some(body.to_string()), None),
        };
        content::create_material(
            proxy,
            &NewMaterial {
                course_id: course_id.clone(),
                title: title.to_string(),
                material_type: *material_type,
                content: text,
                file_url: None,
                external_link: link,
                order: order as i32 + 1,
                uploaded_by: teacher.id.clone(),
            },
        )
        .await?;
    }

    for student in &students {
        content::enroll_student(proxy, &course_id, &student.id).await?;
    }

    assessments::create_assignment(
        proxy,
        &NewAssignment {
            course_id: course_id.clone(),
            title: "Write your first program".to_string(),
            description: "Write a program that prints a greeting and explain each line."
                .to_string(),
            instructions: "Submit the source code and a short explanation.".to_string(),
            max_score: 100,
            due_date: (Utc::now() + Duration::days(7)).naive_utc(),
            status: AssignmentStatus::Published,
            attachment_url: None,
            created_by: teacher.id.clone(),
        },
    )
    .await?;

    tracing::info!(
        teacher = DEMO_TEACHER.email,
        students = students.len(),
        %course_id,
        "seeded sample data"
    );
    Ok(())
}
