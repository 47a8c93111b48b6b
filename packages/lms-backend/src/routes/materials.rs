use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::operations::analytics::{self as progress_ops, Progress};
use crate::db::operations::content::{self, Material, MaterialUpdate, NewMaterial};
use crate::models::{ActivityType, MaterialType};
use crate::response::{created, message, ok, AppError};
use crate::services::access::ensure_course_manager;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/:id",
        get(view_material).put(update_material).delete(delete_material),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMaterialRequest {
    title: String,
    material_type: String,
    content: Option<String>,
    file_url: Option<String>,
    external_link: Option<String>,
    order: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateMaterialRequest {
    title: Option<String>,
    material_type: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    content: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    file_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    external_link: Option<Option<String>>,
    order: Option<i32>,
}

/// Absent stays `None`; an explicit `null` becomes `Some(None)` and clears the column.
fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// The value a field will hold after applying `change`.
fn after_change<'a>(
    change: &'a Option<Option<String>>,
    current: &'a Option<String>,
) -> Option<&'a str> {
    match change {
        Some(value) => value.as_deref(),
        None => current.as_deref(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MaterialViewResponse {
    material: Material,
    course_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<Progress>,
}

fn present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Each material type needs the field it is rendered from.
pub fn validate_material(
    material_type: MaterialType,
    content: Option<&str>,
    file_url: Option<&str>,
    external_link: Option<&str>,
) -> Result<(), &'static str> {
    match material_type {
        MaterialType::Text if !present(content) => Err("Text materials require content"),
        MaterialType::Link if !present(external_link) => Err("Link materials require externalLink"),
        MaterialType::Pdf | MaterialType::Video if !present(file_url) && !present(external_link) => {
            Err("PDF and video materials require fileUrl or externalLink")
        }
        _ => Ok(()),
    }
}

fn parse_material_type(raw: &str) -> Result<MaterialType, AppError> {
    MaterialType::parse(raw)
        .ok_or_else(|| AppError::validation("materialType must be PDF, VIDEO, TEXT or LINK"))
}

fn validate_title(title: &str) -> Result<(), AppError> {
    let len = title.trim().chars().count();
    if len == 0 || len > 200 {
        return Err(AppError::validation("Title must be 1-200 characters"));
    }
    Ok(())
}

pub async fn create_for_course(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<String>,
    Json(payload): Json<CreateMaterialRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_title(&payload.title)?;
    let material_type = parse_material_type(&payload.material_type)?;
    validate_material(
        material_type,
        payload.content.as_deref(),
        payload.file_url.as_deref(),
        payload.external_link.as_deref(),
    )
    .map_err(AppError::validation)?;

    let proxy = state.require_db()?;
    let teacher_id = content::course_teacher_id(&proxy, &course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course not found"))?;
    ensure_course_manager(&user, teacher_id.as_deref())?;

    let material = content::create_material(
        &proxy,
        &NewMaterial {
            course_id,
            title: payload.title.trim().to_string(),
            material_type,
            content: payload.content,
            file_url: payload.file_url,
            external_link: payload.external_link,
            order: payload.order.unwrap_or(0),
            uploaded_by: user.id.clone(),
        },
    )
    .await?;
    tracing::info!(material_id = %material.id, course_id = %material.course_id, "material created");
    Ok(created(material))
}

async fn view_material(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(material_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let found = content::get_material(&proxy, &material_id)
        .await?
        .ok_or_else(|| AppError::not_found("Material not found"))?;
    let course_id = found.material.course_id.clone();

    let progress = if user.is_student() {
        if !content::is_enrolled(&proxy, &course_id, &user.id).await? {
            return Err(AppError::forbidden("Enroll in the course to view its materials"));
        }
        let progress =
            progress_ops::record_material_view(&proxy, &user.id, &material_id, &course_id).await?;
        progress_ops::log_activity_best_effort(
            &proxy,
            &user.id,
            Some(&course_id),
            ActivityType::MaterialView,
            &format!("Viewed: {}", found.material.title),
        )
        .await;
        Some(progress)
    } else {
        None
    };

    Ok(ok(MaterialViewResponse {
        material: found.material,
        course_title: found.course_title,
        progress,
    }))
}

async fn update_material(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(material_id): Path<String>,
    Json(payload): Json<UpdateMaterialRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(title) = &payload.title {
        validate_title(title)?;
    }
    let material_type = payload
        .material_type
        .as_deref()
        .map(parse_material_type)
        .transpose()?;

    let proxy = state.require_db()?;
    let existing = content::get_material(&proxy, &material_id)
        .await?
        .ok_or_else(|| AppError::not_found("Material not found"))?;
    ensure_course_manager(&user, existing.course_teacher_id.as_deref())?;

    let current = &existing.material;
    validate_material(
        material_type.unwrap_or(current.material_type),
        after_change(&payload.content, &current.content),
        after_change(&payload.file_url, &current.file_url),
        after_change(&payload.external_link, &current.external_link),
    )
    .map_err(AppError::validation)?;

    let updated = content::update_material(
        &proxy,
        &material_id,
        &MaterialUpdate {
            title: payload.title.map(|t| t.trim().to_string()),
            material_type,
            content: payload.content,
            file_url: payload.file_url,
            external_link: payload.external_link,
            order: payload.order,
        },
    )
    .await?
    .ok_or_else(|| AppError::not_found("Material not found"))?;
    Ok(ok(updated))
}

async fn delete_material(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(material_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let existing = content::get_material(&proxy, &material_id)
        .await?
        .ok_or_else(|| AppError::not_found("Material not found"))?;
    ensure_course_manager(&user, existing.course_teacher_id.as_deref())?;

    if !content::delete_material(&proxy, &material_id, &existing.material.course_id).await? {
        return Err(AppError::not_found("Material not found"));
    }
    tracing::info!(material_id = %material_id, deleted_by = %user.id, "material deleted");
    Ok(message("Material deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_needs_content() {
        assert!(validate_material(MaterialType::Text, None, None, None).is_err());
        assert!(validate_material(MaterialType::Text, Some("  "), None, None).is_err());
        assert!(validate_material(MaterialType::Text, Some("body"), None, None).is_ok());
    }

    #[test]
    fn link_needs_external_link() {
        assert!(validate_material(MaterialType::Link, None, Some("/f.pdf"), None).is_err());
        assert!(validate_material(MaterialType::Link, None, None, Some("https://x.dev")).is_ok());
    }

    #[test]
    fn explicit_null_clears_but_missing_field_keeps() {
        let body: UpdateMaterialRequest =
            serde_json::from_str(r#"{"fileUrl": null, "content": "new"}"#).unwrap();
        assert_eq!(body.file_url, Some(None));
        assert_eq!(body.content, Some(Some("new".to_string())));
        assert_eq!(body.external_link, None);

        let current = Some("https://old.example".to_string());
        assert_eq!(after_change(&body.external_link, &current), Some("https://old.example"));
        assert_eq!(after_change(&body.file_url, &Some("/a.pdf".to_string())), None);
    }

    #[test]
    fn clearing_the_only_source_fails_validation() {
        let body: UpdateMaterialRequest =
            serde_json::from_str(r#"{"externalLink": null}"#).unwrap();
        let link = Some("https://x.dev".to_string());
        let external_link = after_change(&body.external_link, &link);
        assert!(validate_material(MaterialType::Link, None, None, external_link).is_err());
    }

    #[test]
    fn pdf_and_video_accept_either_source() {
        assert!(validate_material(MaterialType::Pdf, None, None, None).is_err());
        assert!(validate_material(MaterialType::Pdf, None, Some("/a.pdf"), None).is_ok());
        assert!(validate_material(MaterialType::Video, None, None, Some("https://v")).is_ok());
    }
}
