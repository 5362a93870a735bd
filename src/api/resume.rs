use crate::{
    auth::ExtractAuth,
    error::{AppError, AppResult, StatusMessage},
    models::Resume,
    resume::ResumeData,
    schema::*,
    DbPool,
    RequestBody,
};
use axum::{
    http::header,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use diesel::{prelude::*, upsert::excluded};
use diesel_async::{pg::AsyncPgConnection, RunQueryDsl};

async fn load_resume(conn: &mut AsyncPgConnection, user_id: i32) -> AppResult<ResumeData> {
    let stored = resumes::table
        .find(user_id)
        .first::<Resume>(conn)
        .await
        .optional()?;

    match stored {
        Some(resume) => Ok(serde_json::from_value(resume.data)?),
        None => Ok(ResumeData::default()),
    }
}

async fn get_resume(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(claims): ExtractAuth,
) -> AppResult<Json<ResumeData>> {
    let conn = &mut pool.get().await?;
    Ok(Json(load_resume(conn, claims.user_id).await?))
}

async fn save_resume(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(claims): ExtractAuth,
    Json(data): Json<ResumeData>,
) -> AppResult<Json<StatusMessage>> {
    #[derive(Insertable)]
    #[diesel(table_name = resumes)]
    struct NewResume {
        user_id: i32,
        data: serde_json::Value,
    }

    let data = data.normalized().map_err(AppError::bad_request)?;

    let conn = &mut pool.get().await?;
    diesel::insert_into(resumes::table)
        .values(NewResume {
            user_id: claims.user_id,
            data: serde_json::to_value(&data)?,
        })
        .on_conflict(resumes::user_id)
        .do_update()
        .set((
            resumes::data.eq(excluded(resumes::data)),
            resumes::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await?;

    tracing::info!(user_id = claims.user_id, "resume saved");
    Ok(StatusMessage::new("Resume saved successfully!"))
}

async fn export(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(claims): ExtractAuth,
) -> AppResult<impl IntoResponse> {
    let conn = &mut pool.get().await?;
    let data = load_resume(conn, claims.user_id).await?;
    let body = serde_json::to_string_pretty(&data)?;

    Ok((
        [
            (header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"resume.json\"".to_string(),
            ),
        ],
        body,
    ))
}

async fn preview(
    Extension(pool): Extension<DbPool>,
    ExtractAuth(claims): ExtractAuth,
) -> AppResult<impl IntoResponse> {
    let conn = &mut pool.get().await?;
    let data = load_resume(conn, claims.user_id).await?;
    Ok((
        [(header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.to_string())],
        data.render_text(),
    ))
}

pub fn app() -> Router<RequestBody> {
    Router::new()
        .route("/", get(get_resume).put(save_resume))
        .route("/export", get(export))
        .route("/preview", get(preview))
}
