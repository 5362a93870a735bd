use crate::{
    error::{AppError, AppResult},
    forms::ClubCategory,
    models::{Club, ClubSocial},
    schema::*,
    storage::Storage,
    DbPool,
    RequestBody,
};
use axum::{extract::Path, routing::get, Extension, Json, Router};
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel_async::{pg::AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClubSocialResponse {
    instagram: Option<String>,
    linkedin: Option<String>,
    twitter: Option<String>,
}

impl From<Option<ClubSocial>> for ClubSocialResponse {
    fn from(socials: Option<ClubSocial>) -> Self {
        socials.map_or_else(Self::default, |s| Self {
            instagram: s.instagram,
            linkedin: s.linkedin,
            twitter: s.twitter,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubResponse {
    id: i32,
    name: String,
    description: String,
    category: String,
    lead_name: String,
    lead_email: String,
    lead_phone: String,
    meeting_schedule: String,
    requirements: String,
    achievements: String,
    member_count: i32,
    established_date: Option<NaiveDate>,
    logo_path: Option<String>,
    image_url: String,
    social_media: ClubSocialResponse,
}

pub async fn club_response(
    storage: &Storage,
    (club, socials): (Club, Option<ClubSocial>),
) -> ClubResponse {
    let image_url = storage.resolve_url(club.logo_path.as_deref()).await;
    ClubResponse {
        id: club.id,
        name: club.name,
        description: club.description,
        category: club.category,
        lead_name: club.lead_name,
        lead_email: club.lead_email,
        lead_phone: club.lead_phone,
        meeting_schedule: club.meeting_schedule,
        requirements: club.requirements,
        achievements: club.achievements,
        member_count: club.member_count,
        established_date: club.established_date,
        logo_path: club.logo_path,
        image_url,
        social_media: socials.into(),
    }
}

pub async fn load_clubs(
    conn: &mut AsyncPgConnection,
    storage: &Storage,
) -> AppResult<Vec<ClubResponse>> {
    let rows = clubs::table
        .left_join(club_socials::table)
        .order(clubs::id.asc())
        .load::<(Club, Option<ClubSocial>)>(conn)
        .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(club_response(storage, row).await);
    }
    Ok(out)
}

pub async fn find_club(conn: &mut AsyncPgConnection, club_id: i32) -> AppResult<Club> {
    clubs::table
        .find(club_id)
        .first::<Club>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("club"))
}

async fn list(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
) -> AppResult<Json<Vec<ClubResponse>>> {
    let conn = &mut pool.get().await?;
    Ok(Json(load_clubs(conn, &storage).await?))
}

async fn info(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Path(club_id): Path<i32>,
) -> AppResult<Json<ClubResponse>> {
    let conn = &mut pool.get().await?;

    let club = clubs::table
        .left_join(club_socials::table)
        .filter(clubs::id.eq(club_id))
        .first::<(Club, Option<ClubSocial>)>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("club"))?;

    Ok(Json(club_response(&storage, club).await))
}

async fn list_categories() -> Json<Vec<&'static str>> {
    Json(ClubCategory::ALL.iter().map(ClubCategory::as_str).collect())
}

pub fn app() -> Router<RequestBody> {
    Router::new()
        .route("/list", get(list))
        .route("/info/:club_id", get(info))
        .route("/categories/list", get(list_categories))
}
