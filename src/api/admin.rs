use super::{
    club::find_club,
    event::find_event,
    multipart::{read_form, Upload},
};
use crate::{
    auth::AdminOnly,
    error::{AppError, AppResult, StatusMessage},
    forms::{ensure_image, ClubForm, EventForm, FormError},
    models::{EventAttendee, Registration, User},
    schema::*,
    storage::Storage,
    DbPool,
    RequestBody,
};
use axum::{
    extract::{Multipart, Path},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use diesel_async::{pg::AsyncPgConnection, AsyncConnection, RunQueryDsl};
use serde::Serialize;
use std::sync::Arc;

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = clubs, treat_none_as_null = true)]
struct ClubRow {
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
}

// `None` socials are written as NULL so a cleared link really clears
#[derive(Insertable, AsChangeset)]
#[diesel(table_name = club_socials, treat_none_as_null = true)]
struct ClubSocialRow {
    instagram: Option<String>,
    linkedin: Option<String>,
    twitter: Option<String>,
}

fn split_club_form(form: ClubForm) -> (ClubRow, ClubSocialRow) {
    (
        ClubRow {
            name: form.name,
            description: form.description,
            category: form.category.to_string(),
            lead_name: form.lead_name,
            lead_email: form.lead_email,
            lead_phone: form.lead_phone,
            meeting_schedule: form.meeting_schedule,
            requirements: form.requirements,
            achievements: form.achievements,
            member_count: form.member_count,
            established_date: form.established_date,
        },
        ClubSocialRow {
            instagram: form.instagram,
            linkedin: form.linkedin,
            twitter: form.twitter,
        },
    )
}

async fn store_image(storage: &Storage, prefix: &str, upload: Option<&Upload>) -> AppResult<Option<String>> {
    let Some(upload) = upload else {
        return Ok(None);
    };
    ensure_image(&upload.bytes).map_err(AppError::bad_request)?;
    Ok(Some(storage.put(prefix, &upload.file_name, &upload.bytes).await?))
}

/// Drops a freshly stored object when the write that should point at it failed.
async fn keep_if_written<T>(
    storage: &Storage,
    stored: Option<&str>,
    written: QueryResult<T>,
) -> AppResult<T> {
    if written.is_err() {
        storage.delete_quietly(stored).await;
    }
    Ok(written?)
}

async fn insert_club(
    conn: &mut AsyncPgConnection,
    row: ClubRow,
    socials: ClubSocialRow,
    logo_path: Option<String>,
) -> QueryResult<i32> {
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        Box::pin(async move {
            let club_id = diesel::insert_into(clubs::table)
                .values((row, clubs::logo_path.eq(logo_path)))
                .returning(clubs::id)
                .get_result::<i32>(conn)
                .await?;

            diesel::insert_into(club_socials::table)
                .values((club_socials::club_id.eq(club_id), socials))
                .execute(conn)
                .await?;

            Ok(club_id)
        })
    })
    .await
}

/// Rewrites a club and its socials. The logo is only touched when a new one was stored.
async fn save_club(
    conn: &mut AsyncPgConnection,
    club_id: i32,
    row: ClubRow,
    socials: ClubSocialRow,
    new_logo: Option<String>,
) -> QueryResult<()> {
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        Box::pin(async move {
            let target = clubs::table.find(club_id);
            match &new_logo {
                Some(path) => {
                    diesel::update(target)
                        .set((&row, clubs::logo_path.eq(path)))
                        .execute(conn)
                        .await?
                }
                None => diesel::update(target).set(&row).execute(conn).await?,
            };

            diesel::update(club_socials::table)
                .filter(club_socials::club_id.eq(club_id))
                .set(&socials)
                .execute(conn)
                .await?;

            Ok(())
        })
    })
    .await
}

async fn create_club(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    AdminOnly(_): AdminOnly,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<StatusMessage>)> {
    let form = read_form(multipart, "logo").await?;
    let club = ClubForm::parse(&form.fields).map_err(AppError::bad_request)?;
    if let Some(logo) = &form.file {
        ensure_image(&logo.bytes).map_err(AppError::bad_request)?;
    }

    let conn = &mut pool.get().await?;

    let logo_path = store_image(&storage, "club-logos", form.file.as_ref()).await?;
    let (row, socials) = split_club_form(club);
    let written = insert_club(conn, row, socials, logo_path.clone()).await;
    let club_id = keep_if_written(&storage, logo_path.as_deref(), written).await?;

    tracing::info!(club_id, "club created");
    Ok((StatusCode::CREATED, StatusMessage::new("Club added successfully!")))
}

async fn update_club(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Path(club_id): Path<i32>,
    AdminOnly(_): AdminOnly,
    multipart: Multipart,
) -> AppResult<Json<StatusMessage>> {
    let form = read_form(multipart, "logo").await?;
    let club = ClubForm::parse(&form.fields).map_err(AppError::bad_request)?;
    if let Some(logo) = &form.file {
        ensure_image(&logo.bytes).map_err(AppError::bad_request)?;
    }

    let conn = &mut pool.get().await?;
    let existing = find_club(conn, club_id).await?;

    // the old logo only goes away once the club points at its replacement
    let new_logo = store_image(&storage, "club-logos", form.file.as_ref()).await?;
    let (row, socials) = split_club_form(club);
    let written = save_club(conn, club_id, row, socials, new_logo.clone()).await;
    keep_if_written(&storage, new_logo.as_deref(), written).await?;
    if new_logo.is_some() {
        storage.delete_quietly(existing.logo_path.as_deref()).await;
    }

    tracing::info!(club_id, "club updated");
    Ok(StatusMessage::new("Club updated successfully!"))
}

async fn delete_club(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Path(club_id): Path<i32>,
    AdminOnly(_): AdminOnly,
) -> AppResult<Json<StatusMessage>> {
    let conn = &mut pool.get().await?;
    let existing = find_club(conn, club_id).await?;

    // socials and chat rows go with the club through ON DELETE CASCADE
    diesel::delete(clubs::table.find(club_id))
        .execute(conn)
        .await?;
    storage.delete_quietly(existing.logo_path.as_deref()).await;
    storage.delete_dir_quietly(&format!("clubs/{club_id}")).await;

    tracing::info!(club_id, "club deleted");
    Ok(StatusMessage::new("Club deleted successfully!"))
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = events)]
struct EventRow {
    title: String,
    description: String,
    rules: String,
    venue: String,
    event_date: NaiveDate,
    event_time: NaiveTime,
}

impl From<EventForm> for EventRow {
    fn from(form: EventForm) -> Self {
        EventRow {
            title: form.title,
            description: form.description,
            rules: form.rules,
            venue: form.venue,
            event_date: form.date,
            event_time: form.time,
        }
    }
}

async fn create_event(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    AdminOnly(_): AdminOnly,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<StatusMessage>)> {
    let form = read_form(multipart, "image").await?;
    let event = EventForm::parse(&form.fields).map_err(AppError::bad_request)?;
    let Some(image) = &form.file else {
        return Err(AppError::bad_request(FormError::ImageRequired));
    };
    ensure_image(&image.bytes).map_err(AppError::bad_request)?;

    let conn = &mut pool.get().await?;
    let image_path = store_image(&storage, "event-images", Some(image)).await?;

    let written = diesel::insert_into(events::table)
        .values((EventRow::from(event), events::image_path.eq(&image_path)))
        .returning(events::id)
        .get_result::<i32>(conn)
        .await;
    let event_id = keep_if_written(&storage, image_path.as_deref(), written).await?;

    tracing::info!(event_id, "event created");
    Ok((StatusCode::CREATED, StatusMessage::new("Event added successfully!")))
}

async fn update_event(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Path(event_id): Path<i32>,
    AdminOnly(_): AdminOnly,
    multipart: Multipart,
) -> AppResult<Json<StatusMessage>> {
    let form = read_form(multipart, "image").await?;
    let event = EventForm::parse(&form.fields).map_err(AppError::bad_request)?;
    if let Some(image) = &form.file {
        ensure_image(&image.bytes).map_err(AppError::bad_request)?;
    }

    let conn = &mut pool.get().await?;
    let existing = find_event(conn, event_id).await?;

    let new_image = store_image(&storage, "event-images", form.file.as_ref()).await?;
    let row = EventRow::from(event);
    let target = events::table.find(event_id);
    let written = match &new_image {
        Some(path) => {
            diesel::update(target)
                .set((&row, events::image_path.eq(path)))
                .execute(conn)
                .await
        }
        None => diesel::update(target).set(&row).execute(conn).await,
    };
    keep_if_written(&storage, new_image.as_deref(), written).await?;
    if new_image.is_some() {
        storage.delete_quietly(existing.image_path.as_deref()).await;
    }

    tracing::info!(event_id, "event updated");
    Ok(StatusMessage::new("Event updated successfully!"))
}

async fn delete_event(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Path(event_id): Path<i32>,
    AdminOnly(_): AdminOnly,
) -> AppResult<Json<StatusMessage>> {
    let conn = &mut pool.get().await?;
    let existing = find_event(conn, event_id).await?;

    diesel::delete(events::table.find(event_id))
        .execute(conn)
        .await?;
    storage.delete_quietly(existing.image_path.as_deref()).await;

    tracing::info!(event_id, "event deleted");
    Ok(StatusMessage::new("Event deleted."))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationResponse {
    id: i32,
    name: String,
    email: String,
    contact: String,
    timestamp: NaiveDateTime,
}

async fn event_registrations(
    Extension(pool): Extension<DbPool>,
    Path(event_id): Path<i32>,
    AdminOnly(_): AdminOnly,
) -> AppResult<Json<Vec<RegistrationResponse>>> {
    let conn = &mut pool.get().await?;
    find_event(conn, event_id).await?;

    let rows = registrations::table
        .filter(registrations::event_id.eq(event_id))
        .order(registrations::created_at.asc())
        .load::<Registration>(conn)
        .await?;

    Ok(Json(
        rows.into_iter()
            .map(|r| RegistrationResponse {
                id: r.id,
                name: r.name,
                email: r.email,
                contact: r.contact,
                timestamp: r.created_at,
            })
            .collect(),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AttendeeResponse {
    user_id: i32,
    display_name: String,
    email: String,
    registered_at: NaiveDateTime,
}

async fn event_attendees(
    Extension(pool): Extension<DbPool>,
    Path(event_id): Path<i32>,
    AdminOnly(_): AdminOnly,
) -> AppResult<Json<Vec<AttendeeResponse>>> {
    let conn = &mut pool.get().await?;
    find_event(conn, event_id).await?;

    let rows = event_attendees::table
        .inner_join(users::table)
        .filter(event_attendees::event_id.eq(event_id))
        .order(event_attendees::registered_at.asc())
        .load::<(EventAttendee, User)>(conn)
        .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(attendee, user)| AttendeeResponse {
                user_id: attendee.user_id,
                display_name: user.display_name,
                email: user.email,
                registered_at: attendee.registered_at,
            })
            .collect(),
    ))
}

pub fn app() -> Router<RequestBody> {
    Router::new()
        .route("/club", post(create_club))
        .route("/club/:club_id", post(update_club).delete(delete_club))
        .route("/event", post(create_event))
        .route("/event/:event_id", post(update_event).delete(delete_event))
        .route("/event/:event_id/registrations", get(event_registrations))
        .route("/event/:event_id/attendees", get(event_attendees))
}
