use crate::{
    auth::ExtractAuth,
    countdown::{self, TimeLeft},
    error::{AppError, AppResult, StatusMessage},
    forms::GuestRegistration,
    models::Event,
    schema::*,
    storage::Storage,
    DbPool,
    RequestBody,
};
use axum::{extract::Path, http::StatusCode, routing::{get, post}, Extension, Json, Router};
use chrono::{NaiveDate, NaiveTime, Utc};
use diesel::{dsl::count_star, prelude::*};
use diesel_async::{pg::AsyncPgConnection, RunQueryDsl};
use itertools::Itertools;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    id: i32,
    title: String,
    description: String,
    rules: String,
    venue: String,
    date: NaiveDate,
    timing: NaiveTime,
    image_path: Option<String>,
    image_url: String,
    registered_count: i64,
    countdown: TimeLeft,
    countdown_label: String,
}

pub async fn event_response(storage: &Storage, event: Event, registered_count: i64) -> EventResponse {
    let image_url = storage.resolve_url(event.image_path.as_deref()).await;
    let countdown = countdown::time_left(event.event_date, event.event_time, Utc::now().naive_utc());
    EventResponse {
        id: event.id,
        title: event.title,
        description: event.description,
        rules: event.rules,
        venue: event.venue,
        date: event.event_date,
        timing: event.event_time,
        image_path: event.image_path,
        image_url,
        registered_count,
        countdown_label: countdown.to_string(),
        countdown,
    }
}

/// Events in calendar order, each with its registration count.
pub async fn load_events(
    conn: &mut AsyncPgConnection,
    storage: &Storage,
    only: Option<&[i32]>,
) -> AppResult<Vec<EventResponse>> {
    let mut query = events::table
        .order((events::event_date.asc(), events::event_time.asc(), events::id.asc()))
        .into_boxed();
    if let Some(ids) = only {
        query = query.filter(events::id.eq_any(ids.to_vec()));
    }
    let events = query.load::<Event>(conn).await?;

    let counts: HashMap<i32, i64> = event_attendees::table
        .group_by(event_attendees::event_id)
        .select((event_attendees::event_id, count_star()))
        .load::<(i32, i64)>(conn)
        .await?
        .into_iter()
        .collect();

    let mut out = Vec::with_capacity(events.len());
    for event in events {
        let count = counts.get(&event.id).copied().unwrap_or(0);
        out.push(event_response(storage, event, count).await);
    }
    Ok(out)
}

pub async fn find_event(conn: &mut AsyncPgConnection, event_id: i32) -> AppResult<Event> {
    events::table
        .find(event_id)
        .first::<Event>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("event"))
}

/// Event ids each user registered for, keyed by user.
pub async fn registrations_by_user(conn: &mut AsyncPgConnection) -> AppResult<HashMap<i32, Vec<i32>>> {
    Ok(event_attendees::table
        .select((event_attendees::user_id, event_attendees::event_id))
        .order(event_attendees::registered_at.asc())
        .load::<(i32, i32)>(conn)
        .await?
        .into_iter()
        .into_group_map())
}

async fn list(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
) -> AppResult<Json<Vec<EventResponse>>> {
    let conn = &mut pool.get().await?;
    Ok(Json(load_events(conn, &storage, None).await?))
}

async fn info(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Path(event_id): Path<i32>,
) -> AppResult<Json<EventResponse>> {
    let conn = &mut pool.get().await?;
    let mut events = load_events(conn, &storage, Some(&[event_id][..])).await?;
    events
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::not_found("event"))
}

async fn register(
    Extension(pool): Extension<DbPool>,
    Path(event_id): Path<i32>,
    ExtractAuth(claims): ExtractAuth,
) -> AppResult<Json<StatusMessage>> {
    #[derive(Insertable)]
    #[diesel(table_name = event_attendees)]
    struct NewAttendee {
        event_id: i32,
        user_id: i32,
    }

    let conn = &mut pool.get().await?;
    find_event(conn, event_id).await?;

    // the unique (event_id, user_id) pair makes this a set union
    let inserted = diesel::insert_into(event_attendees::table)
        .values(NewAttendee {
            event_id,
            user_id: claims.user_id,
        })
        .on_conflict((event_attendees::event_id, event_attendees::user_id))
        .do_nothing()
        .execute(conn)
        .await?;

    if inserted == 0 {
        Ok(StatusMessage::new("You are already registered for this event."))
    } else {
        tracing::info!(event_id, user_id = claims.user_id, "registered for event");
        Ok(StatusMessage::new("Registration successful!"))
    }
}

async fn guest_registration(
    Extension(pool): Extension<DbPool>,
    Path(event_id): Path<i32>,
    Json(req): Json<GuestRegistration>,
) -> AppResult<(StatusCode, Json<StatusMessage>)> {
    #[derive(Insertable)]
    #[diesel(table_name = registrations)]
    struct NewRegistration {
        event_id: i32,
        name: String,
        email: String,
        contact: String,
    }

    req.validate().map_err(AppError::bad_request)?;

    let conn = &mut pool.get().await?;
    find_event(conn, event_id).await?;

    diesel::insert_into(registrations::table)
        .values(NewRegistration {
            event_id,
            name: req.name.trim().to_string(),
            email: req.email.trim().to_string(),
            contact: req.contact.trim().to_string(),
        })
        .execute(conn)
        .await?;

    Ok((
        StatusCode::CREATED,
        StatusMessage::new("Registration successful! Thank you for registering."),
    ))
}

pub fn app() -> Router<RequestBody> {
    Router::new()
        .route("/list", get(list))
        .route("/info/:event_id", get(info))
        .route("/register/:event_id", post(register))
        .route("/guest/:event_id", post(guest_registration))
}
