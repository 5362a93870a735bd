use super::{
    event::{load_events, registrations_by_user, EventResponse},
    multipart::read_form,
};
use crate::{
    auth::ExtractAuth,
    error::{AppError, AppResult, StatusMessage},
    forms::{ensure_image, Fields},
    matching::{self, parse_tags},
    models::User,
    schema::*,
    storage::Storage,
    DbPool,
    RequestBody,
};
use axum::{
    extract::{Multipart, Path},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use diesel::prelude::*;
use diesel_async::{pg::AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    id: i32,
    email: String,
    display_name: String,
    photo_url: String,
    bio: Option<String>,
    socials: Option<String>,
    dob: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    interests: Option<String>,
    languages: Vec<String>,
    is_admin: bool,
    registered_events: Vec<i32>,
}

pub async fn user_response(storage: &Storage, user: User, registered_events: Vec<i32>) -> UserResponse {
    UserResponse {
        photo_url: storage.resolve_url(user.photo_path.as_deref()).await,
        id: user.id,
        email: user.email,
        display_name: user.display_name,
        bio: user.bio,
        socials: user.socials,
        dob: user.dob,
        phone: user.phone,
        address: user.address,
        interests: user.interests,
        languages: user.languages,
        is_admin: user.is_admin,
        registered_events,
    }
}

/// What other members may see about a user: no contact details, birthday or role.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    id: i32,
    display_name: String,
    photo_url: String,
    bio: Option<String>,
    socials: Option<String>,
    interests: Option<String>,
    languages: Vec<String>,
    event_count: usize,
}

pub async fn public_profile(storage: &Storage, user: User, event_count: usize) -> PublicProfile {
    PublicProfile {
        photo_url: storage.resolve_url(user.photo_path.as_deref()).await,
        id: user.id,
        display_name: user.display_name,
        bio: user.bio,
        socials: user.socials,
        interests: user.interests,
        languages: user.languages,
        event_count,
    }
}

pub async fn find_user(conn: &mut AsyncPgConnection, user_id: i32) -> AppResult<User> {
    users::table
        .find(user_id)
        .first::<User>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("user"))
}

pub async fn registered_event_ids(conn: &mut AsyncPgConnection, user_id: i32) -> AppResult<Vec<i32>> {
    Ok(event_attendees::table
        .filter(event_attendees::user_id.eq(user_id))
        .order(event_attendees::registered_at.asc())
        .select(event_attendees::event_id)
        .load::<i32>(conn)
        .await?)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    #[serde(flatten)]
    user: UserResponse,
    events: Vec<EventResponse>,
}

async fn me(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    ExtractAuth(claims): ExtractAuth,
) -> AppResult<Json<ProfileResponse>> {
    let conn = &mut pool.get().await?;
    let user = find_user(conn, claims.user_id).await?;
    let event_ids = registered_event_ids(conn, user.id).await?;
    let events = load_events(conn, &storage, Some(event_ids.as_slice())).await?;

    Ok(Json(ProfileResponse {
        user: user_response(&storage, user, event_ids).await,
        events,
    }))
}

async fn user_info(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Path(user_id): Path<i32>,
    ExtractAuth(_): ExtractAuth,
) -> AppResult<Json<PublicProfile>> {
    let conn = &mut pool.get().await?;
    let user = find_user(conn, user_id).await?;
    let event_count = registered_event_ids(conn, user.id).await?.len();
    Ok(Json(public_profile(&storage, user, event_count).await))
}

/// Merge update: only fields present in the form are written, and an empty
/// value clears an optional field.
#[derive(AsChangeset, Default)]
#[diesel(table_name = users)]
struct ProfileChanges {
    display_name: Option<String>,
    bio: Option<Option<String>>,
    socials: Option<Option<String>>,
    dob: Option<Option<String>>,
    phone: Option<Option<String>>,
    address: Option<Option<String>>,
    interests: Option<Option<String>>,
    languages: Option<Vec<String>>,
    photo_path: Option<Option<String>>,
}

impl ProfileChanges {
    fn from_fields(fields: &Fields) -> ProfileChanges {
        let optional = |name: &str| fields.contains(name).then(|| fields.optional(name));
        ProfileChanges {
            display_name: fields
                .contains("displayName")
                .then(|| fields.text("displayName").to_string())
                .filter(|n| !n.is_empty()),
            bio: optional("bio"),
            socials: optional("socials"),
            dob: optional("dob"),
            phone: optional("phone"),
            address: optional("address"),
            interests: optional("interests"),
            languages: fields
                .contains("languages")
                .then(|| parse_tags(fields.text("languages"))),
            photo_path: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.bio.is_none()
            && self.socials.is_none()
            && self.dob.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.interests.is_none()
            && self.languages.is_none()
            && self.photo_path.is_none()
    }
}

async fn update_me(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    ExtractAuth(claims): ExtractAuth,
    multipart: Multipart,
) -> AppResult<Json<StatusMessage>> {
    let form = read_form(multipart, "photo").await?;
    let mut changes = ProfileChanges::from_fields(&form.fields);
    if let Some(photo) = &form.file {
        ensure_image(&photo.bytes).map_err(AppError::bad_request)?;
    }

    let conn = &mut pool.get().await?;
    find_user(conn, claims.user_id).await?;

    if let Some(photo) = &form.file {
        let path = format!("profiles/{}", claims.user_id);
        storage.put_at(&path, &photo.bytes).await?;
        changes.photo_path = Some(Some(path));
    }

    if changes.is_empty() {
        return Err(AppError::from(StatusCode::BAD_REQUEST, "nothing to update"));
    }

    diesel::update(users::table.find(claims.user_id))
        .set(&changes)
        .execute(conn)
        .await?;

    tracing::info!(user_id = claims.user_id, "profile updated");
    Ok(StatusMessage::new("Profile updated successfully!"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardEntry {
    rank: usize,
    score: usize,
    #[serde(flatten)]
    user: PublicProfile,
}

async fn leaderboard(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
) -> AppResult<Json<Vec<LeaderboardEntry>>> {
    let conn = &mut pool.get().await?;
    let users = users::table
        .order(users::id.asc())
        .load::<User>(conn)
        .await?;
    let mut registrations = registrations_by_user(conn).await?;

    let entries = users
        .into_iter()
        .map(|user| {
            let event_count = registrations.remove(&user.id).map_or(0, |events| events.len());
            let language_count = user.languages.len();
            ((user, event_count), event_count, language_count)
        })
        .collect();

    let mut out = Vec::new();
    for (rank, ((user, event_count), score)) in matching::rank_by_activity(entries).into_iter().enumerate() {
        out.push(LeaderboardEntry {
            rank: rank + 1,
            score,
            user: public_profile(&storage, user, event_count).await,
        });
    }
    Ok(Json(out))
}

pub fn app() -> Router<RequestBody> {
    Router::new()
        .route("/", get(me).post(update_me))
        .route("/user/:user_id", get(user_info))
}

pub fn leaderboard_app() -> Router<RequestBody> {
    Router::new().route("/", get(leaderboard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_touches_present_fields() {
        let fields: Fields = [("bio", "hello"), ("phone", ""), ("languages", "rust, go")]
            .into_iter()
            .collect();
        let changes = ProfileChanges::from_fields(&fields);
        assert_eq!(changes.bio, Some(Some("hello".to_string())));
        assert_eq!(changes.phone, Some(None));
        assert_eq!(changes.address, None);
        assert_eq!(changes.display_name, None);
        assert_eq!(changes.languages, Some(vec!["rust".to_string(), "go".to_string()]));
        assert!(!changes.is_empty());
    }

    #[tokio::test]
    async fn public_profile_hides_contact_details() {
        let storage = Storage::new(std::env::temp_dir(), "http://localhost:8080", "/placeholder-image.png");
        let user = User {
            id: 3,
            email: "ada@club.house".to_string(),
            password_hash: "x".to_string(),
            display_name: "Ada".to_string(),
            photo_path: None,
            bio: Some("engines".to_string()),
            socials: None,
            dob: Some("1815-12-10".to_string()),
            phone: Some("555-0100".to_string()),
            address: Some("London".to_string()),
            interests: None,
            languages: vec!["rust".to_string()],
            is_admin: true,
            created_at: chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        };

        let json = serde_json::to_value(public_profile(&storage, user, 2).await).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["bio", "displayName", "eventCount", "id", "interests", "languages", "photoUrl", "socials"]
        );
        assert_eq!(json["photoUrl"], "/placeholder-image.png");
        assert_eq!(json["eventCount"], 2);
    }

    #[test]
    fn blank_display_name_is_ignored() {
        let fields: Fields = [("displayName", "   ")].into_iter().collect();
        assert!(ProfileChanges::from_fields(&fields).is_empty());
    }
}
