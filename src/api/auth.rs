use super::profile::{registered_event_ids, user_response, UserResponse};
use crate::{
    auth::{self, ExtractAuth, SESSION_LENGTH},
    config::Config,
    error::{AppError, AppResult},
    forms::is_valid_email,
    models::User,
    schema::*,
    storage::Storage,
    DbPool,
    RequestBody,
};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    email: String,
    password: String,
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizedResponse {
    token: String,
    user: UserResponse,
}

impl AuthorizedResponse {
    async fn new(storage: &Storage, user: User, registered_events: Vec<i32>) -> anyhow::Result<AuthorizedResponse> {
        Ok(AuthorizedResponse {
            token: auth::generate_jwt(user.id, user.is_admin, SESSION_LENGTH)?,
            user: user_response(storage, user, registered_events).await,
        })
    }
}

/// The part of an address before the `@`, used when no display name is given.
fn default_display_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

async fn signup(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Extension(config): Extension<Arc<Config>>,
    Json(req): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<AuthorizedResponse>)> {
    #[derive(Insertable)]
    #[diesel(table_name = users)]
    struct NewUser {
        email: String,
        password_hash: String,
        display_name: String,
        is_admin: bool,
    }

    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::from(StatusCode::BAD_REQUEST, "invalid email"));
    }
    if req.password.is_empty() {
        return Err(AppError::from(StatusCode::BAD_REQUEST, "password is required"));
    }
    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(|| default_display_name(&email), str::to_string);

    let conn = &mut pool.get().await?;

    let new_user = diesel::insert_into(users::table)
        .values(NewUser {
            is_admin: config.is_admin_email(&email),
            email,
            password_hash: auth::hash_password(req.password)?,
            display_name,
        })
        .on_conflict(users::email)
        .do_nothing()
        .get_result::<User>(conn)
        .await
        .optional()?;

    let Some(new_user) = new_user else {
        return Err(AppError::from(
            StatusCode::CONFLICT,
            "email is already registered",
        ));
    };

    tracing::info!(user_id = new_user.id, admin = new_user.is_admin, "user signed up");
    Ok((
        StatusCode::CREATED,
        Json(AuthorizedResponse::new(&storage, new_user, Vec::new()).await?),
    ))
}

async fn login(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthorizedResponse>> {
    let conn = &mut pool.get().await?;

    if let Some(user) = users::table
        .filter(users::email.eq(req.email.trim().to_lowercase()))
        .first::<User>(conn)
        .await
        .optional()?
    {
        if auth::verify_password(req.password, &user.password_hash)? {
            let events = registered_event_ids(conn, user.id).await?;
            return Ok(Json(AuthorizedResponse::new(&storage, user, events).await?));
        }
    }
    Err(AppError::from(
        StatusCode::UNAUTHORIZED,
        "invalid email or password",
    ))
}

async fn session(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    ExtractAuth(claims): ExtractAuth,
) -> AppResult<Json<UserResponse>> {
    let conn = &mut pool.get().await?;
    let user = users::table
        .find(claims.user_id)
        .first::<User>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::from(StatusCode::UNAUTHORIZED, "account no longer exists"))?;
    let events = registered_event_ids(conn, user.id).await?;
    Ok(Json(user_response(&storage, user, events).await))
}

pub fn app() -> Router<RequestBody> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/session", get(session))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_local_part() {
        assert_eq!(default_display_name("ada@club.house"), "ada");
        assert_eq!(default_display_name("nobody"), "nobody");
    }
}
