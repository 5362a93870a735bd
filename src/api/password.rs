use crate::{
    auth,
    config::Config,
    email::Mailer,
    error::{AppError, AppResult, StatusMessage},
    models::User,
    schema::*,
    DbPool,
    RequestBody,
};
use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use diesel::{update, ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::RunQueryDsl;
use lettre::{message::Mailbox, Address, Message};
use nanoid::nanoid;
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

/// Outstanding reset links: link id to (issued at, user id).
#[derive(Default)]
struct Resets(HashMap<String, (Instant, i32)>);

impl Resets {
    /// Looks up a live link, dropping it when it has expired.
    fn lookup(&mut self, uid: &str, now: Instant) -> AppResult<i32> {
        let Some(&(issued, user_id)) = self.0.get(uid) else {
            return Err(AppError::from(
                StatusCode::UNAUTHORIZED,
                "invalid password reset url",
            ));
        };

        if now.saturating_duration_since(issued) > RESET_ALLOWED_TIME {
            self.0.remove(uid);
            return Err(AppError::from(
                StatusCode::UNAUTHORIZED,
                "password reset expired",
            ));
        }
        Ok(user_id)
    }
}

#[derive(Deserialize)]
struct PwdRequest {
    email: String,
}

#[derive(Deserialize)]
struct NewPwdRequest {
    password: String,
}

// 1 hour
const RESET_ALLOWED_TIME: Duration = Duration::from_secs(60 * 60);

fn reset_body(name: &str, link: &str) -> String {
    format!(
        r"Hi {},

We have received a request to change your Clubhouse password. To reset your password, please click the below link within the next {} minutes (or paste it into your browser if clicking is not working):

{}

If you did not request this password reset you can disregard this message and your password will remain unchanged.

Thanks,
The Clubhouse Team.",
        name,
        RESET_ALLOWED_TIME.as_secs() / 60,
        link
    )
}

async fn password_request(
    Extension(pool): Extension<DbPool>,
    Extension(config): Extension<Arc<Config>>,
    Extension(mailer): Extension<Option<Arc<Mailer>>>,
    Extension(resets): Extension<Arc<Mutex<Resets>>>,
    Json(req): Json<PwdRequest>,
) -> AppResult<Json<StatusMessage>> {
    let Some(mailer) = mailer else {
        return Err(AppError::from(
            StatusCode::SERVICE_UNAVAILABLE,
            "password reset is not available",
        ));
    };

    let conn = &mut pool.get().await?;

    let Some(user) = users::table
        .filter(users::email.eq(req.email.trim().to_lowercase()))
        .first::<User>(conn)
        .await
        .optional()?
    else {
        return Err(AppError::from(
            StatusCode::NOT_FOUND,
            "could not find matching account",
        ));
    };

    let uid = nanoid!();
    let link = format!(
        "{}/password-reset/{}",
        config.frontend_host.trim_end_matches('/'),
        uid
    );

    let destination_address = user
        .email
        .parse::<Address>()
        .map_err(|_| AppError::from(StatusCode::BAD_REQUEST, "invalid email"))?;

    let email = Message::builder()
        .from(mailer.sender())
        .to(Mailbox::new(Some(user.display_name.clone()), destination_address))
        .subject("Clubhouse Password Reset")
        .body(reset_body(&user.display_name, &link))?;

    match mailer.send(email).await {
        Ok(_) => {
            resets.lock().await.0.insert(uid, (Instant::now(), user.id));
            tracing::info!(user_id = user.id, "password reset link sent");
            Ok(StatusMessage::new("Password reset email sent."))
        }
        Err(e) => {
            tracing::error!(user_id = user.id, error = %e, "failed to send password reset email");
            Err(AppError::from(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to send email",
            ))
        }
    }
}

async fn password_reset(
    Extension(pool): Extension<DbPool>,
    Extension(resets): Extension<Arc<Mutex<Resets>>>,
    Path(uid): Path<String>,
    Json(req): Json<NewPwdRequest>,
) -> AppResult<Json<StatusMessage>> {
    if req.password.is_empty() {
        return Err(AppError::from(StatusCode::BAD_REQUEST, "password is required"));
    }

    let mut resets = resets.lock().await;
    let user_id = resets.lookup(&uid, Instant::now())?;

    let conn = &mut pool.get().await?;

    update(users::table.find(user_id))
        .set(users::password_hash.eq(auth::hash_password(req.password)?))
        .execute(conn)
        .await?;

    resets.0.remove(&uid);
    tracing::info!(user_id, "password reset");

    Ok(StatusMessage::new("Password updated."))
}

async fn check_uid(
    Extension(resets): Extension<Arc<Mutex<Resets>>>,
    Path(uid): Path<String>,
) -> AppResult<Json<StatusMessage>> {
    resets.lock().await.lookup(&uid, Instant::now())?;
    Ok(StatusMessage::new("Password reset link is valid."))
}

pub fn app() -> Router<RequestBody> {
    let shared_resets = Arc::new(Mutex::new(Resets::default()));

    Router::new()
        .route("/reset", post(password_request))
        .route("/:uid", get(check_uid).post(password_reset))
        .layer(Extension(shared_resets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_link_is_rejected() {
        let mut resets = Resets::default();
        assert!(resets.lookup("nope", Instant::now()).is_err());
    }

    #[test]
    fn live_link_resolves_to_its_user() {
        let mut resets = Resets::default();
        let issued = Instant::now();
        resets.0.insert("abc".to_string(), (issued, 9));
        assert_eq!(resets.lookup("abc", issued + Duration::from_secs(60)).ok(), Some(9));
        assert!(resets.0.contains_key("abc"));
    }

    #[test]
    fn expired_link_is_dropped() {
        let mut resets = Resets::default();
        let issued = Instant::now();
        resets.0.insert("abc".to_string(), (issued, 9));
        let later = issued + RESET_ALLOWED_TIME + Duration::from_secs(1);
        assert!(resets.lookup("abc", later).is_err());
        assert!(!resets.0.contains_key("abc"));
    }

    #[test]
    fn body_mentions_link_and_window() {
        let body = reset_body("Ada", "http://x/password-reset/1");
        assert!(body.contains("Hi Ada"));
        assert!(body.contains("http://x/password-reset/1"));
        assert!(body.contains("60 minutes"));
    }
}
