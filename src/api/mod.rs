use crate::RequestBody;
use axum::Router;

pub mod admin;
pub mod auth;
pub mod chat;
pub mod club;
pub mod event;
pub mod home;
mod multipart;
pub mod password;
pub mod profile;
pub mod resume;
pub mod team;

pub fn app() -> Router<RequestBody> {
    Router::new()
        .nest("/auth", auth::app())
        .nest("/password", password::app())
        .nest("/club", club::app())
        .nest("/event", event::app())
        .nest("/home", home::app())
        .nest("/admin", admin::app())
        .nest("/chat", chat::app())
        .nest("/profile", profile::app())
        .nest("/leaderboard", profile::leaderboard_app())
        .nest("/team-finder", team::app())
        .nest("/resume", resume::app())
}
