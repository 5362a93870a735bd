use super::{
    club::{load_clubs, ClubResponse},
    event::{load_events, EventResponse},
};
use crate::{error::AppResult, storage::Storage, DbPool, RequestBody};
use axum::{routing::get, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct HomeResponse {
    events: Vec<EventResponse>,
    clubs: Vec<ClubResponse>,
}

/// Landing page data. Both lists are read concurrently on separate connections.
async fn home(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
) -> AppResult<Json<HomeResponse>> {
    let events = async {
        let conn = &mut pool.get().await?;
        load_events(conn, &storage, None).await
    };
    let clubs = async {
        let conn = &mut pool.get().await?;
        load_clubs(conn, &storage).await
    };
    let (events, clubs) = tokio::try_join!(events, clubs)?;

    Ok(Json(HomeResponse { events, clubs }))
}

pub fn app() -> Router<RequestBody> {
    Router::new().route("/", get(home))
}
