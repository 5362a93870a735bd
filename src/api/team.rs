use super::{
    event::registrations_by_user,
    profile::{public_profile, PublicProfile},
};
use crate::{
    auth::ExtractAuth,
    error::AppResult,
    matching::{self, Candidate},
    models::User,
    schema::*,
    storage::Storage,
    DbPool,
    RequestBody,
};
use axum::{extract::Query, routing::get, Extension, Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

impl Candidate for User {
    fn name(&self) -> &str {
        &self.display_name
    }

    fn bio(&self) -> Option<&str> {
        self.bio.as_deref()
    }

    fn tags(&self) -> &[String] {
        &self.languages
    }
}

#[derive(Deserialize, Default)]
struct FinderQuery {
    #[serde(default)]
    search: String,
    sort: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TeamMatch {
    match_score: usize,
    shared_languages: Vec<String>,
    #[serde(flatten)]
    user: PublicProfile,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FinderResponse {
    my_languages: Vec<String>,
    sorted_by_match: bool,
    matches: Vec<TeamMatch>,
}

async fn find(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    ExtractAuth(claims): ExtractAuth,
    Query(query): Query<FinderQuery>,
) -> AppResult<Json<FinderResponse>> {
    let sorted_by_match = query.sort.as_deref() == Some("match");

    let conn = &mut pool.get().await?;
    let everyone = users::table
        .order(users::id.asc())
        .load::<User>(conn)
        .await?;
    let registrations = registrations_by_user(conn).await?;

    let my_languages = everyone
        .iter()
        .find(|u| u.id == claims.user_id)
        .map(|u| u.languages.clone())
        .unwrap_or_default();

    let found = matching::find_team(
        everyone,
        |u| u.id == claims.user_id,
        &my_languages,
        &query.search,
        sorted_by_match,
    );

    let mut matches = Vec::with_capacity(found.len());
    for scored in found {
        let event_count = registrations.get(&scored.candidate.id).map_or(0, Vec::len);
        matches.push(TeamMatch {
            match_score: scored.score,
            shared_languages: scored.shared,
            user: public_profile(&storage, scored.candidate, event_count).await,
        });
    }

    Ok(Json(FinderResponse {
        my_languages,
        sorted_by_match,
        matches,
    }))
}

pub fn app() -> Router<RequestBody> {
    Router::new().route("/", get(find))
}
