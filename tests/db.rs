//! Round trips against a migrated database. Skipped unless `DATABASE_URL` is set.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, NaiveTime};
use clubhouse::{
    auth,
    config::Config,
    connect_to_db,
    schema::{clubs, events},
    DbPool,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use futures::{SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use std::{net::TcpListener, path::PathBuf, time::Duration};
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

/// Smallest body `infer` recognises as a png.
const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

fn storage_dir() -> PathBuf {
    std::env::temp_dir().join("clubhouse-db-tests")
}

fn setup() -> Option<(Router, DbPool)> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    std::env::set_var("JWT_SECRET", "Y2x1YmhvdXNlLXRlc3Qtc2VjcmV0LWNsdWJob3VzZQ==");

    let config = Config {
        db_url,
        port: 0,
        public_url: "http://localhost:8080".to_string(),
        frontend_host: "http://localhost:3000".to_string(),
        storage_dir: storage_dir().to_string_lossy().into_owned(),
        placeholder_image: "/placeholder-image.png".to_string(),
        admin_emails: String::new(),
        email_username: None,
        email_password: None,
        smtp_relay: "smtp.gmail.com".to_string(),
        log_format: "pretty".to_string(),
        chat_buffer: 8,
        max_upload_bytes: 64 * 1024,
    };
    let pool = connect_to_db(&config.db_url).unwrap();
    Some((clubhouse::app(&config, pool.clone(), None), pool))
}

fn request(method: Method, uri: &str, bearer: Option<&str>) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn call(app: &Router, method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let builder = request(method, uri, bearer);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();
    send(app, request).await
}

/// Posts a multipart form, with an optional png under `file_field`.
async fn post_form(
    app: &Router,
    uri: &str,
    bearer: &str,
    fields: &[(&str, &str)],
    file_field: Option<&str>,
) -> (StatusCode, Value) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--XYZ\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some(name) = file_field {
        body.extend_from_slice(
            format!(
                "--XYZ\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"logo.png\"\r\n\
                 Content-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(PNG);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(b"--XYZ--\r\n");

    let request = request(Method::POST, uri, Some(bearer))
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XYZ")
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

async fn signup(app: &Router) -> (String, String) {
    let email = format!("{}@club.house", nanoid::nanoid!(10).to_lowercase());
    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({ "email": email, "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (email, body["token"].as_str().unwrap().to_string())
}

async fn user_id(app: &Router, token: &str) -> i64 {
    let (_, session) = call(app, Method::GET, "/api/auth/session", Some(token), None).await;
    session["id"].as_i64().unwrap()
}

async fn find_club_by_name(app: &Router, name: &str) -> Option<Value> {
    let (_, clubs) = call(app, Method::GET, "/api/club/list", None, None).await;
    clubs.as_array().unwrap().iter().find(|c| c["name"] == name).cloned()
}

#[tokio::test]
async fn signup_login_and_session() {
    let Some((app, _)) = setup() else { return };

    let (email, token) = signup(&app).await;
    let local_part = email.split('@').next().unwrap();

    let (status, session) = call(&app, Method::GET, "/api/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["email"], email.as_str());
    assert_eq!(session["displayName"], local_part);
    assert_eq!(session["photoUrl"], "/placeholder-image.png");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({ "email": email, "password": "other" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn registering_twice_is_a_no_op() {
    let Some((app, pool)) = setup() else { return };
    let (_, token) = signup(&app).await;

    let event_id = {
        let conn = &mut pool.get().await.unwrap();
        diesel::insert_into(events::table)
            .values((
                events::title.eq("Hack Night"),
                events::description.eq("Build things"),
                events::rules.eq(""),
                events::venue.eq("Lab 2"),
                events::event_date.eq(NaiveDate::from_ymd_opt(2030, 1, 15).unwrap()),
                events::event_time.eq(NaiveTime::from_hms_opt(18, 0, 0).unwrap()),
            ))
            .returning(events::id)
            .get_result::<i32>(conn)
            .await
            .unwrap()
    };

    let uri = format!("/api/event/register/{event_id}");
    let (status, first) = call(&app, Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["message"], "Registration successful!");

    let (_, second) = call(&app, Method::POST, &uri, Some(&token), None).await;
    assert_eq!(second["message"], "You are already registered for this event.");

    let (_, event) = call(&app, Method::GET, &format!("/api/event/info/{event_id}"), None, None).await;
    assert_eq!(event["registeredCount"], 1);
    assert_eq!(event["countdown"]["isExpired"], false);

    let (_, profile) = call(&app, Method::GET, "/api/profile", Some(&token), None).await;
    assert_eq!(profile["registeredEvents"], json!([event_id]));
}

#[tokio::test]
async fn resume_is_saved_normalized() {
    let Some((app, _)) = setup() else { return };
    let (_, token) = signup(&app).await;

    let (_, empty) = call(&app, Method::GET, "/api/resume", Some(&token), None).await;
    assert_eq!(empty["skills"], json!([]));

    let (status, _) = call(
        &app,
        Method::PUT,
        "/api/resume",
        Some(&token),
        Some(json!({
            "personalInfo": { "name": "Ada" },
            "education": [{ "school": "", "degree": "", "year": "" }],
            "skills": ["rust", " "]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, saved) = call(&app, Method::GET, "/api/resume", Some(&token), None).await;
    assert_eq!(saved["personalInfo"]["name"], "Ada");
    assert_eq!(saved["education"], json!([]));
    assert_eq!(saved["skills"], json!(["rust"]));
}

#[tokio::test]
async fn admin_club_life_cycle_keeps_storage_in_step() {
    let Some((app, _)) = setup() else { return };
    let admin = auth::generate_jwt(0, true, auth::SESSION_LENGTH).unwrap();
    let name = format!("Chess {}", nanoid::nanoid!(8));
    let form = [
        ("name", name.as_str()),
        ("description", "Openings and endgames"),
        ("category", "Academic"),
        ("leadName", "Ada"),
        ("leadEmail", "ada@club.house"),
    ];

    let (status, _) = post_form(&app, "/api/admin/club", &admin, &form, Some("logo")).await;
    assert_eq!(status, StatusCode::CREATED);
    let club = find_club_by_name(&app, &name).await.unwrap();
    let club_id = club["id"].as_i64().unwrap();
    let first_logo = club["logoPath"].as_str().unwrap().to_string();
    assert!(storage_dir().join(&first_logo).exists());

    let uri = format!("/api/admin/club/{club_id}");
    let (status, _) = post_form(&app, &uri, &admin, &form, Some("logo")).await;
    assert_eq!(status, StatusCode::OK);
    let club = find_club_by_name(&app, &name).await.unwrap();
    let second_logo = club["logoPath"].as_str().unwrap().to_string();
    assert_ne!(first_logo, second_logo);
    assert!(!storage_dir().join(&first_logo).exists());
    assert!(storage_dir().join(&second_logo).exists());
    let image_url = club["imageUrl"].clone();

    // no file in the form keeps the current logo
    let (status, _) = post_form(&app, &uri, &admin, &form, None).await;
    assert_eq!(status, StatusCode::OK);
    let club = find_club_by_name(&app, &name).await.unwrap();
    assert_eq!(club["imageUrl"], image_url);
    assert!(storage_dir().join(&second_logo).exists());

    let (status, _) = call(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!storage_dir().join(&second_logo).exists());

    let (status, _) = call(&app, Method::GET, &format!("/api/club/info/{club_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn next_frame<S>(socket: &mut S) -> Option<Value>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    match tokio::time::timeout(Duration::from_millis(500), socket.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => Some(serde_json::from_str(&text).unwrap()),
        _ => None,
    }
}

#[tokio::test]
async fn live_chat_sends_snapshot_then_each_message_once() {
    let Some((app, pool)) = setup() else { return };
    let (_, token) = signup(&app).await;

    let club_id = {
        let conn = &mut pool.get().await.unwrap();
        diesel::insert_into(clubs::table)
            .values((
                clubs::name.eq(format!("Debate {}", nanoid::nanoid!(8))),
                clubs::description.eq("Arguments"),
                clubs::category.eq("Cultural"),
                clubs::lead_name.eq("Ada"),
                clubs::lead_email.eq("ada@club.house"),
            ))
            .returning(clubs::id)
            .get_result::<i32>(conn)
            .await
            .unwrap()
    };
    let messages = format!("/api/chat/{club_id}/messages");

    let (status, first) = call(&app, Method::POST, &messages, Some(&token), Some(json!({ "text": "hello" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(app.clone().into_make_service());
    tokio::spawn(server);

    let url = format!("ws://{addr}/api/chat/{club_id}/live?token={token}");
    let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    let snapshot = next_frame(&mut socket).await.unwrap();
    assert_eq!(snapshot["type"], "snapshot");
    let ids: Vec<&Value> = snapshot["messages"].as_array().unwrap().iter().map(|m| &m["id"]).collect();
    assert_eq!(ids, vec![&first["id"]]);

    let (_, second) = call(&app, Method::POST, &messages, Some(&token), Some(json!({ "text": "again" }))).await;
    let pushed = next_frame(&mut socket).await.unwrap();
    assert_eq!(pushed["type"], "message");
    assert_eq!(pushed["message"]["id"], second["id"]);
    assert_eq!(pushed["message"]["text"], "again");
    assert!(next_frame(&mut socket).await.is_none());

    socket.send(Message::Text("from the socket".to_string())).await.unwrap();
    let echoed = next_frame(&mut socket).await.unwrap();
    assert_eq!(echoed["message"]["text"], "from the socket");
    assert!(next_frame(&mut socket).await.is_none());
}

#[tokio::test]
async fn team_finder_skips_the_caller_and_sorts_by_shared_languages() {
    let Some((app, _)) = setup() else { return };
    let tag = nanoid::nanoid!(8).to_lowercase();
    let rust = format!("{tag}-rust");
    let go = format!("{tag}-go");
    let both = format!("{rust}, {go}");

    let (_, me) = signup(&app).await;
    let (_, one) = signup(&app).await;
    let (_, two) = signup(&app).await;
    for (token, languages) in [(&me, &both), (&one, &rust), (&two, &both)] {
        let (status, _) = post_form(&app, "/api/profile", token, &[("languages", languages)], None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (one_id, two_id) = (user_id(&app, &one).await, user_id(&app, &two).await);

    let uri = format!("/api/team-finder?search={tag}");
    let (_, found) = call(&app, Method::GET, &uri, Some(&me), None).await;
    let ids: Vec<i64> = found["matches"].as_array().unwrap().iter().map(|m| m["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![one_id, two_id]);
    assert_eq!(found["sortedByMatch"], false);

    let (_, sorted) = call(&app, Method::GET, &format!("{uri}&sort=match"), Some(&me), None).await;
    assert_eq!(sorted["sortedByMatch"], true);
    let matches = sorted["matches"].as_array().unwrap();
    let ranked: Vec<(i64, i64)> = matches
        .iter()
        .map(|m| (m["id"].as_i64().unwrap(), m["matchScore"].as_i64().unwrap()))
        .collect();
    assert_eq!(ranked, vec![(two_id, 2), (one_id, 1)]);
    assert!(matches.iter().all(|m| m.get("email").is_none() && m.get("phone").is_none()));

    let (status, profile) = call(&app, Method::GET, &format!("/api/profile/user/{one_id}"), Some(&me), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["languages"], json!([rust]));
    assert!(profile.get("email").is_none());
}
