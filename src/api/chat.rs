use super::{club::find_club, multipart::read_form};
use crate::{
    auth::{self, ExtractAuth},
    chat::{attachment_allowed, ChatFrame, ChatHub, ChatMessageView, Delivered},
    error::{AppError, AppResult},
    models::{ChatMessage, User},
    schema::*,
    storage::{self, Storage},
    DbPool,
    RequestBody,
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Multipart, Path, Query,
    },
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use diesel::prelude::*;
use diesel_async::{pg::AsyncPgConnection, RunQueryDsl};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Insertable)]
#[diesel(table_name = chat_messages)]
struct NewChatMessage {
    club_id: i32,
    user_id: i32,
    user_name: String,
    user_photo: Option<String>,
    text: String,
    file_path: Option<String>,
    file_type: Option<String>,
    file_name: Option<String>,
}

async fn message_view(storage: &Storage, message: ChatMessage) -> ChatMessageView {
    let user_photo = match message.user_photo.as_deref() {
        Some(photo) => Some(storage.resolve_url(Some(photo)).await),
        None => None,
    };
    let file_url = match message.file_path.as_deref() {
        Some(path) => Some(storage.resolve_url(Some(path)).await),
        None => None,
    };
    ChatMessageView {
        id: message.id,
        club_id: message.club_id,
        user_id: message.user_id,
        user_name: message.user_name,
        user_photo,
        text: message.text,
        file_url,
        is_image: message
            .file_type
            .as_deref()
            .map_or(false, |t| t.starts_with("image/")),
        file_type: message.file_type,
        file_name: message.file_name,
        timestamp: message.created_at,
    }
}

async fn load_history(
    conn: &mut AsyncPgConnection,
    storage: &Storage,
    club_id: i32,
) -> AppResult<Vec<ChatMessageView>> {
    let rows = chat_messages::table
        .filter(chat_messages::club_id.eq(club_id))
        .order((chat_messages::created_at.asc(), chat_messages::id.asc()))
        .load::<ChatMessage>(conn)
        .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(message_view(storage, row).await);
    }
    Ok(out)
}

struct Attachment {
    path: String,
    content_type: String,
    name: String,
}

/// Appends a message for `user_id` and pushes it to live subscribers.
async fn append(
    conn: &mut AsyncPgConnection,
    storage: &Storage,
    hub: &ChatHub,
    club_id: i32,
    user_id: i32,
    text: String,
    attachment: Option<Attachment>,
) -> AppResult<ChatMessageView> {
    let author = users::table
        .find(user_id)
        .first::<User>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::from(StatusCode::UNAUTHORIZED, "account no longer exists"))?;

    let display_name = author.display_name.trim();
    let (file_path, file_type, file_name) = match attachment {
        Some(a) => (Some(a.path), Some(a.content_type), Some(a.name)),
        None => (None, None, None),
    };

    let row = diesel::insert_into(chat_messages::table)
        .values(NewChatMessage {
            club_id,
            user_id,
            user_name: if display_name.is_empty() {
                "Anonymous".to_string()
            } else {
                display_name.to_string()
            },
            user_photo: author.photo_path.clone(),
            text,
            file_path,
            file_type,
            file_name,
        })
        .get_result::<ChatMessage>(conn)
        .await?;

    let view = message_view(storage, row).await;
    let receivers = hub.publish(view.clone()).await;
    tracing::debug!(club_id, message_id = view.id, receivers, "chat message appended");
    Ok(view)
}

fn checked_text(text: &str) -> AppResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::from(StatusCode::BAD_REQUEST, "message is empty"));
    }
    Ok(text.to_string())
}

async fn history(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Path(club_id): Path<i32>,
    ExtractAuth(_): ExtractAuth,
) -> AppResult<Json<Vec<ChatMessageView>>> {
    let conn = &mut pool.get().await?;
    find_club(conn, club_id).await?;
    Ok(Json(load_history(conn, &storage, club_id).await?))
}

#[derive(Deserialize)]
struct SendRequest {
    #[serde(default)]
    text: String,
}

async fn send_text(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Extension(hub): Extension<Arc<ChatHub>>,
    Path(club_id): Path<i32>,
    ExtractAuth(claims): ExtractAuth,
    Json(req): Json<SendRequest>,
) -> AppResult<(StatusCode, Json<ChatMessageView>)> {
    let text = checked_text(&req.text)?;

    let conn = &mut pool.get().await?;
    find_club(conn, club_id).await?;
    let view = append(conn, &storage, &hub, club_id, claims.user_id, text, None).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn send_file(
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Extension(hub): Extension<Arc<ChatHub>>,
    Path(club_id): Path<i32>,
    ExtractAuth(claims): ExtractAuth,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ChatMessageView>)> {
    let form = read_form(multipart, "file").await?;
    let Some(file) = form.file else {
        return Err(AppError::from(StatusCode::BAD_REQUEST, "no file attached"));
    };
    let content_type = storage::sniff_mime(&file.bytes)
        .map(str::to_string)
        .or(file.content_type)
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());
    if !attachment_allowed(&file.file_name, Some(&content_type)) {
        return Err(AppError::from(
            StatusCode::BAD_REQUEST,
            "only images, pdf, doc, docx and txt files can be shared",
        ));
    }

    let conn = &mut pool.get().await?;
    find_club(conn, club_id).await?;

    let name = storage::sanitize_file_name(&file.file_name);
    let path = format!("clubs/{club_id}/files/{name}");
    storage.put_at(&path, &file.bytes).await?;

    let attachment = Attachment {
        path,
        content_type,
        name: file.file_name,
    };
    let view = append(
        conn,
        &storage,
        &hub,
        club_id,
        claims.user_id,
        String::new(),
        Some(attachment),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Deserialize)]
struct LiveQuery {
    token: String,
}

async fn live(
    ws: WebSocketUpgrade,
    Extension(pool): Extension<DbPool>,
    Extension(storage): Extension<Arc<Storage>>,
    Extension(hub): Extension<Arc<ChatHub>>,
    Path(club_id): Path<i32>,
    Query(query): Query<LiveQuery>,
) -> AppResult<Response> {
    // browsers cannot set headers on a websocket handshake
    let claims = auth::claims_from_token(&query.token)?;

    {
        let conn = &mut pool.get().await?;
        find_club(conn, club_id).await?;
    }

    Ok(ws.on_upgrade(move |socket| async move {
        let session = LiveSession {
            pool,
            storage,
            hub,
            club_id,
            user_id: claims.user_id,
        };
        if let Err(e) = session.run(socket).await {
            tracing::warn!(club_id, error = %e, "chat subscription ended with an error");
        }
    }))
}

struct LiveSession {
    pool: DbPool,
    storage: Arc<Storage>,
    hub: Arc<ChatHub>,
    club_id: i32,
    user_id: i32,
}

impl LiveSession {
    async fn run(self, socket: WebSocket) -> anyhow::Result<()> {
        let (mut sink, mut stream) = socket.split();

        // subscribe before reading the snapshot so nothing appended in between is lost
        let mut rx = self.hub.subscribe(self.club_id).await;
        let snapshot = {
            let conn = &mut self.pool.get().await?;
            load_history(conn, &self.storage, self.club_id)
                .await
                .map_err(|e| {
                    tracing::warn!(club_id = self.club_id, error = %e, "failed to load chat history");
                    anyhow::anyhow!("failed to load chat history")
                })?
        };
        let mut delivered = Delivered::from_snapshot(&snapshot);
        send_frame(&mut sink, &ChatFrame::Snapshot { messages: snapshot }).await?;
        let rooms = self.hub.room_count().await;
        tracing::debug!(club_id = self.club_id, user_id = self.user_id, rooms, "chat subscriber joined");

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(message) => {
                        if delivered.first_time(&message) {
                            send_frame(&mut sink, &ChatFrame::Message { message }).await?;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(club_id = self.club_id, skipped, "chat subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(frame) = self.post(&text).await {
                            send_frame(&mut sink, &frame).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
            }
        }

        tracing::debug!(club_id = self.club_id, user_id = self.user_id, "chat subscriber left");
        Ok(())
    }

    /// A text frame from the client is a new message by the subscriber.
    async fn post(&self, text: &str) -> Result<(), ChatFrame> {
        let failed = |message: &str| ChatFrame::Error {
            message: message.to_string(),
        };
        let text = checked_text(text).map_err(|_| failed("message is empty"))?;
        let conn = &mut self.pool.get().await.map_err(|e| {
            tracing::warn!(club_id = self.club_id, error = %e, "no database connection for chat message");
            failed("could not send message")
        })?;
        append(
            conn,
            &self.storage,
            &self.hub,
            self.club_id,
            self.user_id,
            text,
            None,
        )
        .await
        .map(|_| ())
        .map_err(|e| {
            tracing::warn!(
                club_id = self.club_id,
                user_id = self.user_id,
                error = %e,
                "failed to append chat message"
            );
            failed("could not send message")
        })
    }
}

async fn send_frame<S>(sink: &mut S, frame: &ChatFrame) -> anyhow::Result<()>
where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let text = serde_json::to_string(frame)?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}

pub fn app() -> Router<RequestBody> {
    Router::new()
        .route("/:club_id/messages", get(history).post(send_text))
        .route("/:club_id/files", post(send_file))
        .route("/:club_id/live", get(live))
}
