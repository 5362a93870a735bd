//! Per-club broadcast of appended chat messages.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    path::Path,
};
use tokio::sync::{broadcast, Mutex};

/// A chat message as clients see it, with attachment and photo urls resolved.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageView {
    pub id: i32,
    pub club_id: i32,
    pub user_id: i32,
    pub user_name: String,
    pub user_photo: Option<String>,
    pub text: String,
    pub file_url: Option<String>,
    pub file_type: Option<String>,
    pub file_name: Option<String>,
    pub is_image: bool,
    pub timestamp: NaiveDateTime,
}

/// Frames pushed to live subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatFrame {
    Snapshot { messages: Vec<ChatMessageView> },
    Message { message: ChatMessageView },
    Error { message: String },
}

pub struct ChatHub {
    rooms: Mutex<HashMap<i32, broadcast::Sender<ChatMessageView>>>,
    capacity: usize,
}

impl ChatHub {
    pub fn new(capacity: usize) -> ChatHub {
        ChatHub {
            rooms: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn subscribe(&self, club_id: i32) -> broadcast::Receiver<ChatMessageView> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(club_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Sends `message` to the club's subscribers and returns how many got it.
    /// Rooms nobody listens to any more are dropped.
    pub async fn publish(&self, message: ChatMessageView) -> usize {
        let mut rooms = self.rooms.lock().await;
        let Some(sender) = rooms.get(&message.club_id) else {
            return 0;
        };
        let club_id = message.club_id;
        match sender.send(message) {
            Ok(n) => n,
            Err(_) => {
                rooms.remove(&club_id);
                0
            }
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

/// Attachments the chat accepts: any image, pdf, word documents and text.
pub fn attachment_allowed(file_name: &str, content_type: Option<&str>) -> bool {
    if content_type.map_or(false, |t| t.starts_with("image/")) {
        return true;
    }
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    matches!(extension.as_deref(), Some("pdf" | "doc" | "docx" | "txt"))
}

/// Ids a live subscriber has already been sent.
///
/// Ids are not committed in order, so a message with a lower id than the
/// newest in the snapshot can still arrive later and must be delivered.
#[derive(Debug, Default)]
pub struct Delivered(HashSet<i32>);

impl Delivered {
    pub fn from_snapshot(snapshot: &[ChatMessageView]) -> Delivered {
        Delivered(snapshot.iter().map(|m| m.id).collect())
    }

    /// Records `message` and reports whether it still has to be sent.
    pub fn first_time(&mut self, message: &ChatMessageView) -> bool {
        self.0.insert(message.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn message(id: i32, club_id: i32) -> ChatMessageView {
        ChatMessageView {
            id,
            club_id,
            user_id: 1,
            user_name: "Ada".to_string(),
            user_photo: None,
            text: format!("message {id}"),
            file_url: None,
            file_type: None,
            file_name: None,
            is_image: false,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn subscribers_only_see_their_club() {
        let hub = ChatHub::new(8);
        let mut robotics = hub.subscribe(1).await;
        let mut chess = hub.subscribe(2).await;

        assert_eq!(hub.publish(message(10, 1)).await, 1);
        assert_eq!(robotics.recv().await.unwrap().id, 10);
        assert!(chess.try_recv().is_err());
    }

    #[tokio::test]
    async fn publishing_without_listeners_is_a_no_op() {
        let hub = ChatHub::new(8);
        assert_eq!(hub.publish(message(1, 3)).await, 0);
        assert_eq!(hub.room_count().await, 0);
    }

    #[tokio::test]
    async fn abandoned_rooms_are_dropped() {
        let hub = ChatHub::new(8);
        let rx = hub.subscribe(4).await;
        assert_eq!(hub.room_count().await, 1);
        drop(rx);
        assert_eq!(hub.publish(message(1, 4)).await, 0);
        assert_eq!(hub.room_count().await, 0);
    }

    #[test]
    fn attachment_types() {
        assert!(attachment_allowed("photo.heic", Some("image/heic")));
        assert!(attachment_allowed("notes.TXT", None));
        assert!(attachment_allowed("cv.docx", Some("application/octet-stream")));
        assert!(!attachment_allowed("run.exe", Some("application/x-msdownload")));
        assert!(!attachment_allowed("README", None));
    }

    #[test]
    fn snapshot_messages_are_not_sent_twice() {
        let snapshot = vec![message(4, 1), message(6, 1)];
        let mut delivered = Delivered::from_snapshot(&snapshot);

        assert!(!delivered.first_time(&message(6, 1)));
        assert!(delivered.first_time(&message(7, 1)));
        assert!(!delivered.first_time(&message(7, 1)));
        // committed after the snapshot was read, despite the lower id
        assert!(delivered.first_time(&message(5, 1)));
    }

    #[tokio::test]
    async fn snapshot_then_live_messages_arrive_once() {
        let hub = ChatHub::new(8);
        let mut rx = hub.subscribe(1).await;
        // appended between subscribing and reading the snapshot
        hub.publish(message(2, 1)).await;
        let mut delivered = Delivered::from_snapshot(&[message(1, 1), message(2, 1)]);
        hub.publish(message(3, 1)).await;

        let mut sent = Vec::new();
        while let Ok(m) = rx.try_recv() {
            if delivered.first_time(&m) {
                sent.push(m.id);
            }
        }
        assert_eq!(sent, vec![3]);
    }

    #[test]
    fn frames_are_tagged() {
        let frame = serde_json::to_value(ChatFrame::Message { message: message(1, 1) }).unwrap();
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["message"]["userName"], "Ada");
    }
}
