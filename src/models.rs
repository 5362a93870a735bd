use crate::schema::*;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub photo_path: Option<String>,
    pub bio: Option<String>,
    pub socials: Option<String>,
    pub dob: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub interests: Option<String>,
    pub languages: Vec<String>,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct Club {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub category: String,
    pub lead_name: String,
    pub lead_email: String,
    pub lead_phone: String,
    pub meeting_schedule: String,
    pub requirements: String,
    pub achievements: String,
    pub member_count: i32,
    pub established_date: Option<NaiveDate>,
    pub logo_path: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Club))]
pub struct ClubSocial {
    pub id: i32,
    pub club_id: i32,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct Event {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub rules: String,
    pub venue: String,
    pub event_date: NaiveDate,
    pub event_time: NaiveTime,
    pub image_path: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Event))]
#[diesel(belongs_to(User))]
pub struct EventAttendee {
    pub id: i32,
    pub event_id: i32,
    pub user_id: i32,
    pub registered_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Event))]
pub struct Registration {
    pub id: i32,
    pub event_id: i32,
    pub name: String,
    pub email: String,
    pub contact: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Club))]
pub struct ChatMessage {
    pub id: i32,
    pub club_id: i32,
    pub user_id: i32,
    pub user_name: String,
    pub user_photo: Option<String>,
    pub text: String,
    pub file_path: Option<String>,
    pub file_type: Option<String>,
    pub file_name: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(primary_key(user_id))]
pub struct Resume {
    pub user_id: i32,
    pub data: serde_json::Value,
    pub updated_at: NaiveDateTime,
}
