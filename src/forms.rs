//! Validation of the admin and user forms.
//!
//! Forms arrive as flat text fields (multipart or json) and are checked here
//! before anything touches the database or the object store. Error messages
//! are the status lines shown next to the form.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("Please fill in all required fields (Club Name, Description, Category, Lead Name, and Email).")]
    ClubRequired,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Please enter a valid number for Member Count.")]
    InvalidMemberCount,
    #[error("Please select a valid category.")]
    InvalidCategory,
    #[error("Please enter a valid link for {0}.")]
    InvalidLink(&'static str),
    #[error("Please enter the established date as YYYY-MM-DD.")]
    InvalidEstablishedDate,
    #[error("All fields are required.")]
    EventRequired,
    #[error("Please enter the event date as YYYY-MM-DD.")]
    InvalidEventDate,
    #[error("Please enter the event time as HH:MM.")]
    InvalidEventTime,
    #[error("Please select an image.")]
    ImageRequired,
    #[error("Please select a valid image file.")]
    NotAnImage,
    #[error("Name and email are required.")]
    RegistrationRequired,
}

pub type FormResult<T> = Result<T, FormError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClubCategory {
    Technical,
    Cultural,
    Sports,
    Academic,
    #[serde(rename = "Social Service")]
    SocialService,
    Professional,
    Innovation,
    Research,
    Others,
}

impl ClubCategory {
    pub const ALL: [ClubCategory; 9] = [
        ClubCategory::Technical,
        ClubCategory::Cultural,
        ClubCategory::Sports,
        ClubCategory::Academic,
        ClubCategory::SocialService,
        ClubCategory::Professional,
        ClubCategory::Innovation,
        ClubCategory::Research,
        ClubCategory::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClubCategory::Technical => "Technical",
            ClubCategory::Cultural => "Cultural",
            ClubCategory::Sports => "Sports",
            ClubCategory::Academic => "Academic",
            ClubCategory::SocialService => "Social Service",
            ClubCategory::Professional => "Professional",
            ClubCategory::Innovation => "Innovation",
            ClubCategory::Research => "Research",
            ClubCategory::Others => "Others",
        }
    }
}

impl FromStr for ClubCategory {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClubCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or(FormError::InvalidCategory)
    }
}

impl fmt::Display for ClubCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `^[^\s@]+@[^\s@]+\.[^\s@]+$`
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let plain = |s: &str| !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c == '@');
    if !plain(local) || domain.contains('@') || domain.chars().any(char::is_whitespace) {
        return false;
    }
    // the last dot needs something on both sides; earlier dots may belong to either part
    domain
        .char_indices()
        .filter(|(_, c)| *c == '.')
        .any(|(i, _)| i > 0 && i + 1 < domain.len())
}

/// Flat text fields of a submitted form.
#[derive(Debug, Default, Clone)]
pub struct Fields(HashMap<String, String>);

impl Fields {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Trimmed value, `""` when absent.
    pub fn text(&self, name: &str) -> &str {
        self.0.get(name).map_or("", |v| v.trim())
    }

    pub fn optional(&self, name: &str) -> Option<String> {
        Some(self.text(name))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Fields(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClubForm {
    pub name: String,
    pub description: String,
    pub category: ClubCategory,
    pub lead_name: String,
    pub lead_email: String,
    pub lead_phone: String,
    pub meeting_schedule: String,
    pub requirements: String,
    pub achievements: String,
    pub member_count: i32,
    pub established_date: Option<NaiveDate>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
}

impl ClubForm {
    pub fn parse(fields: &Fields) -> FormResult<ClubForm> {
        let required = ["name", "description", "category", "leadName", "leadEmail"];
        if required.iter().any(|f| fields.text(f).is_empty()) {
            return Err(FormError::ClubRequired);
        }

        let lead_email = fields.text("leadEmail");
        if !is_valid_email(lead_email) {
            return Err(FormError::InvalidEmail);
        }

        let member_count = fields
            .text("memberCount")
            .parse::<i32>()
            .ok()
            .filter(|n| *n >= 0)
            .ok_or(FormError::InvalidMemberCount)?;

        let established_date = fields
            .optional("establishedDate")
            .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
            .transpose()
            .map_err(|_| FormError::InvalidEstablishedDate)?;

        Ok(ClubForm {
            name: fields.text("name").to_string(),
            description: fields.text("description").to_string(),
            category: fields.text("category").parse()?,
            lead_name: fields.text("leadName").to_string(),
            lead_email: lead_email.to_string(),
            lead_phone: fields.text("leadPhone").to_string(),
            meeting_schedule: fields.text("meetingSchedule").to_string(),
            requirements: fields.text("requirements").to_string(),
            achievements: fields.text("achievements").to_string(),
            member_count,
            established_date,
            instagram: social_link(fields, "instagram", "Instagram")?,
            linkedin: social_link(fields, "linkedin", "LinkedIn")?,
            twitter: social_link(fields, "twitter", "Twitter")?,
        })
    }
}

fn social_link(fields: &Fields, name: &str, label: &'static str) -> FormResult<Option<String>> {
    let Some(link) = fields.optional(name) else {
        return Ok(None);
    };
    match Url::parse(&link) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Some(link)),
        _ => Err(FormError::InvalidLink(label)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventForm {
    pub title: String,
    pub description: String,
    pub rules: String,
    pub venue: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl EventForm {
    pub fn parse(fields: &Fields) -> FormResult<EventForm> {
        let required = ["title", "description", "venue", "timing", "date"];
        if required.iter().any(|f| fields.text(f).is_empty()) {
            return Err(FormError::EventRequired);
        }

        let date = NaiveDate::parse_from_str(fields.text("date"), "%Y-%m-%d")
            .map_err(|_| FormError::InvalidEventDate)?;
        let time = parse_time(fields.text("timing")).ok_or(FormError::InvalidEventTime)?;

        Ok(EventForm {
            title: fields.text("title").to_string(),
            description: fields.text("description").to_string(),
            rules: fields.text("rules").to_string(),
            venue: fields.text("venue").to_string(),
            date,
            time,
        })
    }
}

/// Accepts `HH:MM`, `HH:MM:SS` and 12-hour `10:00 AM`.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw.trim(), fmt).ok())
}

/// A guest sign-up for an event.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestRegistration {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub contact: String,
}

impl GuestRegistration {
    pub fn validate(&self) -> FormResult<()> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() {
            return Err(FormError::RegistrationRequired);
        }
        if !is_valid_email(self.email.trim()) {
            return Err(FormError::InvalidEmail);
        }
        Ok(())
    }
}

/// Uploaded files that stand in for a club logo or event image must be images.
pub fn ensure_image(bytes: &[u8]) -> FormResult<()> {
    if crate::storage::is_image(bytes) {
        Ok(())
    } else {
        Err(FormError::NotAnImage)
    }
}
