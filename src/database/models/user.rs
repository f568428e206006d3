use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::session::SessionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Creator,
    Admin,
}

string_enum!(Role, "role", {
    Client => "client",
    Creator => "creator",
    Admin => "admin",
});

/// Per-minute prices a creator charges for each session kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rates {
    pub video: Decimal,
    pub audio: Decimal,
    pub chat: Decimal,
}

impl Rates {
    pub fn for_kind(&self, kind: SessionKind) -> Decimal {
        match kind {
            SessionKind::Video => self.video,
            SessionKind::Audio => self.audio,
            SessionKind::Chat => self.chat,
        }
    }
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            video: Decimal::new(10, 0),
            audio: Decimal::new(10, 0),
            chat: Decimal::new(5, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Services {
    pub video: bool,
    pub audio: bool,
    pub chat: bool,
}

impl Services {
    pub fn offers(&self, kind: SessionKind) -> bool {
        match kind {
            SessionKind::Video => self.video,
            SessionKind::Audio => self.audio,
            SessionKind::Chat => self.chat,
        }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self { video: true, audio: true, chat: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub weekday: Weekday,
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub rates: Rates,
    pub services: Services,
    pub online: bool,
    pub referral_code: String,
    pub availability: Vec<AvailabilitySlot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// "HH:MM" wire format for slot boundaries
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
