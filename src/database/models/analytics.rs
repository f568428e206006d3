use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsProvider {
    GoogleAnalytics,
}

string_enum!(AnalyticsProvider, "analytics provider", {
    GoogleAnalytics => "google_analytics",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsIntegration {
    pub creator_id: String,
    pub provider: AnalyticsProvider,
    pub measurement_id: String,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}
