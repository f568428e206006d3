use chrono::Utc;
use serde::Deserialize;

use super::{ensure_role, ServiceError, ServiceResult};
use crate::auth::AuthUser;
use crate::database::models::{AnalyticsIntegration, AnalyticsProvider, Role};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateAnalytics {
    pub measurement_id: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Google Analytics 4 ids look like `G-XXXXXXXX`.
pub fn is_valid_measurement_id(id: &str) -> bool {
    match id.strip_prefix("G-") {
        Some(rest) => rest.len() >= 4 && rest.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
        None => false,
    }
}

pub struct AnalyticsService<'a> {
    state: &'a AppState,
}

impl<'a> AnalyticsService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn get(&self, caller: &AuthUser) -> ServiceResult<AnalyticsIntegration> {
        ensure_role(caller, Role::Creator)?;
        self.state
            .store
            .get_analytics(&caller.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("analytics integration"))
    }

    pub async fn put(&self, caller: &AuthUser, input: UpdateAnalytics) -> ServiceResult<AnalyticsIntegration> {
        ensure_role(caller, Role::Creator)?;
        let measurement_id = input.measurement_id.trim().to_string();
        if !is_valid_measurement_id(&measurement_id) {
            return Err(ServiceError::invalid_field("measurement_id", "must look like G-XXXXXXXX"));
        }

        Ok(self
            .state
            .store
            .upsert_analytics(AnalyticsIntegration {
                creator_id: caller.user_id.clone(),
                provider: AnalyticsProvider::GoogleAnalytics,
                measurement_id,
                enabled: input.enabled,
                updated_at: Utc::now(),
            })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn measurement_id_format() {
        assert!(is_valid_measurement_id("G-AB12CD34"));
        assert!(is_valid_measurement_id("G-ABCD"));
        assert!(!is_valid_measurement_id("G-ABC"));
        assert!(!is_valid_measurement_id("g-ABCD1234"));
        assert!(!is_valid_measurement_id("UA-1234567-1"));
        assert!(!is_valid_measurement_id("G-abcd1234"));
    }

    #[tokio::test]
    async fn creators_manage_their_integration() {
        let state = AppState::in_memory(AppConfig::development());
        let service = AnalyticsService::new(&state);
        let creator = AuthUser::new("cr", Role::Creator);

        assert!(matches!(service.get(&creator).await, Err(ServiceError::NotFound(_))));
        let saved = service
            .put(&creator, UpdateAnalytics { measurement_id: " G-XYZ123 ".to_string(), enabled: true })
            .await
            .unwrap();
        assert_eq!(saved.measurement_id, "G-XYZ123");
        assert_eq!(service.get(&creator).await.unwrap(), saved);

        let client = AuthUser::new("cl", Role::Client);
        assert!(matches!(service.get(&client).await, Err(ServiceError::Forbidden(_))));
    }
}
