use super::{ServiceError, ServiceResult};
use crate::auth::{issue_stream_token, AuthUser, JwtError, StreamToken};
use crate::state::AppState;

pub struct StreamService<'a> {
    state: &'a AppState,
}

impl<'a> StreamService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// User token for the Stream video/chat SDK, always for the caller.
    pub fn token(&self, caller: &AuthUser) -> ServiceResult<StreamToken> {
        issue_stream_token(&caller.user_id, &self.state.config.stream).map_err(|e| match e {
            JwtError::NotConfigured(what) => {
                tracing::warn!("Stream token requested but {} secret is not configured", what);
                ServiceError::Unavailable("Stream is not configured".to_string())
            }
            other => other.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::Role;

    #[test]
    fn unconfigured_stream_is_unavailable() {
        let state = AppState::in_memory(AppConfig::development());
        let caller = AuthUser::new("u1", Role::Client);
        assert!(matches!(StreamService::new(&state).token(&caller), Err(ServiceError::Unavailable(_))));

        let mut config = AppConfig::development();
        config.stream.api_key = "key".to_string();
        config.stream.api_secret = "secret".to_string();
        let state = AppState::in_memory(config);
        let token = StreamService::new(&state).token(&caller).unwrap();
        assert_eq!(token.user_id, "u1");
    }
}
