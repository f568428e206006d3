use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::settlement::{self, FinishedSession};
use super::{ensure_role, NotificationService, ServiceError, ServiceResult, UserService};
use crate::auth::AuthUser;
use crate::billing;
use crate::database::models::{Call, CallStatus, Creator, NotificationKind, Role, SessionKind, Settlement};
use crate::database::Page;
use crate::events::EventKind;
use crate::state::AppState;

const SESSION_ID_MAX: usize = 128;

#[derive(Debug, Deserialize)]
pub struct RegisterCall {
    pub call_id: String,
    pub kind: SessionKind,
    pub creator_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCall {
    pub call_id: String,
    pub status: CallStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallView {
    #[serde(flatten)]
    pub call: Call,
    pub settlement: Option<Settlement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaxDuration {
    pub creator_id: String,
    pub kind: SessionKind,
    pub rate: Decimal,
    pub balance: Decimal,
    pub max_duration_secs: i64,
}

/// Checks a client-chosen session id and that a client may open a
/// session of `kind` with `creator_id`. Shared with chats.
pub(crate) async fn admit_session(
    state: &AppState,
    caller: &AuthUser,
    session_id: &str,
    creator_id: &str,
    kind: SessionKind,
) -> ServiceResult<Creator> {
    ensure_role(caller, Role::Client)?;
    let session_id = session_id.trim();
    if session_id.is_empty() || session_id.len() > SESSION_ID_MAX {
        return Err(ServiceError::invalid_field(
            "session_id",
            format!("must be 1 to {} characters", SESSION_ID_MAX),
        ));
    }
    if caller.user_id == creator_id {
        return Err(ServiceError::invalid("cannot open a session with yourself"));
    }
    if state.store.get_call(session_id).await?.is_some() || state.store.get_chat(session_id).await?.is_some() {
        return Err(ServiceError::Conflict(format!("session {} already exists", session_id)));
    }

    let creator = UserService::new(state).get_creator(creator_id).await?;
    if !creator.services.offers(kind) {
        return Err(ServiceError::Conflict(format!("creator {} does not offer {} sessions", creator_id, kind)));
    }

    let balance = state
        .store
        .get_wallet(&caller.user_id)
        .await?
        .map(|w| w.balance)
        .ok_or_else(|| ServiceError::not_found(format!("wallet for user {}", caller.user_id)))?;
    let one_minute = billing::session_cost(creator.rates.for_kind(kind), 60);
    if balance < one_minute {
        return Err(ServiceError::InsufficientFunds(format!(
            "Insufficient balance: {} required for one minute, {} available",
            one_minute, balance
        )));
    }
    Ok(creator)
}

pub struct CallService<'a> {
    state: &'a AppState,
}

impl<'a> CallService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn register(&self, caller: &AuthUser, input: RegisterCall) -> ServiceResult<Call> {
        if input.kind == SessionKind::Chat {
            return Err(ServiceError::invalid_field("kind", "calls are video or audio"));
        }
        admit_session(self.state, caller, &input.call_id, &input.creator_id, input.kind).await?;

        let call = self
            .state
            .store
            .insert_call(Call {
                call_id: input.call_id.trim().to_string(),
                kind: input.kind,
                creator_id: input.creator_id,
                client_id: caller.user_id.clone(),
                status: CallStatus::Initiated,
                created_at: Utc::now(),
                started_at: None,
                ended_at: None,
                duration_secs: None,
            })
            .await?;

        tracing::info!(call_id = %call.call_id, client_id = %call.client_id, creator_id = %call.creator_id, kind = %call.kind, "call registered");
        self.state.events.publish(&call.creator_id, EventKind::IncomingCall, &call);
        Ok(call)
    }

    pub async fn update_status(&self, caller: &AuthUser, input: UpdateCall) -> ServiceResult<Call> {
        let current = self.participant_call(caller, &input.call_id).await?;
        let next = input.status;
        if !current.status.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition {
                from: current.status.to_string(),
                to: next.to_string(),
            });
        }

        let now = Utc::now();
        let mut call = current.clone();
        call.status = next;
        match next {
            CallStatus::Ongoing => call.started_at = Some(now),
            CallStatus::Ended => {
                let cap = i64::from(self.state.config.billing.max_session_minutes) * 60;
                let elapsed = call.started_at.map(|s| (now - s).num_seconds()).unwrap_or(0);
                call.ended_at = Some(now);
                call.duration_secs = Some(elapsed.clamp(0, cap));
            }
            _ => call.ended_at = Some(now),
        }

        let call = self.state.store.transition_call(current.status, call).await?;
        tracing::info!(call_id = %call.call_id, from = %current.status, to = %call.status, "call status changed");

        for user_id in [&call.client_id, &call.creator_id] {
            self.state.events.publish(user_id, EventKind::CallStatus, &call);
        }
        if call.status == CallStatus::Missed {
            NotificationService::new(self.state)
                .notify_quietly(
                    &call.creator_id,
                    NotificationKind::Call,
                    "Missed call",
                    format!("You missed a {} call", call.kind),
                )
                .await;
        }
        Ok(call)
    }

    /// Bills an ended call. Repeating returns the original settlement.
    pub async fn settle(&self, caller: &AuthUser, call_id: &str) -> ServiceResult<CallView> {
        let call = self.participant_call(caller, call_id).await?;
        if call.status != CallStatus::Ended {
            return Err(ServiceError::Conflict(format!("call {} is {}, not ended", call.call_id, call.status)));
        }

        let settlement = settlement::settle(
            self.state,
            FinishedSession {
                session_id: &call.call_id,
                kind: call.kind,
                client_id: &call.client_id,
                creator_id: &call.creator_id,
                duration_secs: call.duration_secs.unwrap_or(0),
            },
        )
        .await?;
        Ok(CallView { call, settlement: Some(settlement) })
    }

    pub async fn get(&self, caller: &AuthUser, call_id: &str) -> ServiceResult<CallView> {
        let call = self.participant_call(caller, call_id).await?;
        let settlement = self.state.store.get_settlement(&call.call_id).await?;
        Ok(CallView { call, settlement })
    }

    pub async fn list(&self, caller: &AuthUser, page: Page) -> ServiceResult<Vec<Call>> {
        Ok(self.state.store.list_calls_for_user(&caller.user_id, page.clamped()).await?)
    }

    /// Seconds of `kind` with `creator_id` the caller's balance pays for.
    pub async fn max_duration(&self, caller: &AuthUser, creator_id: &str, kind: SessionKind) -> ServiceResult<MaxDuration> {
        let creator = UserService::new(self.state).get_creator(creator_id).await?;
        let rate = creator.rates.for_kind(kind);
        let balance = self
            .state
            .store
            .get_wallet(&caller.user_id)
            .await?
            .map(|w| w.balance)
            .unwrap_or(Decimal::ZERO);

        Ok(MaxDuration {
            creator_id: creator.id,
            kind,
            rate,
            balance,
            max_duration_secs: billing::max_duration_secs(balance, rate, self.state.config.billing.max_session_minutes),
        })
    }

    async fn participant_call(&self, caller: &AuthUser, call_id: &str) -> ServiceResult<Call> {
        let call = self
            .state
            .store
            .get_call(call_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("call {}", call_id)))?;
        if !call.is_participant(&caller.user_id) && !caller.is_admin() {
            return Err(ServiceError::Forbidden(format!("not a participant of call {}", call_id)));
        }
        Ok(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::{Client, Rates, Services, TransactionCategory};
    use crate::services::users::{RegisterCreator, UserService};
    use crate::services::wallet::{AddMoney, WalletService};
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    struct Fixture {
        state: AppState,
        client: AuthUser,
        creator: AuthUser,
    }

    async fn fixture(balance: &str) -> Fixture {
        let state = AppState::in_memory(AppConfig::development());
        let creator = AuthUser::new("creator_1", Role::Creator);
        let client = AuthUser::new("client_1", Role::Client);

        UserService::new(&state)
            .register_creator(
                &creator,
                RegisterCreator {
                    username: "asha".to_string(),
                    full_name: "Asha Rao".to_string(),
                    phone: None,
                    bio: None,
                    photo_url: None,
                    rates: Some(Rates { video: d("10"), audio: d("6"), chat: d("2") }),
                    services: Some(Services { video: true, audio: false, chat: true }),
                },
            )
            .await
            .unwrap();
        let now = Utc::now();
        state
            .store
            .insert_client(Client {
                id: client.user_id.clone(),
                username: "ravi".to_string(),
                full_name: "Ravi".to_string(),
                phone: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        if d(balance) > Decimal::ZERO {
            WalletService::new(&state)
                .add_money(&client, AddMoney { user_id: client.user_id.clone(), amount: d(balance), reference: None })
                .await
                .unwrap();
        }
        Fixture { state, client, creator }
    }

    fn video_call(call_id: &str) -> RegisterCall {
        RegisterCall {
            call_id: call_id.to_string(),
            kind: SessionKind::Video,
            creator_id: "creator_1".to_string(),
        }
    }

    #[tokio::test]
    async fn register_checks_service_funds_and_duplicates() {
        let f = fixture("20").await;
        let calls = CallService::new(&f.state);

        let audio = RegisterCall { kind: SessionKind::Audio, ..video_call("c0") };
        assert!(matches!(calls.register(&f.client, audio).await, Err(ServiceError::Conflict(_))));

        let mut incoming = f.state.events.subscribe("creator_1");
        let call = calls.register(&f.client, video_call("c1")).await.unwrap();
        assert_eq!(call.status, CallStatus::Initiated);
        assert_eq!(incoming.next().await.unwrap().kind, EventKind::IncomingCall);

        assert!(matches!(calls.register(&f.client, video_call("c1")).await, Err(ServiceError::Conflict(_))));
        assert!(matches!(
            calls.register(&f.creator, video_call("c2")).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn register_requires_one_minute_of_balance() {
        let f = fixture("0").await;
        let err = CallService::new(&f.state)
            .register(&f.client, video_call("c1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientFunds(_)));
    }

    #[tokio::test]
    async fn lifecycle_rejects_illegal_transitions() {
        let f = fixture("20").await;
        let calls = CallService::new(&f.state);
        calls.register(&f.client, video_call("c1")).await.unwrap();

        let update = |status| UpdateCall { call_id: "c1".to_string(), status };
        let err = calls.update_status(&f.creator, update(CallStatus::Ended)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));

        let ongoing = calls.update_status(&f.creator, update(CallStatus::Ongoing)).await.unwrap();
        assert!(ongoing.started_at.is_some());
        let ended = calls.update_status(&f.client, update(CallStatus::Ended)).await.unwrap();
        assert_eq!(ended.status, CallStatus::Ended);
        assert!(ended.duration_secs.is_some());

        let err = calls.update_status(&f.client, update(CallStatus::Ongoing)).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition { .. }));

        let stranger = AuthUser::new("someone", Role::Client);
        assert!(matches!(calls.get(&stranger, "c1").await, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn settlement_moves_money_once() {
        let f = fixture("100").await;
        let calls = CallService::new(&f.state);
        calls.register(&f.client, video_call("c1")).await.unwrap();

        let early = calls.settle(&f.client, "c1").await.unwrap_err();
        assert!(matches!(early, ServiceError::Conflict(_)));

        let mut call = f.state.store.get_call("c1").await.unwrap().unwrap();
        call.status = CallStatus::Ended;
        call.duration_secs = Some(90);
        f.state.store.transition_call(CallStatus::Initiated, call).await.unwrap();

        let first = calls.settle(&f.client, "c1").await.unwrap();
        let settlement = first.settlement.unwrap();
        assert_eq!(settlement.amount_due, d("15.00"));
        assert_eq!(settlement.amount_charged, d("15.00"));
        assert_eq!(settlement.platform_fee, d("3.00"));
        assert_eq!(settlement.creator_earning, d("12.00"));

        let again = calls.settle(&f.creator, "c1").await.unwrap();
        assert_eq!(again.settlement.unwrap(), settlement);

        let client_wallet = f.state.store.get_wallet("client_1").await.unwrap().unwrap();
        let creator_wallet = f.state.store.get_wallet("creator_1").await.unwrap().unwrap();
        assert_eq!(client_wallet.balance, d("85.00"));
        assert_eq!(creator_wallet.balance, d("12.00"));

        let creator_rows = f.state.store.list_transactions("creator_1", Page::default()).await.unwrap();
        assert_eq!(creator_rows.len(), 1);
        assert_eq!(creator_rows[0].category, TransactionCategory::SessionEarning);
    }

    #[tokio::test]
    async fn max_duration_reflects_balance() {
        let f = fixture("25").await;
        let max = CallService::new(&f.state)
            .max_duration(&f.client, "creator_1", SessionKind::Video)
            .await
            .unwrap();
        assert_eq!(max.max_duration_secs, 150);
        assert_eq!(max.rate, d("10"));
    }
}
