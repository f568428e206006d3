//! Money movement shared by finished calls and chats.

use crate::billing;
use crate::database::models::{NotificationKind, SessionKind, Settlement};
use crate::database::SettlementPlan;
use crate::events::EventKind;
use crate::state::AppState;

use super::{NotificationService, ServiceError, ServiceResult};

/// The billable facts of one finished session
pub(crate) struct FinishedSession<'s> {
    pub session_id: &'s str,
    pub kind: SessionKind,
    pub client_id: &'s str,
    pub creator_id: &'s str,
    pub duration_secs: i64,
}

/// Charges the client and pays the creator for a finished session.
///
/// Safe to repeat: the store keeps one settlement per session id, and a
/// replay returns it without touching either wallet.
pub(crate) async fn settle(state: &AppState, session: FinishedSession<'_>) -> ServiceResult<Settlement> {
    if let Some(existing) = state.store.get_settlement(session.session_id).await? {
        return Ok(existing);
    }

    let creator = state
        .store
        .get_creator(session.creator_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("creator {}", session.creator_id)))?;
    let rate = billing::round_money(creator.rates.for_kind(session.kind));
    let amount_due = billing::session_cost(rate, session.duration_secs);

    let outcome = state
        .store
        .settle_session(SettlementPlan {
            session_id: session.session_id.to_string(),
            session_kind: session.kind,
            client_id: session.client_id.to_string(),
            creator_id: session.creator_id.to_string(),
            rate,
            duration_secs: session.duration_secs,
            amount_due,
            commission_percent: state.config.billing.commission_percent,
        })
        .await?;

    let settlement = outcome.settlement;
    if outcome.replayed {
        return Ok(settlement);
    }

    tracing::info!(
        session_id = %settlement.session_id,
        client_id = %settlement.client_id,
        creator_id = %settlement.creator_id,
        amount = %settlement.amount_charged,
        fee = %settlement.platform_fee,
        "session settled"
    );
    if settlement.amount_charged < settlement.amount_due {
        tracing::warn!(
            session_id = %settlement.session_id,
            due = %settlement.amount_due,
            charged = %settlement.amount_charged,
            "client balance did not cover the session"
        );
    }

    announce(state, &settlement).await;
    Ok(settlement)
}

async fn announce(state: &AppState, settlement: &Settlement) {
    for user_id in [&settlement.client_id, &settlement.creator_id] {
        match state.store.get_wallet(user_id).await {
            Ok(Some(wallet)) => state.events.publish(user_id, EventKind::WalletUpdated, &wallet),
            Ok(None) => {}
            Err(e) => tracing::warn!(user_id = %user_id, "could not reload wallet: {}", e),
        }
    }

    if settlement.amount_charged.is_zero() {
        return;
    }
    let notifications = NotificationService::new(state);
    notifications
        .notify_quietly(
            &settlement.client_id,
            NotificationKind::Payment,
            "Session charged",
            format!(
                "{} charged for your {} session",
                settlement.amount_charged, settlement.session_kind
            ),
        )
        .await;
    notifications
        .notify_quietly(
            &settlement.creator_id,
            NotificationKind::Payment,
            "Earnings credited",
            format!(
                "{} earned from a {} session",
                settlement.creator_earning, settlement.session_kind
            ),
        )
        .await;
}
