use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{ensure_role, ensure_self_or_admin, ServiceError, ServiceResult};
use crate::auth::AuthUser;
use crate::billing;
use crate::database::models::{Client, Creator, Rates, Role, Services};
use crate::state::AppState;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 30;
const NAME_MAX: usize = 100;
const BIO_MAX: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct RegisterCreator {
    pub username: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub rates: Option<Rates>,
    #[serde(default)]
    pub services: Option<Services>,
}

/// Partial profile update; absent fields are left alone
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCreator {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub rates: Option<Rates>,
    pub services: Option<Services>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterClient {
    pub username: String,
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateClient {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// Lowercases and checks `[a-z0-9_.]{3,30}`.
pub fn normalize_username(raw: &str) -> ServiceResult<String> {
    let username = raw.trim().to_lowercase();
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(ServiceError::invalid_field(
            "username",
            format!("must be {} to {} characters", USERNAME_MIN, USERNAME_MAX),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
    {
        return Err(ServiceError::invalid_field(
            "username",
            "may only contain letters, digits, '_' and '.'",
        ));
    }
    Ok(username)
}

/// Stable 8-character code other creators use to name their referrer.
pub fn referral_code_for(creator_id: &str) -> String {
    let digest = Sha256::digest(creator_id.as_bytes());
    digest[..4].iter().map(|b| format!("{:02X}", b)).collect()
}

/// Checks each rate and returns them normalized to cents.
fn validate_rates(rates: Rates) -> ServiceResult<Rates> {
    for (field, rate) in [("rates.video", rates.video), ("rates.audio", rates.audio), ("rates.chat", rates.chat)] {
        if rate < Decimal::ZERO || (!rate.is_zero() && !billing::is_valid_amount(rate)) {
            return Err(ServiceError::invalid_field(
                field,
                "must be a non-negative amount with at most 2 decimals",
            ));
        }
    }
    Ok(Rates {
        video: billing::round_money(rates.video),
        audio: billing::round_money(rates.audio),
        chat: billing::round_money(rates.chat),
    })
}

fn optional_text(field: &str, value: Option<String>, max_chars: usize) -> ServiceResult<Option<String>> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Ok(None),
        Some(v) if v.chars().count() > max_chars => Err(ServiceError::invalid_field(
            field,
            format!("must be at most {} characters", max_chars),
        )),
        other => Ok(other),
    }
}

pub struct UserService<'a> {
    state: &'a AppState,
}

impl<'a> UserService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn register_creator(&self, caller: &AuthUser, input: RegisterCreator) -> ServiceResult<Creator> {
        ensure_role(caller, Role::Creator)?;
        let rates = validate_rates(input.rates.unwrap_or_default())?;

        let now = Utc::now();
        let creator = Creator {
            id: caller.user_id.clone(),
            username: normalize_username(&input.username)?,
            full_name: super::required_text("full_name", &input.full_name, NAME_MAX)?,
            phone: optional_text("phone", input.phone, 20)?,
            bio: optional_text("bio", input.bio, BIO_MAX)?,
            photo_url: optional_text("photo_url", input.photo_url, 2048)?,
            rates,
            services: input.services.unwrap_or_default(),
            online: false,
            referral_code: referral_code_for(&caller.user_id),
            availability: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let creator = self.state.store.insert_creator(creator).await?;
        tracing::info!(user_id = %creator.id, username = %creator.username, "creator registered");
        Ok(creator)
    }

    pub async fn get_creator(&self, id: &str) -> ServiceResult<Creator> {
        self.state
            .store
            .get_creator(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("creator {}", id)))
    }

    pub async fn get_creator_by_username(&self, username: &str) -> ServiceResult<Creator> {
        let username = username.trim().to_lowercase();
        self.state
            .store
            .get_creator_by_username(&username)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("creator '{}'", username)))
    }

    pub async fn update_creator(&self, caller: &AuthUser, id: &str, update: UpdateCreator) -> ServiceResult<Creator> {
        ensure_self_or_admin(caller, id)?;
        let mut creator = self.get_creator(id).await?;

        if let Some(username) = update.username {
            creator.username = normalize_username(&username)?;
        }
        if let Some(full_name) = update.full_name {
            creator.full_name = super::required_text("full_name", &full_name, NAME_MAX)?;
        }
        if update.phone.is_some() {
            creator.phone = optional_text("phone", update.phone, 20)?;
        }
        if update.bio.is_some() {
            creator.bio = optional_text("bio", update.bio, BIO_MAX)?;
        }
        if update.photo_url.is_some() {
            creator.photo_url = optional_text("photo_url", update.photo_url, 2048)?;
        }
        if let Some(rates) = update.rates {
            creator.rates = validate_rates(rates)?;
        }
        if let Some(services) = update.services {
            creator.services = services;
        }
        creator.updated_at = Utc::now();

        Ok(self.state.store.update_creator(creator).await?)
    }

    pub async fn set_online(&self, caller: &AuthUser, id: &str, online: bool) -> ServiceResult<Creator> {
        ensure_self_or_admin(caller, id)?;
        let mut creator = self.get_creator(id).await?;
        creator.online = online;
        creator.updated_at = Utc::now();
        let creator = self.state.store.update_creator(creator).await?;
        tracing::debug!(user_id = %creator.id, online, "creator status changed");
        Ok(creator)
    }

    pub async fn register_client(&self, caller: &AuthUser, input: RegisterClient) -> ServiceResult<Client> {
        let now = Utc::now();
        let client = Client {
            id: caller.user_id.clone(),
            username: normalize_username(&input.username)?,
            full_name: super::required_text("full_name", &input.full_name, NAME_MAX)?,
            phone: optional_text("phone", input.phone, 20)?,
            created_at: now,
            updated_at: now,
        };
        let client = self.state.store.insert_client(client).await?;
        tracing::info!(user_id = %client.id, "client registered");
        Ok(client)
    }

    pub async fn get_client(&self, caller: &AuthUser, id: &str) -> ServiceResult<Client> {
        ensure_self_or_admin(caller, id)?;
        self.state
            .store
            .get_client(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("client {}", id)))
    }

    pub async fn update_client(&self, caller: &AuthUser, id: &str, update: UpdateClient) -> ServiceResult<Client> {
        let mut client = self.get_client(caller, id).await?;
        if let Some(username) = update.username {
            client.username = normalize_username(&username)?;
        }
        if let Some(full_name) = update.full_name {
            client.full_name = super::required_text("full_name", &full_name, NAME_MAX)?;
        }
        if update.phone.is_some() {
            client.phone = optional_text("phone", update.phone, 20)?;
        }
        client.updated_at = Utc::now();
        Ok(self.state.store.update_client(client).await?)
    }
}
