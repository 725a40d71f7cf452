/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! Resolution of an external profile to a local account.
//!
//! Known external ids sign in to their linked account. Unknown ones either join
//! an existing account (by email or username, when enabled) or get a freshly
//! created account. Both first-time paths persist a new [`IdentityLink`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::account::{AccountStatus, IdentityLink, LocalAccount, NewAccount};
use super::error::{LoginError, StoreError};
use super::events::LoginEvents;
use super::mapping::ClaimMapper;
use super::profile::ExternalProfile;
use crate::config::ProviderConfig;
use crate::oauth::ProviderClient;
use crate::store::{AccountStore, IdentityLinkStore};

const GENERATED_PASSWORD_LEN: usize = 24;

/// How the external identity was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Already linked; logged in to the linked account.
    SignedIn,
    /// First login, attached to an existing account.
    Joined,
    /// First login, new account created.
    Created,
}

#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub account: LocalAccount,
    pub resolution: Resolution,
}

/// In-process keyed locks serializing first logins of the same external id.
#[derive(Default)]
pub struct SubjectLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SubjectLocks {
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

pub struct IdentityLinker {
    accounts: Arc<dyn AccountStore>,
    links: Arc<dyn IdentityLinkStore>,
    provider: Arc<dyn ProviderClient>,
    events: Arc<dyn LoginEvents>,
    mapper: ClaimMapper,
    username_claim: String,
    join_by_email: bool,
    join_by_username: bool,
    locks: SubjectLocks,
}

impl IdentityLinker {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        links: Arc<dyn IdentityLinkStore>,
        provider: Arc<dyn ProviderClient>,
        events: Arc<dyn LoginEvents>,
        config: &ProviderConfig,
    ) -> Self {
        Self {
            accounts,
            links,
            provider,
            events,
            mapper: ClaimMapper::new(
                &config.attribute_mapping,
                config.role_claim.as_deref(),
                &config.role_mapping,
            ),
            username_claim: config.username_claim.clone(),
            join_by_email: config.join_by_email,
            join_by_username: config.join_by_username,
            locks: SubjectLocks::default(),
        }
    }

    /// Resolve `profile` to a local account. `id_token` authorizes the
    /// management-API identity lookup on the first-time path.
    pub async fn resolve(
        &self,
        profile: &ExternalProfile,
        id_token: &str,
    ) -> Result<LinkOutcome, LoginError> {
        if let Some(link) = self.links.find(&profile.user_id).await? {
            return self.sign_in(link, profile).await;
        }

        let _guard = self.locks.acquire(&profile.user_id).await;
        if let Some(link) = self.links.find(&profile.user_id).await? {
            return self.sign_in(link, profile).await;
        }

        let profile = self.with_identities(profile, id_token).await;
        let (mut account, resolution) = match self.join_candidate(&profile).await? {
            Some(account) => {
                if !profile.email_verified {
                    warn!(
                        external_id = %profile.user_id,
                        account_id = account.id,
                        "refusing to join an existing account with an unverified email"
                    );
                    return Err(LoginError::EmailNotVerified);
                }
                (account, Resolution::Joined)
            }
            None => (self.create_account(&profile).await?, Resolution::Created),
        };

        self.apply_mapping(&profile, &mut account).await?;

        let link = IdentityLink {
            external_id: profile.user_id.clone(),
            account_id: account.id,
            profile: profile.snapshot(),
        };
        match self.links.insert(&link).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                warn!(
                    external_id = %profile.user_id,
                    account_id = account.id,
                    ?resolution,
                    "identity linked concurrently, continuing with the existing link"
                );
                let existing = self
                    .links
                    .find(&profile.user_id)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(format!("link {}", profile.user_id)))?;
                return self.sign_in(existing, &profile).await;
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            external_id = %profile.user_id,
            account_id = account.id,
            ?resolution,
            "linked external identity"
        );
        self.events.signup(&account, &profile);
        Ok(LinkOutcome {
            account,
            resolution,
        })
    }

    async fn sign_in(
        &self,
        link: IdentityLink,
        profile: &ExternalProfile,
    ) -> Result<LinkOutcome, LoginError> {
        let mut account = self
            .accounts
            .load(link.account_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("account {}", link.account_id)))?;

        self.links
            .update_profile(&profile.user_id, &profile.snapshot())
            .await?;
        self.apply_mapping(profile, &mut account).await?;
        self.events.signin(&account, profile);

        Ok(LinkOutcome {
            account,
            resolution: Resolution::SignedIn,
        })
    }

    async fn apply_mapping(
        &self,
        profile: &ExternalProfile,
        account: &mut LocalAccount,
    ) -> Result<(), StoreError> {
        let edit = self.mapper.apply(profile, account);
        if !edit.is_empty() {
            debug!(account_id = account.id, ?edit, "saving mapped claims");
            self.accounts.save(account.id, &edit).await?;
        }
        Ok(())
    }

    /// The profile with its identity records, fetched from the management API
    /// when the userinfo response did not carry them.
    async fn with_identities(&self, profile: &ExternalProfile, id_token: &str) -> ExternalProfile {
        if !profile.identities.is_empty() {
            return profile.clone();
        }
        match self
            .provider
            .fetch_identities(&profile.user_id, id_token)
            .await
        {
            Ok(identities) => profile.with_identities(identities),
            Err(e) => {
                warn!(external_id = %profile.user_id, "failed to fetch identities: {e}");
                profile.clone()
            }
        }
    }

    /// An existing account the external identity may attach to.
    ///
    /// An email match is returned whatever the verification state, so that the
    /// caller rejects unverified emails that collide with an existing account.
    /// A username match requires a verified email or a database identity.
    async fn join_candidate(
        &self,
        profile: &ExternalProfile,
    ) -> Result<Option<LocalAccount>, StoreError> {
        if self.join_by_email {
            if let Some(email) = &profile.email {
                if let Some(account) = self.accounts.find_by_email(email).await? {
                    return Ok(Some(account));
                }
            }
        }

        let trusted = profile.email_verified || profile.is_database_user();
        if self.join_by_username && trusted {
            if let Some(username) = profile.claim_str(&self.username_claim) {
                return self.accounts.find_by_username(&username).await;
            }
        }
        Ok(None)
    }

    async fn create_account(&self, profile: &ExternalProfile) -> Result<LocalAccount, StoreError> {
        let base = profile
            .claim_str(&self.username_claim)
            .unwrap_or_else(|| profile.user_id.clone());
        let username = if self.accounts.find_by_username(&base).await?.is_some() {
            with_timestamp(&base)
        } else {
            base.clone()
        };

        let email = profile
            .email
            .clone()
            .unwrap_or_else(|| format!("change_this_email@{}.com", Uuid::new_v4()));
        let new = NewAccount {
            username,
            email,
            password_hash: hash_password(&random_password())?,
            status: AccountStatus::Active,
        };

        match self.accounts.create(new.clone()).await {
            Err(StoreError::Conflict(_)) => {
                self.accounts
                    .create(NewAccount {
                        username: with_timestamp(&base),
                        ..new
                    })
                    .await
            }
            other => other,
        }
    }
}

fn with_timestamp(username: &str) -> String {
    format!("{username}{}", Utc::now().timestamp())
}

fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Encoding(format!("password hash error: {e}")))
}
