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

//! In-memory store implementations guarded by async mutexes.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{
    AccountStore, IdentityLinkStore, NonceRepository, NonceTake, MAX_OUTSTANDING_NONCES,
    NONCE_TTL,
};
use crate::login::account::{AccountEdit, AccountId, IdentityLink, LocalAccount, NewAccount};
use crate::login::error::StoreError;

#[derive(Default)]
struct AccountTable {
    next_id: AccountId,
    rows: BTreeMap<AccountId, (LocalAccount, String)>,
}

/// Account store backed by a map.
#[derive(Default)]
pub struct MemoryAccountStore {
    table: Mutex<AccountTable>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Password hash stored for an account.
    pub async fn password_hash(&self, id: AccountId) -> Option<String> {
        let table = self.table.lock().await;
        table.rows.get(&id).map(|(_, hash)| hash.clone())
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn load(&self, id: AccountId) -> Result<Option<LocalAccount>, StoreError> {
        let table = self.table.lock().await;
        Ok(table.rows.get(&id).map(|(account, _)| account.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<LocalAccount>, StoreError> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .map(|(account, _)| account)
            .find(|account| account.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<LocalAccount>, StoreError> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .map(|(account, _)| account)
            .find(|account| account.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn create(&self, new: NewAccount) -> Result<LocalAccount, StoreError> {
        let mut table = self.table.lock().await;
        if table
            .rows
            .values()
            .any(|(account, _)| account.username.eq_ignore_ascii_case(&new.username))
        {
            return Err(StoreError::Conflict(format!("username {}", new.username)));
        }
        table.next_id += 1;
        let account = LocalAccount {
            id: table.next_id,
            username: new.username,
            email: new.email,
            status: new.status,
            attributes: BTreeMap::new(),
            roles: Default::default(),
        };
        table
            .rows
            .insert(account.id, (account.clone(), new.password_hash));
        Ok(account)
    }

    async fn save(&self, id: AccountId, edit: &AccountEdit) -> Result<(), StoreError> {
        let mut table = self.table.lock().await;
        let (account, _) = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
        for (key, value) in &edit.attributes {
            account.attributes.insert(key.clone(), value.clone());
        }
        for role in &edit.roles_revoked {
            account.roles.remove(role);
        }
        account.roles.extend(edit.roles_granted.iter().cloned());
        Ok(())
    }
}

/// Identity-link table backed by a map keyed on external id.
#[derive(Default)]
pub struct MemoryIdentityLinkStore {
    links: Mutex<HashMap<String, IdentityLink>>,
}

impl MemoryIdentityLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.links.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl IdentityLinkStore for MemoryIdentityLinkStore {
    async fn find(&self, external_id: &str) -> Result<Option<IdentityLink>, StoreError> {
        Ok(self.links.lock().await.get(external_id).cloned())
    }

    async fn insert(&self, link: &IdentityLink) -> Result<(), StoreError> {
        let mut links = self.links.lock().await;
        if links.contains_key(&link.external_id) {
            return Err(StoreError::Conflict(format!(
                "identity link {}",
                link.external_id
            )));
        }
        links.insert(link.external_id.clone(), link.clone());
        Ok(())
    }

    async fn update_profile(&self, external_id: &str, profile: &Value) -> Result<(), StoreError> {
        let mut links = self.links.lock().await;
        let link = links
            .get_mut(external_id)
            .ok_or_else(|| StoreError::NotFound(format!("identity link {external_id}")))?;
        link.profile = profile.clone();
        Ok(())
    }
}

/// Session nonce lists. The single mutex makes every take atomic.
pub struct MemoryNonceRepository {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Vec<(String, Instant)>>>,
}

impl Default for MemoryNonceRepository {
    fn default() -> Self {
        Self::with_ttl(NONCE_TTL)
    }
}

impl MemoryNonceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn live(&self, issued_at: Instant) -> bool {
        issued_at.elapsed() < self.ttl
    }
}

#[async_trait]
impl NonceRepository for MemoryNonceRepository {
    async fn append(&self, session_id: &str, nonce: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, list| {
            list.retain(|(_, issued_at)| self.live(*issued_at));
            !list.is_empty()
        });
        let list = sessions.entry(session_id.to_string()).or_default();
        list.push((nonce.to_string(), Instant::now()));
        if list.len() > MAX_OUTSTANDING_NONCES {
            let excess = list.len() - MAX_OUTSTANDING_NONCES;
            list.drain(..excess);
        }
        Ok(())
    }

    async fn take(&self, session_id: &str, nonce: &str) -> Result<NonceTake, StoreError> {
        let mut sessions = self.sessions.lock().await;
        let Some(list) = sessions.get_mut(session_id) else {
            return Ok(NonceTake::NoneOutstanding);
        };
        list.retain(|(_, issued_at)| self.live(*issued_at));
        if list.is_empty() {
            return Ok(NonceTake::NoneOutstanding);
        }
        match list.iter().position(|(n, _)| n == nonce) {
            Some(index) => {
                list.remove(index);
                Ok(NonceTake::Consumed)
            }
            None => Ok(NonceTake::NotFound),
        }
    }

    async fn outstanding(&self, session_id: &str) -> Result<Vec<String>, StoreError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(session_id)
            .map(|list| {
                list.iter()
                    .filter(|(_, issued_at)| self.live(*issued_at))
                    .map(|(nonce, _)| nonce.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}
