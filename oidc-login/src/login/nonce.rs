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

//! Single-use state nonces bound to the browser session that started the login.

use std::sync::Arc;

use oauth2::CsrfToken;
use tracing::{debug, warn};

use super::error::StoreError;
use crate::store::{NonceRepository, NonceTake};

/// Random bytes per nonce, before encoding.
pub const NONCE_BYTES: u32 = 32;

/// Issues nonces into a session's outstanding list and consumes them once.
///
/// Several nonces may be outstanding at the same time (one per login tab).
#[derive(Clone)]
pub struct NonceStore {
    repo: Arc<dyn NonceRepository>,
}

impl NonceStore {
    pub fn new(repo: Arc<dyn NonceRepository>) -> Self {
        Self { repo }
    }

    /// Generate a fresh nonce, append it to the session's list, and return it.
    pub async fn issue(&self, session_id: &str) -> Result<String, StoreError> {
        let nonce = CsrfToken::new_random_len(NONCE_BYTES).secret().clone();
        self.repo.append(session_id, &nonce).await?;
        debug!(session_id, "issued login nonce");
        Ok(nonce)
    }

    /// Remove `candidate` from the session's list. Returns `false` (list
    /// untouched) when the session has no such nonce.
    pub async fn consume(&self, session_id: &str, candidate: &str) -> Result<bool, StoreError> {
        match self.repo.take(session_id, candidate).await? {
            NonceTake::Consumed => Ok(true),
            NonceTake::NoneOutstanding => {
                warn!(session_id, "failed to compare nonce: no outstanding states");
                Ok(false)
            }
            NonceTake::NotFound => {
                warn!(session_id, "failed to compare nonce: state not found");
                Ok(false)
            }
        }
    }
}
