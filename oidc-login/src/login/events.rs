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

//! Login lifecycle events.
//!
//! The linker and the orchestrator call the sink synchronously, after the
//! corresponding state has been committed.

use tracing::info;

use super::account::LocalAccount;
use super::profile::ExternalProfile;

pub trait LoginEvents: Send + Sync {
    /// A verified external profile is about to be linked.
    fn pre_login(&self, profile: &ExternalProfile);

    /// An existing local account logged in.
    fn signin(&self, account: &LocalAccount, profile: &ExternalProfile);

    /// An external identity was linked for the first time (new or joined account).
    fn signup(&self, account: &LocalAccount, profile: &ExternalProfile);
}

/// Default sink: log every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLoginEvents;

impl LoginEvents for TracingLoginEvents {
    fn pre_login(&self, profile: &ExternalProfile) {
        info!(external_id = %profile.user_id, "pre-login");
    }

    fn signin(&self, account: &LocalAccount, profile: &ExternalProfile) {
        info!(
            external_id = %profile.user_id,
            account_id = account.id,
            username = %account.username,
            "signin"
        );
    }

    fn signup(&self, account: &LocalAccount, profile: &ExternalProfile) {
        info!(
            external_id = %profile.user_id,
            account_id = account.id,
            username = %account.username,
            "signup"
        );
    }
}
