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

//! Request types for the login service.
//!
//! These types define the shape of query strings and form bodies. They are
//! used by both the server (for deserialization) and clients (for serialization).

use serde::{Deserialize, Serialize};

/// Query string or form body delivered to `GET|POST /callback`.
///
/// `code` is consumed by the token exchange; `state` carries the nonce issued
/// when the authorize URL was built.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CallbackParams {
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub error_description: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub code: Option<String>,

    /// Explicit post-login destination. Falls back to the account's profile page.
    #[serde(default)]
    pub destination: Option<String>,
}

/// Form body for `POST /verify_email`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyEmailRequest {
    #[serde(rename = "idToken")]
    pub id_token: String,
}
