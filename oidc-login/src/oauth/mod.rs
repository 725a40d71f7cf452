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

//! OIDC helpers: endpoint and authorize-URL construction, JWKS caching,
//! ID token verification, and delegated calls to the provider.

pub mod authorize;
pub mod jwks;
pub mod provider;
pub mod verify;

pub use authorize::{build_authorize_url, build_logout_url, ProviderEndpoints, PROMPT_NONE, SCOPE};
pub use jwks::JwksCache;
pub use provider::{HttpProviderClient, ProviderClient, ProviderTokens};
pub use verify::{IdTokenClaims, TokenVerifier};
