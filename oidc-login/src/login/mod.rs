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

//! The login core: nonces, claim mapping, identity linking, and the callback
//! orchestrator that ties them together.

pub mod account;
pub mod error;
pub mod events;
pub mod linker;
pub mod mapping;
pub mod nonce;
pub mod profile;
pub mod service;

pub use error::{LoginError, ProviderError, ResendError, StoreError, TokenError};
pub use events::{LoginEvents, TracingLoginEvents};
pub use linker::{IdentityLinker, LinkOutcome, Resolution};
pub use service::{CallbackOutcome, Collaborators, LoginService};
