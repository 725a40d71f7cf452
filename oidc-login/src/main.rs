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

//! OIDC login server entry point.
//!
//! A standalone Axum service that runs the authorization-code login, links the
//! external identity to a local account, and issues local session cookies.

use std::sync::Arc;

use oidc_login::config::Config;
use oidc_login::db::PgStores;
use oidc_login::login::{Collaborators, LoginService, TracingLoginEvents};
use oidc_login::oauth::{HttpProviderClient, JwksCache, ProviderEndpoints, TokenVerifier};
use oidc_login::routes;
use oidc_login::state::AppState;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().expect("failed to load configuration");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to PostgreSQL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    tracing::info!("Connected to PostgreSQL");

    let provider_config = Arc::new(config.provider.clone());
    let http = reqwest::Client::builder()
        .timeout(provider_config.http_timeout)
        .build()
        .expect("failed to build HTTP client");
    let endpoints =
        ProviderEndpoints::from_config(&provider_config).expect("invalid OIDC_DOMAIN");
    let jwks = JwksCache::new(endpoints.jwks().to_string(), http.clone());
    let verifier =
        TokenVerifier::from_config(&provider_config, jwks).expect("invalid ID token key material");
    let provider = Arc::new(HttpProviderClient::new(
        http,
        endpoints.clone(),
        &provider_config,
    ));

    let stores = Arc::new(PgStores::new(pool));
    let login = LoginService::new(
        provider_config,
        endpoints,
        verifier,
        Collaborators {
            accounts: stores.clone(),
            links: stores.clone(),
            nonces: stores,
            provider,
            events: Arc::new(TracingLoginEvents),
        },
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState::new(Arc::new(login), &config);
    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind listener");

    tracing::info!("OIDC login service listening on {}", config.listen_addr);

    axum::serve(listener, app).await.expect("server error");
}
