//! Accounta is a lightweight account backend with a reward wallet.

#![forbid(unsafe_code)]

pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod image;
mod router;
#[cfg(test)]
pub mod testing;
pub mod token;
pub mod user;
pub mod wallet;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::routing::post;
pub use error::ServerError;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

use crate::crypto::PasswordManager;
use crate::image::{
    Cloudinary, ObjectStore, ProfileImageManager, TempStorage, UploadPolicy,
};
use crate::token::TokenManager;
use crate::user::{PgUserStore, UserStore};
use crate::wallet::{PgWalletStore, WalletStore};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub users: Arc<dyn UserStore>,
    pub images: Arc<ProfileImageManager>,
    pub token: TokenManager,
    pub crypto: Arc<PasswordManager>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    DefaultOnResponse::new()
                        .latency_unit(LatencyUnit::Micros),
                ),
        )
        // Set a timeout.
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
        ]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    let body_limit = state.config.upload.max_size_bytes + 1024;

    let api = Router::new()
        // `POST /auth/sign-up` goes to `create`.
        .route("/auth/sign-up", post(router::create::handler))
        // `POST /auth/login` goes to `login`.
        .route("/auth/login", post(router::login::handler))
        // `POST /auth/refresh-token` goes to `refresh`.
        .route("/auth/refresh-token", post(router::login::refresh_handler))
        .merge(router::users::router(state.clone()));

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>>
{
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let db = match config.postgres {
        Some(ref pg) => {
            database::Database::new(
                &pg.address,
                &pg.username
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &pg.password
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &pg.database
                    .clone()
                    .unwrap_or(database::DEFAULT_DATABASE_NAME.into()),
                pg.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        None => {
            tracing::error!("missing `postgres` entry on `config.yaml` file");
            std::process::exit(0);
        },
    };

    // execute migrations scripts on start.
    sqlx::migrate!().run(&db.postgres).await?;

    let Some(token_config) = &config.token else {
        tracing::error!("missing `token` entry on `config.yaml` file");
        std::process::exit(0);
    };
    let token = TokenManager::new(&token_config.secret, config.url.clone());

    let Some(cloudinary_config) = &config.cloudinary else {
        tracing::error!("missing `cloudinary` entry on `config.yaml` file");
        std::process::exit(0);
    };
    let objects: Arc<dyn ObjectStore> = Arc::new(Cloudinary::new(
        cloudinary_config,
        Duration::from_secs(config.upload.timeout_secs),
    )?);

    let users: Arc<dyn UserStore> =
        Arc::new(PgUserStore::new(db.postgres.clone()));
    let wallets: Arc<dyn WalletStore> =
        Arc::new(PgWalletStore::new(db.postgres.clone()));

    let spool_dir = config
        .upload
        .temp_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("accounta"));
    let policy = UploadPolicy::from_config(
        &config.upload,
        &config.wallet,
        cloudinary_config.folder.clone(),
    );
    let images = Arc::new(ProfileImageManager::new(
        users.clone(),
        wallets,
        objects,
        TempStorage::new(spool_dir),
        policy,
    ));

    let crypto = Arc::new(PasswordManager::new(config.argon2.clone())?);

    Ok(AppState {
        config,
        users,
        images,
        token,
        crypto,
    })
}
