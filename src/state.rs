use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::services::AuthService;
use crate::config::AppConfig;
use crate::friends::services::FriendService;
use crate::users::services::UserService;

const OPENAPI_PATH: &str = "docs/openapi.yaml";

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub friends: Arc<FriendService>,
    /// API description, loaded eagerly at startup and immutable afterwards.
    pub openapi: Option<Arc<String>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let openapi = match std::fs::read_to_string(OPENAPI_PATH) {
            Ok(doc) => Some(Arc::new(doc)),
            Err(e) => {
                tracing::warn!(error = %e, path = OPENAPI_PATH, "openapi document not loaded");
                None
            }
        };

        Ok(Self {
            auth: Arc::new(AuthService::new(db.clone(), config.auth.clone())),
            users: Arc::new(UserService::new(db.clone())),
            friends: Arc::new(FriendService::new(db.clone())),
            db,
            config,
            openapi,
        })
    }
}
