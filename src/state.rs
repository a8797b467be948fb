use std::sync::Arc;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{InMemoryUserStore, PgUserStore, UserStore};
use crate::auth::services::{AuthService, UsersService};
use crate::config::{AppConfig, StoreKind};
use crate::db;
use crate::reports::repo::{InMemoryReportStore, PgReportStore, ReportStore};
use crate::reports::services::ReportsService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserStore>,
    pub reports: Arc<dyn ReportStore>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        match config.store {
            StoreKind::Postgres => {
                let pool = db::connect(&config.database_url).await?;
                db::migrate(&pool).await;
                Ok(Self::from_parts(
                    config,
                    Arc::new(PgUserStore::new(pool.clone())),
                    Arc::new(PgReportStore::new(pool)),
                ))
            }
            StoreKind::Memory => {
                tracing::warn!("using in-memory stores; data is lost on exit");
                Ok(Self::in_memory(config))
            }
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_parts(
            config,
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryReportStore::new()),
        )
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        reports: Arc<dyn ReportStore>,
    ) -> Self {
        Self {
            jwt: JwtKeys::from(&config.jwt),
            config: Arc::new(config),
            users,
            reports,
        }
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.users.clone())
    }

    pub fn users_service(&self) -> UsersService {
        UsersService::new(self.users.clone())
    }

    pub fn reports_service(&self) -> ReportsService {
        ReportsService::new(self.reports.clone())
    }
}
