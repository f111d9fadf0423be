/// Application context: configuration, pool and the domain managers
use crate::{
    account::AccountManager,
    clients::ClientManager,
    config::ServerConfig,
    db,
    error::ApiResult,
    mailer::Mailer,
    reporting::ReportManager,
    session::SessionManager,
    task::TaskManager,
    timesheet::TimeManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub mailer: Arc<Mailer>,
    pub sessions: Arc<SessionManager>,
    pub accounts: Arc<AccountManager>,
    pub clients: Arc<ClientManager>,
    pub tasks: Arc<TaskManager>,
    pub time: Arc<TimeManager>,
    pub reports: Arc<ReportManager>,
}

impl AppContext {
    /// Open the configured database, run migrations and wire the managers.
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;
        let pool = db::create_pool(&config.database).await?;
        Self::build(config, pool).await
    }

    /// Same wiring against an in-memory database, for tests.
    pub async fn in_memory(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;
        let pool = db::create_memory_pool().await?;
        Self::build(config, pool).await
    }

    async fn build(config: ServerConfig, pool: SqlitePool) -> ApiResult<Self> {
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let config = Arc::new(config);
        let mailer = Arc::new(Mailer::new(config.email.clone())?);

        let sessions = Arc::new(SessionManager::new(
            pool.clone(),
            config.clone(),
            mailer.clone(),
        ));
        let accounts = Arc::new(AccountManager::new(
            pool.clone(),
            config.clone(),
            sessions.clone(),
            mailer.clone(),
        ));
        let time = Arc::new(TimeManager::new(pool.clone()));
        let clients = Arc::new(ClientManager::new(pool.clone(), time.clone()));
        let tasks = Arc::new(TaskManager::new(pool.clone()));
        let reports = Arc::new(ReportManager::new(pool.clone()));

        Ok(Self {
            config,
            db: pool,
            mailer,
            sessions,
            accounts,
            clients,
            tasks,
            time,
            reports,
        })
    }
}
