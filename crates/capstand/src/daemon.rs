//! Main daemon orchestration

use capstan_core::{Result, ServerConfig};
use capstan_db::Database;
use capstan_engine::{AppDefinitionHandler, CmdDeployer, HandlerConfig};
use capstan_logs::BuildLogRegistry;
use capstan_web::AppState;
use std::future::Future;
use std::sync::Arc;

/// Main daemon struct
pub struct Daemon {
    config: ServerConfig,
    db: Database,
    handler: Arc<AppDefinitionHandler>,
}

impl Daemon {
    /// Open the database and wire the handler to the hook deployer
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let db = Database::open(&config.db_path).await?;

        let deployer = CmdDeployer::new(config.hooks.clone(), config.root_domain.clone())
            .with_default_nginx_config(config.default_nginx_config.clone());
        let logs = Arc::new(BuildLogRegistry::new(config.build_log_size));

        let handler = AppDefinitionHandler::new(
            Arc::new(db.apps()),
            Arc::new(db.projects()),
            Arc::new(deployer),
            logs,
            HandlerConfig {
                root_domain: config.root_domain.clone(),
                default_nginx_config: config.default_nginx_config.clone(),
            },
        );

        Ok(Self {
            config,
            db,
            handler: Arc::new(handler),
        })
    }

    /// Serve the API until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // The proxy config may be stale after a restart
        self.handler.reload_proxy().await;

        let state = AppState::new(self.handler.clone(), self.config.api_key.clone());
        capstan_web::start_server(
            &self.config.bind_addr,
            state,
            self.config.cors_origin.as_deref(),
            shutdown,
        )
        .await?;

        self.db.close().await;
        Ok(())
    }
}
