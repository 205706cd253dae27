use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;

use gruz_core::{
    config::{Config, Listener},
    repository::Repository,
    security::AdminPolicy,
    service::Service,
    supervisor::{self, Outcome, Supervisor},
};
use gruz_postgres::PgExecutor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load().context("failed to load configuration")?;
    gruz_core::logging::init("gruz", cfg.log_json)?;
    tracing::info!(env = %cfg.env, listeners = ?cfg.listeners, "starting gruz");

    let db = PgExecutor::connect(&cfg.database_url, cfg.db_max_connections)
        .await
        .context("failed to connect to database")?;
    db.ensure_schema().await.context("failed to prepare schema")?;
    db.ping().await.context("database ping failed")?;

    let service = Service::new(Repository::new(Arc::new(db.clone())));
    let mut sup = Supervisor::new();

    if cfg.is_enabled(Listener::Api) {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, cfg.http_port));
        let service = service.clone();
        sup.spawn(Listener::Api.name(), move |cancel| {
            gruz_http::serve(addr, service, cancel)
        });
    }

    if cfg.is_enabled(Listener::Driver) {
        if let Some(token) = cfg.driver_bot_token.clone() {
            let service = service.clone();
            let ttl = cfg.conversation_ttl;
            sup.spawn(Listener::Driver.name(), move |cancel| {
                gruz_telegram::router::run_driver_bot(token, service, ttl, cancel)
            });
        }
    }

    if cfg.is_enabled(Listener::Admin) {
        if let Some(token) = cfg.admin_bot_token.clone() {
            let policy = AdminPolicy::new(cfg.admin_ids.clone());
            if policy.is_empty() {
                tracing::warn!("ADMIN_IDS is empty; the admin bot will deny every command");
            }
            let service = service.clone();
            sup.spawn(Listener::Admin.name(), move |cancel| {
                gruz_telegram::router::run_admin_bot(token, service, policy, cancel)
            });
        }
    }

    if sup.is_empty() {
        anyhow::bail!("no listeners enabled");
    }

    tokio::select! {
        res = supervisor::shutdown_signal() => {
            res.context("failed to install signal handlers")?;
            tracing::info!("shutdown signal received");
        }
        _ = sup.all_exited() => {
            tracing::warn!("every listener has exited");
        }
    }

    let report = sup.shutdown(cfg.shutdown_timeout).await;
    for (name, outcome) in &report.outcomes {
        match outcome {
            Outcome::Finished => tracing::info!(listener = %name, "finished"),
            Outcome::Failed(e) => tracing::error!(listener = %name, error = %e, "failed"),
            Outcome::Aborted => tracing::warn!(listener = %name, "aborted"),
        }
    }

    db.close().await;
    tracing::info!(clean = report.is_clean(), "gruz stopped");
    Ok(())
}
