use std::sync::Arc;

use school_portal::auth::bootstrap_admin;
use school_portal::config::Config;
use school_portal::store::{MemoryStore, PostgresStore, Store};
use school_portal::token::Sessions;
use school_portal::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = Config::from_env()?;

    let store: Store = match &config.database_url {
        Some(url) => {
            let pg = PostgresStore::connect(url, config.max_connections).await?;
            pg.migrate().await?;
            Arc::new(pg)
        }
        None => {
            log::warn!("DATABASE_URL is not set, records will only live in memory");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap_admin(&store, &admin.username, &admin.password).await?;
    }

    let sessions = Sessions::new(
        config.jwt_secret.as_bytes(),
        config.session_ttl,
        config.cookie_name.clone(),
    )
    .secure_cookies(config.cookie_secure);
    let app = app(AppState::new(store, sessions));

    log::info!(
        "Starting school portal HTTP server on http://{}",
        config.bind_addr
    );
    axum::Server::bind(&config.bind_addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
}
