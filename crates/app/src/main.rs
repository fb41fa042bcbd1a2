use std::{sync::Arc, time::Duration};

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use server::{ServerConfig, ServerState};

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "bank={level},server={level},ledger={level},sea_orm={level}",
            level = settings.app.level
        ))
        .init();

    let db = connect_database(&settings.database).await?;
    let store = ledger::Store::builder().database(db).build().await?;
    let token_maker = token::JwtMaker::new(&settings.server.token_symmetric_key)?;

    let state = ServerState {
        store,
        token_maker: Arc::new(token_maker),
        config: ServerConfig {
            access_token_duration: chrono::Duration::seconds(
                settings.server.access_token_duration_secs,
            ),
            transfer_timeout: Duration::from_millis(settings.server.transfer_timeout_ms),
            transfer_max_retries: settings.server.transfer_max_retries,
            ..ServerConfig::default()
        },
    };

    let addr = format!("{}:{}", settings.server.bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    server::run_with_listener(state, listener).await?;

    Ok(())
}

async fn connect_database(
    config: &settings::Database,
) -> Result<DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections).sqlx_logging(false);

    let database = Database::connect(opt).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("database ready");
    Ok(database)
}
