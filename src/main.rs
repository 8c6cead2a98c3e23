use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use account_service::configuration::{get_configuration, StorageBackend};
use account_service::startup::{build_services, run};
use account_service::store::{InMemoryStore, PostgresStore};
use account_service::telemetry::init_telemetry;

fn startup_error(kind: std::io::ErrorKind, message: &'static str) -> std::io::Error {
    std::io::Error::new(kind, message)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    configuration.auth.validate().map_err(|e| {
        tracing::error!("Invalid auth configuration: {}", e);
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let (sessions, accounts) = match configuration.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory account storage; data is lost on restart");
            build_services(Arc::new(InMemoryStore::new()), &configuration.auth)
        }
        StorageBackend::Postgres => {
            tracing::info!("Attempting to connect to database");

            let pool = PgPoolOptions::new()
                .max_connections(configuration.database.max_connections)
                .connect(&configuration.database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    startup_error(std::io::ErrorKind::ConnectionRefused, "Database connection error")
                })?;

            sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                startup_error(std::io::ErrorKind::Other, "Database migration error")
            })?;

            tracing::info!("Database ready");
            build_services(Arc::new(PostgresStore::new(pool)), &configuration.auth)
        }
    };

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, sessions, accounts)?.await
}
