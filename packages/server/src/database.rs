use std::time::Duration;

use sea_orm::sea_query::Index;
use sea_orm::sqlx::sqlite::SqliteJournalMode;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::entity::{build_request, request_state};

fn is_sqlite(url: &str) -> bool {
    url.starts_with("sqlite:")
}

pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.clone());

    // Set connection pool options
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(config.sqlx_logging);

    if is_sqlite(&config.url) {
        // Readers don't block the writer, and writers queue on the lock
        // instead of failing with SQLITE_BUSY.
        let busy_timeout = Duration::from_secs(config.busy_timeout_secs);
        opt.map_sqlx_sqlite_opts(move |opts| {
            opts.journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(busy_timeout)
        });
    }

    let db = Database::connect(opt).await?;
    db.get_schema_registry("iib_server::entity::*")
        .sync(&db)
        .await?;

    ensure_indexes(&db).await?;

    Ok(db)
}

/// Ensure the non-unique lookup indexes exist.
///
/// SeaORM's schema-sync only creates unique indexes, so these are created
/// manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    // History lookups: SELECT ... FROM request_state WHERE request_id IN (...)
    let history = Index::create()
        .if_not_exists()
        .name("idx_request_state_request_id")
        .table(request_state::Entity)
        .col(request_state::Column::RequestId)
        .to_owned();

    // State filter on the list endpoint
    let state_filter = Index::create()
        .if_not_exists()
        .name("idx_build_request_state")
        .table(build_request::Entity)
        .col(build_request::Column::State)
        .to_owned();

    for (name, stmt) in [
        ("idx_request_state_request_id", history),
        ("idx_build_request_state", state_filter),
    ] {
        match db.execute_raw(backend.build(&stmt)).await {
            Ok(_) => info!("Ensured index {name} exists"),
            Err(e) => warn!("Failed to create index {name}: {e}"),
        }
    }

    Ok(())
}
