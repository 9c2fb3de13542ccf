//! Example consumer: serves command URIs over HTTP using quadra-sdk.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Set `CONFIG_PATH` to a models file; set `DATABASE_URL` to back `postgres` repos.

use quadra_sdk::{
    app, ensure_database_exists, init_tracing, load_from_path, resolve, AppState, CommandGateway,
    FullConfig, FunctionHandlers, MemoryStore, PgDocumentStore, RepositoryFactory, Settings,
    MEMORY_BACKEND, POSTGRES_BACKEND,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    init_tracing();

    let config = match &settings.config_path {
        Some(path) => load_from_path(path)?,
        None => {
            tracing::warn!("CONFIG_PATH not set; starting with no models");
            FullConfig::default()
        }
    };
    let registry = Arc::new(resolve(&config)?);

    let mut repos = RepositoryFactory::new().with_store(MEMORY_BACKEND, Arc::new(MemoryStore::new()));
    if let Some(url) = &settings.database_url {
        ensure_database_exists(url).await?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        let store = PgDocumentStore::new(pool, settings.schema.clone())?;
        store.ensure_collections(&registry).await?;
        repos.register(POSTGRES_BACKEND, Arc::new(store));
    }

    let gateway = CommandGateway::new(
        registry,
        Arc::new(repos),
        FunctionHandlers::default(),
        settings.max_mapping_depth,
    );

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app(AppState::new(gateway))).await?;
    Ok(())
}
