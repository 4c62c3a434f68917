mod handlers;
mod pagination;
mod validation;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{Extension, Router, Server};
use common::{config::Config, logging};
use db::{Database, DatabaseConnection};
use hosting::{
    provider::Providers,
    rdap::{DomainLookup, RdapLookup},
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::new(None)?;

    logging::init(&config);

    let Some(server_config) = config.server.as_ref() else {
        return Err(anyhow::Error::msg("unable to load server config"));
    };

    info!("connecting to database");
    let database = Arc::new(Database::connect(&config.database.url).await?);
    let server = Server::bind(&server_config.address);

    let providers = Arc::new(Providers::from_config(&config)?);
    let lookup: Arc<dyn DomainLookup> = Arc::new(RdapLookup::from_config(&config)?);
    let config = Arc::new(config);

    server
        .serve(app_router(database, config, providers, lookup).into_make_service())
        .await?;

    Ok(())
}

fn app_router(
    database: Arc<DatabaseConnection>,
    config: Arc<Config>,
    providers: Arc<Providers>,
    lookup: Arc<dyn DomainLookup>,
) -> Router {
    Router::new()
        .nest("/projects", handlers::projects::routes())
        .nest("/domains", handlers::domains::routes())
        .layer(Extension(config))
        .layer(Extension(providers))
        .layer(Extension(lookup))
        .with_state(database)
}
