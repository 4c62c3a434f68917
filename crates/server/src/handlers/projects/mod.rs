mod create;
mod deploy;
mod deployments;
mod details;
mod domains;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use db::DatabaseConnection;

pub(crate) fn routes() -> Router<Arc<DatabaseConnection>> {
    Router::new()
        .route("/", post(create::create))
        .route("/:id", get(details::details))
        .route("/:id/deploy", post(deploy::deploy))
        .route("/:id/deployments", get(deployments::deployments))
        .route("/:id/domains", get(domains::list).post(domains::add))
        .route("/:id/domains/:domain", delete(domains::remove))
}
