use std::net::TcpListener;

use axum::Router;
use db::{project, ActiveModelTrait, ActiveValue, Database, DatabaseConnection};
use migration::MigratorTrait;

pub(crate) async fn create_database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("unable to create test database");

    migration::Migrator::up(&db, None)
        .await
        .expect("unable to run migrations");

    db
}

pub(crate) async fn create_project(
    db: &DatabaseConnection,
    slug: &str,
    platform: project::Platform,
) -> project::Model {
    project::ActiveModel {
        client_id: ActiveValue::Set(1),
        name: ActiveValue::Set(format!("{slug} landing")),
        slug: ActiveValue::Set(slug.to_owned()),
        platform: ActiveValue::Set(platform),
        created_at: ActiveValue::Set(db::utc_now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("unable to create project")
}

/// Serve the router on a random local port, returning its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("unable to bind mock server");
    let address = listener.local_addr().expect("unable to get mock address");

    let server = axum::Server::from_tcp(listener)
        .expect("unable to create mock server")
        .serve(router.into_make_service());

    tokio::spawn(server);

    format!("http://{address}")
}
