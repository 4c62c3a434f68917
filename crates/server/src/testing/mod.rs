use std::{error::Error, sync::Arc};

use axum::{async_trait, Router};
use common::config::Config;
use db::{
    deployment, domain_record, project, ActiveModelTrait, ActiveValue, Database,
    DatabaseConnection, EntityTrait,
};
use hosting::{
    provider::Providers,
    rdap::{DomainLookup, LookupError, RegistrationInfo},
    testing::MockProvider,
};
use hyper::body::{self, Bytes, HttpBody};
use migration::MigratorTrait;
use serde::Serialize;

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

/// Insert a successful deployment of the provided project.
pub(crate) async fn mark_deployed(db: &DatabaseConnection, project: &project::Model, version: i64) {
    deployment::Entity::insert(deployment::ActiveModel {
        project_id: ActiveValue::Set(project.id),
        version: ActiveValue::Set(version),
        status: ActiveValue::Set(deployment::Status::Success),
        platform: ActiveValue::Set(project.platform),
        deploy_url: ActiveValue::Set(Some(format!("https://{}-{version}.mock.app", project.slug))),
        build_time_ms: ActiveValue::Set(Some(1500)),
        metadata: ActiveValue::Set(String::from(r#"{"files":3}"#)),
        created_at: ActiveValue::Set(db::utc_now()),
        ..Default::default()
    })
    .exec_without_returning(db)
    .await
    .expect("unable to insert deployment");
}

pub(crate) async fn create_domain_record(
    db: &DatabaseConnection,
    domain: &str,
    client_id: i64,
    status: domain_record::Status,
) -> domain_record::Model {
    domain_record::Entity::insert(domain_record::ActiveModel {
        domain: ActiveValue::Set(domain.to_owned()),
        client_id: ActiveValue::Set(client_id),
        auto_renew: ActiveValue::Set(false),
        status: ActiveValue::Set(status),
        created_at: ActiveValue::Set(db::utc_now()),
        ..Default::default()
    })
    .exec_with_returning(db)
    .await
    .expect("unable to insert domain record")
}

/// Registration lookup that answers every request with the same details.
pub(crate) struct StaticLookup(pub Option<RegistrationInfo>);

#[async_trait]
impl DomainLookup for StaticLookup {
    async fn lookup(&self, domain: &str) -> Result<RegistrationInfo, LookupError> {
        self.0.clone().ok_or_else(|| LookupError::NotFound {
            domain: domain.to_owned(),
        })
    }
}

/// Application router with in-memory provider and registration lookup.
pub(crate) fn test_router(
    db: DatabaseConnection,
    config: Config,
    provider: Arc<MockProvider>,
    lookup: StaticLookup,
) -> Router {
    crate::app_router(
        Arc::new(db),
        Arc::new(config),
        Arc::new(Providers::default().with(provider)),
        Arc::new(lookup),
    )
}

pub(crate) trait RequestBodyExt: Sized {
    fn from_json<B: Serialize>(val: B) -> Self;
}

impl<T> RequestBodyExt for T
where
    T: HttpBody + From<Vec<u8>>,
{
    fn from_json<B: Serialize>(val: B) -> Self {
        T::from(serde_json::to_vec(&val).expect("unable to serialize"))
    }
}

#[async_trait(?Send)]
pub(crate) trait ResponseBodyExt {
    async fn bytes(self) -> Bytes;

    async fn text(self) -> String;

    async fn json(self) -> serde_json::Value;
}

#[async_trait(?Send)]
impl<T> ResponseBodyExt for T
where
    T: HttpBody,
    T::Error: Error,
{
    async fn bytes(self) -> Bytes {
        body::to_bytes(self)
            .await
            .expect("unable to convert to bytes")
    }

    async fn text(self) -> String {
        String::from_utf8(self.bytes().await.to_vec()).expect("unable to convert to text")
    }

    async fn json(self) -> serde_json::Value {
        serde_json::from_slice(&self.bytes().await).expect("unable to convert to json")
    }
}
