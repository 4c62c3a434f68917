use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use axum_derive_error::ErrorResponse;
use db::{project, DatabaseConnection, DbErr, EntityTrait};
use derive_more::{Display, Error, From};
use hosting::{
    domains::{self, DomainError},
    provider::{MissingCredentials, ProviderDomain, ProviderError, Providers},
};
use serde::Deserialize;
use validator::Validate;

use crate::validation::{ValidatedJson, DOMAIN_REGEX};

/// Errors that may occur while managing provider-side project domains.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum ProjectDomainError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested project was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "project not found")]
    ProjectNotFound,

    /// Project's hosting provider has no credentials configured.
    #[status(StatusCode::BAD_REQUEST)]
    MissingCredentials(MissingCredentials),

    /// Domains can be linked only after the first successful deployment.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "project has no successful deployments")]
    NotDeployed,

    /// Domain name is malformed.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    #[display(fmt = "invalid domain name")]
    InvalidDomain,

    /// Domain is not linked to the project.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "domain not found")]
    DomainNotLinked,

    /// Hosting provider rejected the request.
    #[status(StatusCode::BAD_GATEWAY)]
    #[from(ignore)]
    ProviderError(ProviderError),

    #[from(ignore)]
    DomainError(DomainError),
}

impl From<DomainError> for ProjectDomainError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Database(err) => ProjectDomainError::DatabaseError(err),
            DomainError::NoSuccessfulDeployment => ProjectDomainError::NotDeployed,
            DomainError::Provider(ProviderError::DomainNotLinked { .. }) => {
                ProjectDomainError::DomainNotLinked
            }
            DomainError::Provider(err) => ProjectDomainError::ProviderError(err),
            err => ProjectDomainError::DomainError(err),
        }
    }
}

/// JSON request body.
#[derive(Deserialize, Validate)]
pub(super) struct ProjectDomainRequest {
    /// Domain name to link.
    #[validate(regex = "DOMAIN_REGEX")]
    domain: String,
}

async fn find_project(
    db: &DatabaseConnection,
    id: i64,
) -> Result<project::Model, ProjectDomainError> {
    project::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ProjectDomainError::ProjectNotFound)
}

/// List custom domains linked to the project.
pub(super) async fn list(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    Extension(providers): Extension<Arc<Providers>>,
) -> Result<Json<Vec<ProviderDomain>>, ProjectDomainError> {
    let project = find_project(&db, id).await?;
    let adapter = providers.adapter(project.platform)?;

    Ok(Json(
        domains::list_provider_domains(adapter.as_ref(), &project).await?,
    ))
}

/// Link a custom domain to the project.
pub(super) async fn add(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    Extension(providers): Extension<Arc<Providers>>,
    ValidatedJson(request): ValidatedJson<ProjectDomainRequest>,
) -> Result<Json<ProviderDomain>, ProjectDomainError> {
    let project = find_project(&db, id).await?;
    let adapter = providers.adapter(project.platform)?;

    Ok(Json(
        domains::add_provider_domain(&db, adapter.as_ref(), &project, &request.domain).await?,
    ))
}

/// Unlink a custom domain from the project.
pub(super) async fn remove(
    Path((id, domain)): Path<(i64, String)>,
    State(db): State<Arc<DatabaseConnection>>,
    Extension(providers): Extension<Arc<Providers>>,
) -> Result<StatusCode, ProjectDomainError> {
    if !DOMAIN_REGEX.is_match(&domain) {
        return Err(ProjectDomainError::InvalidDomain);
    }

    let project = find_project(&db, id).await?;
    let adapter = providers.adapter(project.platform)?;

    domains::remove_provider_domain(&db, adapter.as_ref(), &project, &domain).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::testing::{
        create_database, create_project, mark_deployed, test_router, RequestBodyExt,
        ResponseBodyExt, StaticLookup,
    };

    use assert_json::assert_json;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use common::config::Config;
    use db::{project, project::Platform, DatabaseConnection, EntityTrait};
    use hosting::testing::MockProvider;
    use serde_json::json;
    use tower::Service;

    fn router(db: DatabaseConnection, provider: MockProvider) -> Router {
        test_router(db, Config::for_tests(), Arc::new(provider), StaticLookup(None))
    }

    fn add_request(id: i64, domain: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/projects/{id}/domains"))
            .header("Content-Type", "application/json")
            .body(Body::from_json(json!({ "domain": domain })))
            .unwrap()
    }

    #[tokio::test]
    async fn link_and_unlink() {
        let db = create_database().await;
        let project = create_project(&db, "landing", Platform::Vercel).await;
        let id = project.id;

        mark_deployed(&db, &project, 1).await;

        let mut service = router(db.clone(), MockProvider::new(Platform::Vercel));

        let response = service
            .call(add_request(id, "Shop.Example.com"))
            .await
            .unwrap();

        assert_json!(response.json().await, {
            "name": "shop.example.com",
            "verified": false,
            "created_at": 1700000000
        });

        let response = service
            .call(
                Request::builder()
                    .method("GET")
                    .uri(format!("/projects/{id}/domains"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_json!(response.json().await, [
            {
                "name": "shop.example.com",
                "verified": false,
                "created_at": 1700000000
            }
        ]);

        let domain = project::Entity::find_by_id(id)
            .one(&db)
            .await
            .unwrap()
            .unwrap()
            .domain;
        assert_eq!(domain.as_deref(), Some("shop.example.com"));

        let response = service
            .call(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/projects/{id}/domains/shop.example.com"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = service
            .call(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/projects/{id}/domains/shop.example.com"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn requires_successful_deployment() {
        let db = create_database().await;
        let id = create_project(&db, "landing", Platform::Vercel).await.id;

        let mut service = router(db, MockProvider::new(Platform::Vercel));

        let response = service
            .call(add_request(id, "shop.example.com"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unlink_rejects_path_segments() {
        let db = create_database().await;
        let project = create_project(&db, "landing", Platform::Vercel).await;
        let id = project.id;

        mark_deployed(&db, &project, 1).await;

        let mut service = router(db, MockProvider::new(Platform::Vercel));

        let response = service
            .call(add_request(id, "shop.example.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        for domain in ["..%2F..%2F..%2Fv6%2Fdomains%2Fvictim.com", "..", "shop.example.com%3Fx"] {
            let response = service
                .call(
                    Request::builder()
                        .method("DELETE")
                        .uri(format!("/projects/{id}/domains/{domain}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }

        let response = service
            .call(
                Request::builder()
                    .method("GET")
                    .uri(format!("/projects/{id}/domains"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_json!(response.json().await, [
            {
                "name": "shop.example.com",
                "verified": false,
                "created_at": 1700000000
            }
        ]);
    }

    #[tokio::test]
    async fn invalid_domain() {
        let db = create_database().await;
        let project = create_project(&db, "landing", Platform::Vercel).await;

        mark_deployed(&db, &project, 1).await;

        let mut service = router(db, MockProvider::new(Platform::Vercel));

        let response = service
            .call(add_request(project.id, "not a domain"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
