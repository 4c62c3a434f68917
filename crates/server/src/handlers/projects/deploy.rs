use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use axum_derive_error::ErrorResponse;
use common::config::Config;
use db::{project, DatabaseConnection, DbErr, EntityTrait};
use derive_more::{Display, Error, From};
use hosting::{
    orchestrator::{DeployError, DeploySettings, Orchestrator},
    provider::{MissingCredentials, Providers},
};
use serde::Serialize;

/// Errors that may occur during the deployment process.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum ProjectDeployError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested project was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "project not found")]
    ProjectNotFound,

    /// Project's hosting provider has no credentials configured.
    #[status(StatusCode::BAD_REQUEST)]
    MissingCredentials(MissingCredentials),

    /// Deployment pipeline failed, the failure is recorded in the deployment logs.
    #[status(StatusCode::BAD_GATEWAY)]
    #[from(ignore)]
    DeploymentFailed(DeployError),
}

impl From<DeployError> for ProjectDeployError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::Database(err) => ProjectDeployError::DatabaseError(err),
            err => ProjectDeployError::DeploymentFailed(err),
        }
    }
}

/// JSON response body.
#[derive(Serialize)]
pub(super) struct ProjectDeployResponse {
    /// Deployment record identifier.
    id: i64,

    /// Provider-side deployment identifier.
    deployment_id: String,

    /// Live deployment URL.
    url: String,
}

/// Deploy the latest project build to its hosting provider.
///
/// The request is held open until the deployment either succeeds,
/// fails or stops being polled for readiness.
pub(super) async fn deploy(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(providers): Extension<Arc<Providers>>,
) -> Result<Json<ProjectDeployResponse>, ProjectDeployError> {
    let project = project::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or(ProjectDeployError::ProjectNotFound)?;

    let adapter = providers.adapter(project.platform)?;
    let build_dir = Orchestrator::build_dir(&config.deployment.builds_path, &project);

    let outcome = Orchestrator::new(db, DeploySettings::from(&config.deployment))
        .deploy(&project, adapter.as_ref(), &build_dir)
        .await?;

    Ok(Json(ProjectDeployResponse {
        id: outcome.record_id,
        deployment_id: outcome.deployment_id,
        url: outcome.url,
    }))
}
