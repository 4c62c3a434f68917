use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{project, DatabaseConnection, DbErr, EntityTrait};
use derive_more::{Display, Error, From};
use serde::Serialize;

/// Project information.
#[derive(Serialize)]
pub(super) struct ProjectData {
    /// Project identifier.
    id: i64,

    /// Owning client identifier.
    client_id: i64,

    /// Human-readable project name.
    name: String,

    /// Provider-side project name.
    slug: String,

    /// Hosting provider.
    platform: project::Platform,

    /// URL of the latest successful deployment.
    deploy_url: Option<String>,

    /// Custom domain linked on the provider side.
    domain: Option<String>,

    /// Project creation time.
    created_at: i64,
}

impl From<project::Model> for ProjectData {
    fn from(model: project::Model) -> Self {
        Self {
            id: model.id,
            client_id: model.client_id,
            name: model.name,
            slug: model.slug,
            platform: model.platform,
            deploy_url: model.deploy_url,
            domain: model.domain,
            created_at: model.created_at.assume_utc().unix_timestamp(),
        }
    }
}

/// Errors that may occur during the detail preview process.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum ProjectDetailsError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested project was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "project not found")]
    ProjectNotFound,
}

/// Project details handler.
pub(super) async fn details(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<Json<ProjectData>, ProjectDetailsError> {
    project::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .map(|model| Json(model.into()))
        .ok_or(ProjectDetailsError::ProjectNotFound)
}
