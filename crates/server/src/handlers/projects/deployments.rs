use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_derive_error::ErrorResponse;
use db::{
    deployment, project, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, SelectExt,
};
use derive_more::{Display, Error, From};
use futures_util::TryStreamExt;
use serde::Serialize;

use crate::pagination::Pagination;

/// Information about a single deployment.
#[derive(Serialize)]
pub(super) struct DeploymentData {
    /// Deployment record identifier.
    id: i64,

    /// Per-project deployment number.
    version: i64,

    /// Deployment status.
    status: deployment::Status,

    /// Hosting provider used for the deployment.
    platform: project::Platform,

    /// Live URL, if the deployment succeeded.
    deploy_url: Option<String>,

    /// Error text, if the deployment failed.
    logs: Option<String>,

    /// Total pipeline duration, in milliseconds.
    build_time_ms: Option<i64>,

    /// Provider-specific details.
    metadata: serde_json::Value,

    /// Deployment start time.
    created_at: i64,
}

/// Errors that may occur during the list request.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum DeploymentListError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Deployment metadata stored inside of a database is not a valid JSON.
    InvalidMetadata(serde_json::Error),

    /// Requested project was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "project not found")]
    ProjectNotFound,
}

/// List project deployments, most recent first.
pub(super) async fn deployments(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<DeploymentData>>, DeploymentListError> {
    let project_exists = project::Entity::find_by_id(id)
        .select_only()
        .exists(&*db)
        .await?;

    if !project_exists {
        return Err(DeploymentListError::ProjectNotFound);
    }

    deployment::Entity::find()
        .filter(deployment::Column::ProjectId.eq(id))
        .limit(pagination.limit())
        .offset(pagination.offset())
        .order_by_desc(deployment::Column::Id)
        .stream(&*db)
        .await?
        .err_into()
        .and_then(|model| async move {
            Ok(DeploymentData {
                id: model.id,
                version: model.version,
                status: model.status,
                platform: model.platform,
                deploy_url: model.deploy_url,
                logs: model.logs,
                build_time_ms: model.build_time_ms,
                metadata: serde_json::from_str(&model.metadata)?,
                created_at: model.created_at.assume_utc().unix_timestamp(),
            })
        })
        .try_collect()
        .await
        .map(Json)
}
