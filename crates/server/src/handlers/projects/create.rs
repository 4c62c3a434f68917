use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use axum_derive_error::ErrorResponse;
use db::{
    project, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QuerySelect, SelectExt, TransactionErrorExt, TransactionTrait,
};
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::validation::{ValidatedJson, SLUG_REGEX};

/// Errors that may occur during the project creation process.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum ProjectCreateError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Another project already uses the provided slug.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "project slug is already taken")]
    SlugTaken,
}

/// JSON request body.
#[derive(Deserialize, Validate)]
pub(super) struct ProjectCreateRequest {
    /// Owning client identifier.
    client_id: i64,

    /// Human-readable project name.
    #[validate(length(min = 1, max = 255))]
    name: String,

    /// Provider-side project name.
    #[validate(regex = "SLUG_REGEX")]
    slug: String,

    /// Hosting provider to deploy the project to.
    platform: project::Platform,
}

/// JSON response body.
#[derive(Serialize)]
pub(super) struct ProjectCreateResponse {
    /// Project identifier.
    id: i64,
}

/// Project creation handler.
pub(super) async fn create(
    State(db): State<Arc<DatabaseConnection>>,
    ValidatedJson(request): ValidatedJson<ProjectCreateRequest>,
) -> Result<Json<ProjectCreateResponse>, ProjectCreateError> {
    db.transaction(|txn| {
        Box::pin(async move {
            let slug_taken = project::Entity::find()
                .select_only()
                .filter(project::Column::Slug.eq(request.slug.as_str()))
                .exists(txn)
                .await?;

            if slug_taken {
                return Err(ProjectCreateError::SlugTaken);
            }

            let model = project::Entity::insert(project::ActiveModel {
                client_id: ActiveValue::Set(request.client_id),
                name: ActiveValue::Set(request.name),
                slug: ActiveValue::Set(request.slug),
                platform: ActiveValue::Set(request.platform),
                created_at: ActiveValue::Set(db::utc_now()),
                ..Default::default()
            })
            .exec_with_returning(txn)
            .await?;

            info!(id = model.id, slug = %model.slug, "project created");

            Ok(Json(ProjectCreateResponse { id: model.id }))
        })
    })
    .await
    .into_raw_result()
}
