mod create;
mod delete;
mod details;
mod list;
mod refresh;
mod update;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use axum_derive_error::ErrorResponse;
use db::{
    domain_record, project, DatabaseConnection, DbErr, EntityTrait, OffsetDateTime,
    PrimitiveDateTime, QuerySelect, SelectExt,
};
use derive_more::{Display, Error, From};
use hosting::{domains::DomainError, rdap::LookupError};
use serde::Serialize;

pub(crate) fn routes() -> Router<Arc<DatabaseConnection>> {
    Router::new()
        .route("/", get(list::list).post(create::create))
        .route("/refresh", post(refresh::refresh_all))
        .route(
            "/:id",
            get(details::details)
                .patch(update::update)
                .delete(delete::delete),
        )
        .route("/:id/refresh", post(refresh::refresh))
}

/// Errors that may occur while managing domain records.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum DomainRecordError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Requested domain record was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "domain record not found")]
    DomainRecordNotFound,

    /// Referenced project was not found.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "project not found")]
    ProjectNotFound,

    /// Domain record with the same domain name already exists.
    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "domain is already registered")]
    DomainAlreadyExists,

    /// Provided timestamp is out of the supported range.
    #[status(StatusCode::UNPROCESSABLE_ENTITY)]
    #[display(fmt = "invalid timestamp")]
    InvalidTimestamp,

    /// Registration details lookup failed.
    #[status(StatusCode::BAD_GATEWAY)]
    LookupError(LookupError),

    #[from(ignore)]
    DomainError(DomainError),
}

impl From<DomainError> for DomainRecordError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Database(err) => DomainRecordError::DatabaseError(err),
            DomainError::NotFound => DomainRecordError::DomainRecordNotFound,
            DomainError::AlreadyExists { .. } => DomainRecordError::DomainAlreadyExists,
            DomainError::Lookup(err) => DomainRecordError::LookupError(err),
            err => DomainRecordError::DomainError(err),
        }
    }
}

/// Information about a single domain record.
#[derive(Serialize)]
pub(super) struct DomainRecordData {
    /// Domain record identifier.
    id: i64,

    /// Fully-qualified domain name.
    domain: String,

    /// Owning client identifier.
    client_id: i64,

    /// Project the domain is used by.
    project_id: Option<i64>,

    /// Registrar name.
    registrar: Option<String>,

    /// Purchase time.
    purchased_at: Option<i64>,

    /// Registration expiry time.
    expires_at: Option<i64>,

    /// Whether the registration renews automatically.
    auto_renew: bool,

    /// Purchase cost, in minor currency units.
    purchase_cost: Option<i64>,

    /// Renewal cost, in minor currency units.
    renew_cost: Option<i64>,

    /// Amount billed to the client, in minor currency units.
    billed_amount: Option<i64>,

    /// Free-form notes.
    notes: Option<String>,

    /// Registration status.
    status: domain_record::Status,

    /// Record creation time.
    created_at: i64,
}

fn to_unix(timestamp: PrimitiveDateTime) -> i64 {
    timestamp.assume_utc().unix_timestamp()
}

impl From<domain_record::Model> for DomainRecordData {
    fn from(model: domain_record::Model) -> Self {
        Self {
            id: model.id,
            domain: model.domain,
            client_id: model.client_id,
            project_id: model.project_id,
            registrar: model.registrar,
            purchased_at: model.purchased_at.map(to_unix),
            expires_at: model.expires_at.map(to_unix),
            auto_renew: model.auto_renew,
            purchase_cost: model.purchase_cost,
            renew_cost: model.renew_cost,
            billed_amount: model.billed_amount,
            notes: model.notes,
            status: model.status,
            created_at: to_unix(model.created_at),
        }
    }
}

/// Convert a Unix timestamp into a UTC database timestamp.
fn from_unix(timestamp: i64) -> Result<PrimitiveDateTime, DomainRecordError> {
    let timestamp = OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|_| DomainRecordError::InvalidTimestamp)?;

    Ok(PrimitiveDateTime::new(timestamp.date(), timestamp.time()))
}

/// Check that the referenced project exists, if any.
async fn ensure_project(
    db: &DatabaseConnection,
    project_id: Option<i64>,
) -> Result<(), DomainRecordError> {
    let Some(project_id) = project_id else {
        return Ok(());
    };

    let exists = project::Entity::find_by_id(project_id)
        .select_only()
        .exists(db)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(DomainRecordError::ProjectNotFound)
    }
}
