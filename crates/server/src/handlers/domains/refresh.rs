use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use db::DatabaseConnection;
use hosting::{domains, rdap::DomainLookup};
use serde::Serialize;

use super::{DomainRecordData, DomainRecordError};

/// Fill missing registration details of a domain record from the registry.
pub(super) async fn refresh(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    Extension(lookup): Extension<Arc<dyn DomainLookup>>,
) -> Result<Json<DomainRecordData>, DomainRecordError> {
    Ok(Json(
        domains::refresh_record(&db, id, lookup.as_ref())
            .await?
            .into(),
    ))
}

/// JSON response body.
#[derive(Serialize)]
pub(super) struct StatusRefreshResponse {
    /// Count of domain records whose status changed.
    updated: u64,
}

/// Recompute statuses of all domain records.
pub(super) async fn refresh_all(
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<Json<StatusRefreshResponse>, DomainRecordError> {
    let updated = domains::refresh_statuses(&db, db::utc_now()).await?;

    Ok(Json(StatusRefreshResponse { updated }))
}
