use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use db::DatabaseConnection;
use hosting::domains;

use super::{DomainRecordData, DomainRecordError};

/// Domain record details handler.
pub(super) async fn details(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<Json<DomainRecordData>, DomainRecordError> {
    Ok(Json(domains::find_record(&db, id).await?.into()))
}
