use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use db::DatabaseConnection;
use hosting::domains;

use super::DomainRecordError;

/// Domain record deletion handler.
///
/// Provider-side domain links are not affected.
pub(super) async fn delete(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
) -> Result<StatusCode, DomainRecordError> {
    domains::delete_record(&db, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
