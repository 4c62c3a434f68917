use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use db::{domain_record, DatabaseConnection};
use hosting::domains::{self, RecordFilter};
use serde::Deserialize;

use super::{DomainRecordData, DomainRecordError};
use crate::pagination::Pagination;

/// Domain record list filter.
#[derive(Deserialize)]
pub(super) struct DomainRecordQuery {
    client_id: Option<i64>,
    project_id: Option<i64>,
    status: Option<domain_record::Status>,
}

/// List domain records, soonest to expire first.
pub(super) async fn list(
    State(db): State<Arc<DatabaseConnection>>,
    Query(query): Query<DomainRecordQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<DomainRecordData>>, DomainRecordError> {
    let filter = RecordFilter {
        client_id: query.client_id,
        project_id: query.project_id,
        status: query.status,
    };

    let records = domains::list_records(&db, &filter, pagination.offset(), pagination.limit())
        .await?
        .into_iter()
        .map(DomainRecordData::from)
        .collect();

    Ok(Json(records))
}
