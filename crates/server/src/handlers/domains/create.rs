use std::sync::Arc;

use axum::{extract::State, Json};
use db::DatabaseConnection;
use hosting::domains::{self, NewDomainRecord};
use serde::Deserialize;
use validator::Validate;

use super::{ensure_project, from_unix, DomainRecordData, DomainRecordError};
use crate::validation::{ValidatedJson, DOMAIN_REGEX};

/// JSON request body.
#[derive(Deserialize, Validate)]
pub(super) struct DomainRecordCreateRequest {
    /// Fully-qualified domain name.
    #[validate(regex = "DOMAIN_REGEX")]
    domain: String,

    /// Owning client identifier.
    client_id: i64,

    /// Project the domain is used by.
    #[serde(default)]
    project_id: Option<i64>,

    /// Registrar name.
    #[serde(default)]
    #[validate(length(min = 1, max = 255))]
    registrar: Option<String>,

    /// Purchase time, as a Unix timestamp.
    #[serde(default)]
    purchased_at: Option<i64>,

    /// Registration expiry time, as a Unix timestamp.
    #[serde(default)]
    expires_at: Option<i64>,

    /// Whether the registration renews automatically.
    #[serde(default)]
    auto_renew: bool,

    /// Purchase cost, in minor currency units.
    #[serde(default)]
    #[validate(range(min = 0))]
    purchase_cost: Option<i64>,

    /// Renewal cost, in minor currency units.
    #[serde(default)]
    #[validate(range(min = 0))]
    renew_cost: Option<i64>,

    /// Amount billed to the client, in minor currency units.
    #[serde(default)]
    #[validate(range(min = 0))]
    billed_amount: Option<i64>,

    /// Free-form notes.
    #[serde(default)]
    notes: Option<String>,
}

/// Domain record creation handler.
pub(super) async fn create(
    State(db): State<Arc<DatabaseConnection>>,
    ValidatedJson(request): ValidatedJson<DomainRecordCreateRequest>,
) -> Result<Json<DomainRecordData>, DomainRecordError> {
    ensure_project(&db, request.project_id).await?;

    let record = NewDomainRecord {
        domain: request.domain,
        client_id: request.client_id,
        project_id: request.project_id,
        registrar: request.registrar,
        purchased_at: request.purchased_at.map(from_unix).transpose()?,
        expires_at: request.expires_at.map(from_unix).transpose()?,
        auto_renew: request.auto_renew,
        purchase_cost: request.purchase_cost,
        renew_cost: request.renew_cost,
        billed_amount: request.billed_amount,
        notes: request.notes,
    };

    Ok(Json(domains::create_record(&db, record).await?.into()))
}
