use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use db::DatabaseConnection;
use hosting::domains::{self, DomainRecordPatch};
use serde::Deserialize;
use validator::Validate;

use super::{ensure_project, from_unix, DomainRecordData, DomainRecordError};
use crate::validation::{double_option, ValidatedJson};

/// JSON request body.
///
/// Absent fields are left untouched, `null` values clear the field.
#[derive(Deserialize, Validate)]
pub(super) struct DomainRecordUpdateRequest {
    #[serde(default, deserialize_with = "double_option")]
    project_id: Option<Option<i64>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(min = 1, max = 255))]
    registrar: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    purchased_at: Option<Option<i64>>,

    #[serde(default, deserialize_with = "double_option")]
    expires_at: Option<Option<i64>>,

    #[serde(default)]
    auto_renew: Option<bool>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0))]
    purchase_cost: Option<Option<i64>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0))]
    renew_cost: Option<Option<i64>>,

    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0))]
    billed_amount: Option<Option<i64>>,

    #[serde(default, deserialize_with = "double_option")]
    notes: Option<Option<String>>,
}

fn timestamp_patch(
    value: Option<Option<i64>>,
) -> Result<Option<Option<db::PrimitiveDateTime>>, DomainRecordError> {
    value
        .map(|value| value.map(from_unix).transpose())
        .transpose()
}

/// Domain record partial update handler.
///
/// Record status is recomputed from the resulting expiry time.
pub(super) async fn update(
    Path(id): Path<i64>,
    State(db): State<Arc<DatabaseConnection>>,
    ValidatedJson(request): ValidatedJson<DomainRecordUpdateRequest>,
) -> Result<Json<DomainRecordData>, DomainRecordError> {
    ensure_project(&db, request.project_id.flatten()).await?;

    let patch = DomainRecordPatch {
        project_id: request.project_id,
        registrar: request.registrar,
        purchased_at: timestamp_patch(request.purchased_at)?,
        expires_at: timestamp_patch(request.expires_at)?,
        auto_renew: request.auto_renew,
        purchase_cost: request.purchase_cost,
        renew_cost: request.renew_cost,
        billed_amount: request.billed_amount,
        notes: request.notes,
    };

    Ok(Json(domains::update_record(&db, id, patch).await?.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::testing::{
        create_database, create_domain_record, create_project, test_router, RequestBodyExt,
        ResponseBodyExt, StaticLookup,
    };

    use assert_json::{assert_json, validators};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use common::config::Config;
    use db::{domain_record::Status, project::Platform, OffsetDateTime};
    use hosting::testing::MockProvider;
    use serde_json::{json, Value};
    use tower::Service;

    fn router(db: db::DatabaseConnection) -> Router {
        test_router(
            db,
            Config::for_tests(),
            Arc::new(MockProvider::new(Platform::Vercel)),
            StaticLookup(None),
        )
    }

    fn request(id: i64, body: Value) -> Request<Body> {
        Request::builder()
            .method("PATCH")
            .uri(format!("/domains/{id}"))
            .header("Content-Type", "application/json")
            .body(Body::from_json(body))
            .unwrap()
    }

    #[tokio::test]
    async fn partial_update() {
        let db = create_database().await;
        let project_id = create_project(&db, "landing", Platform::Vercel).await.id;
        let id = create_domain_record(&db, "example.com", 1, Status::Active)
            .await
            .id;
        let expired = OffsetDateTime::now_utc().unix_timestamp() - 24 * 60 * 60;

        let mut service = router(db);

        let response = service
            .call(request(
                id,
                json!({
                    "project_id": project_id,
                    "expires_at": expired,
                    "notes": "transfer pending",
                    "billed_amount": 4200
                }),
            ))
            .await
            .unwrap();

        assert_json!(response.json().await, {
            "id": id,
            "domain": "example.com",
            "client_id": 1,
            "project_id": project_id,
            "registrar": validators::null(),
            "purchased_at": validators::null(),
            "expires_at": expired,
            "auto_renew": false,
            "purchase_cost": validators::null(),
            "renew_cost": validators::null(),
            "billed_amount": 4200,
            "notes": "transfer pending",
            "status": "expired",
            "created_at": validators::i64(|_| Ok(()))
        });

        let response = service
            .call(request(
                id,
                json!({
                    "expires_at": null,
                    "notes": null,
                    "auto_renew": true
                }),
            ))
            .await
            .unwrap();

        assert_json!(response.json().await, {
            "id": id,
            "domain": "example.com",
            "client_id": 1,
            "project_id": project_id,
            "registrar": validators::null(),
            "purchased_at": validators::null(),
            "expires_at": validators::null(),
            "auto_renew": true,
            "purchase_cost": validators::null(),
            "renew_cost": validators::null(),
            "billed_amount": 4200,
            "notes": validators::null(),
            "status": "active",
            "created_at": validators::i64(|_| Ok(()))
        });
    }

    #[tokio::test]
    async fn unknown() {
        let db = create_database().await;

        let response = router(db)
            .call(request(123, json!({ "notes": "missing" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_timestamp() {
        let db = create_database().await;
        let id = create_domain_record(&db, "example.com", 1, Status::Active)
            .await
            .id;

        let response = router(db)
            .call(request(id, json!({ "expires_at": i64::MAX })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
