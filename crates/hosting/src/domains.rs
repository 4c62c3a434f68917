//! Domain lifecycle management.
//!
//! Two independent sets of operations live here:
//!
//! - provider pass-through operations that link custom domains to a project
//!   on the hosting provider side, mirroring the latest linked domain onto
//!   the project row;
//! - administrative domain registration records with registrar, expiry and
//!   billing details, whose status is derived from the expiry timestamp.

use db::{
    deployment,
    domain_record::{self, compute_status, EXPIRING_SOON_WINDOW},
    project, ActiveModelTrait, ActiveValue, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, IntoActiveModel, PrimitiveDateTime, QueryFilter, QueryOrder, QuerySelect,
    SelectExt,
};
use derive_more::{Display, Error, From};
use tracing::{debug, info, instrument};

use crate::{
    provider::{ProviderAdapter, ProviderDomain, ProviderError},
    rdap::{DomainLookup, LookupError},
};

/// Errors that may occur during domain management.
#[derive(Debug, Display, From, Error)]
pub enum DomainError {
    /// Database-related error.
    Database(DbErr),

    /// Hosting provider error.
    Provider(ProviderError),

    /// Registration lookup error.
    Lookup(LookupError),

    /// Domain record does not exist.
    #[display(fmt = "domain record not found")]
    NotFound,

    /// Domain record with the same domain name already exists.
    #[from(ignore)]
    #[display(fmt = "domain {} is already registered", domain)]
    AlreadyExists { domain: String },

    /// Project was never deployed successfully.
    #[display(fmt = "project has no successful deployments")]
    NoSuccessfulDeployment,
}

/// New domain record details.
#[derive(Clone, Debug, Default)]
pub struct NewDomainRecord {
    pub domain: String,
    pub client_id: i64,
    pub project_id: Option<i64>,
    pub registrar: Option<String>,
    pub purchased_at: Option<PrimitiveDateTime>,
    pub expires_at: Option<PrimitiveDateTime>,
    pub auto_renew: bool,
    pub purchase_cost: Option<i64>,
    pub renew_cost: Option<i64>,
    pub billed_amount: Option<i64>,
    pub notes: Option<String>,
}

/// Partial domain record update.
///
/// Outer [`None`] leaves the field untouched, `Some(None)` clears it.
#[derive(Clone, Debug, Default)]
pub struct DomainRecordPatch {
    pub project_id: Option<Option<i64>>,
    pub registrar: Option<Option<String>>,
    pub purchased_at: Option<Option<PrimitiveDateTime>>,
    pub expires_at: Option<Option<PrimitiveDateTime>>,
    pub auto_renew: Option<bool>,
    pub purchase_cost: Option<Option<i64>>,
    pub renew_cost: Option<Option<i64>>,
    pub billed_amount: Option<Option<i64>>,
    pub notes: Option<Option<String>>,
}

/// Domain record list filter.
#[derive(Clone, Debug, Default)]
pub struct RecordFilter {
    pub client_id: Option<i64>,
    pub project_id: Option<i64>,
    pub status: Option<domain_record::Status>,
}

/// Normalize a domain name for storage and comparison.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn set_if_present<T>(value: &mut ActiveValue<T>, patch: Option<T>)
where
    T: Into<db::sea_query::Value>,
{
    if let Some(patch) = patch {
        *value = ActiveValue::Set(patch);
    }
}

/// Create a new domain record, deriving its status from the expiry timestamp.
#[instrument(skip_all, fields(domain = %record.domain))]
pub async fn create_record(
    db: &DatabaseConnection,
    record: NewDomainRecord,
) -> Result<domain_record::Model, DomainError> {
    let domain = normalize_domain(&record.domain);

    let exists = domain_record::Entity::find()
        .select_only()
        .filter(domain_record::Column::Domain.eq(domain.as_str()))
        .exists(db)
        .await?;

    if exists {
        return Err(DomainError::AlreadyExists { domain });
    }

    let now = db::utc_now();

    let model = domain_record::Entity::insert(domain_record::ActiveModel {
        domain: ActiveValue::Set(domain),
        client_id: ActiveValue::Set(record.client_id),
        project_id: ActiveValue::Set(record.project_id),
        registrar: ActiveValue::Set(record.registrar),
        purchased_at: ActiveValue::Set(record.purchased_at),
        expires_at: ActiveValue::Set(record.expires_at),
        auto_renew: ActiveValue::Set(record.auto_renew),
        purchase_cost: ActiveValue::Set(record.purchase_cost),
        renew_cost: ActiveValue::Set(record.renew_cost),
        billed_amount: ActiveValue::Set(record.billed_amount),
        notes: ActiveValue::Set(record.notes),
        status: ActiveValue::Set(compute_status(record.expires_at, now)),
        created_at: ActiveValue::Set(now),
        ..Default::default()
    })
    .exec_with_returning(db)
    .await?;

    info!(id = model.id, status = ?model.status, "domain record created");

    Ok(model)
}

/// Find a domain record by its identifier.
pub async fn find_record(
    db: &DatabaseConnection,
    id: i64,
) -> Result<domain_record::Model, DomainError> {
    domain_record::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)
}

/// List domain records that match the filter, ordered by expiry.
///
/// Records without a known expiry come last.
pub async fn list_records(
    db: &DatabaseConnection,
    filter: &RecordFilter,
    offset: u64,
    limit: u64,
) -> Result<Vec<domain_record::Model>, DomainError> {
    let mut query = domain_record::Entity::find();

    if let Some(client_id) = filter.client_id {
        query = query.filter(domain_record::Column::ClientId.eq(client_id));
    }

    if let Some(project_id) = filter.project_id {
        query = query.filter(domain_record::Column::ProjectId.eq(project_id));
    }

    if let Some(status) = filter.status {
        query = query.filter(domain_record::Column::Status.eq(status));
    }

    Ok(query
        .order_by_asc(domain_record::Column::ExpiresAt.is_null())
        .order_by_asc(domain_record::Column::ExpiresAt)
        .order_by_asc(domain_record::Column::Id)
        .offset(offset)
        .limit(limit)
        .all(db)
        .await?)
}

/// Apply a partial update to a domain record, recomputing its status.
#[instrument(skip(db, patch))]
pub async fn update_record(
    db: &DatabaseConnection,
    id: i64,
    patch: DomainRecordPatch,
) -> Result<domain_record::Model, DomainError> {
    let record = find_record(db, id).await?;
    let expires_at = patch.expires_at.unwrap_or(record.expires_at);

    let mut model = record.into_active_model();

    set_if_present(&mut model.project_id, patch.project_id);
    set_if_present(&mut model.registrar, patch.registrar);
    set_if_present(&mut model.purchased_at, patch.purchased_at);
    set_if_present(&mut model.expires_at, patch.expires_at);
    set_if_present(&mut model.auto_renew, patch.auto_renew);
    set_if_present(&mut model.purchase_cost, patch.purchase_cost);
    set_if_present(&mut model.renew_cost, patch.renew_cost);
    set_if_present(&mut model.billed_amount, patch.billed_amount);
    set_if_present(&mut model.notes, patch.notes);
    model.status = ActiveValue::Set(compute_status(expires_at, db::utc_now()));

    Ok(model.update(db).await?)
}

/// Delete a domain record.
pub async fn delete_record(db: &DatabaseConnection, id: i64) -> Result<(), DomainError> {
    let result = domain_record::Entity::delete_by_id(id).exec(db).await?;

    if result.rows_affected == 0 {
        return Err(DomainError::NotFound);
    }

    Ok(())
}

/// Fill missing registration details of a record using the `lookup`.
///
/// Details already present on the record are never overwritten. The record is
/// left untouched if the lookup fails.
#[instrument(skip(db, lookup))]
pub async fn refresh_record(
    db: &DatabaseConnection,
    id: i64,
    lookup: &dyn DomainLookup,
) -> Result<domain_record::Model, DomainError> {
    let record = find_record(db, id).await?;
    let info = lookup.lookup(&record.domain).await?;

    debug!(?info, "registration details fetched");

    let expires_at = record.expires_at.or(info.expires_at);
    let fill_expiry = record.expires_at.is_none() && info.expires_at.is_some();
    let fill_registrar = record.registrar.is_none() && info.registrar.is_some();

    let mut model = record.into_active_model();

    if fill_expiry {
        model.expires_at = ActiveValue::Set(info.expires_at);
    }

    if fill_registrar {
        model.registrar = ActiveValue::Set(info.registrar);
    }

    model.status = ActiveValue::Set(compute_status(expires_at, db::utc_now()));

    Ok(model.update(db).await?)
}

/// Recompute cached statuses of all domain records.
///
/// Returns the count of records whose status changed.
#[instrument(skip(db))]
pub async fn refresh_statuses(
    db: &DatabaseConnection,
    now: PrimitiveDateTime,
) -> Result<u64, DomainError> {
    let soon = now + EXPIRING_SOON_WINDOW;

    let targets = [
        (
            domain_record::Status::Expired,
            Condition::all().add(domain_record::Column::ExpiresAt.lte(now)),
        ),
        (
            domain_record::Status::ExpiringSoon,
            Condition::all()
                .add(domain_record::Column::ExpiresAt.gt(now))
                .add(domain_record::Column::ExpiresAt.lte(soon)),
        ),
        (
            domain_record::Status::Active,
            Condition::any()
                .add(domain_record::Column::ExpiresAt.is_null())
                .add(domain_record::Column::ExpiresAt.gt(soon)),
        ),
    ];

    let mut changed = 0;

    for (status, condition) in targets {
        changed += domain_record::Entity::update_many()
            .filter(condition)
            .filter(domain_record::Column::Status.ne(status))
            .col_expr(domain_record::Column::Status, status.into())
            .exec(db)
            .await?
            .rows_affected;
    }

    info!(changed, "domain record statuses refreshed");

    Ok(changed)
}

/// List custom domains linked to the project on the provider side.
pub async fn list_provider_domains(
    adapter: &dyn ProviderAdapter,
    project: &project::Model,
) -> Result<Vec<ProviderDomain>, DomainError> {
    Ok(adapter.list_domains(&project.slug).await?)
}

/// Link a custom domain to a project that was deployed at least once.
///
/// The linked domain is mirrored onto the project row.
#[instrument(skip(db, adapter, project), fields(project = %project.slug))]
pub async fn add_provider_domain(
    db: &DatabaseConnection,
    adapter: &dyn ProviderAdapter,
    project: &project::Model,
    domain: &str,
) -> Result<ProviderDomain, DomainError> {
    let deployed = deployment::Entity::find()
        .select_only()
        .filter(deployment::Column::ProjectId.eq(project.id))
        .filter(deployment::Column::Status.eq(deployment::Status::Success))
        .exists(db)
        .await?;

    if !deployed {
        return Err(DomainError::NoSuccessfulDeployment);
    }

    let domain = normalize_domain(domain);
    let linked = adapter.add_domain(&project.slug, &domain).await?;

    project::Entity::update_many()
        .filter(project::Column::Id.eq(project.id))
        .col_expr(project::Column::Domain, Some(domain).into())
        .exec(db)
        .await?;

    info!(domain = %linked.name, verified = linked.verified, "domain linked");

    Ok(linked)
}

/// Unlink a custom domain from the project.
///
/// The project's mirrored domain is cleared only if it matches the removed one.
#[instrument(skip(db, adapter, project), fields(project = %project.slug))]
pub async fn remove_provider_domain(
    db: &DatabaseConnection,
    adapter: &dyn ProviderAdapter,
    project: &project::Model,
    domain: &str,
) -> Result<(), DomainError> {
    let domain = normalize_domain(domain);

    adapter.remove_domain(&project.slug, &domain).await?;

    project::Entity::update_many()
        .filter(project::Column::Id.eq(project.id))
        .filter(project::Column::Domain.eq(domain.as_str()))
        .col_expr(project::Column::Domain, Option::<String>::None.into())
        .exec(db)
        .await?;

    info!(%domain, "domain unlinked");

    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use db::{project::Platform, ActiveValue};
    use time::{macros::datetime, Duration};

    use super::*;
    use crate::{
        rdap::RegistrationInfo,
        support::{create_database, create_project},
        testing::MockProvider,
    };

    struct StaticLookup(Option<RegistrationInfo>);

    #[async_trait]
    impl DomainLookup for StaticLookup {
        async fn lookup(&self, domain: &str) -> Result<RegistrationInfo, LookupError> {
            self.0.clone().ok_or_else(|| LookupError::NotFound {
                domain: domain.to_owned(),
            })
        }
    }

    fn new_record(domain: &str, expires_at: Option<PrimitiveDateTime>) -> NewDomainRecord {
        NewDomainRecord {
            domain: String::from(domain),
            client_id: 1,
            expires_at,
            auto_renew: true,
            renew_cost: Some(1299),
            ..Default::default()
        }
    }

    async fn mark_deployed(db: &DatabaseConnection, project_id: i64) {
        deployment::Entity::insert(deployment::ActiveModel {
            project_id: ActiveValue::Set(project_id),
            version: ActiveValue::Set(1),
            status: ActiveValue::Set(deployment::Status::Success),
            platform: ActiveValue::Set(Platform::Vercel),
            metadata: ActiveValue::Set(String::from("{}")),
            created_at: ActiveValue::Set(db::utc_now()),
            ..Default::default()
        })
        .exec_without_returning(db)
        .await
        .unwrap();
    }

    async fn project_domain(db: &DatabaseConnection, id: i64) -> Option<String> {
        project::Entity::find_by_id(id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .domain
    }

    #[tokio::test]
    async fn create_computes_status() {
        let db = create_database().await;
        let now = db::utc_now();

        let soon = create_record(&db, new_record("Soon.example.", Some(now + Duration::days(10))))
            .await
            .unwrap();
        let expired = create_record(&db, new_record("expired.com", Some(now - Duration::days(1))))
            .await
            .unwrap();
        let unknown = create_record(&db, new_record("unknown.com", None))
            .await
            .unwrap();

        assert_eq!(soon.domain, "soon.example");
        assert_eq!(soon.status, domain_record::Status::ExpiringSoon);
        assert_eq!(expired.status, domain_record::Status::Expired);
        assert_eq!(unknown.status, domain_record::Status::Active);
        assert_eq!(unknown.renew_cost, Some(1299));
    }

    #[tokio::test]
    async fn duplicates_are_rejected() {
        let db = create_database().await;

        create_record(&db, new_record("example.com", None))
            .await
            .unwrap();

        assert!(matches!(
            create_record(&db, new_record("EXAMPLE.com", None)).await,
            Err(DomainError::AlreadyExists { domain }) if domain == "example.com"
        ));
    }

    #[tokio::test]
    async fn patch_semantics() {
        let db = create_database().await;
        let now = db::utc_now();

        let record = create_record(
            &db,
            NewDomainRecord {
                registrar: Some(String::from("Registrar")),
                notes: Some(String::from("bought for the spring campaign")),
                ..new_record("example.com", Some(now - Duration::days(3)))
            },
        )
        .await
        .unwrap();

        assert_eq!(record.status, domain_record::Status::Expired);

        let updated = update_record(
            &db,
            record.id,
            DomainRecordPatch {
                expires_at: Some(Some(now + Duration::days(365))),
                notes: Some(None),
                billed_amount: Some(Some(2500)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.status, domain_record::Status::Active);
        assert_eq!(updated.registrar.as_deref(), Some("Registrar"));
        assert_eq!(updated.notes, None);
        assert_eq!(updated.billed_amount, Some(2500));

        let cleared = update_record(
            &db,
            record.id,
            DomainRecordPatch {
                expires_at: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(cleared.expires_at, None);
        assert_eq!(cleared.status, domain_record::Status::Active);

        assert!(matches!(
            update_record(&db, record.id + 100, DomainRecordPatch::default()).await,
            Err(DomainError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete() {
        let db = create_database().await;
        let record = create_record(&db, new_record("example.com", None))
            .await
            .unwrap();

        delete_record(&db, record.id).await.unwrap();

        assert!(matches!(
            delete_record(&db, record.id).await,
            Err(DomainError::NotFound)
        ));
    }

    #[tokio::test]
    async fn refresh_fills_missing_fields_only() {
        let db = create_database().await;
        let now = db::utc_now();
        let own_expiry = now + Duration::days(200);

        let complete = create_record(
            &db,
            NewDomainRecord {
                registrar: Some(String::from("Own Registrar")),
                ..new_record("complete.com", Some(own_expiry))
            },
        )
        .await
        .unwrap();
        let empty = create_record(&db, new_record("empty.com", None))
            .await
            .unwrap();

        let lookup = StaticLookup(Some(RegistrationInfo {
            expires_at: Some(now + Duration::days(5)),
            registrar: Some(String::from("Looked Up Registrar")),
        }));

        let complete = refresh_record(&db, complete.id, &lookup).await.unwrap();
        assert_eq!(complete.expires_at, Some(own_expiry));
        assert_eq!(complete.registrar.as_deref(), Some("Own Registrar"));
        assert_eq!(complete.status, domain_record::Status::Active);

        let empty = refresh_record(&db, empty.id, &lookup).await.unwrap();
        assert_eq!(empty.expires_at, Some(now + Duration::days(5)));
        assert_eq!(empty.registrar.as_deref(), Some("Looked Up Registrar"));
        assert_eq!(empty.status, domain_record::Status::ExpiringSoon);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_record() {
        let db = create_database().await;
        let record = create_record(&db, new_record("example.com", None))
            .await
            .unwrap();

        assert!(matches!(
            refresh_record(&db, record.id, &StaticLookup(None)).await,
            Err(DomainError::Lookup(LookupError::NotFound { .. }))
        ));
        assert_eq!(find_record(&db, record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn batch_status_refresh() {
        let db = create_database().await;

        let first = create_record(&db, new_record("a.com", Some(datetime!(2024-06-20 00:00))))
            .await
            .unwrap();
        let second = create_record(&db, new_record("b.com", Some(datetime!(2024-12-01 00:00))))
            .await
            .unwrap();
        create_record(&db, new_record("c.com", None)).await.unwrap();

        assert_eq!(first.status, domain_record::Status::Expired);
        assert_eq!(second.status, domain_record::Status::Expired);

        let changed = refresh_statuses(&db, datetime!(2024-06-01 00:00))
            .await
            .unwrap();

        assert_eq!(changed, 2);
        assert_eq!(
            find_record(&db, first.id).await.unwrap().status,
            domain_record::Status::ExpiringSoon
        );
        assert_eq!(
            find_record(&db, second.id).await.unwrap().status,
            domain_record::Status::Active
        );

        assert_eq!(
            refresh_statuses(&db, datetime!(2024-06-01 00:00))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn list_filters() {
        let db = create_database().await;
        let now = db::utc_now();

        create_record(&db, new_record("later.com", Some(now + Duration::days(300))))
            .await
            .unwrap();
        create_record(&db, new_record("sooner.com", Some(now + Duration::days(3))))
            .await
            .unwrap();
        create_record(
            &db,
            NewDomainRecord {
                client_id: 2,
                ..new_record("other.com", None)
            },
        )
        .await
        .unwrap();

        let domains = |records: Vec<domain_record::Model>| {
            records
                .into_iter()
                .map(|record| record.domain)
                .collect::<Vec<_>>()
        };

        let all = list_records(&db, &RecordFilter::default(), 0, 25)
            .await
            .unwrap();
        assert_eq!(domains(all), ["sooner.com", "later.com", "other.com"]);

        let client = list_records(
            &db,
            &RecordFilter {
                client_id: Some(1),
                ..Default::default()
            },
            0,
            25,
        )
        .await
        .unwrap();
        assert_eq!(client.len(), 2);

        let expiring = list_records(
            &db,
            &RecordFilter {
                status: Some(domain_record::Status::ExpiringSoon),
                ..Default::default()
            },
            0,
            25,
        )
        .await
        .unwrap();
        assert_eq!(domains(expiring), ["sooner.com"]);
    }

    #[tokio::test]
    async fn provider_domain_requires_deployment() {
        let db = create_database().await;
        let project = create_project(&db, "landing", Platform::Vercel).await;
        let provider = MockProvider::new(Platform::Vercel);

        assert!(matches!(
            add_provider_domain(&db, &provider, &project, "example.com").await,
            Err(DomainError::NoSuccessfulDeployment)
        ));
        assert!(provider.list_domains("landing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_domain_lifecycle() {
        let db = create_database().await;
        let project = create_project(&db, "landing", Platform::Vercel).await;
        let provider = MockProvider::new(Platform::Vercel).domain("old.example.com");

        mark_deployed(&db, project.id).await;

        let linked = add_provider_domain(&db, &provider, &project, "Example.com")
            .await
            .unwrap();
        assert_eq!(linked.name, "example.com");

        let names: Vec<_> = list_provider_domains(&provider, &project)
            .await
            .unwrap()
            .into_iter()
            .map(|domain| domain.name)
            .collect();
        assert_eq!(names, ["old.example.com", "example.com"]);

        assert_eq!(
            project_domain(&db, project.id).await.as_deref(),
            Some("example.com")
        );

        remove_provider_domain(&db, &provider, &project, "old.example.com")
            .await
            .unwrap();
        assert_eq!(
            project_domain(&db, project.id).await.as_deref(),
            Some("example.com")
        );

        remove_provider_domain(&db, &provider, &project, "example.com")
            .await
            .unwrap();
        assert_eq!(project_domain(&db, project.id).await, None);

        assert!(matches!(
            remove_provider_domain(&db, &provider, &project, "example.com").await,
            Err(DomainError::Provider(ProviderError::DomainNotLinked { .. }))
        ));
    }
}
