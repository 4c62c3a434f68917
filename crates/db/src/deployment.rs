//! Recorded deployment run.
//!
//! A deployment row is inserted with the [`Status::Building`] status when
//! the pipeline starts and is updated exactly once to either [`Status::Success`]
//! or [`Status::Failed`] when it finishes.

use sea_orm::{entity::prelude::*, sea_query, QuerySelect};
use serde::{Deserialize, Serialize};

use crate::project::Platform;

/// Deployment model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "deployments")]
pub struct Model {
    /// Unique deployment identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Related project identifier.
    pub project_id: i64,

    /// Per-project sequential deployment number, starting from 1.
    pub version: i64,

    /// Deployment status.
    pub status: Status,

    /// Hosting provider used for this deployment.
    pub platform: Platform,

    /// Final URL, if the deployment succeeded.
    pub deploy_url: Option<String>,

    /// Captured error text, if the deployment failed.
    pub logs: Option<String>,

    /// Total pipeline duration, in milliseconds.
    pub build_time_ms: Option<i64>,

    /// JSON-encoded provider-specific details.
    pub metadata: String,

    /// Deployment creation timestamp.
    pub created_at: TimeDateTime,
}

#[derive(
    Copy, Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[sea_orm(num_value = 0)]
    Pending,
    #[sea_orm(num_value = 1)]
    Building,
    #[sea_orm(num_value = 2)]
    Success,
    #[sea_orm(num_value = 3)]
    Failed,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Get the version number for the next deployment of the provided project.
///
/// Concurrent deployments of the same project may observe the same value,
/// versions are informational and are not used as identifiers.
pub async fn next_version<C: ConnectionTrait>(db: &C, project_id: i64) -> Result<i64, DbErr> {
    let latest = Entity::find()
        .select_only()
        .column_as(sea_query::Expr::col(Column::Version).max(), "version")
        .filter(Column::ProjectId.eq(project_id))
        .into_tuple::<Option<i64>>()
        .one(db)
        .await?
        .flatten();

    Ok(latest.unwrap_or(0) + 1)
}
