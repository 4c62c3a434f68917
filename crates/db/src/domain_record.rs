//! Administrative domain registration record.
//!
//! Domain records track registrar, expiry and billing information and are
//! managed independently of the domains linked on the hosting provider side.
//! A record may exist for a domain that is not linked anywhere yet, and a linked
//! domain does not require a record.
//!
//! The stored [`Status`] value is a cache of [`compute_status`] at write time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::{Duration, PrimitiveDateTime};

/// Domains that expire within this window are considered [`Status::ExpiringSoon`].
pub const EXPIRING_SOON_WINDOW: Duration = Duration::days(30);

/// Domain record model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "domain_records")]
pub struct Model {
    /// Unique domain record identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Fully-qualified domain name.
    #[sea_orm(unique)]
    pub domain: String,

    /// Owning client identifier.
    pub client_id: i64,

    /// Project the domain is used by, if any.
    pub project_id: Option<i64>,

    /// Registrar name.
    pub registrar: Option<String>,

    /// Purchase timestamp.
    pub purchased_at: Option<TimeDateTime>,

    /// Registration expiry timestamp.
    pub expires_at: Option<TimeDateTime>,

    /// Whether the registration renews automatically.
    pub auto_renew: bool,

    /// Purchase cost, in minor currency units.
    pub purchase_cost: Option<i64>,

    /// Renewal cost, in minor currency units.
    pub renew_cost: Option<i64>,

    /// Amount billed to the client, in minor currency units.
    pub billed_amount: Option<i64>,

    /// Free-form notes.
    pub notes: Option<String>,

    /// Cached registration status.
    pub status: Status,

    /// Record creation timestamp.
    pub created_at: TimeDateTime,
}

/// Domain registration status.
#[derive(
    Copy,
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[sea_orm(num_value = 0)]
    Active,
    #[sea_orm(num_value = 1)]
    ExpiringSoon,
    #[sea_orm(num_value = 2)]
    Expired,
}

/// Derive domain registration status from its expiry timestamp.
///
/// Records without a known expiry are considered active.
pub fn compute_status(expires_at: Option<PrimitiveDateTime>, now: PrimitiveDateTime) -> Status {
    match expires_at {
        None => Status::Active,
        Some(expires_at) if expires_at <= now => Status::Expired,
        Some(expires_at) if expires_at <= now + EXPIRING_SOON_WINDOW => Status::ExpiringSoon,
        Some(_) => Status::Active,
    }
}

/// Domain record model relations.
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
