//! Landing page project.
//!
//! Only the fields the deployment pipeline depends on are modelled here,
//! the rest of the project configuration is owned by the template renderer.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Project model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    /// Unique project identifier.
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Owning client identifier.
    pub client_id: i64,

    /// Human-readable project name.
    pub name: String,

    /// Provider-side project name, also used as a build directory name.
    pub slug: String,

    /// Hosting provider the project is deployed to.
    pub platform: Platform,

    /// URL of the latest successful deployment.
    pub deploy_url: Option<String>,

    /// Custom domain linked on the provider side.
    pub domain: Option<String>,

    /// Project creation timestamp.
    pub created_at: TimeDateTime,
}

/// Supported hosting providers.
#[derive(
    Copy, Debug, Clone, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[sea_orm(num_value = 0)]
    Vercel,
    #[sea_orm(num_value = 1)]
    Netlify,
}

impl Platform {
    /// Lowercase provider name, as used in logs and deployment metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Vercel => "vercel",
            Platform::Netlify => "netlify",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Project model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::deployment::Entity")]
    Deployments,

    #[sea_orm(has_many = "super::domain_record::Entity")]
    DomainRecords,
}

impl Related<super::deployment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deployments.def()
    }
}

impl Related<super::domain_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DomainRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
