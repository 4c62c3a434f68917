pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_projects_table;
mod m20240101_000002_create_deployments_table;
mod m20240101_000003_create_domain_records_table;

pub(crate) use m20240101_000001_create_projects_table::Projects;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_projects_table::Migration),
            Box::new(m20240101_000002_create_deployments_table::Migration),
            Box::new(m20240101_000003_create_domain_records_table::Migration),
        ]
    }
}
