use db::deployment::Status;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deployments::Table)
                    .col(
                        ColumnDef::new(Deployments::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Deployments::ProjectId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Deployments::Version).big_integer().not_null())
                    .col(
                        ColumnDef::new(Deployments::Status)
                            .small_integer()
                            .not_null()
                            .default(Status::Pending),
                    )
                    .col(
                        ColumnDef::new(Deployments::Platform)
                            .small_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Deployments::DeployUrl).string())
                    .col(ColumnDef::new(Deployments::Logs).text())
                    .col(ColumnDef::new(Deployments::BuildTimeMs).big_integer())
                    .col(
                        ColumnDef::new(Deployments::Metadata)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Deployments::CreatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Deployments::Table, Deployments::ProjectId)
                            .to(crate::Projects::Table, crate::Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("deployments_project_id_idx")
                    .table(Deployments::Table)
                    .col(Deployments::ProjectId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Deployments::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum Deployments {
    Table,
    Id,
    ProjectId,
    Version,
    Status,
    Platform,
    DeployUrl,
    Logs,
    BuildTimeMs,
    Metadata,
    CreatedAt,
}
