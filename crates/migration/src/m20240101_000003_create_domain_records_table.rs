use db::domain_record::Status;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DomainRecords::Table)
                    .col(
                        ColumnDef::new(DomainRecords::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DomainRecords::Domain)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(DomainRecords::ClientId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DomainRecords::ProjectId).big_integer())
                    .col(ColumnDef::new(DomainRecords::Registrar).string())
                    .col(ColumnDef::new(DomainRecords::PurchasedAt).timestamp())
                    .col(ColumnDef::new(DomainRecords::ExpiresAt).timestamp())
                    .col(
                        ColumnDef::new(DomainRecords::AutoRenew)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(DomainRecords::PurchaseCost).big_integer())
                    .col(ColumnDef::new(DomainRecords::RenewCost).big_integer())
                    .col(ColumnDef::new(DomainRecords::BilledAmount).big_integer())
                    .col(ColumnDef::new(DomainRecords::Notes).text())
                    .col(
                        ColumnDef::new(DomainRecords::Status)
                            .small_integer()
                            .not_null()
                            .default(Status::Active),
                    )
                    .col(
                        ColumnDef::new(DomainRecords::CreatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(DomainRecords::Table, DomainRecords::ProjectId)
                            .to(crate::Projects::Table, crate::Projects::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DomainRecords::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
enum DomainRecords {
    Table,
    Id,
    Domain,
    ClientId,
    ProjectId,
    Registrar,
    PurchasedAt,
    ExpiresAt,
    AutoRenew,
    PurchaseCost,
    RenewCost,
    BilledAmount,
    Notes,
    Status,
    CreatedAt,
}
