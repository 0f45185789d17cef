use sea_orm_migration::prelude::*;

use crate::schema::{create_index, created_at_col, drop_table, id_col};

#[derive(DeriveIden)]
enum AuditLogs {
    Table,
    Id,
    BatchId,
    EventId,
    EntityType,
    EntityId,
    Action,
    Data,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(&mut id_col(AuditLogs::Id))
                    .col(ColumnDef::new(AuditLogs::BatchId).string_len(64).not_null())
                    .col(ColumnDef::new(AuditLogs::EventId).big_integer().null())
                    .col(ColumnDef::new(AuditLogs::EntityType).string_len(64).not_null())
                    .col(ColumnDef::new(AuditLogs::EntityId).big_integer().null())
                    .col(ColumnDef::new(AuditLogs::Action).string_len(64).not_null())
                    .col(ColumnDef::new(AuditLogs::Data).text().null())
                    .col(&mut created_at_col(AuditLogs::CreatedAt))
                    .to_owned(),
            )
            .await?;

        create_index(manager, "idx_audit_logs_event", AuditLogs::Table, AuditLogs::EventId)
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_table(manager, AuditLogs::Table).await
    }
}
