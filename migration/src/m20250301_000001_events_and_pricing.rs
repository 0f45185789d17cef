use sea_orm_migration::prelude::*;

use crate::schema::{create_index, created_at_col, drop_table, id_col, status_col};

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
    Name,
    Slug,
    StripeAccountId,
    ContactEmail,
    DigestFrequency,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EventInstances {
    Table,
    Id,
    EventId,
    Name,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RegistrationTiers {
    Table,
    Id,
    EventId,
    InstanceId,
    Name,
    Description,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RegistrationPeriods {
    Table,
    Id,
    EventId,
    InstanceId,
    Name,
    StartsAt,
    EndsAt,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RegistrationPeriodPricings {
    Table,
    Id,
    RegistrationTierId,
    RegistrationPeriodId,
    Price,
    Available,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RegistrationFields {
    Table,
    Id,
    EventId,
    InstanceId,
    Label,
    FieldType,
    Required,
    Position,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum UpsellItems {
    Table,
    Id,
    EventId,
    InstanceId,
    Name,
    Price,
    Status,
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
                    .table(Events::Table)
                    .if_not_exists()
                    .col(&mut id_col(Events::Id))
                    .col(ColumnDef::new(Events::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Events::Slug)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Events::StripeAccountId).string_len(255).null())
                    .col(ColumnDef::new(Events::ContactEmail).string_len(255).null())
                    .col(
                        ColumnDef::new(Events::DigestFrequency)
                            .string_len(16)
                            .not_null()
                            .default("NONE"),
                    )
                    .col(&mut status_col(Events::Status))
                    .col(&mut created_at_col(Events::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EventInstances::Table)
                    .if_not_exists()
                    .col(&mut id_col(EventInstances::Id))
                    .col(ColumnDef::new(EventInstances::EventId).big_integer().not_null())
                    .col(ColumnDef::new(EventInstances::Name).string_len(255).not_null())
                    .col(&mut status_col(EventInstances::Status))
                    .col(&mut created_at_col(EventInstances::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .from(EventInstances::Table, EventInstances::EventId)
                            .to(Events::Table, Events::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RegistrationTiers::Table)
                    .if_not_exists()
                    .col(&mut id_col(RegistrationTiers::Id))
                    .col(ColumnDef::new(RegistrationTiers::EventId).big_integer().not_null())
                    .col(
                        ColumnDef::new(RegistrationTiers::InstanceId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RegistrationTiers::Name).string_len(255).not_null())
                    .col(ColumnDef::new(RegistrationTiers::Description).text().null())
                    .col(&mut status_col(RegistrationTiers::Status))
                    .col(&mut created_at_col(RegistrationTiers::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RegistrationPeriods::Table)
                    .if_not_exists()
                    .col(&mut id_col(RegistrationPeriods::Id))
                    .col(
                        ColumnDef::new(RegistrationPeriods::EventId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RegistrationPeriods::InstanceId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RegistrationPeriods::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(RegistrationPeriods::StartsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RegistrationPeriods::EndsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(&mut status_col(RegistrationPeriods::Status))
                    .col(&mut created_at_col(RegistrationPeriods::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RegistrationPeriodPricings::Table)
                    .if_not_exists()
                    .col(&mut id_col(RegistrationPeriodPricings::Id))
                    .col(
                        ColumnDef::new(RegistrationPeriodPricings::RegistrationTierId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RegistrationPeriodPricings::RegistrationPeriodId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RegistrationPeriodPricings::Price)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RegistrationPeriodPricings::Available)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(&mut status_col(RegistrationPeriodPricings::Status))
                    .col(&mut created_at_col(RegistrationPeriodPricings::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                RegistrationPeriodPricings::Table,
                                RegistrationPeriodPricings::RegistrationTierId,
                            )
                            .to(RegistrationTiers::Table, RegistrationTiers::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                RegistrationPeriodPricings::Table,
                                RegistrationPeriodPricings::RegistrationPeriodId,
                            )
                            .to(RegistrationPeriods::Table, RegistrationPeriods::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RegistrationFields::Table)
                    .if_not_exists()
                    .col(&mut id_col(RegistrationFields::Id))
                    .col(
                        ColumnDef::new(RegistrationFields::EventId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RegistrationFields::InstanceId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RegistrationFields::Label).string_len(255).not_null())
                    .col(
                        ColumnDef::new(RegistrationFields::FieldType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RegistrationFields::Required)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(RegistrationFields::Position)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(&mut status_col(RegistrationFields::Status))
                    .col(&mut created_at_col(RegistrationFields::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UpsellItems::Table)
                    .if_not_exists()
                    .col(&mut id_col(UpsellItems::Id))
                    .col(ColumnDef::new(UpsellItems::EventId).big_integer().not_null())
                    .col(ColumnDef::new(UpsellItems::InstanceId).big_integer().not_null())
                    .col(ColumnDef::new(UpsellItems::Name).string_len(255).not_null())
                    .col(ColumnDef::new(UpsellItems::Price).big_integer().not_null())
                    .col(&mut status_col(UpsellItems::Status))
                    .col(&mut created_at_col(UpsellItems::CreatedAt))
                    .to_owned(),
            )
            .await?;

        create_index(manager, "idx_tiers_scope", RegistrationTiers::Table, RegistrationTiers::InstanceId).await?;
        create_index(manager, "idx_periods_scope", RegistrationPeriods::Table, RegistrationPeriods::InstanceId).await?;
        create_index(manager, "idx_fields_scope", RegistrationFields::Table, RegistrationFields::InstanceId).await?;
        create_index(manager, "idx_upsells_scope", UpsellItems::Table, UpsellItems::InstanceId).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_table(manager, UpsellItems::Table).await?;
        drop_table(manager, RegistrationFields::Table).await?;
        drop_table(manager, RegistrationPeriodPricings::Table).await?;
        drop_table(manager, RegistrationPeriods::Table).await?;
        drop_table(manager, RegistrationTiers::Table).await?;
        drop_table(manager, EventInstances::Table).await?;
        drop_table(manager, Events::Table).await?;
        Ok(())
    }
}
