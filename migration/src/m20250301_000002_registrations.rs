use sea_orm_migration::prelude::*;

use crate::schema::{
    create_event_unique_index, create_index, created_at_col, drop_table, id_col, status_col,
};

#[derive(DeriveIden, Clone)]
enum Coupons {
    Table,
    Id,
    EventId,
    InstanceId,
    Code,
    Name,
    DiscountType,
    Amount,
    AppliesTo,
    MaxRedemptions,
    EndsAt,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Registrations {
    Table,
    Id,
    EventId,
    InstanceId,
    RegistrationTierId,
    RegistrationPeriodPricingId,
    PriceSnapshot,
    UpsellTotal,
    Total,
    CouponId,
    TeamId,
    CrmPersonId,
    StripePaymentIntentId,
    Finalized,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RegistrationFieldResponses {
    Table,
    Id,
    RegistrationId,
    FieldId,
    Value,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RegistrationUpsells {
    Table,
    Id,
    RegistrationId,
    UpsellItemId,
    PriceSnapshot,
    Quantity,
    CreatedAt,
}

#[derive(DeriveIden)]
enum LedgerItems {
    Table,
    Id,
    EventId,
    InstanceId,
    RegistrationId,
    CrmPersonId,
    Amount,
    Source,
    StripePaymentIntentId,
    ReceiptUrl,
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
                    .table(Coupons::Table)
                    .if_not_exists()
                    .col(&mut id_col(Coupons::Id))
                    .col(ColumnDef::new(Coupons::EventId).big_integer().not_null())
                    .col(ColumnDef::new(Coupons::InstanceId).big_integer().not_null())
                    .col(ColumnDef::new(Coupons::Code).string_len(64).not_null())
                    .col(ColumnDef::new(Coupons::Name).string_len(255).null())
                    .col(ColumnDef::new(Coupons::DiscountType).string_len(16).not_null())
                    .col(ColumnDef::new(Coupons::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Coupons::AppliesTo).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Coupons::MaxRedemptions)
                            .big_integer()
                            .not_null()
                            .default(-1),
                    )
                    .col(
                        ColumnDef::new(Coupons::EndsAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(&mut status_col(Coupons::Status))
                    .col(&mut created_at_col(Coupons::CreatedAt))
                    .col(&mut created_at_col(Coupons::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        create_event_unique_index(
            manager,
            "uq_coupons_scope_code",
            Coupons::Table,
            Coupons::EventId,
            &[Coupons::InstanceId, Coupons::Code],
        )
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(Registrations::Table)
                    .if_not_exists()
                    .col(&mut id_col(Registrations::Id))
                    .col(ColumnDef::new(Registrations::EventId).big_integer().not_null())
                    .col(ColumnDef::new(Registrations::InstanceId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Registrations::RegistrationTierId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Registrations::RegistrationPeriodPricingId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Registrations::PriceSnapshot)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Registrations::UpsellTotal)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Registrations::Total)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Registrations::CouponId).big_integer().null())
                    .col(ColumnDef::new(Registrations::TeamId).big_integer().null())
                    .col(ColumnDef::new(Registrations::CrmPersonId).big_integer().null())
                    .col(
                        ColumnDef::new(Registrations::StripePaymentIntentId)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Registrations::Finalized)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(&mut status_col(Registrations::Status))
                    .col(&mut created_at_col(Registrations::CreatedAt))
                    .col(&mut created_at_col(Registrations::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Registrations::Table, Registrations::CouponId)
                            .to(Coupons::Table, Coupons::Id),
                    )
                    .to_owned(),
            )
            .await?;

        create_index(
            manager,
            "idx_registrations_coupon",
            Registrations::Table,
            Registrations::CouponId,
        )
        .await?;
        create_index(
            manager,
            "idx_registrations_instance",
            Registrations::Table,
            Registrations::InstanceId,
        )
        .await?;
        create_index(
            manager,
            "idx_registrations_intent",
            Registrations::Table,
            Registrations::StripePaymentIntentId,
        )
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(RegistrationFieldResponses::Table)
                    .if_not_exists()
                    .col(&mut id_col(RegistrationFieldResponses::Id))
                    .col(
                        ColumnDef::new(RegistrationFieldResponses::RegistrationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RegistrationFieldResponses::FieldId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RegistrationFieldResponses::Value).text().not_null())
                    .col(&mut created_at_col(RegistrationFieldResponses::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                RegistrationFieldResponses::Table,
                                RegistrationFieldResponses::RegistrationId,
                            )
                            .to(Registrations::Table, Registrations::Id),
                    )
                    .to_owned(),
            )
            .await?;

        create_index(
            manager,
            "idx_field_responses_registration",
            RegistrationFieldResponses::Table,
            RegistrationFieldResponses::RegistrationId,
        )
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(RegistrationUpsells::Table)
                    .if_not_exists()
                    .col(&mut id_col(RegistrationUpsells::Id))
                    .col(
                        ColumnDef::new(RegistrationUpsells::RegistrationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RegistrationUpsells::UpsellItemId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RegistrationUpsells::PriceSnapshot)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RegistrationUpsells::Quantity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(&mut created_at_col(RegistrationUpsells::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                RegistrationUpsells::Table,
                                RegistrationUpsells::RegistrationId,
                            )
                            .to(Registrations::Table, Registrations::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LedgerItems::Table)
                    .if_not_exists()
                    .col(&mut id_col(LedgerItems::Id))
                    .col(ColumnDef::new(LedgerItems::EventId).big_integer().not_null())
                    .col(ColumnDef::new(LedgerItems::InstanceId).big_integer().not_null())
                    .col(ColumnDef::new(LedgerItems::RegistrationId).big_integer().null())
                    .col(ColumnDef::new(LedgerItems::CrmPersonId).big_integer().null())
                    .col(ColumnDef::new(LedgerItems::Amount).big_integer().not_null())
                    .col(ColumnDef::new(LedgerItems::Source).string_len(16).not_null())
                    .col(
                        ColumnDef::new(LedgerItems::StripePaymentIntentId)
                            .string_len(255)
                            .null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(LedgerItems::ReceiptUrl).text().null())
                    .col(&mut created_at_col(LedgerItems::CreatedAt))
                    .to_owned(),
            )
            .await?;

        create_index(
            manager,
            "idx_ledger_registration",
            LedgerItems::Table,
            LedgerItems::RegistrationId,
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_table(manager, LedgerItems::Table).await?;
        drop_table(manager, RegistrationUpsells::Table).await?;
        drop_table(manager, RegistrationFieldResponses::Table).await?;
        drop_table(manager, Registrations::Table).await?;
        drop_table(manager, Coupons::Table).await?;
        Ok(())
    }
}
