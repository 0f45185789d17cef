use sea_orm_migration::prelude::*;

use crate::schema::{create_event_unique_index, create_index, created_at_col, drop_table, id_col};

#[derive(DeriveIden, Clone)]
enum CrmPeople {
    Table,
    Id,
    EventId,
    Email,
    Name,
    Source,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CrmPersonEmails {
    Table,
    Id,
    CrmPersonId,
    InboundEmailId,
    EmailId,
    CreatedAt,
}

#[derive(DeriveIden, Clone)]
enum Conversations {
    Table,
    Id,
    EventId,
    MailboxHash,
    Subject,
    LastMessageAt,
    CreatedAt,
}

#[derive(DeriveIden, Clone)]
enum InboundEmails {
    Table,
    Id,
    EventId,
    ConversationId,
    MessageId,
    ProviderMessageId,
    FromEmail,
    FromName,
    ToAddresses,
    CcAddresses,
    Subject,
    TextBody,
    HtmlBody,
    ReceivedAt,
    CrmPersonId,
    CreatedAt,
}

#[derive(DeriveIden, Clone)]
enum Emails {
    Table,
    Id,
    EventId,
    ConversationId,
    MessageId,
    ProviderMessageId,
    FromEmail,
    ToAddresses,
    CcAddresses,
    Subject,
    TextBody,
    HtmlBody,
    SentAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EmailAttachments {
    Table,
    Id,
    InboundEmailId,
    Filename,
    ContentType,
    Size,
    Content,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GmailConnections {
    Table,
    Id,
    EventId,
    Email,
    AccessToken,
    RefreshToken,
    TokenExpiresAt,
    LastSyncedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CrmPeople::Table)
                    .if_not_exists()
                    .col(&mut id_col(CrmPeople::Id))
                    .col(ColumnDef::new(CrmPeople::EventId).big_integer().not_null())
                    .col(ColumnDef::new(CrmPeople::Email).string_len(320).not_null())
                    .col(ColumnDef::new(CrmPeople::Name).string_len(255).null())
                    .col(ColumnDef::new(CrmPeople::Source).string_len(16).not_null())
                    .col(&mut created_at_col(CrmPeople::CreatedAt))
                    .to_owned(),
            )
            .await?;
        create_event_unique_index(
            manager,
            "uq_crm_people_event_email",
            CrmPeople::Table,
            CrmPeople::EventId,
            &[CrmPeople::Email],
        )
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(Conversations::Table)
                    .if_not_exists()
                    .col(&mut id_col(Conversations::Id))
                    .col(ColumnDef::new(Conversations::EventId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Conversations::MailboxHash)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Conversations::Subject).text().null())
                    .col(
                        ColumnDef::new(Conversations::LastMessageAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(&mut created_at_col(Conversations::CreatedAt))
                    .to_owned(),
            )
            .await?;
        create_event_unique_index(
            manager,
            "uq_conversations_event_thread",
            Conversations::Table,
            Conversations::EventId,
            &[Conversations::MailboxHash],
        )
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(InboundEmails::Table)
                    .if_not_exists()
                    .col(&mut id_col(InboundEmails::Id))
                    .col(ColumnDef::new(InboundEmails::EventId).big_integer().not_null())
                    .col(
                        ColumnDef::new(InboundEmails::ConversationId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InboundEmails::MessageId).string_len(512).not_null())
                    .col(
                        ColumnDef::new(InboundEmails::ProviderMessageId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(InboundEmails::FromEmail).string_len(320).not_null())
                    .col(ColumnDef::new(InboundEmails::FromName).string_len(255).null())
                    .col(ColumnDef::new(InboundEmails::ToAddresses).text().not_null())
                    .col(ColumnDef::new(InboundEmails::CcAddresses).text().not_null())
                    .col(ColumnDef::new(InboundEmails::Subject).text().null())
                    .col(ColumnDef::new(InboundEmails::TextBody).text().null())
                    .col(ColumnDef::new(InboundEmails::HtmlBody).text().null())
                    .col(
                        ColumnDef::new(InboundEmails::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InboundEmails::CrmPersonId).big_integer().null())
                    .col(&mut created_at_col(InboundEmails::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .from(InboundEmails::Table, InboundEmails::ConversationId)
                            .to(Conversations::Table, Conversations::Id),
                    )
                    .to_owned(),
            )
            .await?;
        create_event_unique_index(
            manager,
            "uq_inbound_emails_event_message",
            InboundEmails::Table,
            InboundEmails::EventId,
            &[InboundEmails::MessageId],
        )
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(Emails::Table)
                    .if_not_exists()
                    .col(&mut id_col(Emails::Id))
                    .col(ColumnDef::new(Emails::EventId).big_integer().not_null())
                    .col(ColumnDef::new(Emails::ConversationId).big_integer().not_null())
                    .col(ColumnDef::new(Emails::MessageId).string_len(512).not_null())
                    .col(
                        ColumnDef::new(Emails::ProviderMessageId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Emails::FromEmail).string_len(320).not_null())
                    .col(ColumnDef::new(Emails::ToAddresses).text().not_null())
                    .col(ColumnDef::new(Emails::CcAddresses).text().not_null())
                    .col(ColumnDef::new(Emails::Subject).text().null())
                    .col(ColumnDef::new(Emails::TextBody).text().null())
                    .col(ColumnDef::new(Emails::HtmlBody).text().null())
                    .col(
                        ColumnDef::new(Emails::SentAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(&mut created_at_col(Emails::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Emails::Table, Emails::ConversationId)
                            .to(Conversations::Table, Conversations::Id),
                    )
                    .to_owned(),
            )
            .await?;
        create_event_unique_index(
            manager,
            "uq_emails_event_message",
            Emails::Table,
            Emails::EventId,
            &[Emails::MessageId],
        )
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(CrmPersonEmails::Table)
                    .if_not_exists()
                    .col(&mut id_col(CrmPersonEmails::Id))
                    .col(
                        ColumnDef::new(CrmPersonEmails::CrmPersonId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CrmPersonEmails::InboundEmailId)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(CrmPersonEmails::EmailId).big_integer().null())
                    .col(&mut created_at_col(CrmPersonEmails::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .from(CrmPersonEmails::Table, CrmPersonEmails::CrmPersonId)
                            .to(CrmPeople::Table, CrmPeople::Id),
                    )
                    .to_owned(),
            )
            .await?;
        create_index(
            manager,
            "idx_crm_person_emails_person",
            CrmPersonEmails::Table,
            CrmPersonEmails::CrmPersonId,
        )
        .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailAttachments::Table)
                    .if_not_exists()
                    .col(&mut id_col(EmailAttachments::Id))
                    .col(
                        ColumnDef::new(EmailAttachments::InboundEmailId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailAttachments::Filename).string_len(512).not_null())
                    .col(
                        ColumnDef::new(EmailAttachments::ContentType)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmailAttachments::Size).big_integer().not_null())
                    .col(ColumnDef::new(EmailAttachments::Content).binary().not_null())
                    .col(&mut created_at_col(EmailAttachments::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .from(EmailAttachments::Table, EmailAttachments::InboundEmailId)
                            .to(InboundEmails::Table, InboundEmails::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GmailConnections::Table)
                    .if_not_exists()
                    .col(&mut id_col(GmailConnections::Id))
                    .col(
                        ColumnDef::new(GmailConnections::EventId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(GmailConnections::Email).string_len(320).not_null())
                    .col(ColumnDef::new(GmailConnections::AccessToken).text().not_null())
                    .col(ColumnDef::new(GmailConnections::RefreshToken).text().not_null())
                    .col(
                        ColumnDef::new(GmailConnections::TokenExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GmailConnections::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(&mut created_at_col(GmailConnections::CreatedAt))
                    .col(&mut created_at_col(GmailConnections::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_table(manager, GmailConnections::Table).await?;
        drop_table(manager, EmailAttachments::Table).await?;
        drop_table(manager, CrmPersonEmails::Table).await?;
        drop_table(manager, Emails::Table).await?;
        drop_table(manager, InboundEmails::Table).await?;
        drop_table(manager, Conversations::Table).await?;
        drop_table(manager, CrmPeople::Table).await?;
        Ok(())
    }
}
