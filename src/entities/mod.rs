pub mod audit_logs;
pub mod conversations;
pub mod coupons;
pub mod crm_people;
pub mod crm_person_emails;
pub mod email_attachments;
pub mod emails;
pub mod enums;
pub mod event_instances;
pub mod events;
pub mod gmail_connections;
pub mod inbound_emails;
pub mod ledger_items;
pub mod registration_field_responses;
pub mod registration_fields;
pub mod registration_period_pricings;
pub mod registration_periods;
pub mod registration_tiers;
pub mod registration_upsells;
pub mod registrations;
pub mod upsell_items;

pub use enums::*;

pub use audit_logs as audit_log_entity;
pub use conversations as conversation_entity;
pub use coupons as coupon_entity;
pub use crm_people as crm_person_entity;
pub use crm_person_emails as crm_person_email_entity;
pub use email_attachments as email_attachment_entity;
pub use emails as email_entity;
pub use event_instances as event_instance_entity;
pub use events as event_entity;
pub use gmail_connections as gmail_connection_entity;
pub use inbound_emails as inbound_email_entity;
pub use ledger_items as ledger_item_entity;
pub use registration_field_responses as field_response_entity;
pub use registration_fields as registration_field_entity;
pub use registration_period_pricings as period_pricing_entity;
pub use registration_periods as registration_period_entity;
pub use registration_tiers as registration_tier_entity;
pub use registration_upsells as registration_upsell_entity;
pub use registrations as registration_entity;
pub use upsell_items as upsell_item_entity;
