pub use sea_orm_migration::prelude::*;

mod schema;

mod m20250301_000001_events_and_pricing;
mod m20250301_000002_registrations;
mod m20250302_000001_crm_and_mail;
mod m20250303_000001_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_events_and_pricing::Migration),
            Box::new(m20250301_000002_registrations::Migration),
            Box::new(m20250302_000001_crm_and_mail::Migration),
            Box::new(m20250303_000001_audit_logs::Migration),
        ]
    }
}
