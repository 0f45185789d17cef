pub mod admin;
pub mod coupon;
pub mod cron;
pub mod registration;
pub mod webhook;

pub use admin::admin_config;
pub use coupon::coupon_config;
pub use cron::cron_config;
pub use registration::registration_config;
pub use webhook::webhook_config;
