pub mod audit_log_service;
pub mod coupon_service;
pub mod crm_service;
pub mod digest_service;
pub mod gmail_ingestion_service;
pub mod payment_service;
pub mod pricing_service;
pub mod registration_field_service;
pub mod registration_service;

pub use audit_log_service::*;
pub use coupon_service::*;
pub use crm_service::*;
pub use digest_service::*;
pub use gmail_ingestion_service::*;
pub use payment_service::*;
pub use pricing_service::*;
pub use registration_field_service::*;
pub use registration_service::*;
