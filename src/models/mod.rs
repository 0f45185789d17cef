pub mod common;
pub mod coupon;
pub mod crm;
pub mod mail;
pub mod pagination;
pub mod registration;

pub use common::*;
pub use coupon::*;
pub use crm::*;
pub use mail::*;
pub use pagination::*;
pub use registration::*;
