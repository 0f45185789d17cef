pub mod email_address;
pub mod phone;

pub use email_address::*;
pub use phone::*;
