pub mod gmail;
pub mod postmark;
pub mod stripe;

pub use self::gmail::*;
pub use self::postmark::*;
pub use self::stripe::*;
