mod actor;
mod audit_log;
mod organization;
mod role;
mod user;

pub use actor::*;
pub use audit_log::*;
pub use organization::*;
pub use role::*;
pub use user::*;
