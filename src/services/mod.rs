mod audit_service;
mod guard;
pub mod password;
pub mod scope;
mod user_service;

pub use audit_service::*;
pub use guard::*;
pub use scope::{ScopeResolver, SelectOption};
pub use user_service::*;
