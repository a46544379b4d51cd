// libs/auth-cell/src/services/mod.rs
pub mod identity;
pub mod password;

pub use identity::IdentityService;
