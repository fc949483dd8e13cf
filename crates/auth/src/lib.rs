//! `stockledger-auth`: role-based authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage. Authentication
//! happens upstream; what arrives here is a trusted [`AuthContext`].

pub mod context;
pub mod permissions;
pub mod policy;
pub mod roles;

pub use context::AuthContext;
pub use permissions::{Action, Permission, Resource};
pub use policy::{AuthorizationExplanation, AuthzError, Decision, authorize, evaluate, explain};
pub use roles::Role;
