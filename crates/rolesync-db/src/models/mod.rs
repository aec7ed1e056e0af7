//! Target database models.

pub mod context;
pub mod role;
pub mod role_assignment;
pub mod user;

pub use context::{Context, CONTEXT_SYSTEM};
pub use role::Role;
pub use role_assignment::{RoleAssignment, SYNC_COMPONENT};
pub use user::User;
