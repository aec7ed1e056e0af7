//! # rolesync core
//!
//! Shared vocabulary for the role synchronisation workspace:
//!
//! - [`ids`] - typed identifiers for users, roles and contexts
//! - [`types`] - assignment keys, local user fields, user match results
//! - [`traits`] - the target-system capabilities the engine depends on
//! - [`error`] - target-system errors
//! - [`memory`] - an in-memory target system

pub mod error;
pub mod ids;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{TargetError, TargetResult};
pub use ids::{ContextId, ParseIdError, RoleId, UserId};
pub use memory::{InMemoryTarget, LocalUser};
pub use traits::{AssignmentStore, RoleCatalog, TargetSystem, UserCatalog};
pub use types::{AssignmentKey, LocalUserField, MutationOutcome, UserMatch};
