//! Strongly Typed Identifiers
//!
//! Target-system records (users, roles, contexts) are keyed by 64-bit integer
//! ids. Wrapping them in newtypes keeps a role id from ever being passed where
//! a user id is expected.
//!
//! # Example
//!
//! ```
//! use rolesync_core::{RoleId, UserId};
//!
//! let user = UserId::from_i64(42);
//! let role = RoleId::from_i64(3);
//!
//! fn requires_user(id: UserId) -> i64 {
//!     id.as_i64()
//! }
//!
//! assert_eq!(requires_user(user), 42);
//! // requires_user(role); // This would not compile!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying integer parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed integer ID type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an ID from a raw database key.
            #[must_use]
            pub const fn from_i64(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw database key.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
            }
        }
    };
}

define_id!(
    /// Identifier of a local user account in the target system.
    UserId
);

define_id!(
    /// Identifier of a role definition in the target system.
    ///
    /// Roles are looked up by shortname and then referred to by id
    /// everywhere else (assignment index, sync role set, mutations).
    RoleId
);

define_id!(
    /// Identifier of a context (the administrative scope an assignment lives in).
    ContextId
);
