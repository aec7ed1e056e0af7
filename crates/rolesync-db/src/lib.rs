//! # rolesync-db
//!
//! `PostgreSQL` persistence for the target system: users, roles, the
//! system context and role assignments, plus [`PgTargetStore`], which
//! exposes them through the `rolesync-core` traits.
//!
//! ```rust,ignore
//! use rolesync_db::{run_migrations, DbPool, PgTargetStore};
//!
//! let pool = DbPool::connect("postgres://localhost/lms").await?;
//! run_migrations(&pool).await?;
//! let store = PgTargetStore::new(pool);
//! ```

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod store;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::DbPool;
pub use store::PgTargetStore;
