//! # Reconciliation Engine
//!
//! One-way synchronisation of system role assignments from an external
//! source into the target system.
//!
//! ## Overview
//!
//! A run:
//! - checks the configuration is complete before touching any system
//! - opens one source connection and refuses to continue when the source
//!   table holds no more than `min_records` rows
//! - snapshots the current assignments of the synced roles into a
//!   [`CurrentAssignmentIndex`]
//! - streams source rows, claiming assignments that already exist and
//!   granting the ones that do not
//! - releases the source connection on every exit path
//! - revokes every unclaimed assignment, unless the remove action is `keep`
//!
//! Per-row problems (empty fields, unknown roles or users) are counted and
//! skipped; they never abort a run.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      ReconciliationEngine                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │ RowAccessor  │───►│  Role / User │───►│  Assignment  │       │
//! │  │ (normalise)  │    │  resolution  │    │  Index       │       │
//! │  └──────────────┘    └──────────────┘    └──────┬───────┘       │
//! │                                                 │               │
//! │                                                 ▼               │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │ ProgressTrace│    │ SyncCounters │    │ grant/revoke │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use rolesync_provisioning::reconciliation::{ReconciliationEngine, SyncConfig, TracingTrace};
//!
//! let engine = ReconciliationEngine::new(Arc::new(connector), Arc::new(store));
//! let report = engine.sync(&config, &TracingTrace::new()).await;
//! std::process::exit(report.exit_code);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod report;
pub mod row;
pub mod statistics;
pub mod trace;

pub use config::{RemoveAction, SyncConfig, DEFAULT_MIN_RECORDS};
pub use engine::{inspect_source, ReconciliationEngine, TableInspection};
pub use error::{ReconciliationResult, RowError, SkipReason, SyncError};
pub use index::CurrentAssignmentIndex;
pub use report::{SyncReport, SyncStatus};
pub use row::{NormalizedRow, RowAccessor};
pub use statistics::SyncCounters;
pub use trace::{BufferedTrace, NullTrace, ProgressTrace, TraceLevel, TracingTrace};
