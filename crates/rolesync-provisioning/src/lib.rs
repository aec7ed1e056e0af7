//! # Role Provisioning
//!
//! Reconciles system role assignments in the target system against the
//! desired assignments published by an external source.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────────┐     ┌─────────────────┐
//! │ External Source │────►│ ReconciliationEngine │────►│  Target System  │
//! │ (SQL / CSV)     │rows │                      │grant│ (roles, users,  │
//! └─────────────────┘     └──────────┬───────────┘revoke assignments)   │
//!                                    │                 └─────────────────┘
//!                                    ▼
//!                         ┌──────────────────────┐
//!                         │ ProgressTrace +      │
//!                         │ SyncReport           │
//!                         └──────────────────────┘
//! ```
//!
//! See [`reconciliation`] for the run lifecycle.

pub mod reconciliation;

pub use reconciliation::{
    CurrentAssignmentIndex, ProgressTrace, ReconciliationEngine, ReconciliationResult,
    RemoveAction, SkipReason, SyncConfig, SyncCounters, SyncError, SyncReport, SyncStatus,
    TableInspection, TraceLevel,
};
