//! core
//!
//! Core domain types, schemas, and operations for gitpass.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, PassPath, RecipientList, etc.
//! - [`changes`] - Pending change sets and their ordered operations
//! - [`config`] - Configuration schema and loading
//! - [`lock`] - Repository-scoped commit lock
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing

pub mod changes;
pub mod config;
pub mod lock;
pub mod types;
