//! gitpass - A git-backed, GPG-recipient-aware password store
//!
//! Passwords are OpenPGP ciphertext files in a bare git repository. Each
//! directory may carry a `.gpg-id` file naming the key IDs its files are
//! encrypted to; the closest one above a file wins. Reads run against an
//! immutable commit snapshot, and every batch of changes lands as exactly
//! one commit.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, drives the store)
//! - [`store`] - Repository handle and read/write transactions
//! - [`core`] - Domain types, change sets, configuration and locking
//! - [`git`] - Single interface for all Git operations
//! - [`gpg`] - Recipient key IDs from OpenPGP packet headers
//! - [`access`] - Write authorization against recipient lists
//!
//! # Correctness Invariants
//!
//! 1. A transaction never observes commits made after it began
//! 2. A commit's only parent is the snapshot its transaction read
//! 3. Two writers from the same snapshot cannot both succeed
//! 4. A recipient change cannot leave affected files unre-encrypted

pub mod access;
pub mod cli;
pub mod core;
pub mod git;
pub mod gpg;
pub mod store;
