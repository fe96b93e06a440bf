// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for the PostgreSQL Bridge operator
//!
//! This module contains unit tests for:
//! - Reconcile pass scenarios (create, garbage collection, rename, failures)
//! - The Bridge API client
//! - Validation logic
//! - Status management
//! - The pgBackRest command builder

#[path = "../common/mod.rs"]
mod common;

mod engine;
mod validation;
