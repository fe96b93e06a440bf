// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    dead_code
)]

//! Common test utilities shared by the unit and property test targets
//!
//! Provides in-memory stand-ins for the Object Store and the managed database
//! API plus builders for BridgeCluster resources.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[path = "../common/mod.rs"]
//! mod common;
//! use common::*;
//! ```

mod fetcher;

pub use fetcher::*;
pub use fixtures::*;
pub use store::*;
