//! # flagstore Testkit
//!
//! Test utilities for flagstore.
//!
//! This crate provides:
//! - Test fixtures: data kinds, JSON item builders, store helpers
//! - Property-based test generators using proptest
//! - Multi-instance harnesses over one shared in-memory server
//! - Stress testing utilities for concurrent writers
//!
//! ## Usage
//!
//! ```rust
//! use flagstore_testkit::prelude::*;
//!
//! let backend = SharedBackend::new();
//! let store = backend.store("test");
//! assert!(store.upsert(&features(), "flagA", &flag("flagA", 1)).unwrap().is_applied());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
