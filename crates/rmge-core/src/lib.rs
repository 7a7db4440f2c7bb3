// ABOUTME: Shared error type, constants, and data model for the meal plan engine
// ABOUTME: Depended on by every other rmge crate; holds no business logic of its own
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

#![warn(missing_docs)]

//! Core types shared across the retrieval-augmented meal plan engine.

/// Generic LRU-with-TTL cache primitive shared across cache-backed components.
pub mod cache;
/// Numeric defaults used across the engine.
pub mod constants;
/// Unified error type returned by every public RMGE operation.
pub mod errors;
/// Data model: documents, profiles, requests, plans, quota state.
pub mod models;

pub use errors::{RetryClass, RmgeError};
