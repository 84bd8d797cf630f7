//! Shared utilities and common types for the Mapbook backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Coordinate and value validation logic
//! - Limit/offset pagination types

pub mod pagination;
pub mod validation;
