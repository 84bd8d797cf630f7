//! Domain layer for the Mapbook backend.
//!
//! This crate contains:
//! - Domain models (Map, Place, Visit, Notification, identity)
//! - Pure business logic services (membership resolution, geo-merge,
//!   search/filter, notification fan-out planning)
//! - Domain error types
//!
//! Nothing in this crate performs I/O.

pub mod models;
pub mod services;
