//! HTTP route handlers.

pub mod health;
pub mod maps;
pub mod notifications;
pub mod places;
pub mod visits;
