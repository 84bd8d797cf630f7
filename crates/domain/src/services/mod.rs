//! Pure domain services.

pub mod fanout;
pub mod geo_merge;
pub mod membership;
pub mod search;
