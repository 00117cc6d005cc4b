//! HTTP request handlers.

pub mod sessions;
pub mod turn;
