//! HTTP handlers, grouped by concern.

pub mod discovery;
pub mod health;
