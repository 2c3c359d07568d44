/*
 * Responsibility
 * - HTTP API (routes / handlers / dto / extractors)
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod routes;

pub use routes::{default_exemptions, default_policy, routes};
