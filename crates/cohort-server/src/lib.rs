//! HTTP surface for the audience-building engine.
//!
//! Exposes the conversational turn endpoint as a server-sent event
//! stream, plus read paths over the transcript store. Tenant identity is
//! resolved per-request through a collaborator trait and fails closed.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod server;
pub mod telemetry;
pub mod tenancy;
pub mod validation;

pub use config::ServerConfig;
pub use errors::ApiError;
pub use server::{AppState, build_state, router, serve};
pub use tenancy::{StaticTenantResolver, TenantContext, TenantResolver};
