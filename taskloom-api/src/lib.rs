//! Taskloom HTTP API
//!
//! Multi-tenant task management service. Every request runs through a
//! layered pipeline (trace, rate limit, CORS, request inspection, security
//! headers, panic recovery) before reaching the route handlers; protected
//! routes additionally pass token verification. Reads are served
//! cache-aside from Redis with Postgres as the store of record, and task
//! creation triggers detached AI enrichment.

pub mod app;
pub mod config;
pub mod enrichment;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
