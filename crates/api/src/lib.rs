//! HTTP API: configuration, request context, routing and the response envelope.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
