//! HTTP transport layer
//!
//! Provides the three server bindings (`/mcp` unary, `/ws` duplex, `/sse` push) and the
//! metadata endpoints.

pub mod handlers;
pub mod sse;
pub mod ws;
