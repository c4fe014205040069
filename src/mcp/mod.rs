//! JSON-RPC envelope handling and method dispatch
//!
//! Provides the wire records shared by every binding, the method enable/disable table,
//! and the dispatcher that resolves a method name to exactly one outcome.

pub mod methods;
pub mod rpc;
pub mod server;
