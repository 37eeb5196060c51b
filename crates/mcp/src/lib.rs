//! A stateless streaming JSON-RPC tool surface.
//!
//! The dialect is the Model Context Protocol's streamable-HTTP shape in
//! JSON-response mode: each POSTed request carries a tool call (or a
//! lifecycle method) and produces exactly one JSON payload in return.
//! No session state survives a request, so any replica can answer any
//! call.

mod context;
pub mod protocol;
mod registry;
mod server;

pub use context::RequestContext;
pub use registry::{input_schema_for, parse_arguments, ToolHandler, ToolRegistry};
pub use server::routes;
