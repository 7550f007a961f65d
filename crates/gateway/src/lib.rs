//! Gateway: MCP-over-SSE sessions, control-protocol dispatch and the HTTP
//! admin surface.
//!
//! Lifecycle:
//! 1. Load config, open the store, load the catalog
//! 2. Build the protocol bridge and resolve auth
//! 3. Serve `/health`, `/mcp/*` and `/api/*`
//!
//! Tool invocation is delegated to `bridgeway-bridge`; control-protocol
//! methods are registered in `methods.rs`.

pub mod api;
pub mod auth;
pub mod error;
pub mod methods;
pub mod registry;
pub mod server;
pub mod session;
pub mod sse;
pub mod state;
