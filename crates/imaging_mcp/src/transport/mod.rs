//! The two transports. Both expose one [`ToolRegistry`](crate::registry::ToolRegistry):
//! stdio awaits the async handlers, HTTP drives the derived blocking ones.

pub mod http;
pub mod jsonrpc;
pub mod stdio;
