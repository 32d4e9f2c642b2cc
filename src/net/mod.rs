//! Wire types, endpoint surface, and the HTTP gateway.

pub mod api;
pub mod gateway;
pub mod types;
