//! Node client adapter: talks to the upstream Mimblewimble-family node's
//! JSON-RPC foreign API.
//!
//! [`client::ReqwestNodeClient`] implements [`crate::ports::NodeClient`].
//! [`wire`] holds the request/response envelope and payload shapes specific
//! to that API.

mod client;
mod wire;

pub use client::ReqwestNodeClient;
