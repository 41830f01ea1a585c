//! # existrpc-client
//!
//! Async client for the eXist-db XML-RPC endpoint.
//!
//! This crate provides:
//! - HTTP/1.1 transport over plain TCP or TLS, with Basic authentication
//! - Connection settings from URLs and `EXISTDB_*` environment variables
//! - Generic remote procedure invocation with structured faults
//! - Paginated query execution with guaranteed result-set release

pub mod client;
pub mod connection;
pub mod error;
pub mod query;
pub mod tls;

#[cfg(test)]
mod testing;

pub use client::Client;
pub use connection::{BasicAuth, Connection, ConnectionConfig, TlsClientConfig, Transport};
pub use error::{ClientError, LifecycleError};
pub use query::{Query, QueryOptions, ReadAllResult, ResultHandle, ResultSet};
