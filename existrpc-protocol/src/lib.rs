//! # existrpc-protocol
//!
//! XML-RPC wire protocol for existrpc.
//!
//! This crate provides:
//! - A micro XML parser for the subset XML-RPC uses
//! - The `Value` model and its `<value>` encoding
//! - `<methodCall>` / `<methodResponse>` envelopes, including faults
//!
//! It performs no I/O; see `existrpc-client` for the transport.

pub mod codec;
pub mod error;
pub mod message;
pub mod value;
pub mod xml;

pub use codec::{Decoder, Encoder};
pub use error::{DecodeError, EncodeError, ParseError, ParseErrorKind};
pub use message::{Fault, FaultCode, MethodCall, MethodResponse};
pub use value::{Struct, Value};
pub use xml::Element;

/// Content type for request and response bodies.
pub const CONTENT_TYPE: &str = "text/xml";

/// Default XML-RPC endpoint path of an exist-db server.
pub const DEFAULT_XMLRPC_PATH: &str = "/exist/xmlrpc";
