//! High-level client API.

use crate::connection::{Connection, ConnectionConfig, Transport};
use crate::error::ClientError;
use existrpc_protocol::{Decoder, Encoder, MethodCall, MethodResponse, Value};
use std::sync::Arc;

/// XML-RPC client for one endpoint.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Creates a client talking HTTP(S) to the configured endpoint.
    pub fn new(config: ConnectionConfig) -> Result<Self, ClientError> {
        Ok(Self::with_transport(Arc::new(Connection::new(config)?)))
    }

    /// Creates a client over any transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Invokes a remote procedure and returns its result.
    ///
    /// One round trip, no retry. A fault becomes [`ClientError::Fault`]; an
    /// unreadable response becomes [`ClientError::Decode`]. Parameters with
    /// NaN or infinite doubles fail with [`ClientError::Encode`] before
    /// anything is sent.
    pub async fn invoke(
        &self,
        method_name: &str,
        params: Vec<Value>,
    ) -> Result<Value, ClientError> {
        let call = MethodCall::new(method_name).with_params(params);
        let body = Encoder::try_encode_call(&call)?;
        tracing::debug!("Calling {} ({} bytes)", method_name, body.len());

        let response = self.transport.post(body).await?;

        match Decoder::decode_response(&response) {
            Ok(MethodResponse::Success(value)) => {
                tracing::debug!("{} returned {}", method_name, value.type_name());
                Ok(value)
            }
            Ok(MethodResponse::Fault(fault)) => {
                tracing::debug!("{} fault {}: {}", method_name, fault.code, fault.message);
                Err(fault.into())
            }
            Err(e) => {
                tracing::debug!("{} response could not be decoded: {}", method_name, e);
                Err(ClientError::decode(e, &response))
            }
        }
    }

    /// Invokes a procedure that must return an integer.
    pub(crate) async fn invoke_int(
        &self,
        method_name: &str,
        params: Vec<Value>,
    ) -> Result<i64, ClientError> {
        match self.invoke(method_name, params).await? {
            Value::Int(i) => Ok(i),
            other => Err(ClientError::UnexpectedResult {
                method: method_name.to_string(),
                expected: "int",
                found: other.type_name(),
            }),
        }
    }
}
