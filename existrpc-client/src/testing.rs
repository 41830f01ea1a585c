//! In-process transport double for unit tests.

use crate::connection::Transport;
use crate::error::ClientError;
use async_trait::async_trait;
use bytes::Bytes;
use existrpc_protocol::{Decoder, Encoder, MethodCall, MethodResponse};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Handler = Box<dyn Fn(&MethodCall) -> Result<Bytes, ClientError> + Send + Sync>;
type Delay = Box<dyn Fn(&MethodCall) -> Duration + Send + Sync>;

/// Decodes each request, records it, and answers through a handler.
pub struct MockTransport {
    handler: Handler,
    delay: Option<Delay>,
    calls: Mutex<Vec<MethodCall>>,
}

impl MockTransport {
    /// Answers every call with an encoded response.
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&MethodCall) -> MethodResponse + Send + Sync + 'static,
    {
        Self::raw(move |call| Ok(Encoder::encode_response(&handler(call))))
    }

    /// Answers with raw bytes or a transport error.
    pub fn raw<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&MethodCall) -> Result<Bytes, ClientError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Like [`MockTransport::new`], sleeping before each answer.
    pub fn with_delay<F, D>(handler: F, delay: D) -> Arc<Self>
    where
        F: Fn(&MethodCall) -> MethodResponse + Send + Sync + 'static,
        D: Fn(&MethodCall) -> Duration + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(move |call| Ok(Encoder::encode_response(&handler(call)))),
            delay: Some(Box::new(delay)),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Calls received so far, in arrival order.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn method_names(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|c| c.method_name)
            .collect()
    }

    /// Calls to one procedure, in arrival order.
    pub fn calls_to(&self, method_name: &str) -> Vec<MethodCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method_name == method_name)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, body: Bytes) -> Result<Bytes, ClientError> {
        let call = Decoder::decode_call(&body).expect("client sent an invalid methodCall");
        self.calls.lock().unwrap().push(call.clone());
        if let Some(ref delay) = self.delay {
            tokio::time::sleep(delay(&call)).await;
        }
        (self.handler)(&call)
    }
}
