//! XML-RPC envelope types.

use crate::value::{Struct, Value};
use std::fmt;

/// A `<methodCall>`: procedure name plus positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method_name: String,
    pub params: Vec<Value>,
}

impl MethodCall {
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, param: impl Into<Value>) -> Self {
        self.params.push(param.into());
        self
    }
}

/// Fault codes are integers by convention, but some servers send strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FaultCode {
    Int(i64),
    Text(String),
}

impl FaultCode {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FaultCode::Int(i) => Some(*i),
            FaultCode::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultCode::Int(i) => write!(f, "{}", i),
            FaultCode::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for FaultCode {
    fn from(code: i64) -> Self {
        FaultCode::Int(code)
    }
}

impl From<i32> for FaultCode {
    fn from(code: i32) -> Self {
        FaultCode::Int(code.into())
    }
}

impl From<&str> for FaultCode {
    fn from(code: &str) -> Self {
        FaultCode::Text(code.to_string())
    }
}

impl From<FaultCode> for Value {
    fn from(code: FaultCode) -> Self {
        match code {
            FaultCode::Int(i) => Value::Int(i),
            FaultCode::Text(s) => Value::String(s),
        }
    }
}

/// A protocol-level failure reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub code: FaultCode,
    pub message: String,
}

impl Fault {
    pub fn new(code: impl Into<FaultCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The `<struct>` carried inside `<fault><value>`.
    pub fn to_struct(&self) -> Struct {
        Struct::new()
            .with("faultCode", self.code.clone())
            .with("faultString", self.message.as_str())
    }
}

/// A decoded `<methodResponse>`.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(Value),
    Fault(Fault),
}

impl MethodResponse {
    pub fn is_fault(&self) -> bool {
        matches!(self, MethodResponse::Fault(_))
    }

    /// Converts into a `Result`, with the fault as the error.
    pub fn into_result(self) -> Result<Value, Fault> {
        match self {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Fault(fault) => Err(fault),
        }
    }
}
