//! Protocol error types.

use std::fmt;
use thiserror::Error;

/// What the parser was looking for when it gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A specific character was required.
    Expected(char),
    /// A tag or attribute name was required.
    ExpectedName,
    /// A closing tag appeared where an element had to start.
    UnexpectedClosingTag,
    /// Attribute value ran into end of input before its closing quote.
    UnterminatedAttribute,
    /// Comment or declaration ran into end of input.
    UnterminatedMarkup,
    /// Element was never closed, or was closed with a different name.
    UnclosedTag(String),
    /// Input ended where an element had to start.
    UnexpectedEof,
    /// Elements nested deeper than the given limit.
    TooDeep(usize),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::Expected(c) => write!(f, "expected '{}'", c),
            ParseErrorKind::ExpectedName => write!(f, "expected name"),
            ParseErrorKind::UnexpectedClosingTag => write!(f, "unexpected closing tag"),
            ParseErrorKind::UnterminatedAttribute => write!(f, "unterminated attribute value"),
            ParseErrorKind::UnterminatedMarkup => write!(f, "unterminated comment or declaration"),
            ParseErrorKind::UnclosedTag(tag) => write!(f, "Unclosed tag: {}", tag),
            ParseErrorKind::UnexpectedEof => write!(f, "unexpected end of input"),
            ParseErrorKind::TooDeep(limit) => write!(f, "elements nested deeper than {}", limit),
        }
    }
}

/// Malformed XML fragment, with the byte offset where parsing failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at position {offset}")]
pub struct ParseError {
    pub offset: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(offset: usize, kind: ParseErrorKind) -> Self {
        Self { offset, kind }
    }
}

/// Errors turning parsed XML into values or envelopes.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("XML parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("unsupported value type: <{0}>")]
    UnknownType(String),

    #[error("invalid <{tag}> value: {text:?}")]
    InvalidScalar { tag: String, text: String },

    #[error("missing <{0}> element")]
    MissingElement(&'static str),

    #[error("unexpected <{found}> inside <{parent}>")]
    UnexpectedElement { parent: &'static str, found: String },

    #[error("struct member without <name> and <value>")]
    MalformedMember,

    #[error("Not a methodResponse: <{0}>")]
    NotMethodResponse(String),

    #[error("Not a methodCall: <{0}>")]
    NotMethodCall(String),

    #[error("No params or fault in methodResponse")]
    NoParamsOrFault,

    #[error("methodResponse has both params and fault")]
    ParamsAndFault,

    #[error("fault is missing faultCode or faultString")]
    InvalidFault,

    #[error("invalid UTF-8 in body")]
    InvalidUtf8,
}

/// Values XML-RPC cannot represent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("double {0} is not finite")]
    NonFiniteDouble(f64),
}
