//! Query execution and paginated result sets.
//!
//! A result set lives on the server between `executeQuery` and
//! `releaseQueryResult`:
//!
//! ```text
//! execute ──> Open ──count / retrieve*──> Open ──release──> Released
//! ```
//!
//! [`Client::read_all`] drives the whole cycle and always attempts the
//! release once a handle exists, even when a later step fails.

use crate::client::Client;
use crate::error::{ClientError, LifecycleError};
use existrpc_protocol::{Struct, Value};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Serialize, Serializer};
use std::fmt;

/// Remote procedure for one-shot bounded queries.
pub const METHOD_QUERY: &str = "query";
/// Remote procedure that opens a result set.
pub const METHOD_EXECUTE: &str = "executeQuery";
/// Remote procedure returning the size of a result set.
pub const METHOD_GET_HITS: &str = "getHits";
/// Remote procedure returning one item of a result set.
pub const METHOD_RETRIEVE: &str = "retrieve";
/// Remote procedure freeing a result set.
pub const METHOD_RELEASE: &str = "releaseQueryResult";

/// Most `retrieve` calls [`ResultSet::retrieve_all`] keeps in flight at once.
pub const MAX_CONCURRENT_RETRIEVES: usize = 16;

/// Query payload: source text, or the raw bytes of a main module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Text(String),
    Binary(Vec<u8>),
}

impl Query {
    pub fn to_value(&self) -> Value {
        match self {
            Query::Text(text) => Value::String(text.clone()),
            Query::Binary(bytes) => Value::Base64(bytes.clone()),
        }
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Query::Text(text.to_string())
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Query::Text(text)
    }
}

impl From<Vec<u8>> for Query {
    fn from(bytes: Vec<u8>) -> Self {
        Query::Binary(bytes)
    }
}

impl From<&[u8]> for Query {
    fn from(bytes: &[u8]) -> Self {
        Query::Binary(bytes.to_vec())
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Options for [`Client::read`], [`Client::execute`] and [`Client::read_all`].
///
/// `start` (1-based) and `limit` are consumed by this crate and are never
/// part of the options struct sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    start: i64,
    limit: i64,
    options: Struct,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            start: 1,
            limit: 1,
            options: Struct::new(),
        }
    }
}

fn at_least_one(value: &Value) -> i64 {
    match value {
        Value::Int(n) if *n >= 1 => *n,
        _ => 1,
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits a generic options mapping: `start` and `limit` are extracted
    /// (missing or less than 1 means 1), everything else passes through.
    pub fn from_struct(options: Struct) -> Self {
        options
            .into_iter()
            .fold(Self::default(), |acc, (key, value)| acc.with_option(key, value))
    }

    pub fn with_start(mut self, start: i64) -> Self {
        self.start = start.max(1);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Sets a passthrough option. `start` and `limit` are routed to their
    /// own fields.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            "start" => self.start = at_least_one(&value),
            "limit" => self.limit = at_least_one(&value),
            _ => {
                self.options.insert(key, value);
            }
        }
        self
    }

    /// Binds an external variable, stored under the `variables` option.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        match self.options.get_mut("variables") {
            Some(Value::Struct(vars)) => {
                vars.insert(name, value);
            }
            _ => {
                self.options
                    .insert("variables", Struct::new().with(name, value));
            }
        }
        self
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// The options struct as sent to the server.
    pub fn options(&self) -> &Struct {
        &self.options
    }

    pub fn into_options(self) -> Struct {
        self.options
    }
}

/// Server-assigned id of an open result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultHandle(i64);

impl ResultHandle {
    pub fn id(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ResultHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ResultHandle> for Value {
    fn from(handle: ResultHandle) -> Self {
        Value::Int(handle.0)
    }
}

/// Everything [`Client::read_all`] collected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadAllResult {
    pub query: Query,
    /// Options as supplied, without `start` and `limit`.
    pub options: Struct,
    /// Size of the result set when it was opened.
    pub hits: i64,
    /// One value per result item, in document order.
    pub pages: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Open,
    Released,
}

/// An open server-side result set.
///
/// Owned by whoever executed the query; release it exactly once with
/// [`ResultSet::release`]. Dropping an open set leaks the handle until the
/// server times it out.
pub struct ResultSet {
    client: Client,
    handle: ResultHandle,
    state: HandleState,
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("handle", &self.handle)
            .field("state", &self.state)
            .finish()
    }
}

impl ResultSet {
    pub fn handle(&self) -> ResultHandle {
        self.handle
    }

    pub fn is_released(&self) -> bool {
        self.state == HandleState::Released
    }

    fn ensure_open(&self) -> Result<(), LifecycleError> {
        match self.state {
            HandleState::Open => Ok(()),
            HandleState::Released => Err(LifecycleError::Released(self.handle.id())),
        }
    }

    /// Number of items in the result set.
    pub async fn count(&self) -> Result<i64, ClientError> {
        self.ensure_open()?;
        self.client
            .invoke_int(METHOD_GET_HITS, vec![self.handle.into()])
            .await
    }

    /// Item at a 0-based position.
    pub async fn retrieve(&self, position: i64) -> Result<Value, ClientError> {
        self.ensure_open()?;
        self.client
            .invoke(
                METHOD_RETRIEVE,
                vec![self.handle.into(), Value::Int(position), Value::Struct(Struct::new())],
            )
            .await
    }

    /// Items `0..count`, in document order.
    pub async fn retrieve_all(&self, count: i64) -> Result<Vec<Value>, ClientError> {
        self.ensure_open()?;
        self.retrieve_descending_then_reverse(count).await
    }

    /// Issues `retrieve` for positions `count - 1` down to `0`, at most
    /// [`MAX_CONCURRENT_RETRIEVES`] at a time, then reverses the collected values.
    ///
    /// The server hands out positions in the inverse of document order, so
    /// the calls go out last-first and the result vector is flipped: index 0
    /// holds the first logical item regardless of which response arrived first.
    async fn retrieve_descending_then_reverse(
        &self,
        count: i64,
    ) -> Result<Vec<Value>, ClientError> {
        let mut pages: Vec<Value> = stream::iter((0..count.max(0)).rev())
            .map(|position| self.retrieve(position))
            .buffered(MAX_CONCURRENT_RETRIEVES)
            .try_collect()
            .await?;
        pages.reverse();
        Ok(pages)
    }

    /// Frees the result set on the server.
    ///
    /// The handle counts as released once the call is issued, whatever its
    /// outcome, so a failed release is never repeated.
    pub async fn release(&mut self) -> Result<(), ClientError> {
        self.ensure_open()?;
        self.state = HandleState::Released;
        tracing::debug!("Releasing result handle {}", self.handle);
        self.client
            .invoke(METHOD_RELEASE, vec![self.handle.into()])
            .await?;
        Ok(())
    }
}

impl Drop for ResultSet {
    fn drop(&mut self) {
        if self.state == HandleState::Open {
            tracing::warn!(
                "Result handle {} dropped without release; it stays open on the server until it times out",
                self.handle
            );
        }
    }
}

// =========================================================================
// Query operations
// =========================================================================

impl Client {
    /// Runs a bounded query in one call, without opening a result set.
    ///
    /// Sends `(query, limit, start, options)`: note that `limit` precedes `start`.
    pub async fn read(
        &self,
        query: impl Into<Query>,
        options: QueryOptions,
    ) -> Result<Value, ClientError> {
        let query = query.into();
        let params = vec![
            query.to_value(),
            Value::Int(options.limit()),
            Value::Int(options.start()),
            Value::Struct(options.into_options()),
        ];
        self.invoke(METHOD_QUERY, params).await
    }

    /// Executes a query and opens its result set.
    pub async fn execute(
        &self,
        query: impl Into<Query>,
        options: &QueryOptions,
    ) -> Result<ResultSet, ClientError> {
        let query = query.into();
        let id = self
            .invoke_int(
                METHOD_EXECUTE,
                vec![query.to_value(), Value::Struct(options.options().clone())],
            )
            .await?;
        tracing::debug!("Opened result handle {}", id);

        Ok(ResultSet {
            client: self.clone(),
            handle: ResultHandle(id),
            state: HandleState::Open,
        })
    }

    /// Executes a query and collects every result item.
    ///
    /// Once the result set is open it is released on every path. When
    /// counting or retrieving fails, that error is returned even if the
    /// release fails too; the release failure is only logged.
    pub async fn read_all(
        &self,
        query: impl Into<Query>,
        options: QueryOptions,
    ) -> Result<ReadAllResult, ClientError> {
        let query = query.into();
        let mut results = self.execute(query.clone(), &options).await?;

        let fetched = async {
            let hits = results.count().await?;
            let pages = results.retrieve_all(hits).await?;
            Ok::<_, ClientError>((hits, pages))
        }
        .await;

        match fetched {
            Ok((hits, pages)) => {
                results.release().await?;
                Ok(ReadAllResult {
                    query,
                    options: options.into_options(),
                    hits,
                    pages,
                })
            }
            Err(e) => {
                if let Err(release_err) = results.release().await {
                    tracing::warn!(
                        "Failed to release result handle {} after error ({}): {}",
                        results.handle(),
                        e,
                        release_err
                    );
                }
                Err(e)
            }
        }
    }
}
