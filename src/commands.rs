//! Command execution.

use crate::Commands;
use existrpc_client::{Client, QueryOptions};
use existrpc_protocol::Value;

/// Executes a command and returns the formatted output.
pub async fn execute(client: &Client, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Call { method, args } => {
            let params = args
                .iter()
                .map(|arg| parse_json_arg(arg).map(Value::from))
                .collect::<Result<Vec<_>, _>>()?;
            let result = client.invoke(&method, params).await?;
            Ok(format_json(&result)?)
        }

        Commands::Read {
            query,
            start,
            limit,
            vars,
        } => {
            let options = with_vars(QueryOptions::new().with_start(start).with_limit(limit), vars);
            let result = client.read(read_text_arg(&query)?, options).await?;
            Ok(format_json(&result)?)
        }

        Commands::Query { query, vars } => {
            let options = with_vars(QueryOptions::new(), vars);
            let result = client.read_all(read_text_arg(&query)?, options).await?;
            Ok(format_json(&result)?)
        }

        Commands::QueryFile { path, vars } => {
            let module = std::fs::read(&path)?;
            let options = with_vars(QueryOptions::new(), vars);
            let result = client.read_all(module, options).await?;
            Ok(format_json(&result)?)
        }
    }
}

fn with_vars(options: QueryOptions, vars: Vec<(String, serde_json::Value)>) -> QueryOptions {
    vars.into_iter()
        .fold(options, |acc, (name, value)| acc.with_variable(name, Value::from(value)))
}

/// Parses `name=json`. A value that is not valid JSON is taken as a string.
pub fn parse_var(arg: &str) -> Result<(String, serde_json::Value), String> {
    let (name, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", arg))?;
    if name.is_empty() {
        return Err("variable name is empty".to_string());
    }
    let value = serde_json::from_str(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

/// Parses a JSON argument, or reads it from a file if prefixed with @.
fn parse_json_arg(arg: &str) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(arg)?)
    }
}

/// Returns the argument, or the contents of a file if prefixed with @.
fn read_text_arg(arg: &str) -> Result<String, std::io::Error> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path),
        None => Ok(arg.to_string()),
    }
}

/// Formats a result for display.
fn format_json<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}
