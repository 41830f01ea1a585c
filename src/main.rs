//! existrpc - Command-line client for eXist-db over XML-RPC
//!
//! One-shot procedure calls and queries against a running database.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use existrpc_client::{Client, ClientError, ConnectionConfig, TlsClientConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "existrpc")]
#[command(about = "Command-line client for eXist-db over XML-RPC")]
#[command(version)]
struct Cli {
    /// Server URL, e.g. https://localhost:8443
    #[arg(short, long, env = "EXISTDB_SERVER")]
    server: Option<String>,

    /// User name
    #[arg(short, long, env = "EXISTDB_USER")]
    user: Option<String>,

    /// Password
    #[arg(short, long, env = "EXISTDB_PASS", hide_env_values = true)]
    pass: Option<String>,

    /// Path of the XML-RPC endpoint
    #[arg(long)]
    path: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    // ===== TLS Options =====
    /// Path to CA certificate for server verification
    #[arg(long, env = "EXISTDB_CA_CERT")]
    ca_cert: Option<PathBuf>,

    /// Skip server certificate verification (INSECURE)
    #[arg(long, short = 'k')]
    insecure: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Invoke a remote procedure
    Call {
        /// Procedure name
        method: String,

        /// Parameters as JSON (or @file.json to read from file)
        args: Vec<String>,
    },

    /// Run a bounded query in a single call
    Read {
        /// Query text (or @file.xq to read from file)
        query: String,

        /// First item to return, 1-based
        #[arg(long, default_value = "1")]
        start: i64,

        /// Number of items to return
        #[arg(long, default_value = "1")]
        limit: i64,

        /// External variable as name=json
        #[arg(long = "var", value_parser = commands::parse_var)]
        vars: Vec<(String, serde_json::Value)>,
    },

    /// Run a query and fetch every result
    Query {
        /// Query text (or @file.xq to read from file)
        query: String,

        /// External variable as name=json
        #[arg(long = "var", value_parser = commands::parse_var)]
        vars: Vec<(String, serde_json::Value)>,
    },

    /// Upload a main module as binary and fetch every result
    QueryFile {
        /// Path to the module
        path: PathBuf,

        /// External variable as name=json
        #[arg(long = "var", value_parser = commands::parse_var)]
        vars: Vec<(String, serde_json::Value)>,
    },
}

fn build_config(cli: &Cli) -> Result<ConnectionConfig, ClientError> {
    let mut config = match cli.server {
        Some(ref url) => ConnectionConfig::from_url(url)?,
        None => ConnectionConfig::default(),
    };

    if let Some(ref path) = cli.path {
        config = config.with_path(path.as_str());
    }
    // Same rule as the environment: credentials need both halves.
    match (&cli.user, &cli.pass) {
        (Some(user), Some(pass)) => {
            config = config.with_basic_auth(user.as_str(), pass.as_str());
        }
        (Some(_), None) => {
            return Err(ClientError::InvalidConfig(
                "--user requires --pass (or EXISTDB_PASS)".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(ClientError::InvalidConfig(
                "--pass requires --user (or EXISTDB_USER)".to_string(),
            ));
        }
        (None, None) => {}
    }
    if let Some(ref path) = cli.ca_cert {
        config = config.with_tls(TlsClientConfig::new().with_ca_cert(path.clone()));
    }
    if cli.insecure {
        config = config.with_reject_unauthorized(false);
    }

    Ok(config.with_request_timeout(Duration::from_secs(cli.timeout)))
}

fn report(err: &(dyn std::error::Error + 'static)) {
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::Fault { code, message }) => {
            eprintln!("{} {}", "Fault".red(), code.to_string().yellow());
            eprintln!("{}", message);
        }
        Some(ClientError::Decode { source, body }) => {
            eprintln!("{}: {}", "Invalid response".red(), source);
            eprintln!("{}", body.dimmed());
        }
        _ => eprintln!("{}: {}", "Error".red(), err),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let client = match build_config(&cli).and_then(Client::new) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}: {}", "Invalid configuration".red(), e);
            std::process::exit(2);
        }
    };

    match commands::execute(&client, cli.command).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            report(e.as_ref());
            std::process::exit(1);
        }
    }
}
