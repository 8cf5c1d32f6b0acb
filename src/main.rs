//! Files auth backend CLI
//!
//! Hashes passwords, validates password/ACL files, and answers auth and ACL
//! queries on stdin for the broker plugin shim.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sentinel_agent_mqtt_acl::auth::hash_password;
use sentinel_agent_mqtt_acl::{AccessLevel, AuthBackend, FilesBackend, FilesConfig, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// File-backed MQTT auth and ACL checks for Sentinel
#[derive(Parser, Debug)]
#[command(name = "sentinel-mqtt-acl")]
#[command(author = "Sentinel Contributors")]
#[command(version)]
#[command(about = "Password and ACL file backend for MQTT brokers", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON log format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a bcrypt hash for a password file entry
    Hash {
        /// Password to hash
        #[arg(short, long)]
        password: String,

        /// bcrypt cost
        #[arg(short, long, default_value_t = 10)]
        cost: u32,
    },

    /// Load the files once and report what was read
    Check(SourceArgs),

    /// Answer queries on stdin, reloading the files on SIGHUP
    ///
    /// Queries, one per line:
    ///   auth <username> <password>
    ///   acl <username> <client-id> <topic> <read|write|readwrite|subscribe>
    ///   superuser <username>
    ///   reload
    Serve(SourceArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Configuration file path (JSON)
    #[arg(short, long, conflicts_with_all = ["password_file", "acl_file"])]
    config: Option<PathBuf>,

    /// Password file (username:hash per line)
    #[arg(long)]
    password_file: Option<PathBuf>,

    /// ACL file; without one every ACL check is allowed
    #[arg(long)]
    acl_file: Option<PathBuf>,
}

impl SourceArgs {
    fn load_config(&self) -> Result<FilesConfig> {
        let config = match self.config {
            Some(ref path) => {
                info!(path = %path.display(), "Loading configuration from file");
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            None => FilesConfig {
                password_path: self.password_file.clone(),
                acl_path: self.acl_file.clone(),
                ..Default::default()
            },
        };

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Command::Hash { password, cost } => {
            let hash = hash_password(&password, cost).context("Failed to hash password")?;
            println!("{}", hash);
        }
        Command::Check(sources) => {
            let config = sources.load_config()?;
            let store = Store::load(&config).context("Failed to load files")?;
            let stats = store.stats();
            println!("users: {}", stats.users);
            match store.rules() {
                Some(rules) => {
                    println!("acl rules: {}", stats.acl_rules);
                    println!("  user rules: {}", rules.user_rules.values().map(Vec::len).sum::<usize>());
                    println!("  common rules: {}", rules.common_rules.len());
                    println!("  pattern rules: {}", rules.pattern_rules.len());
                }
                None => println!("acl: disabled"),
            }
            println!("malformed lines: {}", stats.malformed_lines);
        }
        Command::Serve(sources) => {
            let config = sources.load_config()?;
            let backend: Arc<dyn AuthBackend> =
                Arc::new(FilesBackend::new(config).context("Failed to load files")?);
            info!(
                version = env!("CARGO_PKG_VERSION"),
                backend = backend.name(),
                "Serving queries on stdin"
            );
            serve(Arc::clone(&backend)).await?;
            backend.close();
        }
    }

    Ok(())
}

async fn serve(backend: Arc<dyn AuthBackend>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut reload_signal = ReloadSignal::new().context("Failed to install SIGHUP handler")?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if let Some(reply) = answer_blocking(Arc::clone(&backend), line).await? {
                    stdout.write_all(reply.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                }
            }
            _ = reload_signal.recv() => {
                info!("Received SIGHUP");
                let backend = Arc::clone(&backend);
                if let Err(e) = tokio::task::spawn_blocking(move || backend.reload()).await? {
                    warn!(error = %e, "Reload on SIGHUP failed");
                }
            }
        }
    }

    Ok(())
}

/// Answer a query off the async workers; bcrypt and file reads block
async fn answer_blocking(backend: Arc<dyn AuthBackend>, line: String) -> Result<Option<String>> {
    let reply = tokio::task::spawn_blocking(move || answer(backend.as_ref(), &line)).await?;
    Ok(reply)
}

/// Answer one query line; blank lines get no reply
fn answer(backend: &dyn AuthBackend, line: &str) -> Option<String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let reply = match parts.as_slice() {
        [] => return None,
        ["auth", username, password] => verdict(backend.authenticate(username, password)),
        ["acl", username, client_id, topic, access] => match parse_access(access) {
            Some(access) => verdict(backend.authorize(username, client_id, topic, access)),
            None => format!("error: unknown access {}", access),
        },
        ["superuser", username] => verdict(backend.is_superuser(username)),
        ["reload"] => match backend.reload() {
            Ok(()) => "ok".to_string(),
            Err(e) => format!("error: {}", e),
        },
        _ => "error: unknown query".to_string(),
    };
    Some(reply)
}

/// Access from a keyword or a broker access code
fn parse_access(token: &str) -> Option<AccessLevel> {
    token
        .parse()
        .ok()
        .or_else(|| token.parse::<i32>().ok().and_then(AccessLevel::from_code))
}

fn verdict(allowed: bool) -> String {
    let verdict = if allowed { "allow" } else { "deny" };
    verdict.to_string()
}

#[cfg(unix)]
struct ReloadSignal(tokio::signal::unix::Signal);

#[cfg(unix)]
impl ReloadSignal {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self(signal(SignalKind::hangup())?))
    }

    async fn recv(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
struct ReloadSignal;

#[cfg(not(unix))]
impl ReloadSignal {
    fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}
