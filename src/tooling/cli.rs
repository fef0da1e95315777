//! CLI Tooling
//!
//! Command-line entry points: inspect the effective configuration and run a
//! scripted session against an in-process server.

use crate::auth::Entity;
use crate::config::{ConfigLoader, ServerConfig};
use crate::error::ApiError;
use crate::facade::params::SetStatus;
use crate::logging::LoggingConfig;
use crate::server::Server;
use crate::types::{MachineJob, StatusKind};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// How long the demo waits on any single watcher fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// apiroot - per-connection API root for a cluster controller
#[derive(Parser)]
#[command(name = "apiroot")]
#[command(about = "Per-connection API root: facades, watchers and teardown")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the effective configuration
    Config {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Run a scripted agent and client session, then tear both down
    Demo {
        /// Units of the demo service to place on the agent's machine
        #[arg(long, default_value = "2")]
        units: usize,
    },
}

/// Loaded configuration plus the command runner.
pub struct CliContext {
    config: ServerConfig,
}

impl CliContext {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Ok(Self { config })
    }

    pub fn from_config(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Logging settings with CLI flags applied over the configuration.
    pub fn logging_config(&self, cli: &Cli) -> LoggingConfig {
        let mut logging = self.config.logging.clone();
        if cli.verbose {
            logging.level = "debug".to_string();
        }
        if let Some(level) = &cli.log_level {
            logging.level = level.clone();
        }
        if let Some(format) = &cli.log_format {
            logging.format = format.clone();
        }
        if let Some(output) = &cli.log_output {
            logging.output = output.clone();
        }
        if let Some(file) = &cli.log_file {
            logging.file = Some(file.clone());
        }
        logging
    }

    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Config { format } => self.show_config(format),
            Commands::Demo { units } => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| ApiError::ConfigError(format!("Failed to start runtime: {}", e)))?;
                runtime.block_on(run_demo(self.config.clone(), *units))
            }
        }
    }

    fn show_config(&self, format: &str) -> Result<String, ApiError> {
        match format {
            "toml" => toml::to_string_pretty(&self.config)
                .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
            "json" => serde_json::to_string_pretty(&self.config)
                .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
            other => Err(ApiError::InvalidArgument(format!(
                "unknown format {:?} (must be 'toml' or 'json')",
                other
            ))),
        }
    }
}

/// Await a watcher fetch, reporting a stall instead of hanging.
async fn fetch<T: std::fmt::Debug>(fut: impl Future<Output = Result<T, ApiError>>) -> String {
    match tokio::time::timeout(FETCH_TIMEOUT, fut).await {
        Ok(Ok(value)) => format!("{:?}", value),
        Ok(Err(e)) if e.is_end_of_stream() => format!("ended: {}", e),
        Ok(Err(e)) => format!("error: {}", e),
        Err(_) => "timed out".to_string(),
    }
}

/// Scripted session: a client builds a small environment, the machine agent
/// watches its machine and units, then both connections are torn down while
/// fetches are still pending.
pub async fn run_demo(config: ServerConfig, units: usize) -> Result<String, ApiError> {
    let mut out = Vec::new();
    let server = Server::new(config)?;

    let admin = server.login(Entity::user("admin"))?;
    let client = admin.client("")?;
    let machine_id = client.add_machine(vec![MachineJob::HostUnits])?;
    for _ in 0..units {
        client.add_unit("demo", Some(&machine_id))?;
    }
    out.push(format!("client added machine {} with {} unit(s)", machine_id, units));

    let all_id = admin.watch_all()?.all_watcher_id;
    let all = admin.all_watcher(&all_id)?;
    let initial = all.next().await?;
    out.push(format!("all watcher {} initial deltas: {}", all_id, initial.len()));

    let agent = server.login(Entity::machine(machine_id.clone(), vec![MachineJob::HostUnits]))?;
    let tag = agent.authorizer().auth_tag().to_string();
    let machiner = agent.machiner("")?;
    let watch = machiner.watch(&[tag.clone()]).await;
    let notify_id = watch
        .into_iter()
        .next()
        .and_then(|r| r.error.is_none().then_some(r.notify_watcher_id))
        .ok_or(ApiError::PermissionDenied)?;
    let notify = agent.notify_watcher(&notify_id)?;

    let units_watch = agent.deployer("")?.watch_units(&[tag.clone()]).await;
    let strings_id = match units_watch.into_iter().next() {
        Some(r) if r.error.is_none() => {
            out.push(format!("deployer sees units {:?}", r.changes));
            r.strings_watcher_id
        }
        _ => return Err(ApiError::PermissionDenied),
    };
    let strings = agent.strings_watcher(&strings_id)?;

    let pending = tokio::spawn(async move { fetch(notify.next()).await });
    machiner.set_status(&[SetStatus {
        tag,
        status: StatusKind::Started,
        info: "demo".to_string(),
    }]);
    let seen = pending
        .await
        .map_err(|e| ApiError::InvalidArgument(format!("demo task failed: {}", e)))?;
    out.push(format!("machine watcher {} saw status change: {}", notify_id, seen));
    let deltas = all.next().await?;
    out.push(format!("all watcher {} deltas after status change: {}", all_id, deltas.len()));

    match agent.all_watcher(&notify_id) {
        Ok(_) => out.push("unexpected wrapper for mismatched id".to_string()),
        Err(e) => out.push(format!("agent all_watcher({}) -> {}", notify_id, e)),
    }
    match agent.client("") {
        Ok(_) => out.push("unexpected client facade for agent".to_string()),
        Err(e) => out.push(format!("agent client(\"\") -> {}", e)),
    }

    let blocked = vec![
        tokio::spawn(async move { fetch(strings.next()).await }),
        tokio::spawn(async move { fetch(all.next()).await }),
    ];
    tokio::task::yield_now().await;
    agent.kill();
    admin.kill();
    for (n, res) in join_all(blocked).await.into_iter().enumerate() {
        let res = res.unwrap_or_else(|e| format!("task failed: {}", e));
        out.push(format!("pending fetch {} after teardown: {}", n + 1, res));
    }
    out.push(format!(
        "agent root {} ({} resources), client root {} ({} resources)",
        agent.lifecycle(),
        agent.resources().count(),
        admin.lifecycle(),
        admin.resources().count()
    ));
    info!("Demo session finished");
    server.close();
    Ok(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_demo_runs_to_teardown() {
        let out = run_demo(ServerConfig::default(), 1).await.unwrap();
        assert!(out.contains("deployer sees units [\"demo/0\"]"), "{}", out);
        assert!(out.contains("saw status change: ()"), "{}", out);
        assert!(out.contains("-> unknown watcher id"), "{}", out);
        assert!(out.contains("-> permission denied"), "{}", out);
        assert_eq!(out.matches("ended: watcher was stopped").count(), 2, "{}", out);
        assert!(out.contains("agent root terminated (0 resources)"), "{}", out);
    }

    #[tokio::test]
    async fn test_fetch_separates_end_of_stream_from_errors() {
        let stopped = fetch(async { Err::<(), _>(ApiError::StoppedWatcher) }).await;
        assert_eq!(stopped, "ended: watcher was stopped");
        let closed = fetch(async { Err::<(), _>(ApiError::StoreClosed) }).await;
        assert!(closed.starts_with("ended: "), "{}", closed);
        let denied = fetch(async { Err::<(), _>(ApiError::PermissionDenied) }).await;
        assert_eq!(denied, "error: permission denied");
    }

    #[test]
    fn test_show_config_formats() {
        let ctx = CliContext::from_config(ServerConfig::default());
        let toml_out = ctx.execute(&Commands::Config { format: "toml".into() }).unwrap();
        assert!(toml_out.contains("change_buffer = 256"));
        let json_out = ctx.execute(&Commands::Config { format: "json".into() }).unwrap();
        assert!(json_out.contains("\"change_buffer\": 256"));
        assert!(ctx.execute(&Commands::Config { format: "yaml".into() }).is_err());
    }

    #[test]
    fn test_cli_flags_override_logging() {
        let cli = Cli::parse_from(["apiroot", "--verbose", "--log-format", "json", "demo"]);
        let ctx = CliContext::from_config(ServerConfig::default());
        let logging = ctx.logging_config(&cli);
        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, "json");
        assert!(matches!(cli.command, Commands::Demo { units: 2 }));
    }
}
