use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};
use relay::{resolve, ProcessEnv, RelayConfig, Snapshot};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod aws;
mod config;
mod submit;

use crate::config::CfgArgs;
use crate::submit::SendArgs;

#[derive(Parser, Debug)]
#[command(name = "smtp-relay", version, about = "Relay outbound mail through Amazon SES or Pinpoint")]
struct Cli {
    /// Configuration file whose settings override the command line
    #[arg(long = "config")]
    config_path: Option<String>,

    #[command(flatten)]
    cfg: CfgArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the configuration and print it as JSON
    Check,
    /// Relay one message read from stdin
    Send(SendArgs),
}

fn init_tracing(snapshot: &Snapshot) -> Result<()> {
    let settings = snapshot.settings();
    let level = settings.log_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if settings.log_json.unwrap_or(false) {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| miette::miette!("initialising logging: {e}"))
}

fn dump_config(snapshot: &Snapshot) -> Result<String> {
    let entry = serde_json::json!({
        "component": "smtp-relay",
        "cfg": snapshot,
    });
    serde_json::to_string(&entry)
        .into_diagnostic()
        .wrap_err("serialising configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let base = RelayConfig::from(cli.cfg);
    let file = cli.config_path.as_deref().map(crate::config::load).transpose()?;
    let snapshot = resolve(&base, file.as_ref(), &ProcessEnv)?;

    init_tracing(&snapshot)?;

    match cli.command.unwrap_or(Command::Check) {
        Command::Check => {
            println!("{}", dump_config(&snapshot)?);
            Ok(())
        }
        Command::Send(args) => {
            debug!(cfg = %dump_config(&snapshot)?, "Resolved configuration");
            info!(backend = %snapshot.backend(), "Relaying message from stdin");
            let clients = aws::AwsClients::load().await;
            let mut stdin = tokio::io::stdin();
            submit::submit(&snapshot, &clients, &args, &mut stdin).await
        }
    }
}
