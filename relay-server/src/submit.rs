use std::net::SocketAddr;
use std::sync::Arc;

use clap::Args;
use miette::{bail, Result};
use relay::{new_client, ClientProvider, Relay, RelayError, Snapshot, TracingLog};
use tokio::io::AsyncRead;

/// Relay a single message read from stdin, sendmail style.
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Envelope sender address
    #[arg(long)]
    pub from: String,

    /// Envelope recipient address, may be repeated
    #[arg(long = "to", required = true)]
    pub to: Vec<String>,

    /// Address of the submitting client, recorded in the relay log
    #[arg(long)]
    pub origin: Option<SocketAddr>,
}

/// Checks the client address, then relays `body` through the configured backend.
pub async fn submit(
    snapshot: &Snapshot,
    clients: &dyn ClientProvider,
    args: &SendArgs,
    body: &mut (dyn AsyncRead + Unpin + Send),
) -> Result<()> {
    if let Some(origin) = args.origin {
        let ip = origin.ip().to_string();
        if !snapshot.is_ip_allowed(&ip) {
            bail!("client address {ip} is not allowed to relay");
        }
    }

    let relay = new_client(snapshot, clients, Arc::new(TracingLog));
    relay
        .send(args.origin, &args.from, &args.to, body)
        .await
        .map_err(|e: RelayError| {
            let code = e.reply_code();
            miette::Report::new(e).wrap_err(format!("message rejected with {code}"))
        })
}
